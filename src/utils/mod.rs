pub mod http;

pub use http::{Fetcher, HttpClient};
