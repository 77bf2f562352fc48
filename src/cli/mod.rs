pub mod app;
mod commands;

pub use app::{App, RunOptions, print_report, PARTIAL_FAILURE_EXIT_CODE};
pub use commands::{Args, Commands};
