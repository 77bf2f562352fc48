pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod sources;
pub mod utils;

// Re-export main types for easier access
pub use cli::App;
pub use config::Config;
pub use context::Context;
pub use crate::core::{
    AtomicWriter,
    Manga,
    Source,
    SourceOutput
};
pub use engine::{
    Orchestrator,
    RunReport,
    TaskPool
};
pub use error::{ScrapeError, ScrapeResult};
