// src/context.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::Serialize;

use crate::core::output::AtomicWriter;
use crate::core::source::SourceOutput;
use crate::engine::TaskPool;
use crate::error::{ScrapeResult, ScrapeError};

/// Shared resources handed to every source execution.
///
/// The pool and the writer are the only state shared between concurrently
/// running sources; both synchronize internally.
#[derive(Clone)]
pub struct Context {
    pub output_dir: PathBuf,
    pub pool: Arc<TaskPool>,
    pub writer: Arc<AtomicWriter>,
}

impl Context {
    /// Create a new context
    pub fn new(output_dir: impl Into<PathBuf>, pool: Arc<TaskPool>, writer: Arc<AtomicWriter>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pool,
            writer,
        }
    }

    /// Output directory for this run
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Atomically persist `records` as `<output_dir>/<name>.json`
    pub async fn save<T>(&self, name: &str, records: Vec<T>) -> ScrapeResult<SourceOutput>
    where
        T: Serialize + Send + 'static,
    {
        let writer = self.writer.clone();
        let dir = self.output_dir.clone();
        let name = name.to_string();
        let count = records.len();

        let path = tokio::task::spawn_blocking(move || writer.write_json(&dir, &name, &records))
            .await
            .map_err(|e| ScrapeError::UnexpectedError(format!("Write task failed: {}", e)))??;

        Ok(SourceOutput { records: count, path })
    }

    /// Ensure the output directory exists
    pub async fn ensure_output_dir(&self) -> ScrapeResult<()> {
        tokio::fs::create_dir_all(&self.output_dir).await
            .map_err(|e| ScrapeError::FileError {
                path: self.output_dir.clone(),
                message: format!("Failed to create directory: {}", e),
            })
    }
}
