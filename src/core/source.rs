// src/core/source.rs
use std::path::PathBuf;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::context::Context;
use crate::error::ScrapeResult;

/// What a source persisted once it finished
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceOutput {
    pub records: usize,
    pub path: PathBuf,
}

/// Trait that every site scraper implements
#[async_trait]
pub trait Source: Send + Sync {
    /// Name used for selection and for the output file
    fn name(&self) -> &str;

    /// Short human readable description
    fn description(&self) -> &str {
        ""
    }

    /// Collect records, fanning sub-work out to `ctx.pool`, and persist them through `ctx.save`
    async fn execute(&self, ctx: &Context) -> ScrapeResult<SourceOutput>;
}
