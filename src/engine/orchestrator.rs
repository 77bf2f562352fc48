// src/engine/orchestrator.rs
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{info, warn, error, debug};
use uuid::Uuid;

use crate::context::Context;
use crate::core::source::{Source, SourceOutput};
use crate::error::{ScrapeResult, ScrapeError};
use super::pool::panic_message;

/// Final status of one source execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SourceStatus {
    Completed,
    Failed,
}

/// Outcome of one source execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub status: SourceStatus,
    pub records: Option<usize>,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Aggregated result of an orchestrated run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<SourceOutcome>,
    /// Requested names that matched no registered source
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn completed(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| o.status == SourceStatus::Completed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| o.status == SourceStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

/// Launches one independent execution per requested source and joins them all
pub struct Orchestrator {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl Orchestrator {
    /// Create an orchestrator with no sources
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Register a source under its lowercase name
    pub fn register(&mut self, source: Arc<dyn Source>) {
        let key = source.name().to_lowercase();
        if self.sources.contains_key(&key) {
            warn!("Source '{}' is already registered, overriding", key);
        }
        self.sources.insert(key, source);
    }

    /// Look up a source by name, ignoring case and surrounding whitespace
    pub fn get(&self, name: &str) -> ScrapeResult<Arc<dyn Source>> {
        self.sources
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| ScrapeError::SourceNotFound(name.trim().to_string()))
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Registered sources sorted by name
    pub fn sources(&self) -> Vec<Arc<dyn Source>> {
        let mut sources: Vec<_> = self.sources.values().cloned().collect();
        sources.sort_by(|a, b| a.name().cmp(b.name()));
        sources
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources().iter().map(|s| s.name().to_string()).collect()
    }

    /// Run the named sources concurrently and wait for every one of them.
    ///
    /// Unknown names are skipped with a warning. A source that errors or panics
    /// is recorded as failed without touching its siblings or the pool. The
    /// caller stops the pool afterwards; by the time this returns no source is
    /// submitting any more.
    pub async fn run(&self, names: &[String], ctx: Arc<Context>) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut skipped = Vec::new();
        let mut seen = HashSet::new();
        let mut handles = Vec::new();

        for raw in names {
            let requested = raw.trim();
            if requested.is_empty() || !seen.insert(requested.to_lowercase()) {
                continue;
            }

            let source = match self.get(requested) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Skipping: {}", e);
                    skipped.push(requested.to_string());
                    continue;
                }
            };

            let name = source.name().to_string();
            let ctx = ctx.clone();
            info!(%run_id, source = %name, "Starting source");

            let handle = tokio::spawn(async move {
                let start = Instant::now();
                let result = source.execute(&ctx).await;
                (result, start.elapsed())
            });
            handles.push((name, Instant::now(), handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, launched, handle) in handles {
            let outcome = match handle.await {
                Ok((result, elapsed)) => Self::outcome(&name, result, elapsed),
                Err(e) => {
                    let message = if e.is_panic() {
                        format!("source panicked: {}", panic_message(e.into_panic().as_ref()))
                    } else {
                        format!("source task cancelled: {}", e)
                    };
                    Self::outcome(&name, Err(ScrapeError::source_failure(&name, message)), launched.elapsed())
                }
            };
            outcomes.push(outcome);
        }

        debug!(%run_id, "Joined {} source executions", outcomes.len());

        RunReport {
            run_id,
            started_at,
            outcomes,
            skipped,
        }
    }

    fn outcome(name: &str, result: ScrapeResult<SourceOutput>, elapsed: Duration) -> SourceOutcome {
        match result {
            Ok(output) => {
                info!(source = %name, "Source finished with {} records in {:?}", output.records, elapsed);
                SourceOutcome {
                    source: name.to_string(),
                    status: SourceStatus::Completed,
                    records: Some(output.records),
                    output: Some(output.path),
                    error: None,
                    elapsed,
                }
            }
            Err(e) => {
                error!(source = %name, "Source failed: {}", e);
                SourceOutcome {
                    source: name.to_string(),
                    status: SourceStatus::Failed,
                    records: None,
                    output: None,
                    error: Some(e.to_string()),
                    elapsed,
                }
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
