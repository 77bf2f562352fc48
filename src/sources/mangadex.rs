// src/sources/mangadex.rs
use std::collections::BTreeMap;
use std::sync::Arc;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, debug, warn};
use url::Url;

use crate::config::MangaDexConfig;
use crate::context::Context;
use crate::core::model::Manga;
use crate::core::source::{Source, SourceOutput};
use crate::engine::gather;
use crate::error::{ScrapeResult, ScrapeError};
use crate::utils::http::Fetcher;

const NAME: &str = "mangadex";
const TITLE_URL: &str = "https://mangadex.org/title";
const COVER_URL: &str = "https://uploads.mangadex.org/covers";

/// MangaDex catalogue via the public JSON API
pub struct MangaDexSource {
    fetcher: Arc<dyn Fetcher>,
    config: MangaDexConfig,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiManga {
    id: String,
    attributes: ApiAttributes,
    #[serde(default)]
    relationships: Vec<ApiRelationship>,
}

#[derive(Debug, Deserialize)]
struct ApiAttributes {
    #[serde(default)]
    title: BTreeMap<String, String>,
    #[serde(default)]
    description: BTreeMap<String, String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRelationship {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Option<Value>,
}

impl MangaDexSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: MangaDexConfig) -> Self {
        Self { fetcher, config }
    }

    /// Offsets requested for one run
    fn offsets(&self) -> Vec<usize> {
        let step = self.config.page_size.max(1);
        (0..=self.config.max_offset).step_by(step).collect()
    }

    fn page_url(&self, offset: usize) -> ScrapeResult<String> {
        let base = format!("{}/manga", self.config.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&base)
            .map_err(|e| ScrapeError::ConfigError(format!("Invalid MangaDex base URL {}: {}", base, e)))?;

        url.query_pairs_mut()
            .append_pair("limit", &self.config.page_size.max(1).to_string())
            .append_pair("offset", &offset.to_string())
            .append_pair("includes[]", "cover_art");

        Ok(url.into())
    }
}

/// Decode one API page, skipping entries that do not match the expected shape
fn parse_page(body: &str) -> ScrapeResult<Vec<Manga>> {
    let page: ApiPage = serde_json::from_str(body).map_err(|e| ScrapeError::ParseError {
        context: "MangaDex page".to_string(),
        message: e.to_string(),
    })?;

    let mut entries = Vec::with_capacity(page.data.len());
    for item in page.data {
        match serde_json::from_value::<ApiManga>(item) {
            Ok(entry) => entries.push(to_manga(entry)),
            Err(e) => debug!("Skipping malformed MangaDex entry: {}", e),
        }
    }
    Ok(entries)
}

fn to_manga(entry: ApiManga) -> Manga {
    let title = entry.attributes.title.get("en")
        .or_else(|| entry.attributes.title.values().next())
        .cloned()
        .unwrap_or_default();

    let cover_url = entry.relationships.iter()
        .filter(|rel| rel.kind == "cover_art")
        .filter_map(|rel| rel.attributes.as_ref()?.get("fileName")?.as_str())
        .filter_map(|file| file.rsplit('/').next())
        .filter(|file| !file.is_empty())
        .last()
        .map(|file| format!("{}/{}/{}", COVER_URL, entry.id, file));

    Manga {
        title,
        description: entry.attributes.description.get("en").cloned().filter(|d| !d.is_empty()),
        url: Some(entry.id.clone()),
        public_url: Some(format!("{}/{}", TITLE_URL, entry.id)),
        cover_url,
        state: entry.attributes.status,
        id: entry.id,
        ..Default::default()
    }
}

#[async_trait]
impl Source for MangaDexSource {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "MangaDex catalogue through api.mangadex.org"
    }

    async fn execute(&self, ctx: &Context) -> ScrapeResult<SourceOutput> {
        let offsets = self.offsets();
        info!(source = NAME, "Fetching {} pages", offsets.len());

        let mut jobs = Vec::with_capacity(offsets.len());
        for &offset in &offsets {
            let url = self.page_url(offset)?;
            let fetcher = self.fetcher.clone();
            jobs.push(async move {
                match fetcher.fetch_text(&url).await {
                    Ok(body) => parse_page(&body),
                    Err(e) => Err(ScrapeError::NetworkError(format!("{:#}", e))),
                }
            });
        }

        let pages = gather(&ctx.pool, jobs).await?;

        let mut all = Vec::new();
        for (offset, page) in offsets.iter().zip(pages) {
            let entries = match page {
                Some(Ok(entries)) => entries,
                Some(Err(e)) => {
                    warn!(source = NAME, offset, "Page failed: {}", e);
                    return Err(ScrapeError::source_failure(NAME, format!("offset {}: {}", offset, e)));
                }
                None => {
                    return Err(ScrapeError::source_failure(NAME, format!("offset {}: page task faulted", offset)));
                }
            };

            // The catalogue ends at the first empty page.
            if entries.is_empty() {
                debug!(source = NAME, offset, "Reached end of catalogue");
                break;
            }
            all.extend(entries);
        }

        ctx.save(NAME, all).await
    }
}
