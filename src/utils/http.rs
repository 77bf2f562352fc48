// src/utils/http.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use anyhow::{Result, Context};
use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::debug;

use crate::config::HttpConfig;

/// Longest response body excerpt carried in an error
const BODY_EXCERPT_LEN: usize = 200;

/// Anything that can turn a URL into page text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body, failing on non-success statuses
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// HTTP client for fetching pages
pub struct HttpClient {
    client: Client,
    user_agents: Vec<String>,
    accept_language: String,
    next_agent: AtomicUsize,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let mut user_agents = config.user_agents.clone();
        if user_agents.is_empty() {
            user_agents.push(format!("mangascrape/{}", env!("CARGO_PKG_VERSION")));
        }

        Ok(Self {
            client,
            user_agents,
            accept_language: config.accept_language.clone(),
            next_agent: AtomicUsize::new(0),
        })
    }

    /// Next user agent in round-robin order
    pub fn user_agent(&self) -> &str {
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        &self.user_agents[index]
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let response = self.client
            .get(url)
            .header(header::USER_AGENT, self.user_agent())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8")
            .header(header::ACCEPT_LANGUAGE, &self.accept_language)
            .send()
            .await
            .context(format!("Failed to GET {}", url))?;

        let status = response.status();
        let body = response.text().await
            .context(format!("Failed to read body of {}", url))?;

        if !status.is_success() {
            let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
            return Err(anyhow::anyhow!("Unexpected status {} fetching {}: {}", status, url, excerpt));
        }

        Ok(body)
    }
}
