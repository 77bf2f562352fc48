use serde::{Serialize, Deserialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub global: GlobalConfig,
    pub http: HttpConfig,
    pub sources: SourcesConfig,
}

/// Run-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    pub output_dir: PathBuf,
    /// Pool workers; zero selects the pool's default
    pub workers: usize,
    pub sites: Vec<String>,
    pub exit_policy: ExitPolicy,
}

/// Whether failed sources affect the process exit status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Exit 0 whenever the run itself could start
    #[default]
    AlwaysSucceed,
    /// Exit non-zero when any source failed
    FailOnSourceError,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub accept_language: String,
    pub user_agents: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    pub mangadex: MangaDexConfig,
    pub batoto: BatotoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MangaDexConfig {
    pub base_url: String,
    pub page_size: usize,
    /// Highest offset requested
    pub max_offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatotoConfig {
    pub base_url: String,
    /// Number of browse pages to fetch
    pub pages: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            workers: 8,
            sites: vec!["mangadex".to_string(), "batoto".to_string()],
            exit_policy: ExitPolicy::AlwaysSucceed,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            accept_language: "en-US,en;q=0.9".to_string(),
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36".to_string(),
            ],
        }
    }
}

impl Default for MangaDexConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mangadex.org".to_string(),
            page_size: 100,
            max_offset: 1000,
        }
    }
}

impl Default for BatotoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bato.to".to_string(),
            pages: 1,
        }
    }
}
