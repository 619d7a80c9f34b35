//! Configuration management.

mod file_config;

pub use file_config::{find_config_file, save_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::SearchMode;
use crate::sources::SourceError;
use crate::utils::RateLimitBudget;

/// Largest page the graph index serves in one request.
pub const MAX_GRAPH_PAGE_SIZE: usize = 100;

/// Largest page the scholar engine serves in one request.
pub const MAX_SCHOLAR_PAGE_SIZE: usize = 20;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for the metadata providers
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Download settings
    #[serde(default)]
    pub downloads: DownloadConfig,

    /// Per-provider request budgets
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Provider base URLs
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl Config {
    /// Reject settings no provider can honour.
    pub fn validate(&self) -> Result<(), SourceError> {
        self.rate_limits.validate()?;

        if self.search.page_limit == 0 || self.search.page_limit > MAX_GRAPH_PAGE_SIZE {
            return Err(SourceError::Configuration(format!(
                "search.page_limit must be between 1 and {}, got {}",
                MAX_GRAPH_PAGE_SIZE, self.search.page_limit
            )));
        }
        if self.search.google_page_size == 0 || self.search.google_page_size > MAX_SCHOLAR_PAGE_SIZE
        {
            return Err(SourceError::Configuration(format!(
                "search.google_page_size must be between 1 and {}, got {}",
                MAX_SCHOLAR_PAGE_SIZE, self.search.google_page_size
            )));
        }
        if self.downloads.batch_size == 0 {
            return Err(SourceError::Configuration(
                "downloads.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, SourceError> {
        toml::to_string_pretty(self)
            .map_err(|e| SourceError::Configuration(format!("Failed to render config: {}", e)))
    }
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Semantic Scholar API key (optional, unlocks the fast budget)
    #[serde(default = "env_semantic_scholar_key")]
    pub semantic_scholar: Option<String>,

    /// SerpAPI key, required for scholar-engine searches
    #[serde(default = "env_serpapi_key")]
    pub serpapi: Option<String>,

    /// Crossref Metadata Plus token (optional)
    #[serde(default = "env_crossref_plus_token")]
    pub crossref_plus_token: Option<String>,

    /// Contact address sent to Crossref's polite pool
    #[serde(default = "default_crossref_mailto")]
    pub crossref_mailto: String,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            semantic_scholar: env_semantic_scholar_key(),
            serpapi: env_serpapi_key(),
            crossref_plus_token: env_crossref_plus_token(),
            crossref_mailto: default_crossref_mailto(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_semantic_scholar_key() -> Option<String> {
    non_empty_env("SEMANTIC_SCHOLAR_API_KEY")
}

fn env_serpapi_key() -> Option<String> {
    non_empty_env("SERPAPI_API_KEY")
}

fn env_crossref_plus_token() -> Option<String> {
    non_empty_env("CROSSREF_API_KEY")
}

fn default_crossref_mailto() -> String {
    non_empty_env("CROSSREF_MAILTO").unwrap_or_else(|| "paperscraper@example.org".to_string())
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default directory for saved PDFs
    #[serde(default = "default_download_dir")]
    pub default_path: PathBuf,

    /// Papers resolved concurrently per wave
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_path: default_download_dir(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./papers")
}

fn default_batch_size() -> usize {
    10
}

/// Requests per second per provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Graph index with an API key
    #[serde(default = "default_semantic_scholar_rps")]
    pub semantic_scholar: f64,

    /// Graph index without an API key
    #[serde(default = "default_fallback_slow_rps")]
    pub fallback_slow: f64,

    /// Scholar engine
    #[serde(default = "default_google_scholar_rps")]
    pub google_scholar: f64,

    /// Works index
    #[serde(default = "default_crossref_rps")]
    pub crossref: f64,

    /// Each PDF strategy
    #[serde(default = "default_scraper_rps")]
    pub scraper: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            semantic_scholar: default_semantic_scholar_rps(),
            fallback_slow: default_fallback_slow_rps(),
            google_scholar: default_google_scholar_rps(),
            crossref: default_crossref_rps(),
            scraper: default_scraper_rps(),
        }
    }
}

impl RateLimitConfig {
    /// Budget for the graph index; the fast one needs a key.
    pub fn semantic_scholar_budget(&self, has_api_key: bool) -> RateLimitBudget {
        if has_api_key {
            RateLimitBudget::per_second(self.semantic_scholar)
        } else {
            RateLimitBudget::per_second(self.fallback_slow)
        }
    }

    pub fn google_scholar_budget(&self) -> RateLimitBudget {
        RateLimitBudget::per_second(self.google_scholar)
    }

    pub fn crossref_budget(&self) -> RateLimitBudget {
        RateLimitBudget::per_second(self.crossref)
    }

    pub fn scraper_budget(&self) -> RateLimitBudget {
        RateLimitBudget::per_second(self.scraper)
    }

    /// Set every budget to the same rate.
    pub fn uniform(requests_per_second: f64) -> Self {
        Self {
            semantic_scholar: requests_per_second,
            fallback_slow: requests_per_second,
            google_scholar: requests_per_second,
            crossref: requests_per_second,
            scraper: requests_per_second,
        }
    }

    fn validate(&self) -> Result<(), SourceError> {
        for (name, rps) in [
            ("semantic_scholar", self.semantic_scholar),
            ("fallback_slow", self.fallback_slow),
            ("google_scholar", self.google_scholar),
            ("crossref", self.crossref),
            ("scraper", self.scraper),
        ] {
            if !(rps.is_finite() && rps > 0.0) {
                return Err(SourceError::Configuration(format!(
                    "rate_limits.{} must be a positive number, got {}",
                    name, rps
                )));
            }
        }
        Ok(())
    }
}

fn default_semantic_scholar_rps() -> f64 {
    90.0
}

fn default_fallback_slow_rps() -> f64 {
    0.25
}

fn default_google_scholar_rps() -> f64 {
    1.0
}

fn default_crossref_rps() -> f64 {
    30.0
}

fn default_scraper_rps() -> f64 {
    0.5
}

/// Search defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub default_mode: SearchMode,

    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Graph-index page size
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,

    /// Scholar-engine page size
    #[serde(default = "default_google_page_size")]
    pub google_page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_mode: SearchMode::default(),
            default_limit: default_limit(),
            page_limit: default_page_limit(),
            google_page_size: default_google_page_size(),
        }
    }
}

fn default_limit() -> usize {
    10
}

fn default_page_limit() -> usize {
    MAX_GRAPH_PAGE_SIZE
}

fn default_google_page_size() -> usize {
    MAX_SCHOLAR_PAGE_SIZE
}

/// Base URLs of every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_semantic_scholar_url")]
    pub semantic_scholar: String,

    #[serde(default = "default_serpapi_url")]
    pub serpapi: String,

    #[serde(default = "default_crossref_url")]
    pub crossref: String,

    #[serde(default = "default_arxiv_url")]
    pub arxiv: String,

    #[serde(default = "default_biorxiv_url")]
    pub biorxiv: String,

    #[serde(default = "default_medrxiv_url")]
    pub medrxiv: String,

    #[serde(default = "default_pmc_url")]
    pub pmc: String,

    #[serde(default = "default_pubmed_url")]
    pub pubmed: String,

    #[serde(default = "default_doi_resolver_url")]
    pub doi_resolver: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            semantic_scholar: default_semantic_scholar_url(),
            serpapi: default_serpapi_url(),
            crossref: default_crossref_url(),
            arxiv: default_arxiv_url(),
            biorxiv: default_biorxiv_url(),
            medrxiv: default_medrxiv_url(),
            pmc: default_pmc_url(),
            pubmed: default_pubmed_url(),
            doi_resolver: default_doi_resolver_url(),
        }
    }
}

impl EndpointConfig {
    /// Point every provider at one server.
    pub fn all(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            semantic_scholar: base.clone(),
            serpapi: base.clone(),
            crossref: base.clone(),
            arxiv: base.clone(),
            biorxiv: base.clone(),
            medrxiv: base.clone(),
            pmc: base.clone(),
            pubmed: base.clone(),
            doi_resolver: base,
        }
    }
}

fn default_semantic_scholar_url() -> String {
    "https://api.semanticscholar.org".to_string()
}

fn default_serpapi_url() -> String {
    "https://serpapi.com".to_string()
}

fn default_crossref_url() -> String {
    "https://api.crossref.org".to_string()
}

fn default_arxiv_url() -> String {
    "https://arxiv.org".to_string()
}

fn default_biorxiv_url() -> String {
    "https://www.biorxiv.org".to_string()
}

fn default_medrxiv_url() -> String {
    "https://www.medrxiv.org".to_string()
}

fn default_pmc_url() -> String {
    "https://www.ncbi.nlm.nih.gov".to_string()
}

fn default_pubmed_url() -> String {
    "https://pubmed.ncbi.nlm.nih.gov".to_string()
}

fn default_doi_resolver_url() -> String {
    "https://doi.org".to_string()
}

/// Load configuration from a file, with `PAPER_SCRAPER__*` environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("PAPER_SCRAPER").separator("__"))
        .build()?;

    settings.try_deserialize()
}
