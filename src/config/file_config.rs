//! Configuration file support for paper-scraper.
//!
//! Settings live in a TOML file; any value can be overridden from the
//! environment with `PAPER_SCRAPER__<SECTION>__<KEY>`.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! semantic_scholar = "your-api-key"
//! serpapi = "your-serpapi-key"
//! crossref_mailto = "you@example.org"
//!
//! [downloads]
//! default_path = "./papers"
//! batch_size = 10
//!
//! [rate_limits]
//! semantic_scholar = 90.0
//! fallback_slow = 0.25
//! google_scholar = 1.0
//! crossref = 30.0
//! scraper = 0.5
//!
//! [search]
//! default_mode = "default"
//! default_limit = 10
//! page_limit = 100
//! google_page_size = 20
//!
//! [endpoints]
//! semantic_scholar = "https://api.semanticscholar.org"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

const LOCAL_CONFIG_NAME: &str = "paper-scraper.toml";

/// Locate a configuration file: `./paper-scraper.toml`, then the user config dir.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("paper-scraper").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Save configuration to a TOML file
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }
    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
