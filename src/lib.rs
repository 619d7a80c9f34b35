//! # Paper Scraper
//!
//! Finds scholarly papers through a graph index (Semantic Scholar) or a
//! scholar search engine (Google Scholar via SerpAPI), reconciles their
//! metadata against Crossref, renders citations from BibTeX and downloads
//! PDFs through a chain of per-provider strategies.
//!
//! ## Architecture
//!
//! - [`models`]: Paper records, identifiers and search parameters
//! - [`sources`]: Provider clients and the shared error type
//! - [`scrapers`]: PDF strategies, the strategy chain and the batch downloader
//! - [`search`]: The paging orchestrator tying everything together
//! - [`utils`]: Rate-limited HTTP, BibTeX handling, citations and PDF helpers
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use paper_scraper::config::Config;
//! use paper_scraper::models::SearchRequest;
//! use paper_scraper::search_papers;
//!
//! # async fn run() -> Result<(), paper_scraper::sources::SourceError> {
//! let request = SearchRequest::new("benzene ring aromaticity")
//!     .limit(3)
//!     .dump_dir("./papers");
//! let papers = search_papers(&request, &Config::default()).await?;
//! for (path, record) in &papers {
//!     println!("{}: {}", path.display(), record.citation);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod models;
pub mod scrapers;
pub mod search;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{PaperMap, PaperRecord, RawPaper, SearchMode, SearchRequest};
pub use search::{fetch_paper, search_papers, SearchSession};
pub use sources::SourceError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
