//! PDF resolution strategies and the chain that runs them.
//!
//! A [`PdfStrategy`] looks at a [`RawPaper`] and either declines it
//! ([`ScraperOutcome::NotApplicable`]), saves its PDF, or reports why it
//! failed. The [`ScraperChain`] runs strategies in ascending priority order
//! (registration order breaks ties) and stops at the first success.
//!
//! # Adding a strategy
//!
//! ```rust
//! use async_trait::async_trait;
//! use paper_scraper::models::RawPaper;
//! use paper_scraper::scrapers::{PdfStrategy, ScraperChain, ScraperOutcome};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Institutional;
//!
//! #[async_trait]
//! impl PdfStrategy for Institutional {
//!     fn name(&self) -> &str {
//!         "institutional"
//!     }
//!
//!     async fn try_resolve(&self, _paper: &RawPaper, _dest: &Path) -> ScraperOutcome {
//!         ScraperOutcome::NotApplicable
//!     }
//! }
//!
//! let mut chain = ScraperChain::new();
//! chain.register(Arc::new(Institutional));
//! assert_eq!(chain.names(), vec!["institutional"]);
//! ```

mod arxiv;
mod batch;
mod chemrxiv;
mod link;
mod local;
pub mod mock;
mod open_access;
mod pmc;
mod xiv;

pub use arxiv::ArxivStrategy;
pub use batch::{BatchDownloader, DownloadSummary, PaperParser};
pub use chemrxiv::ChemRxivStrategy;
pub use link::link_to_pdf;
pub use local::LocalStrategy;
pub use mock::MockStrategy;
pub use open_access::OpenAccessStrategy;
pub use pmc::{PmcStrategy, PubMedStrategy};
pub use xiv::{XivServer, XivStrategy};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::models::RawPaper;
use crate::sources::SourceError;
use crate::utils::{HttpClient, BROWSER_USER_AGENT};

/// Strategy priorities; lower runs first.
pub mod priority {
    pub const LOCAL: u8 = 0;
    pub const PREPRINT: u8 = 10;
    pub const REPOSITORY: u8 = 20;
}

/// Result of one strategy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScraperOutcome {
    /// The paper carries nothing this strategy can use
    NotApplicable,
    /// PDF saved at this path
    Success(PathBuf),
    /// The strategy applied but could not produce a PDF
    Failure(String),
}

impl ScraperOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScraperOutcome::Success(_))
    }

    /// Map a download attempt that writes to `dest`.
    pub fn from_result(result: Result<(), SourceError>, dest: &Path) -> Self {
        match result {
            Ok(()) => ScraperOutcome::Success(dest.to_path_buf()),
            Err(e) => ScraperOutcome::Failure(e.to_string()),
        }
    }
}

/// One way of turning a paper into a saved PDF
#[async_trait]
pub trait PdfStrategy: Send + Sync + std::fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &str;

    fn priority(&self) -> u8 {
        priority::REPOSITORY
    }

    /// Try to save the paper's PDF at `dest`. Never panics on bad input.
    async fn try_resolve(&self, paper: &RawPaper, dest: &Path) -> ScraperOutcome;
}

/// Strategies in the order they are tried
#[derive(Debug, Default, Clone)]
pub struct ScraperChain {
    strategies: Vec<Arc<dyn PdfStrategy>>,
}

impl ScraperChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy, keeping the list sorted by priority.
    pub fn register(&mut self, strategy: Arc<dyn PdfStrategy>) {
        self.strategies.push(strategy);
        self.strategies.sort_by_key(|s| s.priority());
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run strategies until one saves the PDF.
    pub async fn resolve(&self, paper: &RawPaper, dest: &Path) -> ScraperOutcome {
        let mut failures = Vec::new();
        for strategy in &self.strategies {
            match strategy.try_resolve(paper, dest).await {
                ScraperOutcome::Success(path) => {
                    debug!("{} saved {}", strategy.name(), path.display());
                    return ScraperOutcome::Success(path);
                }
                ScraperOutcome::NotApplicable => {}
                ScraperOutcome::Failure(reason) => {
                    debug!("{} failed: {}", strategy.name(), reason);
                    failures.push(format!("{}: {}", strategy.name(), reason));
                }
            }
        }

        if failures.is_empty() {
            ScraperOutcome::NotApplicable
        } else {
            ScraperOutcome::Failure(failures.join("; "))
        }
    }
}

/// Every built-in strategy, each with its own scraper budget.
pub fn default_chain(config: &Config) -> Result<ScraperChain, SourceError> {
    let http = HttpClient::with_user_agent(BROWSER_USER_AGENT)?;
    let budget = config.rate_limits.scraper_budget();
    let endpoints = &config.endpoints;

    let mut chain = ScraperChain::new();
    chain.register(Arc::new(LocalStrategy));
    chain.register(Arc::new(
        ArxivStrategy::new(http.rate_limited(budget)?).with_base_url(&endpoints.arxiv),
    ));
    chain.register(Arc::new(
        XivStrategy::new(XivServer::MedRxiv, http.rate_limited(budget)?)
            .with_base_url(&endpoints.medrxiv),
    ));
    chain.register(Arc::new(
        XivStrategy::new(XivServer::BioRxiv, http.rate_limited(budget)?)
            .with_base_url(&endpoints.biorxiv),
    ));
    chain.register(Arc::new(
        ChemRxivStrategy::new(http.rate_limited(budget)?).with_resolver_url(&endpoints.doi_resolver),
    ));
    chain.register(Arc::new(
        PmcStrategy::new(http.rate_limited(budget)?).with_base_url(&endpoints.pmc),
    ));
    chain.register(Arc::new(
        PubMedStrategy::new(http.rate_limited(budget)?)
            .with_base_urls(&endpoints.pubmed, &endpoints.pmc),
    ));
    chain.register(Arc::new(OpenAccessStrategy::new(http.rate_limited(budget)?)));
    Ok(chain)
}
