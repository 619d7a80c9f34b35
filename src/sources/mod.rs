//! Scholarly metadata providers.
//!
//! Each provider is a small client bound to its own rate-limited HTTP client:
//!
//! - [`SemanticScholarClient`] - the citation graph index (free-text search,
//!   paper and DOI lookup, citations, references, recommendations, title match)
//! - [`GoogleScholarClient`] - the scholar search engine, reached through SerpAPI
//! - [`CrossRefClient`] - the works index, used to reconcile DOIs and fetch BibTeX
//!
//! [`MetadataParser`] turns whatever a provider returned into a
//! [`PaperRecord`](crate::models::PaperRecord).

mod crossref;
mod google_scholar;
mod metadata;
mod semantic;

pub use crossref::{author_query, CrossRefClient};
pub use google_scholar::{
    preprocess, GoogleScholarClient, ScholarItem, ScholarPage, ScholarResult,
};
pub use metadata::{parse_semantic_scholar_metadata, MetadataParser};
pub use semantic::{GraphPage, SemanticScholarClient, SEMANTIC_SCHOLAR_API_FIELDS};

/// Errors that can occur when talking to a provider or resolving a paper
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Paper or resource not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// No DOI could be found or reconciled
    #[error("DOI not found: {0}")]
    DoiNotFound(String),

    /// Parsing error (JSON, HTML, BibTeX)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Network or transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success answer from a provider
    #[error("API error: {0}")]
    Api(String),

    /// A BibTeX entry could not be rendered, not even as a bare title
    #[error("Citation conversion failed: {0}")]
    CitationConversion(String),

    /// Missing key or invalid setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl SourceError {
    /// Whether this is the DOI flavour of "not found".
    pub fn is_doi_not_found(&self) -> bool {
        matches!(self, SourceError::DoiNotFound(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}
