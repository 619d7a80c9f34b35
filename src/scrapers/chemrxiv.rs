//! ChemRxiv PDFs, reached through the DOI resolver.

use async_trait::async_trait;
use std::path::Path;

use crate::models::RawPaper;
use crate::scrapers::{link_to_pdf, priority, PdfStrategy, ScraperOutcome};
use crate::utils::RateLimitedClient;

const DOI_RESOLVER_URL: &str = "https://doi.org";

#[derive(Debug, Clone)]
pub struct ChemRxivStrategy {
    client: RateLimitedClient,
    resolver_url: String,
}

impl ChemRxivStrategy {
    pub fn new(client: RateLimitedClient) -> Self {
        Self {
            client,
            resolver_url: DOI_RESOLVER_URL.to_string(),
        }
    }

    pub fn with_resolver_url(mut self, resolver_url: impl Into<String>) -> Self {
        self.resolver_url = resolver_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PdfStrategy for ChemRxivStrategy {
    fn name(&self) -> &str {
        "chemrxiv"
    }

    fn priority(&self) -> u8 {
        priority::PREPRINT
    }

    async fn try_resolve(&self, paper: &RawPaper, dest: &Path) -> ScraperOutcome {
        let Some(doi) = paper
            .doi()
            .filter(|doi| doi.to_ascii_lowercase().contains("chemrxiv"))
        else {
            return ScraperOutcome::NotApplicable;
        };
        let url = format!("{}/{}", self.resolver_url, doi);
        ScraperOutcome::from_result(link_to_pdf(&self.client, &url, dest).await, dest)
    }
}
