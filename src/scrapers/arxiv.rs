//! arXiv PDFs.

use async_trait::async_trait;
use std::path::Path;

use crate::models::{IdKind, RawPaper};
use crate::scrapers::{priority, PdfStrategy, ScraperOutcome};
use crate::sources::SourceError;
use crate::utils::{check_status, likely_pdf, save_pdf, RateLimitedClient};

const ARXIV_URL: &str = "https://arxiv.org";

/// arXiv id from an `.../arXiv.<id>` DOI, else the explicit ArXiv id.
pub fn arxiv_id(paper: &RawPaper) -> Option<String> {
    if let Some(doi) = paper.doi() {
        let last = doi.rsplit('/').next().unwrap_or(doi);
        if last.to_ascii_lowercase().starts_with("arxiv") {
            if let Some((_, id)) = doi.split_once("/arXiv.") {
                return Some(id.to_string());
            }
            if let Some((_, id)) = last.split_once('.') {
                return Some(id.to_string());
            }
        }
    }
    paper.external_ids.get(IdKind::ArXiv).map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct ArxivStrategy {
    client: RateLimitedClient,
    base_url: String,
}

impl ArxivStrategy {
    pub fn new(client: RateLimitedClient) -> Self {
        Self {
            client,
            base_url: ARXIV_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<(), SourceError> {
        let url = format!("{}/pdf/{}.pdf", self.base_url, id);
        let response = check_status(self.client.get(&url).send().await?)?;
        let bytes = response.bytes().await?;
        if !likely_pdf(&bytes) {
            return Err(SourceError::NotFound(format!("{} did not return a PDF", url)));
        }
        save_pdf(dest, bytes.to_vec()).await
    }
}

#[async_trait]
impl PdfStrategy for ArxivStrategy {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn priority(&self) -> u8 {
        priority::PREPRINT
    }

    async fn try_resolve(&self, paper: &RawPaper, dest: &Path) -> ScraperOutcome {
        let Some(id) = arxiv_id(paper) else {
            return ScraperOutcome::NotApplicable;
        };
        ScraperOutcome::from_result(self.download(&id, dest).await, dest)
    }
}
