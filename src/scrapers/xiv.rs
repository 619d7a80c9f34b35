//! bioRxiv and medRxiv PDFs.
//!
//! Both servers share the `10.1101/` DOI prefix, so a miss on one server is
//! reported as not applicable and the chain moves on to the other.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::models::RawPaper;
use crate::scrapers::{priority, PdfStrategy, ScraperOutcome};
use crate::utils::{likely_pdf, save_pdf, RateLimitedClient};

const XIV_DOI_PREFIX: &str = "10.1101/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XivServer {
    BioRxiv,
    MedRxiv,
}

impl XivServer {
    pub fn as_str(&self) -> &'static str {
        match self {
            XivServer::BioRxiv => "biorxiv",
            XivServer::MedRxiv => "medrxiv",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            XivServer::BioRxiv => "https://www.biorxiv.org",
            XivServer::MedRxiv => "https://www.medrxiv.org",
        }
    }
}

impl fmt::Display for XivServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct XivStrategy {
    server: XivServer,
    client: RateLimitedClient,
    base_url: String,
}

impl XivStrategy {
    pub fn new(server: XivServer, client: RateLimitedClient) -> Self {
        Self {
            server,
            client,
            base_url: server.default_url().to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PdfStrategy for XivStrategy {
    fn name(&self) -> &str {
        self.server.as_str()
    }

    fn priority(&self) -> u8 {
        priority::PREPRINT
    }

    async fn try_resolve(&self, paper: &RawPaper, dest: &Path) -> ScraperOutcome {
        let Some(doi) = paper.doi().filter(|doi| doi.starts_with(XIV_DOI_PREFIX)) else {
            return ScraperOutcome::NotApplicable;
        };

        let url = format!("{}/content/{}.full.pdf", self.base_url, doi);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return ScraperOutcome::Failure(e.to_string()),
        };
        if !response.status().is_success() {
            debug!("{} has no {} ({})", self.server, doi, response.status());
            return ScraperOutcome::NotApplicable;
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return ScraperOutcome::Failure(e.to_string()),
        };
        if !likely_pdf(&bytes) {
            debug!("{} returned no PDF for {}", self.server, doi);
            return ScraperOutcome::NotApplicable;
        }
        ScraperOutcome::from_result(save_pdf(dest, bytes.to_vec()).await, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdKind;
    use crate::utils::{HttpClient, RateLimitBudget};
    use mockito::Server;

    fn strategy(server: XivServer, base: String) -> XivStrategy {
        let client = HttpClient::new()
            .unwrap()
            .rate_limited(RateLimitBudget::per_second(1000.0))
            .unwrap();
        XivStrategy::new(server, client).with_base_url(base)
    }

    fn xiv_paper() -> RawPaper {
        let mut paper = RawPaper::new("p", "t");
        paper.external_ids.insert(IdKind::Doi, "10.1101/2020.01.01.123456");
        paper
    }

    #[tokio::test]
    async fn test_downloads_full_pdf() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/content/10.1101/2020.01.01.123456.full.pdf")
            .with_status(200)
            .with_body("%PDF-1.4")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.pdf");
        let outcome = strategy(XivServer::BioRxiv, server.url())
            .try_resolve(&xiv_paper(), &dest)
            .await;
        assert_eq!(outcome, ScraperOutcome::Success(dest));
    }

    #[tokio::test]
    async fn test_miss_is_not_applicable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/content/10.1101/2020.01.01.123456.full.pdf")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.pdf");
        let outcome = strategy(XivServer::MedRxiv, server.url())
            .try_resolve(&xiv_paper(), &dest)
            .await;
        assert_eq!(outcome, ScraperOutcome::NotApplicable);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_other_prefix_not_applicable() {
        let mut paper = RawPaper::new("p", "t");
        paper.external_ids.insert(IdKind::Doi, "10.1021/x");
        let outcome = strategy(XivServer::BioRxiv, "http://127.0.0.1:9".to_string())
            .try_resolve(&paper, Path::new("x.pdf"))
            .await;
        assert_eq!(outcome, ScraperOutcome::NotApplicable);
    }

    #[test]
    fn test_names() {
        assert_eq!(XivServer::BioRxiv.to_string(), "biorxiv");
        assert_eq!(XivServer::MedRxiv.as_str(), "medrxiv");
    }
}
