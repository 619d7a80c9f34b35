//! PubMed Central and PubMed PDFs.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::models::{IdKind, RawPaper};
use crate::scrapers::{priority, PdfStrategy, ScraperOutcome};
use crate::sources::SourceError;
use crate::utils::{
    check_status, content_type_is_pdf, resolve_link, save_pdf, search_pdf_link, RateLimitedClient,
};

const NCBI_URL: &str = "https://www.ncbi.nlm.nih.gov";
const PUBMED_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

#[allow(clippy::expect_used)]
static PMC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PMC\d+").expect("pmc id regex is valid"));

/// Shared article-page flow for both strategies.
async fn pmc_to_pdf(
    client: &RateLimitedClient,
    base_url: &str,
    pmc_id: &str,
    dest: &Path,
) -> Result<(), SourceError> {
    let number = pmc_id.trim().trim_start_matches("PMC");
    let page_url = format!("{}/pmc/articles/PMC{}/", base_url, number);
    let response = check_status(client.get(&page_url).send().await?)?;
    let page_url = response.url().to_string();
    let html = response.text().await?;

    let link = search_pdf_link(&html, false)
        .ok_or_else(|| SourceError::NotFound(format!("No PDF link for PMC{}", number)))?;
    let pdf_url = resolve_link(&page_url, &link)?;

    let response = check_status(client.get(pdf_url.clone()).send().await?)?;
    if !content_type_is_pdf(&response) {
        return Err(SourceError::NotFound(format!("{} is not a PDF", pdf_url)));
    }
    let bytes = response.bytes().await?;
    save_pdf(dest, bytes.to_vec()).await
}

#[derive(Debug, Clone)]
pub struct PmcStrategy {
    client: RateLimitedClient,
    base_url: String,
}

impl PmcStrategy {
    pub fn new(client: RateLimitedClient) -> Self {
        Self {
            client,
            base_url: NCBI_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PdfStrategy for PmcStrategy {
    fn name(&self) -> &str {
        "pmc"
    }

    async fn try_resolve(&self, paper: &RawPaper, dest: &Path) -> ScraperOutcome {
        let Some(pmc_id) = paper.external_ids.get(IdKind::PubMedCentral) else {
            return ScraperOutcome::NotApplicable;
        };
        ScraperOutcome::from_result(
            pmc_to_pdf(&self.client, &self.base_url, pmc_id, dest).await,
            dest,
        )
    }
}

/// Finds the PMC id on the PubMed abstract page, then follows the PMC flow.
#[derive(Debug, Clone)]
pub struct PubMedStrategy {
    client: RateLimitedClient,
    pubmed_url: String,
    pmc_url: String,
}

impl PubMedStrategy {
    pub fn new(client: RateLimitedClient) -> Self {
        Self {
            client,
            pubmed_url: PUBMED_URL.to_string(),
            pmc_url: NCBI_URL.to_string(),
        }
    }

    pub fn with_base_urls(mut self, pubmed_url: &str, pmc_url: &str) -> Self {
        self.pubmed_url = pubmed_url.trim_end_matches('/').to_string();
        self.pmc_url = pmc_url.trim_end_matches('/').to_string();
        self
    }

    async fn download(&self, pubmed_id: &str, dest: &Path) -> Result<(), SourceError> {
        let url = format!("{}/{}/", self.pubmed_url, pubmed_id.trim());
        let html = check_status(self.client.get(&url).send().await?)?
            .text()
            .await?;
        let pmc_id = PMC_ID
            .find(&html)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| SourceError::NotFound(format!("PubMed {} has no PMC id", pubmed_id)))?;
        pmc_to_pdf(&self.client, &self.pmc_url, &pmc_id, dest).await
    }
}

#[async_trait]
impl PdfStrategy for PubMedStrategy {
    fn name(&self) -> &str {
        "pubmed"
    }

    async fn try_resolve(&self, paper: &RawPaper, dest: &Path) -> ScraperOutcome {
        let Some(pubmed_id) = paper.external_ids.get(IdKind::PubMed) else {
            return ScraperOutcome::NotApplicable;
        };
        ScraperOutcome::from_result(self.download(pubmed_id, dest).await, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{HttpClient, RateLimitBudget};
    use mockito::Server;

    fn client() -> RateLimitedClient {
        HttpClient::new()
            .unwrap()
            .rate_limited(RateLimitBudget::per_second(1000.0))
            .unwrap()
    }

    async fn serve_pmc(server: &mut mockito::ServerGuard, pdf_type: &str) -> Vec<mockito::Mock> {
        let page = server
            .mock("GET", "/pmc/articles/PMC123/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<a href="pdf/main.pdf">PDF (1.2M)</a>"#)
            .create_async()
            .await;
        let pdf = server
            .mock("GET", "/pmc/articles/PMC123/pdf/main.pdf")
            .with_status(200)
            .with_header("content-type", pdf_type)
            .with_body("%PDF-1.6")
            .create_async()
            .await;
        vec![page, pdf]
    }

    #[tokio::test]
    async fn test_pmc_downloads() {
        let mut server = Server::new_async().await;
        let _mocks = serve_pmc(&mut server, "application/pdf").await;

        let mut paper = RawPaper::new("p", "t");
        paper.external_ids.insert(IdKind::PubMedCentral, "PMC123");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.pdf");

        let outcome = PmcStrategy::new(client())
            .with_base_url(server.url())
            .try_resolve(&paper, &dest)
            .await;
        assert_eq!(outcome, ScraperOutcome::Success(dest.clone()));
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.6");
    }

    #[tokio::test]
    async fn test_pmc_rejects_html() {
        let mut server = Server::new_async().await;
        let _mocks = serve_pmc(&mut server, "text/html").await;

        let mut paper = RawPaper::new("p", "t");
        paper.external_ids.insert(IdKind::PubMedCentral, "123");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.pdf");

        let outcome = PmcStrategy::new(client())
            .with_base_url(server.url())
            .try_resolve(&paper, &dest)
            .await;
        assert!(matches!(outcome, ScraperOutcome::Failure(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_pubmed_delegates_to_pmc() {
        let mut server = Server::new_async().await;
        let _mocks = serve_pmc(&mut server, "application/pdf").await;
        let _abstract = server
            .mock("GET", "/31452104/")
            .with_status(200)
            .with_body(r#"<a class="id-link" href="/pmc/articles/PMC123/">PMC123</a>"#)
            .create_async()
            .await;

        let mut paper = RawPaper::new("p", "t");
        paper.external_ids.insert(IdKind::PubMed, "31452104");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.pdf");

        let outcome = PubMedStrategy::new(client())
            .with_base_urls(&server.url(), &server.url())
            .try_resolve(&paper, &dest)
            .await;
        assert_eq!(outcome, ScraperOutcome::Success(dest));
    }

    #[tokio::test]
    async fn test_pubmed_without_pmc_id_fails() {
        let mut server = Server::new_async().await;
        let _abstract = server
            .mock("GET", "/1/")
            .with_status(200)
            .with_body("<p>abstract</p>")
            .create_async()
            .await;

        let mut paper = RawPaper::new("p", "t");
        paper.external_ids.insert(IdKind::PubMed, "1");
        let outcome = PubMedStrategy::new(client())
            .with_base_urls(&server.url(), &server.url())
            .try_resolve(&paper, Path::new("x.pdf"))
            .await;
        assert!(matches!(outcome, ScraperOutcome::Failure(_)));
    }

    #[tokio::test]
    async fn test_without_ids_not_applicable() {
        let paper = RawPaper::new("p", "t");
        let pmc = PmcStrategy::new(client());
        let pubmed = PubMedStrategy::new(client());
        assert_eq!(
            pmc.try_resolve(&paper, Path::new("x.pdf")).await,
            ScraperOutcome::NotApplicable
        );
        assert_eq!(
            pubmed.try_resolve(&paper, Path::new("x.pdf")).await,
            ScraperOutcome::NotApplicable
        );
    }
}
