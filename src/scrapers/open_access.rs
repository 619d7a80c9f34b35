//! Provider-supplied open-access links.

use async_trait::async_trait;
use std::path::Path;

use crate::models::RawPaper;
use crate::scrapers::{link_to_pdf, PdfStrategy, ScraperOutcome};
use crate::utils::RateLimitedClient;

#[derive(Debug, Clone)]
pub struct OpenAccessStrategy {
    client: RateLimitedClient,
}

impl OpenAccessStrategy {
    pub fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PdfStrategy for OpenAccessStrategy {
    fn name(&self) -> &str {
        "openaccess"
    }

    async fn try_resolve(&self, paper: &RawPaper, dest: &Path) -> ScraperOutcome {
        let Some(url) = paper.open_access_url() else {
            return ScraperOutcome::NotApplicable;
        };
        ScraperOutcome::from_result(link_to_pdf(&self.client, url, dest).await, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{HttpClient, RateLimitBudget};
    use mockito::Server;

    #[tokio::test]
    async fn test_open_access_link() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/oa/1")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF")
            .create_async()
            .await;

        let client = HttpClient::new()
            .unwrap()
            .rate_limited(RateLimitBudget::per_second(1000.0))
            .unwrap();
        let strategy = OpenAccessStrategy::new(client);

        let mut paper = RawPaper::new("p", "t");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.pdf");
        assert_eq!(
            strategy.try_resolve(&paper, &dest).await,
            ScraperOutcome::NotApplicable
        );

        paper.set_open_access_url(format!("{}/oa/1", server.url()));
        assert_eq!(
            strategy.try_resolve(&paper, &dest).await,
            ScraperOutcome::Success(dest.clone())
        );
    }
}
