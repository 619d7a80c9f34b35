//! CrossRef works index: DOI reconciliation and BibTeX retrieval.

use serde::Deserialize;
use tracing::debug;

use crate::sources::SourceError;
use crate::utils::{regenerate_key, RateLimitedClient, RateLimitedRequestBuilder};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// Matches scoring below this are not trusted.
const MIN_MATCH_SCORE: f64 = 0.5;

/// CrossRef client
///
/// Uses the CrossRef REST API with the polite-pool `mailto` parameter.
#[derive(Debug, Clone)]
pub struct CrossRefClient {
    client: RateLimitedClient,
    base_url: String,
    mailto: String,
    plus_token: Option<String>,
}

impl CrossRefClient {
    pub fn new(client: RateLimitedClient, mailto: impl Into<String>) -> Self {
        Self {
            client,
            base_url: CROSSREF_API_BASE.to_string(),
            mailto: mailto.into(),
            plus_token: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Metadata Plus token, sent as a bearer header when present
    pub fn with_plus_token(mut self, token: Option<String>) -> Self {
        self.plus_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    fn authorize(&self, builder: RateLimitedRequestBuilder) -> RateLimitedRequestBuilder {
        match &self.plus_token {
            Some(token) => {
                builder.header("Crossref-Plus-API-Token", &format!("Bearer {}", token))
            }
            None => builder,
        }
    }

    /// Best-matching DOI for a title, optionally narrowed by author names.
    ///
    /// Any miss (error status, no items, low score) is a
    /// [`SourceError::DoiNotFound`].
    pub async fn reconcile_doi(&self, title: &str, authors: &[String]) -> Result<String, SourceError> {
        let mut params: Vec<(&str, String)> = vec![
            ("query.title", title.to_string()),
            ("mailto", self.mailto.clone()),
            ("select", "DOI,score".to_string()),
            ("rows", "1".to_string()),
        ];
        let authors = author_query(authors);
        if !authors.is_empty() {
            params.push(("query.author", authors));
        }

        let url = format!("{}/works", self.base_url);
        let response = self
            .authorize(self.client.get(&url).query(&params))
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to query CrossRef: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::DoiNotFound(format!(
                "Could not reconcile DOI {} (status {})",
                title,
                response.status()
            )));
        }

        let data: CRResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        if data.status == "failed" {
            return Err(SourceError::DoiNotFound(format!(
                "Could not reconcile DOI {}",
                title
            )));
        }

        let message = data.message.unwrap_or_default();
        if message.total_results == 0 {
            return Err(SourceError::DoiNotFound(format!(
                "Could not reconcile DOI {}",
                title
            )));
        }

        let item = message.items.into_iter().next().ok_or_else(|| {
            SourceError::DoiNotFound(format!("Could not reconcile DOI {}", title))
        })?;
        let score = item.score.unwrap_or(0.0);
        if score < MIN_MATCH_SCORE {
            return Err(SourceError::DoiNotFound(format!(
                "Could not reconcile DOI {} (best score {:.2})",
                title, score
            )));
        }

        match item.doi {
            Some(doi) if !doi.trim().is_empty() => {
                debug!("Reconciled {} to DOI {} (score {:.2})", title, doi, score);
                Ok(doi)
            }
            _ => Err(SourceError::DoiNotFound(format!(
                "Could not reconcile DOI {}",
                title
            ))),
        }
    }

    /// BibTeX for a DOI, with the key rebuilt from author, year and title.
    pub async fn doi_to_bibtex(&self, doi: &str) -> Result<String, SourceError> {
        let url = format!(
            "{}/works/{}/transform/application/x-bibtex",
            self.base_url, doi
        );
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to fetch BibTeX: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::DoiNotFound(format!(
                "Unable to retrieve BibTeX for DOI {} (status {})",
                doi,
                response.status()
            )));
        }

        let text = response.text().await?;
        Ok(regenerate_key(text.trim()))
    }
}

/// Author tokens longer than one character, for `query.author`.
pub fn author_query(authors: &[String]) -> String {
    authors
        .iter()
        .flat_map(|author| author.split_whitespace())
        .map(|token| token.trim_matches(|c: char| c == '.' || c == ','))
        .filter(|token| token.chars().count() > 1)
        .collect::<Vec<_>>()
        .join(" ")
}

// CrossRef API response structures

#[derive(Debug, Deserialize)]
struct CRResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<CRMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct CRMessage {
    #[serde(rename = "total-results", default)]
    total_results: u64,
    #[serde(default)]
    items: Vec<CRItem>,
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{HttpClient, RateLimitBudget};
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> CrossRefClient {
        let http = HttpClient::new().unwrap();
        CrossRefClient::new(
            http.rate_limited(RateLimitBudget::per_second(1000.0)).unwrap(),
            "tests@example.org",
        )
        .with_base_url(server.url())
    }

    fn works_body(total: u64, doi: &str, score: f64) -> String {
        serde_json::json!({
            "status": "ok",
            "message": {"total-results": total, "items": [{"DOI": doi, "score": score}]}
        })
        .to_string()
    }

    #[test]
    fn test_author_query_skips_initials() {
        let authors = vec!["A. Vaswani".to_string(), "N Shazeer".to_string()];
        assert_eq!(author_query(&authors), "Vaswani Shazeer");
        assert_eq!(author_query(&[]), "");
    }

    #[tokio::test]
    async fn test_reconcile_doi() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query.title".into(), "Attention is all you need".into()),
                Matcher::UrlEncoded("query.author".into(), "Vaswani Shazeer".into()),
                Matcher::UrlEncoded("rows".into(), "1".into()),
                Matcher::UrlEncoded("select".into(), "DOI,score".into()),
                Matcher::UrlEncoded("mailto".into(), "tests@example.org".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(works_body(1, "10.5555/3295222.3295349", 91.2))
            .create_async()
            .await;

        let doi = client(&server)
            .reconcile_doi(
                "Attention is all you need",
                &["A. Vaswani".to_string(), "Noam Shazeer".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(doi, "10.5555/3295222.3295349");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reconcile_doi_misses() {
        let mut server = Server::new_async().await;
        let _low = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("query.title".into(), "low".into()))
            .with_status(200)
            .with_body(works_body(1, "10.1/low", 0.2))
            .create_async()
            .await;
        let _empty = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("query.title".into(), "empty".into()))
            .with_status(200)
            .with_body(r#"{"status":"ok","message":{"total-results":0,"items":[]}}"#)
            .create_async()
            .await;
        let _failed = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("query.title".into(), "failed".into()))
            .with_status(200)
            .with_body(r#"{"status":"failed","message":null}"#)
            .create_async()
            .await;
        let _error = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("query.title".into(), "error".into()))
            .with_status(500)
            .create_async()
            .await;

        let crossref = client(&server);
        for title in ["low", "empty", "failed", "error"] {
            let err = crossref.reconcile_doi(title, &[]).await.unwrap_err();
            assert!(err.is_doi_not_found(), "{}: {}", title, err);
        }
    }

    #[tokio::test]
    async fn test_doi_to_bibtex_regenerates_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/works/10.1021/jacs.0c00001/transform/application/x-bibtex")
            .with_status(200)
            .with_body(" @article{Doe_2020, title={Benzene rings revisited}, author={Doe, Jane}, journal={JACS}, year={2020} }")
            .create_async()
            .await;

        let bibtex = client(&server)
            .doi_to_bibtex("10.1021/jacs.0c00001")
            .await
            .unwrap();
        assert!(bibtex.starts_with("@article{Doe2020Benzene,"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_doi_to_bibtex_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/works/10.1/missing/transform/application/x-bibtex")
            .with_status(404)
            .create_async()
            .await;

        let err = client(&server).doi_to_bibtex("10.1/missing").await.unwrap_err();
        assert!(err.is_doi_not_found());
    }

    #[tokio::test]
    async fn test_plus_token_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/works/10.1/x/transform/application/x-bibtex")
            .match_header("Crossref-Plus-API-Token", "Bearer secret")
            .with_status(200)
            .with_body("@article{X_1, title={T}}")
            .create_async()
            .await;

        client(&server)
            .with_plus_token(Some("secret".to_string()))
            .doi_to_bibtex("10.1/x")
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
