//! Semantic Scholar graph index client.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{RawPaper, SearchMode, YearFilter};
use crate::sources::SourceError;
use crate::utils::{RateLimitedClient, RateLimitedRequestBuilder};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org";

/// Fields requested for every paper.
pub const SEMANTIC_SCHOLAR_API_FIELDS: &str = "citationStyles,externalIds,url,openAccessPdf,year,isOpenAccess,influentialCitationCount,citationCount,title";

/// One page of graph-index results
#[derive(Debug, Clone, Default)]
pub struct GraphPage {
    pub papers: Vec<RawPaper>,
    pub total: Option<u64>,
    pub has_more: bool,
}

/// Semantic Scholar client
///
/// Uses the Semantic Scholar graph and recommendations REST APIs.
#[derive(Debug, Clone)]
pub struct SemanticScholarClient {
    client: RateLimitedClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(client: RateLimitedClient, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: SEMANTIC_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Add API key to request headers if available
    fn add_api_key_if_present(&self, builder: RateLimitedRequestBuilder) -> RateLimitedRequestBuilder {
        if let Some(ref key) = self.api_key {
            builder.header("x-api-key", key)
        } else {
            builder
        }
    }

    /// Fetch one page in `mode`. Free-text results come back sorted by
    /// influential citation count, highest first.
    pub async fn fetch_page(
        &self,
        mode: SearchMode,
        query: &str,
        offset: usize,
        limit: usize,
        year: Option<&YearFilter>,
    ) -> Result<GraphPage, SourceError> {
        let (url, mut params) = mode.endpoint(&self.base_url, query, offset, limit);
        params.push(("fields", SEMANTIC_SCHOLAR_API_FIELDS.to_string()));
        if let Some(year) = year.filter(|_| mode.accepts_year()) {
            params.push(("year", year.as_param()));
        }

        let response = self
            .add_api_key_if_present(self.client.get(&url).query(&params))
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to query Semantic Scholar: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::NOT_FOUND && mode == SearchMode::Doi {
                return Err(SourceError::DoiNotFound(format!("DOI {} not found.", query)));
            }
            return Err(SourceError::Api(format!(
                "Error searching papers given query {}: status {}",
                query, status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let total = body.get("total").and_then(Value::as_u64);
        let has_more = match (mode, total) {
            (SearchMode::Default, Some(total)) => ((offset + limit) as u64) < total,
            _ => false,
        };

        let mut papers = extract_papers(mode, body);
        if mode == SearchMode::Default {
            papers.sort_by(|a, b| {
                b.influential_citation_count
                    .unwrap_or(0)
                    .cmp(&a.influential_citation_count.unwrap_or(0))
            });
        }
        debug!(
            "{} returned {} papers for {} (offset {})",
            mode,
            papers.len(),
            query,
            offset
        );

        Ok(GraphPage {
            papers,
            total,
            has_more,
        })
    }

    /// Best title match, retrying without the year when the filtered
    /// search finds nothing.
    pub async fn match_title(
        &self,
        title: &str,
        year: Option<&str>,
    ) -> Result<Option<RawPaper>, SourceError> {
        let papers = self.title_query(title, year).await?;
        if papers.is_empty() {
            if let Some(year) = year {
                info!("{} | {} not found. Now trying without year.", title, year);
                return Ok(self.title_query(title, None).await?.into_iter().next());
            }
        }
        Ok(papers.into_iter().next())
    }

    async fn title_query(&self, title: &str, year: Option<&str>) -> Result<Vec<RawPaper>, SourceError> {
        let (url, mut params) = SearchMode::Google.endpoint(&self.base_url, title, 0, 1);
        params.push(("fields", SEMANTIC_SCHOLAR_API_FIELDS.to_string()));
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }

        let response = self
            .add_api_key_if_present(self.client.get(&url).query(&params))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Title match for {} failed with status {}", title, status);
            return Err(SourceError::Api(format!(
                "Error matching title {}: status {}",
                title, status
            )));
        }

        let body: Value = response.json().await?;
        Ok(extract_papers(SearchMode::Google, body))
    }
}

/// Pull the papers out of a response body. Items that do not deserialize
/// are dropped one by one.
fn extract_papers(mode: SearchMode, mut body: Value) -> Vec<RawPaper> {
    let items = if mode.single_record() {
        vec![body]
    } else {
        match body
            .as_object_mut()
            .and_then(|object| object.remove(mode.items_field()))
        {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        }
    };

    items
        .into_iter()
        .filter_map(|mut item| {
            if let Some(field) = mode.nested_field() {
                item = item.as_object_mut()?.remove(field)?;
            }
            match serde_json::from_value::<RawPaper>(item) {
                Ok(paper) => Some(paper),
                Err(e) => {
                    warn!("Dropping malformed {} result: {}", mode, e);
                    None
                }
            }
        })
        .collect()
}
