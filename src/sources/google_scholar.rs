//! Google Scholar search engine, reached through SerpAPI.
//!
//! Scholar results carry no stable identifier, so each one is given a DOI
//! (taken from its link, derived from an arXiv id, or reconciled through
//! CrossRef) and a synthesized id built from that DOI.

use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use regex::Regex;

use crate::config::MAX_SCHOLAR_PAGE_SIZE;
use crate::models::{ExternalIds, IdKind, OpenAccessPdf, RawPaper, YearFilter};
use crate::sources::{CrossRefClient, SourceError};
use crate::utils::{encode_id, find_doi, RateLimitedClient};

const SERPAPI_BASE: &str = "https://serpapi.com";

#[allow(clippy::expect_used)]
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\b").expect("year regex is valid"));

/// SerpAPI answers this when the scholar engine blocked the request.
const BLOCKED_STATUS: u16 = 443;

/// One organic Google Scholar result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScholarResult {
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub publication_info: PublicationInfo,
    #[serde(default)]
    pub resources: Vec<ScholarResource>,
    #[serde(default)]
    pub inline_links: InlineLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicationInfo {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub authors: Vec<ScholarAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScholarAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScholarResource {
    #[serde(default)]
    pub file_format: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InlineLinks {
    #[serde(default)]
    pub cited_by: Option<CitedBy>,
    #[serde(default)]
    pub serpapi_cite_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CitedBy {
    #[serde(default)]
    pub total: Option<u64>,
}

impl ScholarResult {
    /// First four-digit number in the publication summary.
    pub fn publication_year(&self) -> Option<String> {
        let summary = self.publication_info.summary.as_deref()?;
        YEAR.find(summary).map(|m| m.as_str().to_string())
    }

    pub fn author_names(&self) -> Vec<String> {
        self.publication_info
            .authors
            .iter()
            .map(|a| a.name.clone())
            .collect()
    }

    /// Explicit PDF resource, else the first resource with a link.
    pub fn resource_link(&self) -> Option<String> {
        let pdf = self.resources.iter().find(|r| {
            r.file_format
                .as_deref()
                .is_some_and(|f| f.eq_ignore_ascii_case("pdf"))
                && r.link.is_some()
        });
        pdf.or_else(|| self.resources.iter().find(|r| r.link.is_some()))
            .and_then(|r| r.link.clone())
    }
}

/// One page of scholar-engine results
#[derive(Debug, Clone, Default)]
pub struct ScholarPage {
    pub results: Vec<ScholarResult>,
    pub total: Option<u64>,
    pub has_more: bool,
}

/// A scholar result mapped onto the graph index's record shape
#[derive(Debug, Clone)]
pub struct ScholarItem {
    pub paper: RawPaper,
    /// PDF link taken from the result's resources, which beats any graph-index link
    pub resource_link: Option<String>,
}

/// Google Scholar client (SerpAPI `google_scholar` engine)
#[derive(Debug, Clone)]
pub struct GoogleScholarClient {
    client: RateLimitedClient,
    base_url: String,
    api_key: String,
}

impl GoogleScholarClient {
    pub fn new(client: RateLimitedClient, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: SERPAPI_BASE.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch one page of organic results starting at `offset`.
    pub async fn search_page(
        &self,
        query: &str,
        offset: usize,
        page_size: usize,
        year: Option<&YearFilter>,
    ) -> Result<ScholarPage, SourceError> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.to_string()),
            ("api_key", self.api_key.clone()),
            ("engine", "google_scholar".to_string()),
            ("num", page_size.clamp(1, MAX_SCHOLAR_PAGE_SIZE).to_string()),
            ("start", offset.to_string()),
        ];
        if let Some(year) = year {
            let (low, high) = year.bounds();
            params.push(("as_ylo", low.to_string()));
            params.push(("as_yhi", high.to_string()));
        }

        let url = format!("{}/search.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to query Google Scholar: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(format!(
                "Error searching papers: {} {}",
                status, text
            )));
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let total = body
            .pointer("/search_information/total_results")
            .and_then(Value::as_u64);
        let has_more = body.get("pagination").is_some();

        let Some(Value::Array(items)) = body
            .as_object_mut()
            .and_then(|object| object.remove("organic_results"))
        else {
            debug!("No organic results for {} at offset {}", query, offset);
            return Ok(ScholarPage {
                results: Vec::new(),
                total,
                has_more: false,
            });
        };

        let results = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ScholarResult>(item) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Dropping malformed Google Scholar result: {}", e);
                    None
                }
            })
            .collect();

        Ok(ScholarPage {
            results,
            total,
            has_more,
        })
    }

    /// Follow a result's citation endpoint: the MLA snippet and the BibTeX
    /// text behind the `BibTeX` export link.
    pub async fn fetch_citation(&self, cite_link: &str) -> Result<(String, String), SourceError> {
        let response = self
            .client
            .get(cite_link)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Api(format!(
                "Citation lookup at {} returned status {}",
                cite_link, status
            )));
        }
        let cite: CiteResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse citation JSON: {}", e)))?;

        let citation = cite
            .citations
            .iter()
            .find(|c| c.title == "MLA")
            .map(|c| c.snippet.clone())
            .ok_or_else(|| SourceError::NotFound(format!("No MLA citation at {}", cite_link)))?;
        let bibtex_link = cite
            .links
            .iter()
            .find(|l| l.name == "BibTeX")
            .map(|l| l.link.clone())
            .ok_or_else(|| SourceError::NotFound(format!("No BibTeX link at {}", cite_link)))?;

        let response = self.client.get(&bibtex_link).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = if status.as_u16() == BLOCKED_STATUS {
                format!("Google scholar blocked the BibTeX link {}", bibtex_link)
            } else {
                format!(
                    "Unexpected failure to follow BibTeX link {} (status {})",
                    bibtex_link, status
                )
            };
            return Err(SourceError::Api(message));
        }

        let bibtex = response.text().await?;
        if !bibtex.trim_start().starts_with('@') {
            return Err(SourceError::Other(format!(
                "Google scholar ip block on BibTeX link {}",
                bibtex_link
            )));
        }
        Ok((citation, bibtex.trim().to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CiteResponse {
    #[serde(default)]
    citations: Vec<CiteSnippet>,
    #[serde(default)]
    links: Vec<CiteLink>,
}

#[derive(Debug, Deserialize)]
struct CiteSnippet {
    title: String,
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct CiteLink {
    name: String,
    link: String,
}

fn arxiv_id_from_link(link: &str) -> Option<&str> {
    let id = link
        .strip_prefix("https://arxiv.org/abs/")
        .or_else(|| link.strip_prefix("http://arxiv.org/abs/"))?
        .trim_end_matches('/');
    (!id.is_empty()).then_some(id)
}

fn strip_arxiv_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos) if pos > 0 && id[pos + 1..].chars().all(|c| c.is_ascii_digit()) && pos + 1 < id.len() => {
            &id[..pos]
        }
        _ => id,
    }
}

/// Map a scholar result onto a [`RawPaper`], reconciling a DOI through
/// CrossRef when neither the link nor an arXiv id provides one.
pub async fn preprocess(
    result: ScholarResult,
    crossref: &CrossRefClient,
) -> Result<ScholarItem, SourceError> {
    let year = result.publication_year();
    let resource_link = result.resource_link();

    let mut ids = ExternalIds::new();
    if let Some(link) = result.link.as_deref() {
        if let Some(doi) = find_doi(link) {
            ids.insert(IdKind::Doi, doi);
        }
        if let Some(arxiv_id) = arxiv_id_from_link(link) {
            ids.insert(IdKind::ArXiv, arxiv_id);
            if ids.get(IdKind::Doi).is_none() {
                ids.insert(
                    IdKind::Doi,
                    format!("10.48550/arXiv.{}", strip_arxiv_version(arxiv_id)),
                );
            }
        }
    }

    let doi = match ids.get(IdKind::Doi) {
        Some(doi) => doi.to_string(),
        None => {
            let doi = crossref
                .reconcile_doi(&result.title, &result.author_names())
                .await?;
            ids.insert(IdKind::Doi, doi.clone());
            doi
        }
    };

    let open_access = resource_link.clone().or_else(|| result.link.clone());
    let paper = RawPaper {
        paper_id: Some(encode_id(&doi)),
        title: Some(result.title),
        year,
        url: result.link,
        external_ids: ids,
        open_access_pdf: open_access.map(|url| OpenAccessPdf { url: Some(url) }),
        citation_count: Some(
            result
                .inline_links
                .cited_by
                .and_then(|c| c.total)
                .unwrap_or(0),
        ),
        cite_link: result.inline_links.serpapi_cite_link,
        ..Default::default()
    };

    Ok(ScholarItem {
        paper,
        resource_link,
    })
}
