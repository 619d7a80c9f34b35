//! Search orchestration: page through a provider, reconcile what it returns
//! and download PDFs until the requested number of papers is saved.

use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::models::{PaperMap, RawPaper, SearchCursor, SearchMode, SearchRequest, YearFilter};
use crate::scrapers::{default_chain, BatchDownloader, DownloadSummary, ScraperChain, ScraperOutcome};
use crate::sources::{
    preprocess, CrossRefClient, GoogleScholarClient, MetadataParser, ScholarItem, ScholarResult,
    SemanticScholarClient, SourceError,
};
use crate::utils::{pdf_file_name, HttpClient};

/// Papers of one page plus whether the provider has more
#[derive(Debug, Default)]
struct FetchedPage {
    papers: Vec<RawPaper>,
    has_more: bool,
}

/// Everything one search needs: adapters, their limiters and the downloader.
///
/// Built fresh per search; nothing is shared between sessions.
#[derive(Debug)]
pub struct SearchSession {
    mode: SearchMode,
    semantic: SemanticScholarClient,
    google: Option<GoogleScholarClient>,
    crossref: CrossRefClient,
    parser: MetadataParser,
    downloader: BatchDownloader,
    page_limit: usize,
    google_page_size: usize,
}

impl SearchSession {
    pub fn new(config: &Config, mode: SearchMode) -> Result<Self, SourceError> {
        config.validate()?;
        let keys = &config.api_keys;
        let limits = &config.rate_limits;
        let endpoints = &config.endpoints;
        let http = HttpClient::new()?;

        let serpapi_key = keys.serpapi.clone().filter(|k| !k.trim().is_empty());
        if mode == SearchMode::Google && serpapi_key.is_none() {
            return Err(SourceError::Configuration(
                "A SerpAPI key (SERPAPI_API_KEY) is required for google searches".to_string(),
            ));
        }

        let s2_key = keys.semantic_scholar.clone().filter(|k| !k.trim().is_empty());
        if s2_key.is_none() {
            info!("No Semantic Scholar API key; using the slow request budget");
        }
        let semantic = SemanticScholarClient::new(
            http.rate_limited(limits.semantic_scholar_budget(s2_key.is_some()))?,
            s2_key,
        )
        .with_base_url(&endpoints.semantic_scholar);

        let crossref = CrossRefClient::new(
            http.rate_limited(limits.crossref_budget())?,
            keys.crossref_mailto.clone(),
        )
        .with_base_url(&endpoints.crossref)
        .with_plus_token(keys.crossref_plus_token.clone());

        let google = match serpapi_key {
            Some(key) => Some(
                GoogleScholarClient::new(http.rate_limited(limits.google_scholar_budget())?, key)
                    .with_base_url(&endpoints.serpapi),
            ),
            None => None,
        };

        let mut parser = MetadataParser::new().with_crossref(crossref.clone());
        if let Some(google) = &google {
            parser = parser.with_google_scholar(google.clone());
        }

        Ok(Self {
            mode,
            semantic,
            google,
            crossref,
            parser,
            downloader: BatchDownloader::new(default_chain(config)?),
            page_limit: config.search.page_limit,
            google_page_size: config.search.google_page_size,
        })
    }

    /// Replace the PDF strategies.
    pub fn with_chain(mut self, chain: ScraperChain) -> Self {
        self.downloader = BatchDownloader::new(chain);
        self
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Run the search to completion.
    ///
    /// An error on the first page is returned. A later page failing ends the
    /// run with whatever was saved so far.
    pub async fn run(self, request: &SearchRequest) -> Result<PaperMap, SourceError> {
        let span = info_span!("search", query = %request.query, mode = %self.mode);
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(mut self, request: &SearchRequest) -> Result<PaperMap, SourceError> {
        let mut results = PaperMap::new();
        if request.limit == 0 {
            self.finish();
            return Ok(results);
        }

        if let Err(e) = tokio::fs::create_dir_all(&request.dump_dir).await {
            self.finish();
            return Err(e.into());
        }

        let year = request.year.as_deref().and_then(|raw| {
            let filter = YearFilter::parse(raw);
            if filter.is_none() {
                warn!("Ignoring invalid year filter {:?}; searching all years", raw);
            }
            filter
        });

        let mut cursor = SearchCursor::new(request.limit, self.page_size(request.limit));
        let batch_size = request.batch_size.max(1);

        loop {
            let page = match self.fetch_page(request, &cursor, year.as_ref()).await {
                Ok(page) => page,
                Err(e) if cursor.offset == 0 => {
                    self.finish();
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Page at offset {} failed, returning {} papers: {}",
                        cursor.offset,
                        results.len(),
                        e
                    );
                    break;
                }
            };
            debug!(
                "Offset {}: {} candidates, more pages: {}",
                cursor.offset,
                page.papers.len(),
                page.has_more
            );

            let saved = self
                .downloader
                .batch_scrape(
                    page.papers,
                    &request.dump_dir,
                    &self.parser,
                    batch_size,
                    cursor.remaining(results.len()),
                )
                .await;
            results.extend(saved);

            if !cursor.advance(results.len(), page.has_more) {
                break;
            }
        }

        info!("Saved {} of {} requested papers", results.len(), request.limit);
        self.finish();
        Ok(results)
    }

    /// Graph-index pages are always full so the influential-citation sort
    /// sees every candidate. Scholar pages keep a margin of five for items
    /// that fail reconciliation.
    fn page_size(&self, limit: usize) -> usize {
        if self.mode == SearchMode::Google {
            self.google_page_size.min(limit + 5)
        } else {
            self.page_limit
        }
    }

    fn finish(self) -> DownloadSummary {
        self.downloader.close()
    }

    async fn fetch_page(
        &self,
        request: &SearchRequest,
        cursor: &SearchCursor,
        year: Option<&YearFilter>,
    ) -> Result<FetchedPage, SourceError> {
        match (self.mode, &self.google) {
            (SearchMode::Google, Some(google)) => {
                let page = google
                    .search_page(&request.query, cursor.offset, cursor.page_size, year)
                    .await?;
                let papers = self.reconcile_scholar_results(page.results).await;
                Ok(FetchedPage {
                    papers,
                    has_more: page.has_more,
                })
            }
            (SearchMode::Google, None) => Err(SourceError::Configuration(
                "A SerpAPI key is required for google searches".to_string(),
            )),
            (mode, _) => {
                let page = self
                    .semantic
                    .fetch_page(mode, &request.query, cursor.offset, cursor.page_size, year)
                    .await?;
                Ok(FetchedPage {
                    papers: page.papers,
                    has_more: page.has_more,
                })
            }
        }
    }

    /// Preprocess scholar results, then swap each for its graph-index match
    /// when one with BibTeX exists.
    async fn reconcile_scholar_results(
        &self,
        results: Vec<ScholarResult>,
    ) -> Vec<RawPaper> {
        let crossref = &self.crossref;
        let preprocessed = join_all(results.into_iter().map(|result| async move {
            let title = result.title.clone();
            match preprocess(result, crossref).await {
                Ok(item) => Some(item),
                Err(e) if e.is_doi_not_found() => {
                    info!("Dropping {}: {}", title, e);
                    None
                }
                Err(e) => {
                    warn!("Could not preprocess {}: {}", title, e);
                    None
                }
            }
        }))
        .await;

        join_all(
            preprocessed
                .into_iter()
                .flatten()
                .map(|item| self.cross_reference(item)),
        )
        .await
    }

    async fn cross_reference(&self, item: ScholarItem) -> RawPaper {
        let ScholarItem {
            paper,
            resource_link,
        } = item;
        let title = paper.title.clone().unwrap_or_default();

        match self.semantic.match_title(&title, paper.year.as_deref()).await {
            Ok(Some(mut matched)) if matched.bibtex().is_some() => {
                if let Some(link) = resource_link {
                    matched.set_open_access_url(link);
                }
                matched
            }
            Ok(_) => {
                debug!("No graph-index match with BibTeX for {}", title);
                paper
            }
            Err(e) => {
                warn!("Cross-reference of {} failed: {}", title, e);
                paper
            }
        }
    }
}

/// Search with a fresh session built from `config`.
pub async fn search_papers(
    request: &SearchRequest,
    config: &Config,
) -> Result<PaperMap, SourceError> {
    SearchSession::new(config, request.mode)?.run(request).await
}

/// Save one paper's PDF into `dump_dir` using the built-in strategies.
pub async fn fetch_paper(
    paper: &RawPaper,
    dump_dir: &Path,
    config: &Config,
) -> Result<PathBuf, SourceError> {
    let chain = default_chain(config)?;
    let id = paper.paper_id.as_deref().unwrap_or("paper");
    let dest = dump_dir.join(pdf_file_name(id));
    match chain.resolve(paper, &dest).await {
        ScraperOutcome::Success(path) => Ok(path),
        ScraperOutcome::NotApplicable => Err(SourceError::NotFound(format!(
            "No strategy applies to {}",
            id
        ))),
        ScraperOutcome::Failure(reason) => Err(SourceError::NotFound(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, RateLimitConfig};
    use crate::scrapers::MockStrategy;
    use mockito::{Matcher, Server};
    use std::sync::Arc;

    fn config() -> Config {
        let mut config = Config::default();
        config.endpoints = EndpointConfig::all("http://127.0.0.1:9");
        config.rate_limits = RateLimitConfig::uniform(1000.0);
        config.api_keys.serpapi = None;
        config.api_keys.semantic_scholar = None;
        config
    }

    #[test]
    fn test_google_mode_needs_serpapi_key() {
        let err = SearchSession::new(&config(), SearchMode::Google).unwrap_err();
        assert!(matches!(err, SourceError::Configuration(_)));
    }

    #[test]
    fn test_missing_graph_key_is_not_an_error() {
        let session = SearchSession::new(&config(), SearchMode::Default).unwrap();
        assert_eq!(session.mode(), SearchMode::Default);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = config();
        config.search.page_limit = 0;
        assert!(SearchSession::new(&config, SearchMode::Default).is_err());
    }

    #[test]
    fn test_page_sizes() {
        let session = SearchSession::new(&config(), SearchMode::Default).unwrap();
        assert_eq!(session.page_size(3), 100);

        let mut config = config();
        config.api_keys.serpapi = Some("serp-key".to_string());
        let session = SearchSession::new(&config, SearchMode::Google).unwrap();
        assert_eq!(session.page_size(3), 8);
        assert_eq!(session.page_size(50), 20);
    }

    #[tokio::test]
    async fn test_zero_limit_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let request = SearchRequest::new("benzene").limit(0).dump_dir(dir.path());
        let results = search_papers(&request, &config()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_local_paper_is_fetched_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("mine.pdf");
        std::fs::write(&existing, b"%PDF").unwrap();

        let mut paper = RawPaper::new("mine", "Mine");
        paper.local_path = Some(existing.clone());
        let path = fetch_paper(&paper, dir.path(), &config()).await.unwrap();
        assert_eq!(path, existing);

        let err = fetch_paper(&RawPaper::new("x", "Nothing"), dir.path(), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_session_uses_given_chain() {
        let mut server = Server::new_async().await;
        let _search = server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::json!({"total": 1, "data": [{
                    "paperId": "p1",
                    "title": "Benzene",
                    "citationStyles": {"bibtex": "@article{Doe2020, author = {Jane Doe}, title = {Benzene}, journal = {JACS}, year = {2020}}"}
                }]})
                .to_string(),
            )
            .create_async()
            .await;

        let mut config = config();
        config.endpoints = EndpointConfig::all(&server.url());
        let strategy = Arc::new(MockStrategy::succeeding("mock", 0));
        let mut chain = ScraperChain::new();
        chain.register(strategy.clone());

        let dir = tempfile::tempdir().unwrap();
        let request = SearchRequest::new("benzene").limit(1).dump_dir(dir.path());
        let papers = SearchSession::new(&config, SearchMode::Default)
            .unwrap()
            .with_chain(chain)
            .run(&request)
            .await
            .unwrap();

        assert_eq!(papers.len(), 1);
        let record = &papers[&dir.path().join("p1.pdf")];
        assert_eq!(record.key, "Doe2020");
        assert_eq!(record.citation, "Jane Doe. Benzene. JACS, 2020.");
        assert_eq!(strategy.call_count(), 1);
    }
}
