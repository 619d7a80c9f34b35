//! Concurrent batch downloading.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::{PaperMap, PaperRecord, RawPaper};
use crate::scrapers::{ScraperChain, ScraperOutcome};
use crate::sources::SourceError;
use crate::utils::pdf_file_name;

/// Turns a provider record into the record stored next to its PDF.
#[async_trait]
pub trait PaperParser: Send + Sync {
    async fn parse(&self, paper: &RawPaper) -> Result<PaperRecord, SourceError>;
}

/// Counters reported when a downloader is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Papers that went through parsing and the strategy chain
    pub attempted: usize,
    pub downloaded: usize,
    /// Papers skipped because this session already resolved them
    pub cached: usize,
    pub failed: usize,
}

/// Runs the strategy chain over batches of papers.
///
/// A paper id resolved once is never fetched again by the same downloader.
#[derive(Debug)]
pub struct BatchDownloader {
    chain: ScraperChain,
    resolved: HashMap<String, PathBuf>,
    summary: DownloadSummary,
}

impl BatchDownloader {
    pub fn new(chain: ScraperChain) -> Self {
        Self {
            chain,
            resolved: HashMap::new(),
            summary: DownloadSummary::default(),
        }
    }

    /// Where an already resolved paper was saved.
    pub fn resolved_path(&self, paper_id: &str) -> Option<&Path> {
        self.resolved.get(paper_id).map(PathBuf::as_path)
    }

    pub fn summary(&self) -> DownloadSummary {
        self.summary
    }

    /// Parse and download up to `limit` new papers, `batch_size` at a time.
    ///
    /// Per-paper failures are logged and skipped. The returned map only holds
    /// papers saved by this call.
    pub async fn batch_scrape(
        &mut self,
        papers: Vec<RawPaper>,
        dump_dir: &Path,
        parser: &dyn PaperParser,
        batch_size: usize,
        limit: usize,
    ) -> PaperMap {
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for paper in papers {
            let Some(id) = paper.paper_id.clone() else {
                debug!("Skipping paper without id: {:?}", paper.title);
                continue;
            };
            if self.resolved.contains_key(&id) {
                self.summary.cached += 1;
                continue;
            }
            if seen.insert(id.clone()) {
                pending.push((id, paper));
            }
        }

        let mut results = PaperMap::new();
        let mut pending = pending.into_iter().peekable();
        while results.len() < limit && pending.peek().is_some() {
            let wave_size = batch_size.max(1).min(limit - results.len());
            let wave: Vec<(String, RawPaper)> = pending.by_ref().take(wave_size).collect();
            self.summary.attempted += wave.len();

            let chain = &self.chain;
            let outcomes = join_all(wave.iter().map(|(id, paper)| async move {
                let record = match parser.parse(paper).await {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Could not parse metadata of {}: {}", id, e);
                        return None;
                    }
                };
                let dest = dump_dir.join(pdf_file_name(id));
                match chain.resolve(paper, &dest).await {
                    ScraperOutcome::Success(path) => Some((id.clone(), path, record)),
                    ScraperOutcome::NotApplicable => {
                        debug!("No strategy applies to {}", id);
                        None
                    }
                    ScraperOutcome::Failure(reason) => {
                        debug!("No PDF for {}: {}", id, reason);
                        None
                    }
                }
            }))
            .await;

            for outcome in outcomes {
                match outcome {
                    Some((id, path, record)) => {
                        self.summary.downloaded += 1;
                        self.resolved.insert(id, path.clone());
                        results.insert(path, record);
                    }
                    None => self.summary.failed += 1,
                }
            }
        }

        results
    }

    /// Finish the session and report what it did.
    pub fn close(self) -> DownloadSummary {
        info!(
            "Downloads finished: {} attempted, {} saved, {} cached, {} failed",
            self.summary.attempted,
            self.summary.downloaded,
            self.summary.cached,
            self.summary.failed
        );
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperRecordBuilder;
    use crate::scrapers::MockStrategy;
    use std::sync::Arc;

    struct TitleParser;

    #[async_trait]
    impl PaperParser for TitleParser {
        async fn parse(&self, paper: &RawPaper) -> Result<PaperRecord, SourceError> {
            let id = paper.paper_id.clone().unwrap_or_default();
            let title = paper.title.clone().unwrap_or_default();
            if title.is_empty() {
                return Err(SourceError::Parse("no title".to_string()));
            }
            Ok(PaperRecordBuilder::new(id.clone(), id, title.clone())
                .citation(title)
                .build())
        }
    }

    fn papers(n: usize) -> Vec<RawPaper> {
        (0..n)
            .map(|i| RawPaper::new(format!("id{}", i), format!("Paper {}", i)))
            .collect()
    }

    fn downloader(strategy: Arc<MockStrategy>) -> BatchDownloader {
        let mut chain = ScraperChain::new();
        chain.register(strategy);
        BatchDownloader::new(chain)
    }

    #[tokio::test]
    async fn test_respects_limit() {
        let strategy = Arc::new(MockStrategy::succeeding("mock", 0));
        let mut downloader = downloader(strategy.clone());
        let dir = tempfile::tempdir().unwrap();

        let saved = downloader
            .batch_scrape(papers(10), dir.path(), &TitleParser, 4, 3)
            .await;

        assert_eq!(saved.len(), 3);
        assert_eq!(strategy.call_count(), 3);
        assert!(saved.contains_key(&dir.path().join("id0.pdf")));
        for (path, record) in &saved {
            assert!(path.exists());
            assert!(!record.citation.is_empty());
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let strategy = Arc::new(MockStrategy::succeeding("mock", 0));
        let mut downloader = downloader(strategy.clone());
        let dir = tempfile::tempdir().unwrap();

        let mut input = papers(3);
        input[1].title = None;
        let saved = downloader
            .batch_scrape(input, dir.path(), &TitleParser, 10, 10)
            .await;

        assert_eq!(saved.len(), 2);
        assert_eq!(strategy.call_count(), 2);
        let summary = downloader.close();
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_same_paper_is_resolved_once() {
        let strategy = Arc::new(MockStrategy::succeeding("mock", 0));
        let mut downloader = downloader(strategy.clone());
        let dir = tempfile::tempdir().unwrap();

        let mut input = papers(2);
        input.push(RawPaper::new("id0", "Paper 0"));
        let first = downloader
            .batch_scrape(input, dir.path(), &TitleParser, 10, 10)
            .await;
        assert_eq!(first.len(), 2);

        let second = downloader
            .batch_scrape(papers(2), dir.path(), &TitleParser, 10, 10)
            .await;
        assert!(second.is_empty());
        assert_eq!(strategy.call_count(), 2);
        assert_eq!(
            downloader.resolved_path("id1"),
            Some(dir.path().join("id1.pdf").as_path())
        );
        assert_eq!(downloader.close().cached, 2);
    }

    #[tokio::test]
    async fn test_unresolved_papers_are_left_out() {
        let strategy = Arc::new(MockStrategy::new(
            "mock",
            0,
            ScraperOutcome::Failure("nope".to_string()),
        ));
        let mut downloader = downloader(strategy.clone());
        let dir = tempfile::tempdir().unwrap();

        let saved = downloader
            .batch_scrape(papers(2), dir.path(), &TitleParser, 1, 5)
            .await;
        assert!(saved.is_empty());
        assert_eq!(strategy.call_count(), 2);
        assert!(downloader.resolved_path("id0").is_none());
    }
}
