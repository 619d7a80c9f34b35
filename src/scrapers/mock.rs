//! Mock strategy for testing purposes.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::RawPaper;
use crate::scrapers::{PdfStrategy, ScraperOutcome};
use crate::utils::save_pdf;

/// A strategy that returns a fixed outcome and counts its calls.
#[derive(Debug)]
pub struct MockStrategy {
    name: String,
    priority: u8,
    outcome: ScraperOutcome,
    writes_file: bool,
    /// Number of `try_resolve` calls so far
    pub calls: AtomicUsize,
}

impl MockStrategy {
    /// Create a mock that always answers `outcome`.
    pub fn new(name: impl Into<String>, priority: u8, outcome: ScraperOutcome) -> Self {
        Self {
            name: name.into(),
            priority,
            outcome,
            writes_file: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that writes a tiny PDF to the destination and succeeds.
    pub fn succeeding(name: impl Into<String>, priority: u8) -> Self {
        Self {
            writes_file: true,
            ..Self::new(name, priority, ScraperOutcome::NotApplicable)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PdfStrategy for MockStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn try_resolve(&self, _paper: &RawPaper, dest: &Path) -> ScraperOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.writes_file {
            return match save_pdf(dest, b"%PDF-1.4 mock".to_vec()).await {
                Ok(()) => ScraperOutcome::Success(dest.to_path_buf()),
                Err(e) => ScraperOutcome::Failure(e.to_string()),
            };
        }
        self.outcome.clone()
    }
}
