//! Papers that are already files on disk.

use async_trait::async_trait;
use std::path::Path;

use crate::models::RawPaper;
use crate::scrapers::{priority, PdfStrategy, ScraperOutcome};

/// Reports an existing local file as resolved, without copying it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStrategy;

#[async_trait]
impl PdfStrategy for LocalStrategy {
    fn name(&self) -> &str {
        "local"
    }

    fn priority(&self) -> u8 {
        priority::LOCAL
    }

    async fn try_resolve(&self, paper: &RawPaper, _dest: &Path) -> ScraperOutcome {
        let Some(path) = paper.local_path.as_deref() else {
            return ScraperOutcome::NotApplicable;
        };
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => ScraperOutcome::Success(path.to_path_buf()),
            Ok(_) => ScraperOutcome::Failure(format!("{} is not a file", path.display())),
            Err(e) => ScraperOutcome::Failure(format!("{}: {}", path.display(), e)),
        }
    }
}
