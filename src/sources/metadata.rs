//! Provider records to [`PaperRecord`]s.

use async_trait::async_trait;
use tracing::debug;

use crate::models::{PaperRecord, PaperRecordBuilder, RawPaper};
use crate::scrapers::PaperParser;
use crate::sources::{CrossRefClient, GoogleScholarClient, SourceError};
use crate::utils::{clean_up_bibtex, extract_key, format_bibtex};

/// Build a record from a graph-index paper that carries BibTeX.
pub fn parse_semantic_scholar_metadata(paper: &RawPaper) -> Result<PaperRecord, SourceError> {
    let paper_id = paper
        .paper_id
        .as_deref()
        .ok_or_else(|| SourceError::Parse("Paper has no id".to_string()))?;
    let bibtex = paper
        .bibtex()
        .ok_or_else(|| SourceError::Parse(format!("Paper {} has no BibTeX", paper_id)))?;
    let key = extract_key(bibtex)
        .ok_or_else(|| SourceError::Parse(format!("Paper {} has an empty citation key", paper_id)))?;

    let citation = format_bibtex(bibtex, key, true)?;

    Ok(PaperRecordBuilder::new(paper_id, key, paper.title.clone().unwrap_or_default())
        .citation(citation)
        .bibtex(clean_up_bibtex(bibtex))
        .year(paper.year.clone())
        .url(paper.url.clone())
        .doi(paper.doi().map(str::to_string))
        .citation_count(paper.citation_count.unwrap_or(0))
        .tldr(paper.tldr_text().map(str::to_string))
        .build())
}

/// Parser used by the batch downloader.
///
/// Papers with graph-index BibTeX are parsed directly. Others (scholar
/// results the graph index could not match) get their BibTeX from CrossRef
/// by DOI, then from the scholar engine's citation endpoint.
#[derive(Debug, Clone, Default)]
pub struct MetadataParser {
    crossref: Option<CrossRefClient>,
    google: Option<GoogleScholarClient>,
}

impl MetadataParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crossref(mut self, crossref: CrossRefClient) -> Self {
        self.crossref = Some(crossref);
        self
    }

    pub fn with_google_scholar(mut self, google: GoogleScholarClient) -> Self {
        self.google = Some(google);
        self
    }

    async fn parse_google_scholar_metadata(
        &self,
        paper: &RawPaper,
    ) -> Result<PaperRecord, SourceError> {
        let paper_id = paper
            .paper_id
            .as_deref()
            .ok_or_else(|| SourceError::Parse("Paper has no id".to_string()))?;
        let title = paper.title.clone().unwrap_or_default();

        let mut resolved = None;
        if let (Some(doi), Some(crossref)) = (paper.doi(), &self.crossref) {
            match crossref.doi_to_bibtex(doi).await {
                Ok(bibtex) => match extract_key(&bibtex).map(str::to_string) {
                    Some(key) => match format_bibtex(&bibtex, &key, false) {
                        Ok(citation) => resolved = Some((key, citation, bibtex)),
                        Err(e) => debug!("CrossRef BibTeX for {} unusable: {}", doi, e),
                    },
                    None => debug!("CrossRef BibTeX for {} has no key", doi),
                },
                Err(e) => debug!("No CrossRef BibTeX for {}: {}", doi, e),
            }
        }

        if resolved.is_none() {
            if let (Some(cite_link), Some(google)) = (paper.cite_link.as_deref(), &self.google) {
                let (citation, bibtex) = google.fetch_citation(cite_link).await?;
                let key = extract_key(&bibtex)
                    .ok_or_else(|| {
                        SourceError::Parse(format!("Scholar BibTeX for {} has no key", title))
                    })?
                    .to_string();
                resolved = Some((key, citation, bibtex));
            }
        }

        let (key, citation, bibtex) = resolved.ok_or_else(|| {
            SourceError::NotFound(format!(
                "Exhausted all options for citation retrieval for {}",
                title
            ))
        })?;

        Ok(PaperRecordBuilder::new(paper_id, key, title)
            .citation(citation)
            .bibtex(bibtex)
            .year(paper.year.clone())
            .url(paper.url.clone())
            .doi(paper.doi().map(str::to_string))
            .citation_count(paper.citation_count.unwrap_or(0))
            .build())
    }
}

#[async_trait]
impl PaperParser for MetadataParser {
    async fn parse(&self, paper: &RawPaper) -> Result<PaperRecord, SourceError> {
        if paper.bibtex().is_some() {
            parse_semantic_scholar_metadata(paper)
        } else {
            self.parse_google_scholar_metadata(paper).await
        }
    }
}
