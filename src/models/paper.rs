//! Paper models: the provider record as received and the canonical record
//! produced once a PDF has been saved.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;

/// Kinds of external identifier a paper may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdKind {
    ArXiv,
    Doi,
    PubMedCentral,
    PubMed,
}

impl IdKind {
    /// Key used by the graph index's `externalIds` object
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::ArXiv => "ArXiv",
            IdKind::Doi => "DOI",
            IdKind::PubMedCentral => "PubMedCentral",
            IdKind::PubMed => "PubMed",
        }
    }
}

impl FromStr for IdKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ArXiv" => Ok(IdKind::ArXiv),
            "DOI" => Ok(IdKind::Doi),
            "PubMedCentral" => Ok(IdKind::PubMedCentral),
            "PubMed" => Ok(IdKind::PubMed),
            other => Err(format!("unsupported external id kind: {}", other)),
        }
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External identifiers of one paper. Unknown kinds and empty values are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalIds(BTreeMap<IdKind, String>);

impl ExternalIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: IdKind) -> Option<&str> {
        self.0.get(&kind).map(String::as_str)
    }

    pub fn insert(&mut self, kind: IdKind, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.0.insert(kind, value.trim().to_string());
        }
    }

    pub fn with(mut self, kind: IdKind, value: impl Into<String>) -> Self {
        self.insert(kind, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IdKind, &str)> {
        self.0.iter().map(|(kind, value)| (*kind, value.as_str()))
    }
}

impl Serialize for ExternalIds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (kind, value) in &self.0 {
            map.serialize_entry(kind.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExternalIds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<HashMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
        let mut ids = ExternalIds::new();
        for (name, value) in raw.unwrap_or_default() {
            let Ok(kind) = name.parse::<IdKind>() else {
                continue;
            };
            match value {
                serde_json::Value::String(s) => ids.insert(kind, s),
                serde_json::Value::Number(n) => ids.insert(kind, n.to_string()),
                _ => {}
            }
        }
        Ok(ids)
    }
}

/// Years arrive as numbers from the graph index and as strings elsewhere.
fn deserialize_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccessPdf {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationStyles {
    #[serde(default)]
    pub bibtex: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tldr {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A paper as a provider returned it, before any PDF or citation work.
///
/// Field names follow the graph index's JSON; scholar-engine results are
/// mapped into the same shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPaper {
    #[serde(default)]
    pub paper_id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "deserialize_year")]
    pub year: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub external_ids: ExternalIds,

    #[serde(default)]
    pub open_access_pdf: Option<OpenAccessPdf>,

    #[serde(default)]
    pub citation_styles: Option<CitationStyles>,

    #[serde(default)]
    pub citation_count: Option<u64>,

    #[serde(default)]
    pub influential_citation_count: Option<u64>,

    #[serde(default)]
    pub tldr: Option<Tldr>,

    /// Already on disk; the local strategy short-circuits on it.
    #[serde(skip)]
    pub local_path: Option<PathBuf>,

    /// Scholar-engine citation endpoint, kept for the citation fallback.
    #[serde(skip)]
    pub cite_link: Option<String>,
}

impl RawPaper {
    /// Create a paper with only an id and title
    pub fn new(paper_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            paper_id: Some(paper_id.into()),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn doi(&self) -> Option<&str> {
        self.external_ids.get(IdKind::Doi)
    }

    pub fn bibtex(&self) -> Option<&str> {
        self.citation_styles
            .as_ref()
            .and_then(|styles| styles.bibtex.as_deref())
            .filter(|bibtex| !bibtex.trim().is_empty())
    }

    pub fn open_access_url(&self) -> Option<&str> {
        self.open_access_pdf
            .as_ref()
            .and_then(|pdf| pdf.url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }

    pub fn set_open_access_url(&mut self, url: impl Into<String>) {
        self.open_access_pdf = Some(OpenAccessPdf {
            url: Some(url.into()),
        });
    }

    pub fn tldr_text(&self) -> Option<&str> {
        self.tldr.as_ref().and_then(|tldr| tldr.text.as_deref())
    }
}

/// The normalized record kept for every paper whose PDF was saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    /// Citation key
    pub key: String,

    /// Rendered citation text
    pub citation: String,

    pub bibtex: String,

    pub title: String,

    pub year: Option<String>,

    pub url: Option<String>,

    /// Provider id the PDF file is named after
    pub paper_id: String,

    pub doi: Option<String>,

    pub citation_count: u64,

    pub tldr: Option<String>,
}

/// Builder for constructing PaperRecord objects
#[derive(Debug, Clone)]
pub struct PaperRecordBuilder {
    record: PaperRecord,
}

impl PaperRecordBuilder {
    /// Create a new builder with required fields
    pub fn new(
        paper_id: impl Into<String>,
        key: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            record: PaperRecord {
                key: key.into(),
                citation: String::new(),
                bibtex: String::new(),
                title: title.into(),
                year: None,
                url: None,
                paper_id: paper_id.into(),
                doi: None,
                citation_count: 0,
                tldr: None,
            },
        }
    }

    pub fn citation(mut self, citation: impl Into<String>) -> Self {
        self.record.citation = citation.into();
        self
    }

    pub fn bibtex(mut self, bibtex: impl Into<String>) -> Self {
        self.record.bibtex = bibtex.into();
        self
    }

    pub fn year(mut self, year: Option<String>) -> Self {
        self.record.year = year;
        self
    }

    pub fn url(mut self, url: Option<String>) -> Self {
        self.record.url = url;
        self
    }

    pub fn doi(mut self, doi: Option<String>) -> Self {
        self.record.doi = doi;
        self
    }

    pub fn citation_count(mut self, count: u64) -> Self {
        self.record.citation_count = count;
        self
    }

    pub fn tldr(mut self, tldr: Option<String>) -> Self {
        self.record.tldr = tldr;
        self
    }

    /// Build the PaperRecord
    pub fn build(self) -> PaperRecord {
        self.record
    }
}

/// Saved PDF path to the record of the paper in it
pub type PaperMap = BTreeMap<PathBuf, PaperRecord>;
