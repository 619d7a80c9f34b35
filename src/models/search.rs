//! Search request models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How a query string is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Free-text search on the graph index
    #[default]
    Default,
    /// Query is a graph-index paper id
    Paper,
    /// Query is a DOI
    Doi,
    /// Papers recommended for the given paper id
    #[serde(alias = "paper_recommendations")]
    Recommendations,
    /// Papers citing the given paper id
    #[serde(alias = "citations")]
    FutureCitations,
    /// Papers the given paper id cites
    #[serde(alias = "references")]
    PastReferences,
    /// Free-text search on the scholar engine, matched back to the graph index
    Google,
}

/// Request line for one graph-index call: URL plus query parameters.
pub type GraphRequest = (String, Vec<(&'static str, String)>);

impl SearchMode {
    pub const ALL: [SearchMode; 7] = [
        SearchMode::Default,
        SearchMode::Paper,
        SearchMode::Doi,
        SearchMode::Recommendations,
        SearchMode::FutureCitations,
        SearchMode::PastReferences,
        SearchMode::Google,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Default => "default",
            SearchMode::Paper => "paper",
            SearchMode::Doi => "doi",
            SearchMode::Recommendations => "recommendations",
            SearchMode::FutureCitations => "future_citations",
            SearchMode::PastReferences => "past_references",
            SearchMode::Google => "google",
        }
    }

    /// Graph-index endpoint and parameters for this mode. In `Google` mode
    /// this is the one-result title match used for cross-referencing.
    pub fn endpoint(&self, base_url: &str, query: &str, offset: usize, limit: usize) -> GraphRequest {
        let base = base_url.trim_end_matches('/');
        match self {
            SearchMode::Default => (
                format!("{}/graph/v1/paper/search", base),
                vec![
                    ("query", query.replace('-', " ")),
                    ("offset", offset.to_string()),
                    ("limit", limit.to_string()),
                ],
            ),
            SearchMode::Paper => (format!("{}/graph/v1/paper/{}", base, query), Vec::new()),
            SearchMode::Doi => (format!("{}/graph/v1/paper/DOI:{}", base, query), Vec::new()),
            SearchMode::Recommendations => (
                format!("{}/recommendations/v1/papers/forpaper/{}", base, query),
                Vec::new(),
            ),
            SearchMode::FutureCitations => (
                format!("{}/graph/v1/paper/{}/citations", base, query),
                vec![("limit", limit.to_string())],
            ),
            SearchMode::PastReferences => (
                format!("{}/graph/v1/paper/{}/references", base, query),
                vec![("limit", limit.to_string())],
            ),
            SearchMode::Google => (
                format!("{}/graph/v1/paper/search", base),
                vec![("query", query.replace('-', " ")), ("limit", "1".to_string())],
            ),
        }
    }

    /// Response field holding the result list.
    pub fn items_field(&self) -> &'static str {
        match self {
            SearchMode::Recommendations => "recommendedPapers",
            _ => "data",
        }
    }

    /// Object each result item wraps its paper in, if any.
    pub fn nested_field(&self) -> Option<&'static str> {
        match self {
            SearchMode::FutureCitations => Some("citingPaper"),
            SearchMode::PastReferences => Some("citedPaper"),
            _ => None,
        }
    }

    /// The response is the paper itself rather than a list.
    pub fn single_record(&self) -> bool {
        matches!(self, SearchMode::Paper | SearchMode::Doi)
    }

    pub fn accepts_year(&self) -> bool {
        matches!(self, SearchMode::Default | SearchMode::Google)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "default" => Ok(SearchMode::Default),
            "paper" => Ok(SearchMode::Paper),
            "doi" => Ok(SearchMode::Doi),
            "recommendations" | "paper_recommendations" => Ok(SearchMode::Recommendations),
            "future_citations" | "citations" => Ok(SearchMode::FutureCitations),
            "past_references" | "references" => Ok(SearchMode::PastReferences),
            "google" => Ok(SearchMode::Google),
            other => Err(format!("unknown search mode: {}", other)),
        }
    }
}

/// Publication-year filter: one year or an inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearFilter {
    Single(u16),
    Range(u16, u16),
}

impl YearFilter {
    /// Parse `"2019"` or `"2019-2023"`. Reversed or partial ranges are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.split_once('-') {
            Some((start, end)) => {
                let start: u16 = start.trim().parse().ok()?;
                let end: u16 = end.trim().parse().ok()?;
                (start <= end).then_some(YearFilter::Range(start, end))
            }
            None => raw.parse().ok().map(YearFilter::Single),
        }
    }

    /// Value of the graph index's `year` parameter.
    pub fn as_param(&self) -> String {
        match self {
            YearFilter::Single(year) => year.to_string(),
            YearFilter::Range(start, end) => format!("{}-{}", start, end),
        }
    }

    /// Inclusive lower and upper bound.
    pub fn bounds(&self) -> (u16, u16) {
        match self {
            YearFilter::Single(year) => (*year, *year),
            YearFilter::Range(start, end) => (*start, *end),
        }
    }
}

/// Paging state of one search run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCursor {
    pub offset: usize,
    pub target_limit: usize,
    pub page_size: usize,
}

impl SearchCursor {
    pub fn new(target_limit: usize, page_size: usize) -> Self {
        Self {
            offset: 0,
            target_limit,
            page_size,
        }
    }

    pub fn is_satisfied(&self, collected: usize) -> bool {
        collected >= self.target_limit
    }

    pub fn remaining(&self, collected: usize) -> usize {
        self.target_limit.saturating_sub(collected)
    }

    /// Move to the next page; `false` when the run should stop.
    pub fn advance(&mut self, collected: usize, has_more: bool) -> bool {
        if self.is_satisfied(collected) || !has_more {
            return false;
        }
        self.offset += self.page_size;
        true
    }
}

/// Search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free text, paper id or DOI depending on the mode
    pub query: String,

    /// Number of saved papers to aim for
    pub limit: usize,

    /// Directory the PDFs are written to
    pub dump_dir: PathBuf,

    /// Year filter (single year or range like "2018-2022")
    pub year: Option<String>,

    pub mode: SearchMode,

    /// Papers resolved concurrently per wave
    pub batch_size: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: 10,
            dump_dir: PathBuf::from("."),
            year: None,
            mode: SearchMode::Default,
            batch_size: 10,
        }
    }
}

impl SearchRequest {
    /// Create a new search request
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set target number of papers
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set output directory
    pub fn dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dir.into();
        self
    }

    /// Set year filter
    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Set search mode
    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set batch size
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in SearchMode::ALL {
            assert_eq!(mode.as_str().parse::<SearchMode>().unwrap(), mode);
        }
        assert_eq!("citations".parse::<SearchMode>().unwrap(), SearchMode::FutureCitations);
        assert_eq!(
            "paper-recommendations".parse::<SearchMode>().unwrap(),
            SearchMode::Recommendations
        );
        assert!("bogus".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_default_endpoint() {
        let (url, params) =
            SearchMode::Default.endpoint("https://api.example.org/", "benzene-ring", 100, 100);
        assert_eq!(url, "https://api.example.org/graph/v1/paper/search");
        assert_eq!(
            params,
            vec![
                ("query", "benzene ring".to_string()),
                ("offset", "100".to_string()),
                ("limit", "100".to_string()),
            ]
        );
    }

    #[test]
    fn test_id_endpoints() {
        let base = "https://api.example.org";
        assert_eq!(
            SearchMode::Doi.endpoint(base, "10.1/x", 0, 10).0,
            "https://api.example.org/graph/v1/paper/DOI:10.1/x"
        );
        assert_eq!(
            SearchMode::Recommendations.endpoint(base, "p1", 0, 10).0,
            "https://api.example.org/recommendations/v1/papers/forpaper/p1"
        );
        let (url, params) = SearchMode::FutureCitations.endpoint(base, "p1", 0, 25);
        assert_eq!(url, "https://api.example.org/graph/v1/paper/p1/citations");
        assert_eq!(params, vec![("limit", "25".to_string())]);
        assert_eq!(
            SearchMode::PastReferences.endpoint(base, "p1", 0, 10).0,
            "https://api.example.org/graph/v1/paper/p1/references"
        );
        assert_eq!(SearchMode::Google.endpoint(base, "T", 0, 10).1[1], ("limit", "1".to_string()));
    }

    #[test]
    fn test_response_shape() {
        assert_eq!(SearchMode::Recommendations.items_field(), "recommendedPapers");
        assert_eq!(SearchMode::FutureCitations.nested_field(), Some("citingPaper"));
        assert_eq!(SearchMode::PastReferences.nested_field(), Some("citedPaper"));
        assert!(SearchMode::Doi.single_record());
        assert!(!SearchMode::Default.single_record());
    }

    #[test]
    fn test_year_filter() {
        assert_eq!(YearFilter::parse("2019"), Some(YearFilter::Single(2019)));
        assert_eq!(YearFilter::parse(" 2019-2023 "), Some(YearFilter::Range(2019, 2023)));
        assert_eq!(YearFilter::parse("2023-2019"), None);
        assert_eq!(YearFilter::parse("2019-"), None);
        assert_eq!(YearFilter::parse("recent"), None);
        assert_eq!(YearFilter::Range(2019, 2023).as_param(), "2019-2023");
        assert_eq!(YearFilter::Single(2020).bounds(), (2020, 2020));
    }

    #[test]
    fn test_cursor() {
        let mut cursor = SearchCursor::new(25, 20);
        assert_eq!(cursor.remaining(0), 25);
        assert!(cursor.advance(20, true));
        assert_eq!(cursor.offset, 20);
        assert!(!cursor.advance(22, false));
        assert!(!cursor.advance(25, true));
        assert_eq!(cursor.remaining(30), 0);
    }

    #[test]
    fn test_search_request_builder() {
        let request = SearchRequest::new("benzene")
            .limit(3)
            .year("2020")
            .mode(SearchMode::Google)
            .dump_dir("/tmp/papers");
        assert_eq!(request.limit, 3);
        assert_eq!(request.year.as_deref(), Some("2020"));
        assert_eq!(request.mode, SearchMode::Google);
        assert_eq!(request.batch_size, 10);
    }
}
