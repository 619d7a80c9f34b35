//! Core data models for papers and search runs.

mod paper;
mod search;

pub use paper::{
    CitationStyles, ExternalIds, IdKind, OpenAccessPdf, PaperMap, PaperRecord,
    PaperRecordBuilder, RawPaper, Tldr,
};
pub use search::{GraphRequest, SearchCursor, SearchMode, SearchRequest, YearFilter};
