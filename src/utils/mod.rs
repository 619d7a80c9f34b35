//! Utility modules supporting paper retrieval.
//!
//! - [`HttpClient`]: shared reqwest client that hands out [`RateLimitedClient`]s
//! - [`RateLimitedRequestBuilder`]: request builder that waits on its provider's budget
//! - [`clean_up_bibtex`]: normalize provider BibTeX entry types
//! - [`format_bibtex`]: render BibTeX as an unsrt-style citation
//! - [`likely_pdf`], [`find_pdf_link`], [`save_pdf`]: PDF detection and saving
//!
//! # Rate-limited requests
//!
//! ```rust,no_run
//! use paper_scraper::utils::{HttpClient, RateLimitBudget};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?.rate_limited(RateLimitBudget::per_second(1.0))?;
//! let response = client.get("https://api.crossref.org/works")
//!     .query(&[("rows", "1")])
//!     .send()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod bibtex;
mod cite;
mod http;
mod pdf;

pub use bibtex::{clean_up_bibtex, extract_key, regenerate_key, EntryKind};
pub use cite::{format_bibtex, format_entry, MissingField};
pub use http::{
    check_status, HttpClient, RateLimitBudget, RateLimitedClient, RateLimitedRequestBuilder,
    BROWSER_USER_AGENT,
};
pub use pdf::{
    content_type_is_pdf, encode_id, find_doi, find_pdf_link, likely_pdf, pdf_file_name,
    publisher_pdf_link, resolve_link, save_pdf, search_pdf_link,
};
