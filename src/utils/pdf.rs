//! PDF detection, link discovery and atomic saving.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;
use scraper::{Html, Selector};
use url::Url;

use crate::sources::SourceError;

#[allow(clippy::expect_used)]
static PDF_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"\s]+\.pdf)""#).expect("pdf href regex is valid"));
#[allow(clippy::expect_used)]
static EPDF_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"\s]+\.epdf)""#).expect("epdf href regex is valid"));
#[allow(clippy::expect_used)]
static CHEMRXIV_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"content="(https://chemrxiv\.org/engage/api-gateway/chemrxiv/assets[^"]*\.pdf)""#)
        .expect("chemrxiv asset regex is valid")
});
#[allow(clippy::expect_used)]
static DOI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)10\.\d{4,9}/[-._;()/:a-z0-9]+").expect("doi regex is valid")
});

const DOI_TRAILERS: [&str; 4] = ["/full", "/abstract", "/pdf", ".pdf"];

/// Cheap check on a downloaded body. Bytes that are not UTF-8 count as a
/// PDF; text is rejected when it carries a provider's "no such paper" marker.
pub fn likely_pdf(body: &[u8]) -> bool {
    match std::str::from_utf8(body) {
        Ok(text) => !(text.contains("Invalid article ID") || text.contains("No paper")),
        Err(_) => true,
    }
}

pub fn content_type_is_pdf(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("pdf"))
}

/// First `href` ending in `.pdf` (or `.epdf` rewritten to `.pdf`).
pub fn search_pdf_link(html: &str, epdf: bool) -> Option<String> {
    if epdf {
        EPDF_HREF
            .captures(html)
            .map(|caps| caps[1].replace("epdf", "pdf"))
    } else {
        PDF_HREF.captures(html).map(|caps| caps[1].to_string())
    }
}

/// Publisher-specific PDF location: the ChemRxiv asset link or the
/// `citation_pdf_url` meta tag.
pub fn publisher_pdf_link(html: &str) -> Option<String> {
    if let Some(caps) = CHEMRXIV_ASSET.captures(html) {
        return Some(caps[1].to_string());
    }

    let meta_selector = Selector::parse(r#"meta[name="citation_pdf_url"]"#).ok()?;
    let document = Html::parse_document(html);
    document
        .select(&meta_selector)
        .find_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

/// Publisher link, then `.epdf` links, then plain `.pdf` links.
pub fn find_pdf_link(html: &str) -> Option<String> {
    publisher_pdf_link(html)
        .or_else(|| search_pdf_link(html, true))
        .or_else(|| search_pdf_link(html, false))
}

/// Resolve a possibly relative link against the page it was found on.
pub fn resolve_link(page_url: &str, link: &str) -> Result<Url, SourceError> {
    let base = Url::parse(page_url)
        .map_err(|e| SourceError::InvalidRequest(format!("Malformed URL {}: {}", page_url, e)))?;
    base.join(link)
        .map_err(|e| SourceError::InvalidRequest(format!("Malformed link {}: {}", link, e)))
}

/// DOI embedded in a URL or text, without trailing path noise.
pub fn find_doi(text: &str) -> Option<String> {
    let found = DOI_PATTERN.find(text)?.as_str();
    let mut doi = found.trim_end_matches(['.', ',', ';', ')']);
    for trailer in DOI_TRAILERS {
        if let Some(stripped) = doi.strip_suffix(trailer) {
            doi = stripped;
        }
    }
    Some(doi.to_string())
}

/// Stable id: first 16 hex chars of the MD5 of the lower-cased value.
pub fn encode_id(value: &str) -> String {
    let digest = format!("{:x}", md5::compute(value.to_lowercase().as_bytes()));
    digest[..16].to_string()
}

/// `<paper id>.pdf`, with path separators replaced.
pub fn pdf_file_name(paper_id: &str) -> String {
    format!("{}.pdf", paper_id.replace(['/', '\\'], "_"))
}

/// Write `bytes` to `path` through a temporary file in the same directory.
pub async fn save_pdf(path: &Path, bytes: Vec<u8>) -> Result<(), SourceError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
        .await
        .map_err(|e| SourceError::Other(format!("PDF writer task failed: {}", e)))?
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SourceError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;

    let mut file = tempfile::NamedTempFile::new_in(&dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| SourceError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_likely_pdf() {
        assert!(likely_pdf(b"%PDF-1.7 binary follows"));
        assert!(likely_pdf(&[0x25, 0x50, 0x44, 0x46, 0xff, 0xfe, 0x00]));
        assert!(!likely_pdf(b"<html>Invalid article ID</html>"));
        assert!(!likely_pdf(b"No paper with that identifier"));
    }

    #[test]
    fn test_search_pdf_link() {
        let html = r#"<a href="/doi/epdf/10.1002/x.epdf">Read</a> <a href="/files/main.pdf">PDF</a>"#;
        assert_eq!(
            search_pdf_link(html, true).as_deref(),
            Some("/doi/pdf/10.1002/x.pdf")
        );
        assert_eq!(search_pdf_link(html, false).as_deref(), Some("/files/main.pdf"));
        assert_eq!(search_pdf_link("<p>nothing</p>", false), None);
    }

    #[test]
    fn test_find_pdf_link_prefers_publisher_links() {
        let chem = r#"<meta name="citation_pdf_url" content="https://chemrxiv.org/engage/api-gateway/chemrxiv/assets/orp/resource/item/1/original/paper.pdf"><a href="/other.pdf">x</a>"#;
        assert_eq!(
            find_pdf_link(chem).as_deref(),
            Some("https://chemrxiv.org/engage/api-gateway/chemrxiv/assets/orp/resource/item/1/original/paper.pdf")
        );

        let meta = r#"<html><head><meta name="citation_pdf_url" content="https://pub.example/paper.pdf"></head><body><a href="/other.pdf">x</a></body></html>"#;
        assert_eq!(find_pdf_link(meta).as_deref(), Some("https://pub.example/paper.pdf"));

        let plain = r#"<a href="/other.pdf">x</a>"#;
        assert_eq!(find_pdf_link(plain).as_deref(), Some("/other.pdf"));
    }

    #[test]
    fn test_resolve_link() {
        let url = resolve_link("https://example.org/articles/1", "/files/a.pdf").unwrap();
        assert_eq!(url.as_str(), "https://example.org/files/a.pdf");
        let url = resolve_link("https://example.org/articles/1", "https://cdn.example/b.pdf").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example/b.pdf");
        assert!(resolve_link("not a url", "/a.pdf").is_err());
    }

    #[test]
    fn test_find_doi() {
        assert_eq!(
            find_doi("https://pubs.acs.org/doi/10.1021/acs.jpca.1c00001").as_deref(),
            Some("10.1021/acs.jpca.1c00001")
        );
        assert_eq!(
            find_doi("https://onlinelibrary.wiley.com/doi/full/10.1002/anie.202012345/full").as_deref(),
            Some("10.1002/anie.202012345")
        );
        assert_eq!(find_doi("https://www.nature.com/articles/s41586"), None);
    }

    #[test]
    fn test_encode_id() {
        let id = encode_id("10.1021/ACS.JPCA.1C00001");
        assert_eq!(id.len(), 16);
        assert_eq!(id, encode_id("10.1021/acs.jpca.1c00001"));
        assert_eq!(
            encode_id(""),
            "d41d8cd98f00b204e9800998ecf8427e"[..16].to_string()
        );
    }

    #[test]
    fn test_pdf_file_name() {
        assert_eq!(pdf_file_name("abc123"), "abc123.pdf");
        assert_eq!(pdf_file_name("10.1/x"), "10.1_x.pdf");
    }

    #[tokio::test]
    async fn test_save_pdf_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("paper.pdf");
        save_pdf(&path, b"%PDF-1.4".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
