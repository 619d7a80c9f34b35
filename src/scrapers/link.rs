//! Generic landing-page to PDF extraction.

use std::path::Path;
use tracing::debug;

use crate::sources::SourceError;
use crate::utils::{
    check_status, content_type_is_pdf, find_pdf_link, resolve_link, save_pdf, RateLimitedClient,
};

/// Save the PDF behind `url` at `dest`.
///
/// A response already served as PDF is saved as is. Otherwise the body is
/// scanned for a PDF link, which is resolved against the final (post-redirect)
/// URL, fetched and checked to be a PDF before anything is written.
pub async fn link_to_pdf(
    client: &RateLimitedClient,
    url: &str,
    dest: &Path,
) -> Result<(), SourceError> {
    let response = check_status(client.get(url).send().await?)?;
    if content_type_is_pdf(&response) {
        let bytes = response.bytes().await?;
        return save_pdf(dest, bytes.to_vec()).await;
    }

    let page_url = response.url().to_string();
    let html = response.text().await?;
    let link = find_pdf_link(&html)
        .ok_or_else(|| SourceError::NotFound(format!("No PDF link on {}", page_url)))?;
    let pdf_url = resolve_link(&page_url, &link)?;
    debug!("Following PDF link {}", pdf_url);

    let response = check_status(client.get(pdf_url.clone()).send().await?)?;
    if !content_type_is_pdf(&response) {
        return Err(SourceError::NotFound(format!("{} is not a PDF", pdf_url)));
    }
    let bytes = response.bytes().await?;
    save_pdf(dest, bytes.to_vec()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{HttpClient, RateLimitBudget};
    use mockito::Server;

    fn client() -> RateLimitedClient {
        HttpClient::new()
            .unwrap()
            .rate_limited(RateLimitBudget::per_second(1000.0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_direct_pdf_is_saved() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/paper")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.5")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.pdf");
        link_to_pdf(&client(), &format!("{}/paper", server.url()), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.5");
    }

    #[tokio::test]
    async fn test_relative_link_is_followed() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/articles/1")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<html><a href="/files/1.pdf">PDF</a></html>"#)
            .create_async()
            .await;
        let _pdf = server
            .mock("GET", "/files/1.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.7")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("b.pdf");
        link_to_pdf(&client(), &format!("{}/articles/1", server.url()), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_html_error_page_is_not_saved() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/articles/2")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<a href="/files/2.pdf">PDF</a>"#)
            .create_async()
            .await;
        let _pdf = server
            .mock("GET", "/files/2.pdf")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>Sign in</html>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("c.pdf");
        let err = link_to_pdf(&client(), &format!("{}/articles/2", server.url()), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_page_without_link() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/empty")
            .with_status(200)
            .with_body("<p>abstract only</p>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result =
            link_to_pdf(&client(), &format!("{}/empty", server.url()), &dir.path().join("d.pdf")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_malformed_url_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = link_to_pdf(&client(), "not a url", &dir.path().join("e.pdf")).await;
        assert!(result.is_err());
    }
}
