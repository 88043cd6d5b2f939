use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use super::{Document, DocumentLoader, LoaderError, SourceKind};

static NON_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>")
        .expect("valid non-content pattern")
});

/// Fetches a web page and extracts its visible text.
///
/// No retry is attempted; a timeout or non-success status fails the load.
pub struct WebLoader {
    client: Client,
    max_body_bytes: u64,
}

impl WebLoader {
    /// Build a loader with the given request timeout and body ceiling.
    pub fn new(timeout: Duration, max_body_bytes: u64) -> Result<Self, LoaderError> {
        let client = Client::builder()
            .user_agent("ragline/0.1")
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(LoaderError::Client)?;
        Ok(Self {
            client,
            max_body_bytes,
        })
    }

    async fn fetch_html(&self, url: &Url) -> Result<String, LoaderError> {
        let location = url.as_str().to_string();
        let transport_error = |source: reqwest::Error| {
            if source.is_timeout() {
                LoaderError::Timeout(location.clone())
            } else {
                LoaderError::Http {
                    url: location.clone(),
                    source,
                }
            }
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(LoaderError::UnexpectedStatus {
                url: location.clone(),
                status: response.status().as_u16(),
            });
        }

        let too_large = |size| LoaderError::FileTooLarge {
            size,
            limit: self.max_body_bytes,
        };
        if let Some(declared) = response.content_length() {
            if declared > self.max_body_bytes {
                return Err(too_large(declared));
            }
        }

        // Content-Length may be absent or wrong; the cap also holds while streaming.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            let received = (body.len() + chunk.len()) as u64;
            if received > self.max_body_bytes {
                return Err(too_large(received));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl DocumentLoader for WebLoader {
    async fn extract(&self, location: &str) -> Result<Vec<Document>, LoaderError> {
        let url = validate_url(location)?;
        let html = self.fetch_html(&url).await?;
        let (title, text) = page_text(&html);

        let mut document = Document::new(text, url.as_str(), SourceKind::WebPage.content_type());
        if let Some(title) = title {
            document = document.with_metadata("title", title);
        }
        Ok(vec![document])
    }
}

fn validate_url(raw: &str) -> Result<Url, LoaderError> {
    let parsed = Url::parse(raw.trim()).map_err(|_| LoaderError::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(LoaderError::InvalidUrl(format!(
            "scheme not allowed: {other}"
        ))),
    }
}

/// Extract the page title and the visible body text, one non-empty line per text block.
fn page_text(html: &str) -> (Option<String>, String) {
    let cleaned = NON_CONTENT.replace_all(html, " ");
    let soup = scrape_core::Soup::parse(&cleaned);

    let title = soup
        .find_all("title")
        .ok()
        .and_then(|tags| tags.into_iter().next())
        .map(|tag| collapse_whitespace(&tag.text()))
        .filter(|title| !title.is_empty());

    let body = ["body", "html"]
        .iter()
        .find_map(|selector| {
            soup.find_all(selector)
                .ok()
                .and_then(|tags| tags.into_iter().next())
                .map(|tag| tag.text())
        })
        .unwrap_or_else(|| cleaned.to_string());

    let text = body
        .lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    (title, text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
