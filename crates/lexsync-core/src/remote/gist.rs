//! Gist-style HTTP transport
//!
//! Stores each dataset as a single file inside a private gist:
//!
//! - `GET  /gists?per_page=100&page=N` to find the gist holding a file name
//! - `POST /gists` to create it
//! - `PATCH /gists/{id}` to overwrite the file
//! - `GET  /gists/{id}` to read it; large files come back with
//!   `truncated: true` and a `raw_url` holding the full content
//! - `GET  /user` as reachability check
//!
//! The gist's `updated_at` is used as revision token.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::error::{RemoteError, RemoteResult};
use super::transport::{ContentResponse, RemoteHandle, SnapshotTransport};
use crate::config::RemoteConfig;

/// Gists requested per listing page
const PAGE_SIZE: usize = 100;

/// Upper bound on listing pages scanned by `find`
const MAX_PAGES: usize = 30;

#[derive(Debug, Deserialize)]
struct GistSummary {
    id: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

impl GistSummary {
    fn handle(&self) -> RemoteHandle {
        RemoteHandle {
            id: self.id.clone(),
            revision: self.updated_at.clone(),
            location: self.html_url.clone(),
        }
    }

    fn content_response(self, name: &str) -> RemoteResult<ContentResponse> {
        let mut files = self.files;
        let file = files
            .remove(name)
            .ok_or_else(|| RemoteError::NotFound(format!("file {} in gist {}", name, self.id)))?;

        if file.truncated {
            let overflow_location = file.raw_url.ok_or_else(|| {
                RemoteError::InvalidResponse(format!("{} is truncated but has no raw_url", name))
            })?;
            return Ok(ContentResponse::Truncated { overflow_location });
        }

        Ok(ContentResponse::Complete(file.content.unwrap_or_default()))
    }
}

/// HTTP transport for a gist-compatible API
pub struct GistTransport {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl GistTransport {
    /// Create a transport for the given API base URL
    pub fn new(
        api_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lexsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Create a transport from configuration
    pub fn from_config(config: &RemoteConfig) -> RemoteResult<Self> {
        Self::new(
            config.api_url.clone(),
            config.token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn request(&self, method: Method, url: &str) -> RemoteResult<RequestBuilder> {
        let token = self.token.as_ref().ok_or(RemoteError::NotConfigured)?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json"))
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!("Remote store answered {} for {}: {}", status, url, body);
        let message = if body.is_empty() { url } else { body };
        Err(RemoteError::from_status(status.as_u16(), message))
    }

    async fn send_json<R: DeserializeOwned>(&self, builder: RequestBuilder) -> RemoteResult<R> {
        self.send(builder)
            .await?
            .json::<R>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

/// What one listing page says about a file name
#[derive(Debug, PartialEq)]
enum PageScan {
    Found(RemoteHandle),
    /// Short page: the listing ends here without the file
    LastPage,
    More,
}

fn scan_page(gists: &[GistSummary], name: &str) -> PageScan {
    if let Some(gist) = gists.iter().find(|g| g.files.contains_key(name)) {
        PageScan::Found(gist.handle())
    } else if gists.len() < PAGE_SIZE {
        PageScan::LastPage
    } else {
        PageScan::More
    }
}

fn page_limit_exceeded(name: &str) -> RemoteError {
    RemoteError::InvalidResponse(format!(
        "{} not found in the first {} gists; listing is too long to search",
        name,
        PAGE_SIZE * MAX_PAGES
    ))
}

#[async_trait]
impl SnapshotTransport for GistTransport {
    fn is_configured(&self) -> bool {
        self.token.is_some() && !self.api_url.is_empty()
    }

    async fn ping(&self) -> RemoteResult<()> {
        let url = format!("{}/user", self.api_url);
        self.send(self.request(Method::GET, &url)?).await?;
        Ok(())
    }

    async fn find(&self, name: &str) -> RemoteResult<Option<RemoteHandle>> {
        for page in 1..=MAX_PAGES {
            let url = format!("{}/gists?per_page={}&page={}", self.api_url, PAGE_SIZE, page);
            let gists: Vec<GistSummary> = self.send_json(self.request(Method::GET, &url)?).await?;

            match scan_page(&gists, name) {
                PageScan::Found(handle) => return Ok(Some(handle)),
                PageScan::LastPage => return Ok(None),
                PageScan::More => {}
            }
        }
        // Reporting the file as absent here would make the caller create a
        // second copy of the dataset
        Err(page_limit_exceeded(name))
    }

    async fn create(
        &self,
        name: &str,
        description: &str,
        content: &str,
    ) -> RemoteResult<RemoteHandle> {
        let url = format!("{}/gists", self.api_url);
        let body = json!({
            "description": description,
            "public": false,
            "files": { name: { "content": content } },
        });
        let gist: GistSummary = self
            .send_json(self.request(Method::POST, &url)?.json(&body))
            .await?;
        Ok(gist.handle())
    }

    async fn update(
        &self,
        handle: &RemoteHandle,
        name: &str,
        content: &str,
    ) -> RemoteResult<RemoteHandle> {
        let url = format!("{}/gists/{}", self.api_url, handle.id);
        let body = json!({ "files": { name: { "content": content } } });
        let gist: GistSummary = self
            .send_json(self.request(Method::PATCH, &url)?.json(&body))
            .await?;
        Ok(gist.handle())
    }

    async fn get_content(
        &self,
        handle: &RemoteHandle,
        name: &str,
    ) -> RemoteResult<ContentResponse> {
        let url = format!("{}/gists/{}", self.api_url, handle.id);
        let gist: GistSummary = self.send_json(self.request(Method::GET, &url)?).await?;
        gist.content_response(name)
    }

    async fn get_content_raw(&self, overflow_location: &str) -> RemoteResult<String> {
        self.send(self.request(Method::GET, overflow_location)?)
            .await?
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gist(json: &str) -> GistSummary {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_handle_from_gist() {
        let g = gist(
            r#"{"id": "abc", "updated_at": "2024-01-01T00:00:00Z",
                "html_url": "https://gist.example/abc", "files": {}}"#,
        );
        let handle = g.handle();
        assert_eq!(handle.id, "abc");
        assert_eq!(handle.revision.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(handle.location.as_deref(), Some("https://gist.example/abc"));
    }

    #[test]
    fn test_complete_content() {
        let g = gist(r#"{"id": "abc", "files": {"a.json": {"content": "{}", "truncated": false}}}"#);
        assert_eq!(
            g.content_response("a.json").unwrap(),
            ContentResponse::Complete("{}".to_string())
        );
    }

    #[test]
    fn test_truncated_content_points_to_raw_url() {
        let g = gist(
            r#"{"id": "abc", "files": {"a.json": {"content": "{\"ver",
                "truncated": true, "raw_url": "https://raw.example/a.json"}}}"#,
        );
        assert_eq!(
            g.content_response("a.json").unwrap(),
            ContentResponse::Truncated {
                overflow_location: "https://raw.example/a.json".to_string()
            }
        );
    }

    #[test]
    fn test_truncated_without_raw_url_is_invalid() {
        let g = gist(r#"{"id": "abc", "files": {"a.json": {"truncated": true}}}"#);
        assert!(matches!(
            g.content_response("a.json").unwrap_err(),
            RemoteError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let g = gist(r#"{"id": "abc", "files": {}}"#);
        assert!(matches!(
            g.content_response("a.json").unwrap_err(),
            RemoteError::NotFound(_)
        ));
    }

    fn page(count: usize, with: Option<&str>) -> Vec<GistSummary> {
        (0..count)
            .map(|i| {
                let file = match with {
                    Some(name) if i == count - 1 => format!(r#"{{"{}": {{}}}}"#, name),
                    _ => "{}".to_string(),
                };
                gist(&format!(r#"{{"id": "g{}", "files": {}}}"#, i, file))
            })
            .collect()
    }

    #[test]
    fn test_scan_page() {
        assert_eq!(
            scan_page(&page(PAGE_SIZE, Some("a.json")), "a.json"),
            PageScan::Found(RemoteHandle {
                id: format!("g{}", PAGE_SIZE - 1),
                revision: None,
                location: None,
            })
        );
        assert_eq!(scan_page(&page(3, None), "a.json"), PageScan::LastPage);
        assert_eq!(scan_page(&[], "a.json"), PageScan::LastPage);
        assert_eq!(scan_page(&page(PAGE_SIZE, None), "a.json"), PageScan::More);
    }

    #[test]
    fn test_page_limit_is_an_error() {
        let err = page_limit_exceeded("a.json");
        assert!(matches!(err, RemoteError::InvalidResponse(_)));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("a.json"));
    }

    #[test]
    fn test_configuration() {
        let transport =
            GistTransport::new("https://api.example/", None, Duration::from_secs(5)).unwrap();
        assert!(!transport.is_configured());
        assert_eq!(transport.api_url, "https://api.example");

        let blank = GistTransport::new(
            "https://api.example",
            Some("  ".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(!blank.is_configured());

        let configured = GistTransport::new(
            "https://api.example",
            Some("token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(configured.is_configured());
    }
}
