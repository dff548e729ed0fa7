//! HTTP comment backend.

use std::time::Duration;

use anyhow::{Context, Result};
use board_types::{Comment, CommentDraft, PageRequest, PageResult};
use url::Url;

use super::CommentSource;
use crate::config::ApiConfig;

/// Standard User-Agent header for board API requests.
pub const USER_AGENT: &str = concat!("board/", env!("CARGO_PKG_VERSION"));

/// Talks to `{base}/notes/{resourceId}/comments`.
#[derive(Debug, Clone)]
pub struct HttpCommentSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCommentSource {
    /// Builds a source from the `[api]` config section.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let base_url = api.resolve_base_url()?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, base_url })
    }

    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn comments_url(&self, resource_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Base URL cannot have path segments: {}", self.base_url))?
            .pop_if_empty()
            .extend(["notes", resource_id, "comments"]);
        Ok(url)
    }
}

impl CommentSource for HttpCommentSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<PageResult> {
        let url = self.comments_url(&request.resource_id)?;
        let response = self
            .client
            .get(url)
            .query(&[
                ("page", request.page.to_string()),
                ("pageSize", request.page_size.to_string()),
            ])
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to request page {} of {}",
                    request.page, request.resource_id
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Comment page request failed (HTTP {status}): {body}");
        }

        response
            .json::<PageResult>()
            .await
            .context("Failed to parse comment page")
    }

    async fn create_comment(&self, resource_id: &str, draft: CommentDraft) -> Result<Comment> {
        let url = self.comments_url(resource_id)?;
        let response = self
            .client
            .post(url)
            .json(&draft)
            .send()
            .await
            .with_context(|| format!("Failed to post comment to {resource_id}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Comment creation failed (HTTP {status}): {body}");
        }

        response
            .json::<Comment>()
            .await
            .context("Failed to parse created comment")
    }
}
