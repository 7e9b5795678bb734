//! Boundary to the external generation service.
//!
//! The service receives one JSON request and answers with a chunked body of
//! `data: `-prefixed event lines, consumed by [`crate::ingest`].

use std::time::Duration;

use futures::{Stream, StreamExt};
use inai_markup::ElementPath;
use inai_preview::Selection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GenerationConfig;
use crate::error::{InaiError, InaiResult};

/// The element an edit instruction is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementTarget {
    pub path: ElementPath,
    pub tag_name: String,
    pub text_content: String,
    /// Human readable locator for prompt construction.
    pub description: String,
}

impl From<&Selection> for ElementTarget {
    fn from(sel: &Selection) -> Self {
        Self {
            description: describe_path(&sel.path),
            path: sel.path.clone(),
            tag_name: sel.tag_name.clone(),
            text_content: sel.text_content.clone(),
        }
    }
}

/// "the element reachable by child indices [1, 0, 2] from the document body"
pub fn describe_path(path: &ElementPath) -> String {
    let indices: Vec<String> = path.indices().iter().map(|i| i.to_string()).collect();
    format!(
        "the element reachable by child indices [{}] from the document body",
        indices.join(", ")
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ElementTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            target: None,
            current_content: None,
            file_name: None,
        }
    }

    /// Scopes the request to one element of `file_name`.
    pub fn for_element(
        prompt: impl Into<String>,
        target: ElementTarget,
        file_name: impl Into<String>,
        current_content: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            target: Some(target),
            current_content: Some(current_content.into()),
            file_name: Some(file_name.into()),
        }
    }
}

pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GenerationClient {
    pub fn new(config: &GenerationConfig) -> InaiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts the request and returns the response body as a byte stream.
    /// Dropping the stream cancels the call.
    pub async fn stream(
        &self,
        request: &GenerationRequest,
    ) -> InaiResult<impl Stream<Item = Result<Vec<u8>, reqwest::Error>>> {
        info!(endpoint = %self.endpoint, scoped = request.target.is_some(), "requesting generation");
        let response = self.http.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InaiError::Stream(format!(
                "generation service returned {}: {}",
                status,
                body.trim()
            )));
        }
        debug!(%status, "generation stream open");
        Ok(response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())))
    }
}
