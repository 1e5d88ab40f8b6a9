//! HTTP plumbing shared by the platform adapters
//!
//! Wraps a single `reqwest::Client` with the engine's upload and request
//! timeouts, and maps transport failures and non-2xx responses onto
//! [`PlatformError`] variants for the step that was running.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::EngineConfig;
use crate::error::{PlatformError, Result, SocialSyncError};

/// Maximum number of characters of a response body kept in error messages
const ERROR_BODY_LIMIT: usize = 200;

/// The protocol step a request belongs to; decides which error it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authenticate,
    Upload,
    Post,
}

impl Stage {
    fn error(self, message: String) -> PlatformError {
        match self {
            Stage::Authenticate => PlatformError::Authentication(message),
            Stage::Upload => PlatformError::Upload(message),
            Stage::Post => PlatformError::Post(message),
        }
    }
}

/// A cloneable HTTP client carrying per-stage timeouts.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    upload_timeout: Duration,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("socialsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SocialSyncError::Engine(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upload_timeout: config.upload_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    /// POST used for media uploads (longer timeout)
    pub fn upload(&self, url: &str) -> RequestBuilder {
        self.client.post(url).timeout(self.upload_timeout)
    }

    /// POST used for sessions, statuses and publish calls
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url).timeout(self.request_timeout)
    }
}

/// Send a request, turning transport failures into `Network` errors and
/// non-success statuses into the stage's error with status and body.
pub async fn send(request: RequestBuilder, stage: Stage, context: &str) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(e, stage, context))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body = truncate_chars(body.trim(), ERROR_BODY_LIMIT);
    let message = if body.is_empty() {
        format!("{}: HTTP {}", context, status)
    } else {
        format!("{}: HTTP {}: {}", context, status, body)
    };

    Err(stage.error(message).into())
}

/// Send a request and decode its JSON body.
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    stage: Stage,
    context: &str,
) -> Result<T> {
    let response = send(request, stage, context).await?;
    response.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            stage
                .error(format!("{}: unexpected response: {}", context, e))
                .into()
        } else {
            transport_error(e, stage, context).into()
        }
    })
}

fn transport_error(error: reqwest::Error, stage: Stage, context: &str) -> PlatformError {
    if error.is_timeout() {
        PlatformError::Network(format!("{}: request timed out", context))
    } else if error.is_connect() || error.is_request() || error.is_body() {
        PlatformError::Network(format!("{}: {}", context, error))
    } else {
        stage.error(format!("{}: {}", context, error))
    }
}

/// Keep at most `limit` characters (Unicode scalar values) of `text`.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Strip trailing slashes from a base URL.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ApiClient {
        ApiClient::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_truncate_chars_ascii() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 5), "hello");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_truncate_chars_counts_characters_not_bytes() {
        let text = "é".repeat(310);
        let truncated = truncate_chars(&text, 300);
        assert_eq!(truncated.chars().count(), 300);
        assert_eq!(truncated.len(), 600);
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://example.social/"), "https://example.social");
        assert_eq!(normalize_base_url("https://example.social//"), "https://example.social");
        assert_eq!(normalize_base_url(" https://example.social "), "https://example.social");
    }

    #[tokio::test]
    async fn test_send_maps_status_to_stage_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .respond_with(ResponseTemplate::new(422).set_body_string("{\"error\":\"Text too long\"}"))
            .mount(&server)
            .await;

        let url = format!("{}/api/v1/statuses", server.uri());
        let result = send(client().post(&url), Stage::Post, "create status").await;

        match result {
            Err(SocialSyncError::Platform(PlatformError::Post(msg))) => {
                assert!(msg.contains("422"));
                assert!(msg.contains("Text too long"));
                assert!(msg.contains("create status"));
            }
            other => panic!("Expected Post error, got {:?}", other.map(|r| r.status())),
        }
    }

    #[tokio::test]
    async fn test_send_json_decode_failure_is_stage_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/media"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let url = format!("{}/media", server.uri());
        let result: Result<serde_json::Value> =
            send_json(client().upload(&url), Stage::Upload, "upload media").await;

        assert!(matches!(
            result,
            Err(SocialSyncError::Platform(PlatformError::Upload(_)))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) on localhost is assumed closed.
        let result = send(
            client().post("http://127.0.0.1:9/xrpc"),
            Stage::Authenticate,
            "create session",
        )
        .await;

        assert!(matches!(
            result,
            Err(SocialSyncError::Platform(PlatformError::Network(_)))
        ));
    }
}
