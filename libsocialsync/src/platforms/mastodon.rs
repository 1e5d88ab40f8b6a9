//! Mastodon adapter
//!
//! Also hosts [`MastodonApi`], the Mastodon-compatible REST client reused by
//! the Pixelfed adapter, which differs only in its media endpoint and in
//! having a default instance.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::http::{self, ApiClient, Stage};
use crate::platforms::{unexpected_handle, Adapter, MediaHandle, Session};
use crate::types::{Account, MediaPayload};

pub const PLATFORM: &str = "mastodon";

#[derive(Debug, Deserialize)]
struct MediaAttachment {
    id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: Option<serde_json::Value>,
    url: Option<String>,
    uri: Option<String>,
}

/// Media ids are strings on Mastodon but some compatible servers return numbers.
fn id_to_string(id: &serde_json::Value) -> Option<String> {
    match id {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Client for the Mastodon REST API shape (`/api/v*/media`, `/api/v1/statuses`).
#[derive(Debug, Clone)]
pub(crate) struct MastodonApi {
    client: ApiClient,
    label: &'static str,
    media_path: &'static str,
    default_instance: Option<String>,
}

impl MastodonApi {
    pub(crate) fn new(
        client: ApiClient,
        label: &'static str,
        media_path: &'static str,
        default_instance: Option<String>,
    ) -> Self {
        Self {
            client,
            label,
            media_path,
            default_instance,
        }
    }

    /// Instance base URL without trailing slash.
    pub(crate) fn instance(&self, account: &Account) -> Result<String> {
        let configured = account
            .instance
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        match configured.or(self.default_instance.as_deref()) {
            Some(url) => Ok(http::normalize_base_url(url)),
            None => Err(PlatformError::InvalidAccount(format!(
                "{} account {} has no instance URL",
                self.label,
                account.key()
            ))
            .into()),
        }
    }

    pub(crate) async fn upload(
        &self,
        session: &Session<'_>,
        media: &MediaPayload,
    ) -> Result<MediaHandle> {
        let base = self.instance(session.account)?;
        let url = format!("{}{}", base, self.media_path);

        tracing::debug!(
            "Uploading {} bytes ({}) to {}",
            media.bytes.len(),
            media.mime_type,
            url
        );

        let part = Part::bytes(media.bytes.to_vec())
            .file_name(media.file_name.clone())
            .mime_str(media.mime_type.as_str())
            .map_err(|e| PlatformError::Upload(format!("Invalid media type: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("description", media.alt_text.clone());

        let request = self
            .client
            .upload(&url)
            .bearer_auth(&session.access_token)
            .multipart(form);

        let context = format!("{} media upload", self.label);
        let attachment: MediaAttachment = http::send_json(request, Stage::Upload, &context).await?;

        let id = id_to_string(&attachment.id).ok_or_else(|| {
            PlatformError::Upload(format!("{}: response has no media id", context))
        })?;

        tracing::debug!("{} media uploaded: {}", self.label, id);
        Ok(MediaHandle::Id(id))
    }

    pub(crate) async fn post_status(
        &self,
        session: &Session<'_>,
        text: &str,
        media: Option<&MediaHandle>,
    ) -> Result<String> {
        let base = self.instance(session.account)?;
        let url = format!("{}/api/v1/statuses", base);

        let mut params: Vec<(&str, &str)> = vec![("status", text)];
        match media {
            Some(MediaHandle::Id(id)) => params.push(("media_ids[]", id.as_str())),
            Some(other) => return Err(unexpected_handle(self.label, other).into()),
            None => {}
        }

        let request = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .form(&params);

        let context = format!("{} status", self.label);
        let status: Status = http::send_json(request, Stage::Post, &context).await?;

        status
            .url
            .filter(|u| !u.is_empty())
            .or(status.uri.filter(|u| !u.is_empty()))
            .ok_or_else(|| {
                let id = status.id.as_ref().and_then(id_to_string).unwrap_or_default();
                PlatformError::Post(format!(
                    "{}: response for status '{}' has no URL",
                    context, id
                ))
                .into()
            })
    }
}

/// Mastodon (and other Fediverse servers exposing `/api/v2/media`)
pub struct MastodonAdapter {
    api: MastodonApi,
}

impl MastodonAdapter {
    pub fn new(client: ApiClient) -> Self {
        Self {
            api: MastodonApi::new(client, "Mastodon", "/api/v2/media", None),
        }
    }
}

#[async_trait]
impl Adapter for MastodonAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn authenticate<'a>(&self, account: &'a Account) -> Result<Session<'a>> {
        // Fail before any upload when the instance is missing.
        self.api.instance(account)?;
        Ok(Session::from_static_token(account))
    }

    async fn upload_media(
        &self,
        session: &Session<'_>,
        media: &MediaPayload,
    ) -> Result<MediaHandle> {
        self.api.upload(session, media).await
    }

    async fn create_post(
        &self,
        session: &Session<'_>,
        text: &str,
        media: Option<&MediaHandle>,
    ) -> Result<String> {
        self.api.post_status(session, text, media).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::SocialSyncError;

    fn adapter() -> MastodonAdapter {
        MastodonAdapter::new(ApiClient::new(&EngineConfig::default()).unwrap())
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(adapter().platform(), "mastodon");
    }

    #[test]
    fn test_instance_url_trailing_slash_stripped() {
        let account = Account::new("mastodon", "alice", "T1")
            .unwrap()
            .with_instance("https://example.social/");
        assert_eq!(
            adapter().api.instance(&account).unwrap(),
            "https://example.social"
        );
    }

    #[tokio::test]
    async fn test_missing_instance_is_invalid_account() {
        let account = Account::new("mastodon", "alice", "T1").unwrap();
        let result = adapter().authenticate(&account).await;

        match result {
            Err(SocialSyncError::Platform(PlatformError::InvalidAccount(msg))) => {
                assert!(msg.contains("mastodon:alice"));
            }
            _ => panic!("Expected InvalidAccount error"),
        }
    }

    #[tokio::test]
    async fn test_blank_instance_is_invalid_account() {
        let account = Account::new("mastodon", "alice", "T1")
            .unwrap()
            .with_instance("   ");
        assert!(adapter().authenticate(&account).await.is_err());
    }

    #[tokio::test]
    async fn test_foreign_media_handle_rejected() {
        let account = Account::new("mastodon", "alice", "T1")
            .unwrap()
            .with_instance("https://example.social");
        let session = Session::from_static_token(&account);
        let handle = MediaHandle::PublicUrl("https://cdn.example/a.jpg".to_string());

        let result = adapter().create_post(&session, "hi", Some(&handle)).await;
        assert!(matches!(
            result,
            Err(SocialSyncError::Platform(PlatformError::Post(_)))
        ));
    }

    #[test]
    fn test_id_to_string() {
        assert_eq!(id_to_string(&serde_json::json!("109")), Some("109".to_string()));
        assert_eq!(id_to_string(&serde_json::json!(42)), Some("42".to_string()));
        assert_eq!(id_to_string(&serde_json::json!("")), None);
        assert_eq!(id_to_string(&serde_json::Value::Null), None);
    }
}
