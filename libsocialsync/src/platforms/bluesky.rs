//! Bluesky adapter (AT Protocol XRPC)
//!
//! Each publish attempt exchanges the handle and app password for a fresh
//! session, uploads the image as a raw blob, and creates an
//! `app.bsky.feed.post` record in the account's repository.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{PlatformError, Result};
use crate::http::{self, ApiClient, Stage};
use crate::platforms::{unexpected_handle, Adapter, MediaHandle, Session};
use crate::types::{Account, MediaPayload};

pub const PLATFORM: &str = "bluesky";

/// Hard limit on post text; longer text is truncated, not rejected
pub const MAX_POST_CHARS: usize = 300;

const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    did: String,
    access_jwt: String,
}

#[derive(Deserialize)]
struct UploadBlobResponse {
    blob: Value,
}

#[derive(Deserialize)]
struct CreateRecordResponse {
    #[serde(default)]
    uri: String,
}

pub struct BlueskyAdapter {
    client: ApiClient,
    service: String,
    app_url: String,
}

impl BlueskyAdapter {
    /// `service` is the PDS base URL (e.g. "https://bsky.social"), `app_url`
    /// the web app used to build post links (e.g. "https://bsky.app").
    pub fn new(client: ApiClient, service: &str, app_url: &str) -> Self {
        Self {
            client,
            service: http::normalize_base_url(service),
            app_url: http::normalize_base_url(app_url),
        }
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service, method)
    }

    fn post_url(&self, handle: &str, record_uri: &str) -> Option<String> {
        let rkey = record_uri.rsplit('/').next().filter(|k| !k.is_empty())?;
        Some(format!("{}/profile/{}/post/{}", self.app_url, handle, rkey))
    }
}

/// Build the `app.bsky.feed.post` record submitted by `createRecord`.
///
/// Text is cut to [`MAX_POST_CHARS`] characters.
pub fn build_post_record(text: &str, image: Option<(&Value, &str)>, created_at: &str) -> Value {
    let mut record = json!({
        "$type": POST_COLLECTION,
        "text": http::truncate_chars(text, MAX_POST_CHARS),
        "createdAt": created_at,
        "langs": ["en"],
    });

    if let Some((blob, alt)) = image {
        record["embed"] = json!({
            "$type": "app.bsky.embed.images",
            "images": [{
                "image": blob,
                "alt": alt,
            }],
        });
    }

    record
}

#[async_trait]
impl Adapter for BlueskyAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn authenticate<'a>(&self, account: &'a Account) -> Result<Session<'a>> {
        tracing::debug!("Creating Bluesky session for handle: {}", account.username);

        let request = self.client.post(&self.xrpc("com.atproto.server.createSession")).json(
            &CreateSessionRequest {
                identifier: &account.username,
                password: account.token(),
            },
        );

        let session: CreateSessionResponse =
            http::send_json(request, Stage::Authenticate, "Bluesky createSession").await?;

        tracing::debug!("Bluesky session created for {}", session.did);

        Ok(Session {
            account,
            access_token: session.access_jwt,
            did: Some(session.did),
        })
    }

    async fn upload_media(
        &self,
        session: &Session<'_>,
        media: &MediaPayload,
    ) -> Result<MediaHandle> {
        tracing::debug!(
            "Uploading {} byte blob ({}) to Bluesky",
            media.bytes.len(),
            media.mime_type
        );

        let request = self
            .client
            .upload(&self.xrpc("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_token)
            .header(CONTENT_TYPE, media.mime_type.as_str())
            .body(media.bytes.clone());

        let uploaded: UploadBlobResponse =
            http::send_json(request, Stage::Upload, "Bluesky uploadBlob").await?;

        if uploaded.blob.is_null() {
            return Err(PlatformError::Upload(
                "Bluesky uploadBlob: response has no blob".to_string(),
            )
            .into());
        }

        Ok(MediaHandle::Blob {
            blob: uploaded.blob,
            alt: media.alt_text.clone(),
        })
    }

    async fn create_post(
        &self,
        session: &Session<'_>,
        text: &str,
        media: Option<&MediaHandle>,
    ) -> Result<String> {
        let did = session.did.as_deref().ok_or_else(|| {
            PlatformError::Authentication("Bluesky session has no DID".to_string())
        })?;

        let image = match media {
            Some(MediaHandle::Blob { blob, alt }) => Some((blob, alt.as_str())),
            Some(other) => return Err(unexpected_handle("Bluesky", other).into()),
            None => None,
        };

        if text.chars().count() > MAX_POST_CHARS {
            tracing::debug!(
                "Truncating Bluesky post from {} to {} characters",
                text.chars().count(),
                MAX_POST_CHARS
            );
        }

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let record = build_post_record(text, image, &created_at);

        let request = self
            .client
            .post(&self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_token)
            .json(&json!({
                "repo": did,
                "collection": POST_COLLECTION,
                "record": record,
            }));

        let created: CreateRecordResponse =
            http::send_json(request, Stage::Post, "Bluesky createRecord").await?;

        tracing::debug!("Posted to Bluesky: {}", created.uri);

        self.post_url(&session.account.username, &created.uri)
            .ok_or_else(|| {
                PlatformError::Post("Bluesky createRecord: response has no record URI".to_string())
                    .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn adapter() -> BlueskyAdapter {
        BlueskyAdapter::new(
            ApiClient::new(&EngineConfig::default()).unwrap(),
            "https://bsky.social/",
            "https://bsky.app",
        )
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(adapter().platform(), "bluesky");
    }

    #[test]
    fn test_xrpc_url() {
        assert_eq!(
            adapter().xrpc("com.atproto.server.createSession"),
            "https://bsky.social/xrpc/com.atproto.server.createSession"
        );
    }

    #[test]
    fn test_post_url_from_record_uri() {
        let url = adapter().post_url(
            "user.bsky.social",
            "at://did:plc:abc123/app.bsky.feed.post/3kxyz",
        );
        assert_eq!(
            url.as_deref(),
            Some("https://bsky.app/profile/user.bsky.social/post/3kxyz")
        );
    }

    #[test]
    fn test_post_url_empty_uri() {
        assert_eq!(adapter().post_url("user.bsky.social", ""), None);
    }

    #[test]
    fn test_record_truncates_to_300_characters() {
        let created_at = "2026-01-01T00:00:00.000Z";
        let long = "a".repeat(301);
        let exact = "a".repeat(300);

        let from_long = build_post_record(&long, None, created_at);
        let from_exact = build_post_record(&exact, None, created_at);

        assert_eq!(from_long, from_exact);
        assert_eq!(from_long["text"].as_str().unwrap().chars().count(), 300);
    }

    #[test]
    fn test_record_truncation_respects_multibyte_characters() {
        let text = "🦋".repeat(350);
        let record = build_post_record(&text, None, "2026-01-01T00:00:00.000Z");
        assert_eq!(record["text"].as_str().unwrap().chars().count(), 300);
    }

    #[test]
    fn test_record_shape_without_image() {
        let record = build_post_record("Hello", None, "2026-01-01T00:00:00.000Z");
        assert_eq!(record["$type"], "app.bsky.feed.post");
        assert_eq!(record["text"], "Hello");
        assert_eq!(record["createdAt"], "2026-01-01T00:00:00.000Z");
        assert_eq!(record["langs"], json!(["en"]));
        assert!(record.get("embed").is_none());
    }

    #[test]
    fn test_record_shape_with_image() {
        let blob = json!({"$type": "blob", "ref": {"$link": "bafk"}, "mimeType": "image/png", "size": 10});
        let record = build_post_record("Pic", Some((&blob, "a cat")), "2026-01-01T00:00:00.000Z");

        assert_eq!(record["embed"]["$type"], "app.bsky.embed.images");
        assert_eq!(record["embed"]["images"][0]["image"], blob);
        assert_eq!(record["embed"]["images"][0]["alt"], "a cat");
    }

    #[test]
    fn test_created_at_format_ends_with_z() {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        assert!(created_at.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_create_post_without_did_fails() {
        let account = Account::new("bluesky", "user.bsky.social", "app-pass").unwrap();
        let session = Session::from_static_token(&account);

        let result = adapter().create_post(&session, "hi", None).await;
        assert!(matches!(
            result,
            Err(crate::SocialSyncError::Platform(PlatformError::Authentication(_)))
        ));
    }
}
