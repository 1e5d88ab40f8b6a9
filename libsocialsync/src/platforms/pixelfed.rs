//! Pixelfed adapter
//!
//! Pixelfed speaks the Mastodon client API, but uploads through the v1 media
//! endpoint and falls back to a public instance when the account has none.

use async_trait::async_trait;

use crate::error::Result;
use crate::http::ApiClient;
use crate::platforms::mastodon::MastodonApi;
use crate::platforms::{Adapter, MediaHandle, Session};
use crate::types::MediaPayload;

pub const PLATFORM: &str = "pixelfed";

pub struct PixelfedAdapter {
    api: MastodonApi,
}

impl PixelfedAdapter {
    pub fn new(client: ApiClient, default_instance: impl Into<String>) -> Self {
        Self {
            api: MastodonApi::new(
                client,
                "Pixelfed",
                "/api/v1/media",
                Some(default_instance.into()),
            ),
        }
    }
}

#[async_trait]
impl Adapter for PixelfedAdapter {
    fn platform(&self) -> &str {
        PLATFORM
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
