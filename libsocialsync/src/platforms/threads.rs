//! Threads adapter (Graph API)
//!
//! Threads has no binary upload endpoint: images are fetched by Meta from a
//! public URL, so an image post needs the account's `image_url_override`.
//! Posting takes two calls, creating a media container and then publishing
//! it by its creation id.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::http::{self, ApiClient, Stage};
use crate::platforms::{unexpected_handle, Adapter, MediaHandle, Session};
use crate::types::{Account, MediaPayload};

pub const PLATFORM: &str = "threads";

/// Threads rejects longer posts, so text is cut before submission
pub const MAX_POST_CHARS: usize = 500;

#[derive(Deserialize)]
struct GraphId {
    id: String,
}

pub struct ThreadsAdapter {
    client: ApiClient,
    graph_url: String,
    web_url: String,
}

impl ThreadsAdapter {
    /// `graph_url` is the versioned Graph API root
    /// (e.g. "https://graph.threads.net/v1.0"), `web_url` the site used to
    /// build post links.
    pub fn new(client: ApiClient, graph_url: &str, web_url: &str) -> Self {
        Self {
            client,
            graph_url: http::normalize_base_url(graph_url),
            web_url: http::normalize_base_url(web_url),
        }
    }

    fn user_id<'a>(account: &'a Account) -> Result<&'a str> {
        account
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PlatformError::InvalidAccount(format!(
                    "Threads account {} has no user id",
                    account.key()
                ))
                .into()
            })
    }
}

#[async_trait]
impl Adapter for ThreadsAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn authenticate<'a>(&self, account: &'a Account) -> Result<Session<'a>> {
        Self::user_id(account)?;
        Ok(Session::from_static_token(account))
    }

    /// No upload happens: the configured public URL becomes the handle.
    async fn upload_media(
        &self,
        session: &Session<'_>,
        _media: &MediaPayload,
    ) -> Result<MediaHandle> {
        session
            .account
            .image_url_override
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| MediaHandle::PublicUrl(url.to_string()))
            .ok_or_else(|| {
                PlatformError::Upload(
                    "Threads requires a public image URL; host the image and set \
                     image_url_override on the account"
                        .to_string(),
                )
                .into()
            })
    }

    async fn create_post(
        &self,
        session: &Session<'_>,
        text: &str,
        media: Option<&MediaHandle>,
    ) -> Result<String> {
        let user_id = Self::user_id(session.account)?;
        let text = http::truncate_chars(text, MAX_POST_CHARS);

        let mut params: Vec<(&str, &str)> = vec![
            ("text", text.as_str()),
            ("access_token", session.access_token.as_str()),
        ];
        match media {
            Some(MediaHandle::PublicUrl(url)) => {
                params.push(("media_type", "IMAGE"));
                params.push(("image_url", url.as_str()));
            }
            Some(other) => return Err(unexpected_handle("Threads", other).into()),
            None => params.push(("media_type", "TEXT")),
        }

        let container_url = format!("{}/{}/threads", self.graph_url, user_id);
        let container: GraphId = http::send_json(
            self.client.post(&container_url).form(&params),
            Stage::Post,
            "Threads create container",
        )
        .await?;

        tracing::debug!("Threads container created: {}", container.id);

        let publish_url = format!("{}/{}/threads_publish", self.graph_url, user_id);
        let publish = self.client.post(&publish_url).form(&[
            ("creation_id", container.id.as_str()),
            ("access_token", session.access_token.as_str()),
        ]);

        let published: GraphId =
            match http::send_json(publish, Stage::Post, "Threads publish").await {
                Ok(published) => published,
                Err(e) => {
                    // The unpublished container is left behind on the server.
                    tracing::warn!(
                        "Threads container {} was created but not published: {}",
                        container.id,
                        e
                    );
                    return Err(e);
                }
            };

        Ok(format!("{}/t/{}", self.web_url, published.id))
    }
}
