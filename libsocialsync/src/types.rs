//! Core types for SocialSync

use std::path::{Path, PathBuf};

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SocialSyncError};

// ============================================================================
// Account
// ============================================================================

/// Credentials for one account on one platform.
///
/// `username` and `token` are guaranteed non-empty when built through
/// [`Account::new`]. The token is kept in a [`SecretString`] so it never
/// shows up in `Debug` output or logs.
#[derive(Debug)]
pub struct Account {
    /// Platform identifier used for adapter lookup (e.g. "mastodon")
    pub platform: String,
    /// Handle or username on the platform
    pub username: String,
    token: SecretString,
    /// Instance base URL (Mastodon, Pixelfed)
    pub instance: Option<String>,
    /// Numeric Graph API user id (Threads)
    pub user_id: Option<String>,
    /// Public image URL used instead of a binary upload (Threads)
    pub image_url_override: Option<String>,
}

impl Account {
    /// Create an account, rejecting an empty platform, username or token.
    pub fn new(
        platform: impl Into<String>,
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let platform = platform.into();
        let username = username.into();
        let token = token.into();

        if platform.trim().is_empty() {
            return Err(SocialSyncError::InvalidInput(
                "Account platform cannot be empty".to_string(),
            ));
        }
        if username.trim().is_empty() {
            return Err(SocialSyncError::InvalidInput(format!(
                "Account username cannot be empty (platform: {})",
                platform
            )));
        }
        if token.is_empty() {
            return Err(SocialSyncError::InvalidInput(format!(
                "Account token cannot be empty ({}:{})",
                platform, username
            )));
        }

        Ok(Self {
            platform,
            username,
            token: SecretString::from(token),
            instance: None,
            user_id: None,
            image_url_override: None,
        })
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_image_url_override(mut self, url: impl Into<String>) -> Self {
        self.image_url_override = Some(url.into());
        self
    }

    /// Unique key of this account within one publish call: `platform:username`
    pub fn key(&self) -> String {
        format!("{}:{}", self.platform, self.username)
    }

    /// The secret token (access token or app password)
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Replace the token, e.g. after the caller rotates credentials.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = SecretString::from(token.into());
    }
}

// ============================================================================
// Content
// ============================================================================

/// The post being published: text, an optional single image and its alt text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    pub text: String,
    pub image_path: Option<PathBuf>,
    pub alt_text: String,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>, alt_text: impl Into<String>) -> Self {
        self.image_path = Some(path.into());
        self.alt_text = alt_text.into();
        self
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn has_image(&self) -> bool {
        self.image_path.is_some()
    }

    /// True when there is neither text nor an image to publish
    pub fn is_empty(&self) -> bool {
        !self.has_text() && !self.has_image()
    }
}

// ============================================================================
// Media
// ============================================================================

/// Supported image MIME types for attachments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Parse MIME type from a MIME string (e.g., "image/jpeg")
    pub fn from_mime_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect MIME type from a path, falling back to JPEG for unknown
    /// or missing extensions.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(Self::Jpeg)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Image bytes loaded once per publish call and shared by every account task.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Bytes,
    pub mime_type: ImageMimeType,
    pub file_name: String,
    pub alt_text: String,
}

impl MediaPayload {
    /// Read the image at `path` into memory.
    pub async fn load(path: &Path, alt_text: &str) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Ok(Self {
            bytes: Bytes::from(bytes),
            mime_type: ImageMimeType::from_path(path),
            file_name,
            alt_text: alt_text.to_string(),
        })
    }
}
