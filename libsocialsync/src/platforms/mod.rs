//! Platform adapters
//!
//! Every network is reached through an [`Adapter`]: an optional session
//! exchange, an optional media upload, and the post itself. The publish
//! engine drives all adapters through the same three calls, so protocol
//! differences stay inside each implementation.
//!
//! # Examples
//!
//! ```no_run
//! use libsocialsync::config::Config;
//! use libsocialsync::http::ApiClient;
//! use libsocialsync::platforms::{mastodon::MastodonAdapter, Adapter};
//! use libsocialsync::types::Account;
//!
//! # async fn example() -> libsocialsync::Result<()> {
//! let config = Config::default();
//! let adapter = MastodonAdapter::new(ApiClient::new(&config.engine)?);
//!
//! let account = Account::new("mastodon", "alice", "token")?
//!     .with_instance("https://mastodon.social");
//!
//! let session = adapter.authenticate(&account).await?;
//! let url = adapter.create_post(&session, "Hello fediverse!", None).await?;
//! println!("Posted: {}", url);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::{PlatformError, Result};
use crate::types::{Account, MediaPayload};

pub mod bluesky;
pub mod mastodon;
pub mod pixelfed;
pub mod threads;

// Available outside of tests so integration tests can inject fakes
pub mod mock;

/// Credentials for one publish attempt, produced by [`Adapter::authenticate`].
///
/// Sessions live only as long as one account's attempt and are never reused
/// across publish calls.
pub struct Session<'a> {
    pub account: &'a Account,
    /// Bearer credential sent with API requests
    pub access_token: String,
    /// Repository DID (Bluesky)
    pub did: Option<String>,
}

impl<'a> Session<'a> {
    /// A session that reuses the account's long-lived token as-is.
    pub fn from_static_token(account: &'a Account) -> Self {
        Self {
            account,
            access_token: account.token().to_string(),
            did: None,
        }
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account.key())
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

/// Opaque reference returned by an upload and consumed by the post step.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaHandle {
    /// Server-side media id (Mastodon, Pixelfed)
    Id(String),
    /// Content-addressed blob descriptor plus its alt text (Bluesky)
    Blob { blob: serde_json::Value, alt: String },
    /// Publicly reachable image URL (Threads)
    PublicUrl(String),
}

/// Uniform contract implemented once per social network.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Lowercase platform identifier used for registry lookup
    /// (e.g. "mastodon", "bluesky").
    fn platform(&self) -> &str;

    /// Establish credentials for one attempt.
    ///
    /// The default uses the account's static bearer token and performs no
    /// network I/O.
    ///
    /// # Errors
    ///
    /// `PlatformError::InvalidAccount` when required account fields are
    /// missing, `PlatformError::Authentication` when a session exchange is
    /// rejected.
    async fn authenticate<'a>(&self, account: &'a Account) -> Result<Session<'a>> {
        Ok(Session::from_static_token(account))
    }

    /// Upload the image and return a handle for [`Adapter::create_post`].
    ///
    /// Never called when the content has no image.
    ///
    /// # Errors
    ///
    /// `PlatformError::Upload` when the upload fails or its precondition is
    /// not met, `PlatformError::Network` on transport failures.
    async fn upload_media(&self, session: &Session<'_>, media: &MediaPayload)
        -> Result<MediaHandle>;

    /// Create the post and return its public URL.
    ///
    /// # Errors
    ///
    /// `PlatformError::Post` with HTTP status and body context when the
    /// platform rejects the post, `PlatformError::Network` on transport
    /// failures.
    async fn create_post(
        &self,
        session: &Session<'_>,
        text: &str,
        media: Option<&MediaHandle>,
    ) -> Result<String>;
}

/// Error for an adapter handed a media handle of another platform's shape.
pub(crate) fn unexpected_handle(platform: &str, handle: &MediaHandle) -> PlatformError {
    PlatformError::Post(format!(
        "{} cannot attach media handle {:?}",
        platform, handle
    ))
}
