//! SocialSync - publish one post to many social networks at once
//!
//! This library takes a piece of content (text, optionally one image with alt
//! text) and a list of accounts on Mastodon, Pixelfed, Bluesky and Threads,
//! publishes to all of them concurrently, and reports per-account progress
//! and a final result map. One account failing never affects the others.

pub mod accounts;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod logging;
pub mod platforms;
pub mod progress;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use accounts::{AccountStore, StoredAccount};
pub use config::Config;
pub use engine::{Publication, PublishEngine};
pub use error::{ConfigError, PlatformError, Result, SocialSyncError};
pub use platforms::{Adapter, MediaHandle, Session};
pub use progress::{AccountResult, AttemptState, ProgressEvent, PublishReport};
pub use registry::AdapterRegistry;
pub use types::{Account, Content, ImageMimeType, MediaPayload};
