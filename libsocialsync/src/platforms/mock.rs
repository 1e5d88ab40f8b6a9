//! Mock adapter for testing
//!
//! A configurable in-memory [`Adapter`] that can succeed, fail at any step,
//! or add latency. Integration tests register it in an `AdapterRegistry`
//! under a real or made-up platform name to exercise the publish engine
//! without network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::{Adapter, MediaHandle, Session};
use crate::types::{Account, MediaPayload};

/// Which step of an attempt should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Authenticate,
    Upload,
    Post,
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform identifier the mock registers under
    pub name: String,
    /// Step that fails, if any
    pub fail_at: Option<FailAt>,
    /// Message of the injected failure
    pub error: String,
    /// Latency added before every step
    pub delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            fail_at: None,
            error: "Mock failure".to_string(),
            delay: Duration::ZERO,
        }
    }
}

/// Calls recorded by a [`MockAdapter`]; shared so tests can keep a handle
/// after the adapter moves into a registry.
#[derive(Debug, Default)]
pub struct MockCalls {
    pub authenticate: AtomicUsize,
    pub upload: AtomicUsize,
    pub post: AtomicUsize,
    /// (account key, text, media handle) for every post call
    pub posts: Mutex<Vec<(String, String, Option<MediaHandle>)>>,
}

impl MockCalls {
    pub fn authenticate_count(&self) -> usize {
        self.authenticate.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.upload.load(Ordering::SeqCst)
    }

    pub fn post_count(&self) -> usize {
        self.post.load(Ordering::SeqCst)
    }

    pub fn posted(&self) -> Vec<(String, String, Option<MediaHandle>)> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

pub struct MockAdapter {
    config: MockConfig,
    calls: Arc<MockCalls>,
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            calls: Arc::new(MockCalls::default()),
        }
    }

    /// A mock that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// A mock failing at `step` with `error`
    pub fn failing(name: &str, step: FailAt, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            fail_at: Some(step),
            error: error.to_string(),
            ..Default::default()
        })
    }

    /// A succeeding mock that sleeps before every step
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Arc<MockCalls> {
        Arc::clone(&self.calls)
    }

    async fn step(&self, step: FailAt) -> Result<()> {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.fail_at != Some(step) {
            return Ok(());
        }

        let message = self.config.error.clone();
        Err(match step {
            FailAt::Authenticate => PlatformError::Authentication(message),
            FailAt::Upload => PlatformError::Upload(message),
            FailAt::Post => PlatformError::Post(message),
        }
        .into())
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn platform(&self) -> &str {
        &self.config.name
    }

    async fn authenticate<'a>(&self, account: &'a Account) -> Result<Session<'a>> {
        self.calls.authenticate.fetch_add(1, Ordering::SeqCst);
        self.step(FailAt::Authenticate).await?;
        Ok(Session::from_static_token(account))
    }

    async fn upload_media(
        &self,
        session: &Session<'_>,
        media: &MediaPayload,
    ) -> Result<MediaHandle> {
        self.calls.upload.fetch_add(1, Ordering::SeqCst);
        self.step(FailAt::Upload).await?;
        Ok(MediaHandle::Id(format!(
            "{}-media-{}",
            session.account.username,
            media.bytes.len()
        )))
    }

    async fn create_post(
        &self,
        session: &Session<'_>,
        text: &str,
        media: Option<&MediaHandle>,
    ) -> Result<String> {
        let n = self.calls.post.fetch_add(1, Ordering::SeqCst) + 1;
        self.step(FailAt::Post).await?;

        if let Ok(mut posts) = self.calls.posts.lock() {
            posts.push((session.account.key(), text.to_string(), media.cloned()));
        }

        Ok(format!(
            "https://{}.example/{}/{}",
            self.config.name, session.account.username, n
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageMimeType;
    use crate::SocialSyncError;
    use bytes::Bytes;

    fn media() -> MediaPayload {
        MediaPayload {
            bytes: Bytes::from_static(b"12345"),
            mime_type: ImageMimeType::Png,
            file_name: "x.png".to_string(),
            alt_text: String::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_success() {
        let adapter = MockAdapter::success("test");
        let calls = adapter.calls();
        let account = Account::new("test", "alice", "tok").unwrap();

        let session = adapter.authenticate(&account).await.unwrap();
        let handle = adapter.upload_media(&session, &media()).await.unwrap();
        let url = adapter
            .create_post(&session, "Hello", Some(&handle))
            .await
            .unwrap();

        assert_eq!(url, "https://test.example/alice/1");
        assert_eq!(handle, MediaHandle::Id("alice-media-5".to_string()));
        assert_eq!(calls.authenticate_count(), 1);
        assert_eq!(calls.upload_count(), 1);
        assert_eq!(calls.post_count(), 1);
        assert_eq!(calls.posted()[0].1, "Hello");
    }

    #[tokio::test]
    async fn test_mock_upload_failure() {
        let adapter = MockAdapter::failing("test", FailAt::Upload, "413 too large");
        let account = Account::new("test", "alice", "tok").unwrap();
        let session = adapter.authenticate(&account).await.unwrap();

        let result = adapter.upload_media(&session, &media()).await;
        match result {
            Err(SocialSyncError::Platform(PlatformError::Upload(msg))) => {
                assert_eq!(msg, "413 too large");
            }
            _ => panic!("Expected Upload error"),
        }
    }

    #[tokio::test]
    async fn test_mock_post_failure_not_recorded() {
        let adapter = MockAdapter::failing("test", FailAt::Post, "500");
        let calls = adapter.calls();
        let account = Account::new("test", "alice", "tok").unwrap();
        let session = adapter.authenticate(&account).await.unwrap();

        assert!(adapter.create_post(&session, "Hello", None).await.is_err());
        assert_eq!(calls.post_count(), 1);
        assert!(calls.posted().is_empty());
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let adapter = MockAdapter::with_delay("test", Duration::from_millis(30));
        let account = Account::new("test", "alice", "tok").unwrap();

        let start = std::time::Instant::now();
        let session = adapter.authenticate(&account).await.unwrap();
        adapter.create_post(&session, "Hi", None).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
