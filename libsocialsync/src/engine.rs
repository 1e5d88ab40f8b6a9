//! Cross-platform publish engine
//!
//! Publishes one [`Content`] to many accounts at once. Every account runs as
//! its own task through the state machine
//!
//! ```text
//! pending → uploading → posting → succeeded | failed
//! ```
//!
//! (`uploading` is skipped for text-only posts). Tasks share nothing but the
//! read-only content and image bytes. Each reports state changes on the
//! progress channel and sends its final outcome to a single collector task,
//! which owns the result map and hands it out once every account finished.
//! A failing account never affects the others.
//!
//! # Example
//!
//! ```no_run
//! use libsocialsync::config::Config;
//! use libsocialsync::engine::PublishEngine;
//! use libsocialsync::types::{Account, Content};
//!
//! # async fn example() -> libsocialsync::Result<()> {
//! let engine = PublishEngine::from_config(&Config::default())?;
//!
//! let accounts = vec![
//!     Account::new("mastodon", "alice", "T1")?.with_instance("https://example.social"),
//!     Account::new("bluesky", "user.bsky.social", "app-pass")?,
//! ];
//!
//! let report = engine.publish_and_wait(accounts, Content::text("Hello")).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info, warn};

use crate::config::{Config, EngineConfig};
use crate::error::{PlatformError, Result, SocialSyncError};
use crate::platforms::Adapter;
use crate::progress::{
    AccountResult, AttemptState, PendingReport, ProgressEvent, ProgressStream, PublishReport,
};
use crate::registry::AdapterRegistry;
use crate::types::{Account, Content, MediaPayload};

/// Handles returned by [`PublishEngine::publish`]
pub struct Publication {
    /// Per-account state transitions
    pub progress: ProgressStream,
    /// Final result map
    pub report: PendingReport,
}

impl Publication {
    /// Drain every progress event, then wait for the report.
    pub async fn collect(self) -> Result<(Vec<ProgressEvent>, PublishReport)> {
        let Publication {
            mut progress,
            report,
        } = self;

        let mut events = Vec::new();
        while let Some(event) = progress.recv().await {
            events.push(event);
        }

        Ok((events, report.await?))
    }
}

/// Image shared by all account tasks of one call
#[derive(Clone)]
enum SharedMedia {
    None,
    Loaded(Arc<MediaPayload>),
    Unreadable(Arc<str>),
}

impl SharedMedia {
    async fn load(content: &Content) -> Self {
        let Some(path) = content.image_path.as_deref() else {
            return SharedMedia::None;
        };

        match MediaPayload::load(path, &content.alt_text).await {
            Ok(media) => {
                debug!(
                    "Loaded image {} ({} bytes, {})",
                    path.display(),
                    media.bytes.len(),
                    media.mime_type
                );
                SharedMedia::Loaded(Arc::new(media))
            }
            Err(e) => {
                warn!("Failed to read image {}: {}", path.display(), e);
                SharedMedia::Unreadable(
                    format!("Failed to read image {}: {}", path.display(), e).into(),
                )
            }
        }
    }

    fn is_present(&self) -> bool {
        !matches!(self, SharedMedia::None)
    }
}

/// State of one account's attempt, owned by the task handling it.
struct PublishAttempt {
    account_key: String,
    state: AttemptState,
    result_url: Option<String>,
    error: Option<String>,
    progress: mpsc::UnboundedSender<ProgressEvent>,
}

impl PublishAttempt {
    fn start(account_key: String, progress: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        let attempt = Self {
            account_key,
            state: AttemptState::Pending,
            result_url: None,
            error: None,
            progress,
        };
        attempt.emit();
        attempt
    }

    fn emit(&self) {
        // A dropped progress stream is fine; the report is still delivered.
        let _ = self.progress.send(ProgressEvent::new(
            &self.account_key,
            self.state,
            self.error.as_deref(),
        ));
    }

    fn advance(&mut self, state: AttemptState) {
        debug_assert!(!self.state.is_terminal());
        self.state = state;
        self.emit();
    }

    fn finish(mut self, outcome: Result<String>) -> (String, AccountResult) {
        match outcome {
            Ok(url) => {
                info!("Published to {}: {}", self.account_key, url);
                self.result_url = Some(url);
                self.advance(AttemptState::Succeeded);
            }
            Err(e) => {
                let message = error_message(&e);
                warn!("Failed to publish to {}: {}", self.account_key, message);
                self.error = Some(message);
                self.advance(AttemptState::Failed);
            }
        }

        let result = match (self.result_url, self.error) {
            (Some(url), None) => AccountResult::success(url),
            (_, error) => AccountResult::failure(error.unwrap_or_else(|| "unknown error".to_string())),
        };
        (self.account_key, result)
    }
}

/// Per-account message without the top-level "Platform error:" prefix
fn error_message(error: &SocialSyncError) -> String {
    match error {
        SocialSyncError::Platform(e) => e.to_string(),
        other => other.to_string(),
    }
}

/// Orchestrates concurrent publish attempts across registered adapters.
pub struct PublishEngine {
    registry: Arc<AdapterRegistry>,
    max_concurrency: usize,
}

impl PublishEngine {
    pub fn new(registry: AdapterRegistry, config: &EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Engine with the four built-in adapters
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            AdapterRegistry::with_defaults(config)?,
            &config.engine,
        ))
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Start publishing `content` to every account.
    ///
    /// Returns as soon as all attempts are dispatched. Progress and the final
    /// report are observed through the returned [`Publication`].
    ///
    /// # Errors
    ///
    /// `SocialSyncError::InvalidInput` when `accounts` is empty or the
    /// content has neither text nor an image. Nothing is dispatched in that
    /// case. Every other failure is reported per account.
    pub async fn publish(&self, accounts: Vec<Account>, content: Content) -> Result<Publication> {
        if accounts.is_empty() {
            return Err(SocialSyncError::InvalidInput(
                "No accounts selected".to_string(),
            ));
        }
        if content.is_empty() {
            return Err(SocialSyncError::InvalidInput(
                "Nothing to post: add text or an image".to_string(),
            ));
        }

        let media = SharedMedia::load(&content).await;
        let content = Arc::new(content);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<(String, AccountResult)>();
        let (report_tx, report_rx) = oneshot::channel();

        let mut seen = HashSet::new();
        let mut dispatched = Vec::new();

        for account in accounts {
            let key = account.key();
            if !seen.insert(key.clone()) {
                warn!("Skipping duplicate account {}", key);
                continue;
            }

            let attempt = PublishAttempt::start(key.clone(), progress_tx.clone());
            dispatched.push(key);

            let registry = Arc::clone(&self.registry);
            let content = Arc::clone(&content);
            let media = media.clone();
            let semaphore = Arc::clone(&semaphore);
            let outcome_tx = outcome_tx.clone();

            tokio::spawn(async move {
                let mut attempt = attempt;
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        run_attempt(&registry, &account, &content, &media, &mut attempt).await
                    }
                    Err(e) => Err(SocialSyncError::Engine(format!(
                        "concurrency limiter closed: {}",
                        e
                    ))),
                };
                let _ = outcome_tx.send(attempt.finish(outcome));
            });
        }
        drop(outcome_tx);

        info!("Dispatched publish to {} account(s)", dispatched.len());

        tokio::spawn(async move {
            let mut report = PublishReport::default();
            while let Some((key, result)) = outcome_rx.recv().await {
                report.insert(key, result);
            }

            // A task that panicked never sent its outcome.
            for key in dispatched {
                if report.get(&key).is_none() {
                    let error = "publish task aborted unexpectedly";
                    warn!("{}: {}", key, error);
                    let _ = progress_tx.send(ProgressEvent::new(
                        &key,
                        AttemptState::Failed,
                        Some(error),
                    ));
                    report.insert(key, AccountResult::failure(error));
                }
            }
            drop(progress_tx);

            info!("Publish finished: {}", report.summary());
            let _ = report_tx.send(report);
        });

        Ok(Publication {
            progress: ProgressStream::new(progress_rx),
            report: PendingReport::new(report_rx),
        })
    }

    /// Publish and wait for the final report, ignoring progress events.
    pub async fn publish_and_wait(
        &self,
        accounts: Vec<Account>,
        content: Content,
    ) -> Result<PublishReport> {
        self.publish(accounts, content).await?.report.await
    }
}

async fn run_attempt(
    registry: &AdapterRegistry,
    account: &Account,
    content: &Content,
    media: &SharedMedia,
    attempt: &mut PublishAttempt,
) -> Result<String> {
    if account.username.trim().is_empty() || account.token().is_empty() {
        return Err(PlatformError::InvalidAccount(format!(
            "{} has an empty username or token",
            attempt.account_key
        ))
        .into());
    }

    let adapter = registry.resolve(&account.platform)?;

    if media.is_present() {
        attempt.advance(AttemptState::Uploading);
    } else {
        attempt.advance(AttemptState::Posting);
    }

    let url = publish_with(adapter.as_ref(), account, content, media, attempt).await?;

    if url.trim().is_empty() {
        return Err(PlatformError::Post(format!(
            "{} returned no post URL",
            adapter.platform()
        ))
        .into());
    }

    Ok(url)
}

async fn publish_with(
    adapter: &dyn Adapter,
    account: &Account,
    content: &Content,
    media: &SharedMedia,
    attempt: &mut PublishAttempt,
) -> Result<String> {
    if let SharedMedia::Unreadable(reason) = media {
        return Err(PlatformError::Upload(reason.to_string()).into());
    }

    let session = adapter.authenticate(account).await?;

    let handle = match media {
        SharedMedia::Loaded(payload) => {
            let handle = adapter.upload_media(&session, payload).await?;
            attempt.advance(AttemptState::Posting);
            Some(handle)
        }
        _ => None,
    };

    adapter
        .create_post(&session, &content.text, handle.as_ref())
        .await
}
