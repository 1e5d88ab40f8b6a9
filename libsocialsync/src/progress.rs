//! Progress and result channel of a publish call
//!
//! The engine reports every per-account state change as a [`ProgressEvent`]
//! on a [`ProgressStream`], and delivers the aggregated [`PublishReport`]
//! once through a [`PendingReport`] future after every account finished.
//!
//! Events of one account arrive in state-machine order; events of different
//! accounts interleave freely.
//!
//! # Example
//!
//! ```no_run
//! use libsocialsync::engine::Publication;
//!
//! # async fn example(publication: Publication) -> libsocialsync::Result<()> {
//! let Publication { mut progress, report } = publication;
//!
//! while let Some(event) = progress.recv().await {
//!     eprintln!("{}: {}", event.account_key, event.status);
//! }
//!
//! let report = report.await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, SocialSyncError};

/// Longest error excerpt shown in a failure status line
const STATUS_ERROR_LIMIT: usize = 60;

/// State of one account's publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Pending,
    Uploading,
    Posting,
    Succeeded,
    Failed,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Posting => "posting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One state transition of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// `platform:username`
    pub account_key: String,
    pub state: AttemptState,
    /// Short human-readable status
    pub status: String,
}

impl ProgressEvent {
    pub fn new(account_key: &str, state: AttemptState, error: Option<&str>) -> Self {
        let status = match (state, error) {
            (AttemptState::Pending, _) => "Waiting…".to_string(),
            (AttemptState::Uploading, _) => "Uploading…".to_string(),
            (AttemptState::Posting, _) => "Posting…".to_string(),
            (AttemptState::Succeeded, _) => "✓ Posted!".to_string(),
            (AttemptState::Failed, error) => format!(
                "✗ {}",
                crate::http::truncate_chars(error.unwrap_or("failed"), STATUS_ERROR_LIMIT)
            ),
        };

        Self {
            account_key: account_key.to_string(),
            state,
            status,
        }
    }
}

/// Live stream of progress events; ends once every account reached a
/// terminal state.
pub struct ProgressStream {
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<ProgressEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, or `None` when the publish call has finished.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }
}

impl futures::Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Outcome for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccountResult {
    pub fn success(url: impl Into<String>) -> Self {
        Self {
            ok: true,
            url: Some(url.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregated results of one publish call, keyed by `platform:username`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishReport {
    results: BTreeMap<String, AccountResult>,
}

impl PublishReport {
    pub(crate) fn insert(&mut self, account_key: String, result: AccountResult) {
        self.results.insert(account_key, result);
    }

    pub fn get(&self, account_key: &str) -> Option<&AccountResult> {
        self.results.get(account_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AccountResult)> {
        self.results.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.results.keys()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// "N succeeded, M failed"
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded(), self.failed())
    }

    pub fn into_inner(self) -> BTreeMap<String, AccountResult> {
        self.results
    }
}

/// Resolves to the [`PublishReport`] once every account has finished.
pub struct PendingReport {
    receiver: oneshot::Receiver<PublishReport>,
}

impl PendingReport {
    pub(crate) fn new(receiver: oneshot::Receiver<PublishReport>) -> Self {
        Self { receiver }
    }
}

impl Future for PendingReport {
    type Output = Result<PublishReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| {
            result.map_err(|_| {
                SocialSyncError::Engine(
                    "result collector stopped before delivering the report".to_string(),
                )
            })
        })
    }
}
