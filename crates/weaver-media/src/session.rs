//! Upload sessions.
//!
//! A session ties one pending node to one in-flight transport call. It is a
//! single local task racing the transport future against three cancellation
//! sources, so exactly one terminal transition ever fires:
//!
//! - the uploader's cancel-all token (explicit broadcast)
//! - the uploader's dispose token
//! - the node's own stop token (detached or disposed individually)
//!
//! The session only holds a weak reference to its node. A node dropped by
//! its document mid-upload still settles the session, it just has nothing
//! left to update.

use std::cell::Cell;
use std::fmt;
use std::future::{self, Future};
use std::rc::{Rc, Weak};

use futures_util::future::LocalBoxFuture;
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;
use web_time::Instant;

use crate::error::UploadError;
use crate::node::{MediaNode, SessionHandle};
use crate::runtime;
use crate::state::SessionTracker;
use crate::types::{MediaData, MediaFile, MediaValue};

/// Application-supplied upload operation.
///
/// The core never performs network I/O itself. The returned future resolves
/// with a link or an opaque structured value.
pub trait UploadTransport {
    fn upload(&self, media_type: SmolStr, file: MediaFile) -> LocalBoxFuture<'static, Result<MediaValue, UploadError>>;
}

impl<F, Fut> UploadTransport for F
where
    F: Fn(SmolStr, MediaFile) -> Fut,
    Fut: Future<Output = Result<MediaValue, UploadError>> + 'static,
{
    fn upload(&self, media_type: SmolStr, file: MediaFile) -> LocalBoxFuture<'static, Result<MediaValue, UploadError>> {
        Box::pin(self(media_type, file))
    }
}

pub type SuccessCallback = Rc<dyn Fn(&str, &str, &MediaValue)>;
pub type ErrorCallback = Rc<dyn Fn(&str, &str, &UploadError)>;
pub type CancelledCallback = Rc<dyn Fn(&str, &str)>;

/// Optional application callbacks, each called with `(type, name, ..)`.
#[derive(Clone, Default)]
pub struct UploadCallbacks {
    pub upload_success: Option<SuccessCallback>,
    pub upload_error: Option<ErrorCallback>,
    pub upload_cancelled: Option<CancelledCallback>,
}

impl fmt::Debug for UploadCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCallbacks")
            .field("upload_success", &self.upload_success.is_some())
            .field("upload_error", &self.upload_error.is_some())
            .field("upload_cancelled", &self.upload_cancelled.is_some())
            .finish()
    }
}

/// Uploader-wide signals a session listens to.
#[derive(Debug)]
pub struct SessionSignals {
    pub cancel_all: CancellationToken,
    pub dispose: CancellationToken,
    pub tracker: SessionTracker,
}

/// Everything a pending descriptor needs to start its upload.
pub struct PendingUpload {
    pub file: MediaFile,
    pub transport: Rc<dyn UploadTransport>,
    pub callbacks: UploadCallbacks,
    pub signals: SessionSignals,
}

impl fmt::Debug for PendingUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingUpload")
            .field("file", &self.file)
            .field("callbacks", &self.callbacks)
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

/// Why a pending session was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// Explicit cancel-all broadcast. The only reason that fires `upload_cancelled`.
    Broadcast,
    /// The node was removed from its document.
    Detached,
    /// The uploader or the node was disposed.
    Disposed,
}

/// Upload session lifecycle.
#[derive(Clone, Debug)]
pub enum SessionState {
    Pending,
    Succeeded(MediaValue),
    Failed(UploadError),
    Cancelled(CancelReason),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

struct UploadSession {
    node: Weak<MediaNode>,
    media_type: SmolStr,
    name: SmolStr,
    callbacks: UploadCallbacks,
    cancel_all: CancellationToken,
    dispose: CancellationToken,
    tracker: SessionTracker,
    stop: CancellationToken,
    reason: Rc<Cell<Option<CancelReason>>>,
    started_at: Instant,
}

/// Issue the transport call for `node` and spawn the task awaiting it.
pub(crate) fn start(node: &Rc<MediaNode>, data: &MediaData, pending: PendingUpload) -> SessionHandle {
    let PendingUpload {
        file,
        transport,
        callbacks,
        signals,
    } = pending;
    let stop = CancellationToken::new();
    let reason = Rc::new(Cell::new(None));

    let session = UploadSession {
        node: Rc::downgrade(node),
        media_type: data.media_type.clone(),
        name: data.name.clone(),
        callbacks,
        cancel_all: signals.cancel_all,
        dispose: signals.dispose,
        tracker: signals.tracker,
        stop: stop.clone(),
        reason: Rc::clone(&reason),
        started_at: Instant::now(),
    };

    // A broadcast or disposal that landed before the node existed settles the
    // session without ever reaching the transport.
    let cancelled = session.dispose.is_cancelled() || session.cancel_all.is_cancelled();
    let upload: LocalBoxFuture<'static, Result<MediaValue, UploadError>> = if cancelled {
        tracing::debug!(
            session = ?session.tracker.id(),
            name = %session.name,
            "upload cancelled before it started"
        );
        Box::pin(future::pending::<Result<MediaValue, UploadError>>())
    } else {
        session.tracker.publish(true);
        tracing::debug!(
            session = ?session.tracker.id(),
            media_type = %session.media_type,
            name = %session.name,
            "starting upload"
        );
        transport.upload(session.media_type.clone(), file)
    };
    runtime::spawn_local(session.run(upload));

    SessionHandle { stop, reason }
}

impl UploadSession {
    async fn run(self, upload: LocalBoxFuture<'static, Result<MediaValue, UploadError>>) {
        let state = tokio::select! {
            biased;
            _ = self.dispose.cancelled() => SessionState::Cancelled(CancelReason::Disposed),
            _ = self.stop.cancelled() => {
                SessionState::Cancelled(self.reason.get().unwrap_or(CancelReason::Detached))
            }
            _ = self.cancel_all.cancelled() => SessionState::Cancelled(CancelReason::Broadcast),
            result = upload => match result {
                Ok(value) if value.is_null() => {
                    SessionState::Failed(UploadError::new("upload returned no value"))
                }
                Ok(value) => SessionState::Succeeded(value),
                Err(err) => SessionState::Failed(err),
            },
        };
        self.settle(state);
    }

    /// Runs exactly once per session.
    fn settle(self, state: SessionState) {
        let elapsed_ms = self.started_at.elapsed().as_millis() as u64;
        let node = self.node.upgrade();
        if let Some(node) = &node {
            node.finish(&state);
        }

        let (media_type, name) = (self.media_type.as_str(), self.name.as_str());
        match &state {
            SessionState::Succeeded(value) => match &self.callbacks.upload_success {
                Some(callback) => callback(media_type, name, value),
                None => tracing::info!(media_type, name, elapsed_ms, "successfully uploaded {name}"),
            },
            SessionState::Failed(err) => match &self.callbacks.upload_error {
                Some(callback) => callback(media_type, name, err),
                None => tracing::error!(media_type, name, elapsed_ms, error = %err, "failed to upload {name}"),
            },
            SessionState::Cancelled(reason) => {
                tracing::debug!(media_type, name, elapsed_ms, ?reason, "upload cancelled");
                if *reason == CancelReason::Broadcast {
                    if let Some(callback) = &self.callbacks.upload_cancelled {
                        callback(media_type, name);
                    }
                }
            }
            SessionState::Pending => {}
        }

        if node.is_none() {
            tracing::debug!(name, "upload settled after its node was dropped");
        }
        self.tracker.publish(false);
    }
}
