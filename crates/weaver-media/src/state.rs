//! Aggregate "any upload in flight" tracking.
//!
//! Every live session owns a [`SessionTracker`] registered here. The
//! aggregate flag is the logical OR of all registered sessions' pending
//! flags and is only published when it actually changes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tokio::sync::watch;

/// Identifier of a registered upload session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    sessions: BTreeMap<SessionId, bool>,
}

/// Live-session registry plus the aggregate pending flag.
pub struct UploadingState {
    registry: RefCell<Registry>,
    aggregate: watch::Sender<bool>,
}

impl UploadingState {
    pub fn new() -> Rc<Self> {
        let (aggregate, _) = watch::channel(false);
        Rc::new(Self {
            registry: RefCell::new(Registry::default()),
            aggregate,
        })
    }

    /// Register a new session. It starts out not pending.
    pub fn register(self: &Rc<Self>) -> SessionTracker {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = SessionId(registry.next_id);
            registry.next_id += 1;
            registry.sessions.insert(id, false);
            id
        };
        tracing::trace!(?id, "registered upload session");
        SessionTracker {
            id,
            state: Rc::clone(self),
        }
    }

    /// Subscribe to aggregate changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.aggregate.subscribe()
    }

    /// Current aggregate value.
    pub fn is_uploading(&self) -> bool {
        *self.aggregate.borrow()
    }

    /// Number of registered sessions, pending or not.
    pub fn live_sessions(&self) -> usize {
        self.registry.borrow().sessions.len()
    }

    fn set_pending(&self, id: SessionId, pending: bool) {
        if let Some(flag) = self.registry.borrow_mut().sessions.get_mut(&id) {
            *flag = pending;
        }
        self.publish();
    }

    fn remove(&self, id: SessionId) {
        self.registry.borrow_mut().sessions.remove(&id);
        self.publish();
    }

    fn publish(&self) {
        let any = self.registry.borrow().sessions.values().any(|pending| *pending);
        let changed = self.aggregate.send_if_modified(|current| {
            if *current == any {
                false
            } else {
                *current = any;
                true
            }
        });
        if changed {
            tracing::debug!(uploading = any, "aggregate upload state changed");
        }
    }
}

/// A session's registration in [`UploadingState`].
///
/// Dropping the tracker deregisters the session.
pub struct SessionTracker {
    id: SessionId,
    state: Rc<UploadingState>,
}

impl SessionTracker {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Publish this session's pending flag.
    pub fn publish(&self, pending: bool) {
        self.state.set_pending(self.id, pending);
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.state.remove(self.id);
    }
}

impl std::fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTracker").field("id", &self.id).finish()
    }
}
