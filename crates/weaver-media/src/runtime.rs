//! Spawning onto the host's event loop.
//!
//! Sessions are `!Send` (they hold `Rc`s into the document), so they run as
//! local tasks. Natively that means a `tokio::task::LocalSet` must be
//! driving the current thread. In the browser the microtask queue is used.

use std::future::Future;

/// Spawn a local task on the current event loop.
///
/// # Panics
///
/// On native targets, panics when called outside a `LocalSet`.
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    // Completion is observed through the session's own bookkeeping.
    drop(tokio::task::spawn_local(future));
}
