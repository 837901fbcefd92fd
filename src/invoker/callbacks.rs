//! Lifecycle callback registration.
//!
//! # Responsibilities
//! - Hold the before, after, exception and long-running callback lists
//! - Hold the long-running threshold
//! - Hand out stable snapshots for the pipeline to iterate
//!
//! # Design Decisions
//! - Copy-on-write lists (`ArcSwap`): registration swaps a new `Vec`,
//!   in-flight invocations keep the snapshot they started with
//! - Registration order is call order
//! - Removal is by `CallbackId`; closures have no usable identity

use std::error::Error;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::BoxError;
use crate::http::request::RequestContext;
use crate::routing::invocation::BoundInvocation;

/// Default long-running threshold in milliseconds.
pub const DEFAULT_LONG_RUNNING_LIMIT_MS: i64 = 1000;

/// Runs before the handler. An error aborts the invocation.
pub type BeforeCallback =
    dyn Fn(&BoundInvocation, &dyn RequestContext) -> Result<(), BoxError> + Send + Sync;

/// Runs after a handler that completed successfully.
pub type AfterCallback = dyn Fn(&BoundInvocation, &dyn RequestContext) + Send + Sync;

/// Sees every failure the pipeline did not swallow.
pub type ExceptionCallback =
    dyn Fn(&BoundInvocation, &dyn RequestContext, &(dyn Error + Send + Sync + 'static))
        + Send
        + Sync;

/// Notified when an invocation exceeds the long-running threshold.
pub type LongRunningCallback =
    dyn Fn(&BoundInvocation, &dyn RequestContext, Duration) + Send + Sync;

/// Handle returned on registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl CallbackId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Ordered snapshot of one callback list.
pub type CallbackSnapshot<T> = Arc<Vec<(CallbackId, Arc<T>)>>;

/// Append-ordered list with lock-free reads.
pub struct CallbackList<T: ?Sized> {
    entries: ArcSwap<Vec<(CallbackId, Arc<T>)>>,
}

impl<T: ?Sized> CallbackList<T> {
    fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    fn push(&self, id: CallbackId, callback: Arc<T>) {
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push((id, callback.clone()));
            next
        });
    }

    fn remove(&self, id: CallbackId) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            let next: Vec<_> = current.iter().filter(|(i, _)| *i != id).cloned().collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    /// Current entries. Later registrations do not affect the returned list.
    pub fn snapshot(&self) -> CallbackSnapshot<T> {
        self.entries.load_full()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

/// All lifecycle callbacks of one invocation context.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    before: CallbackList<BeforeCallback>,
    after: CallbackList<AfterCallback>,
    exception: CallbackList<ExceptionCallback>,
    long_running: CallbackList<LongRunningCallback>,
    long_running_limit_ms: AtomicI64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            before: CallbackList::new(),
            after: CallbackList::new(),
            exception: CallbackList::new(),
            long_running: CallbackList::new(),
            long_running_limit_ms: AtomicI64::new(DEFAULT_LONG_RUNNING_LIMIT_MS),
        }
    }

    fn next_id(&self) -> CallbackId {
        CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_before<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&BoundInvocation, &dyn RequestContext) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        let id = self.next_id();
        self.before.push(id, Arc::new(callback));
        id
    }

    pub fn add_after<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&BoundInvocation, &dyn RequestContext) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.after.push(id, Arc::new(callback));
        id
    }

    pub fn add_exception_observer<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&BoundInvocation, &dyn RequestContext, &(dyn Error + Send + Sync + 'static))
            + Send
            + Sync
            + 'static,
    {
        let id = self.next_id();
        self.exception.push(id, Arc::new(callback));
        id
    }

    pub fn add_long_running<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&BoundInvocation, &dyn RequestContext, Duration) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.long_running.push(id, Arc::new(callback));
        id
    }

    pub fn remove_before(&self, id: CallbackId) -> bool {
        self.before.remove(id)
    }

    pub fn remove_after(&self, id: CallbackId) -> bool {
        self.after.remove(id)
    }

    pub fn remove_exception_observer(&self, id: CallbackId) -> bool {
        self.exception.remove(id)
    }

    pub fn remove_long_running(&self, id: CallbackId) -> bool {
        self.long_running.remove(id)
    }

    pub fn before(&self) -> &CallbackList<BeforeCallback> {
        &self.before
    }

    pub fn after(&self) -> &CallbackList<AfterCallback> {
        &self.after
    }

    pub fn exception_observers(&self) -> &CallbackList<ExceptionCallback> {
        &self.exception
    }

    pub fn long_running(&self) -> &CallbackList<LongRunningCallback> {
        &self.long_running
    }

    /// Threshold in milliseconds. Zero or negative disables detection.
    pub fn long_running_limit_ms(&self) -> i64 {
        self.long_running_limit_ms.load(Ordering::Relaxed)
    }

    pub fn set_long_running_limit_ms(&self, limit_ms: i64) {
        let previous = self.long_running_limit_ms.swap(limit_ms, Ordering::Relaxed);
        if previous != limit_ms {
            tracing::info!(previous, limit_ms, "Long-running threshold changed");
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exception observer that writes the failure to the log.
pub fn log_exception(
    bound: &BoundInvocation,
    request: &dyn RequestContext,
    error: &(dyn Error + Send + Sync + 'static),
) {
    tracing::error!(
        method = %request.method(),
        path = %bound.path(),
        route = %bound.descriptor().key(),
        error = %error,
        "Invocation failed"
    );
}
