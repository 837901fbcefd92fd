//! Policies for requests that match more than one route.

use crate::routing::invocation::BoundInvocation;

/// Decides the outcome when several routes match the same request.
pub trait AmbiguityResolver: Send + Sync {
    /// `candidates` holds at least two entries, in registration order.
    /// Returning `None` is treated as "not found".
    fn resolve(&self, path: &str, candidates: Vec<BoundInvocation>) -> Option<BoundInvocation>;
}

impl<F> AmbiguityResolver for F
where
    F: Fn(&str, Vec<BoundInvocation>) -> Option<BoundInvocation> + Send + Sync,
{
    fn resolve(&self, path: &str, candidates: Vec<BoundInvocation>) -> Option<BoundInvocation> {
        self(path, candidates)
    }
}

/// Refuses to dispatch and logs one diagnostic. This is the default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefuseAmbiguous;

impl AmbiguityResolver for RefuseAmbiguous {
    fn resolve(&self, path: &str, candidates: Vec<BoundInvocation>) -> Option<BoundInvocation> {
        let routes: Vec<&str> = candidates.iter().map(|c| c.descriptor().key()).collect();
        tracing::warn!(
            path = %path,
            candidates = ?routes,
            "Ambiguous request path, refusing to dispatch"
        );
        None
    }
}

/// Picks the earliest-registered candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstRegistered;

impl AmbiguityResolver for FirstRegistered {
    fn resolve(&self, path: &str, candidates: Vec<BoundInvocation>) -> Option<BoundInvocation> {
        tracing::debug!(path = %path, count = candidates.len(), "Ambiguous request path, using first registered route");
        candidates.into_iter().next()
    }
}
