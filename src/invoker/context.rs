//! Shared invocation state: callbacks, threshold and statistics.

use std::sync::{Arc, OnceLock};

use crate::invoker::callbacks::{log_exception, CallbackRegistry};
use crate::invoker::statistics::InvocationStatistics;

static GLOBAL: OnceLock<Arc<InvocationContext>> = OnceLock::new();

/// Everything the pipeline reads or updates across invocations.
#[derive(Default)]
pub struct InvocationContext {
    callbacks: CallbackRegistry,
    statistics: InvocationStatistics,
}

impl InvocationContext {
    /// Isolated context with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the logging exception observer pre-registered.
    pub fn with_exception_logging() -> Self {
        let context = Self::new();
        context.callbacks.add_exception_observer(log_exception);
        context
    }

    /// Process-wide context, created on first use with exception logging.
    pub fn global() -> Arc<InvocationContext> {
        GLOBAL
            .get_or_init(|| Arc::new(Self::with_exception_logging()))
            .clone()
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn statistics(&self) -> &InvocationStatistics {
        &self.statistics
    }
}
