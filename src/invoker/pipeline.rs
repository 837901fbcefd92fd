//! The invocation lifecycle around a single handler call.
//!
//! # Data Flow
//! ```text
//! execute(bound, request, response)
//!     → count invocation
//!     → before callbacks (first error aborts, handler never runs)
//!     → start timer
//!     → bound.invoke()
//!         ok  → after callbacks → success counter
//!         err → reset response → exception mapper (if any)
//!               handled     → error counter, Ok(())
//!               not handled → exception observers → error counter, Err(original)
//!     → timer drop: record elapsed, long-running callbacks if over threshold
//! ```
//!
//! # Design Decisions
//! - Runs to completion on the calling thread; no internal tasks
//! - Callback lists are snapshotted, so registration during an invocation
//!   affects only later invocations
//! - Timing lives in a drop guard so it is recorded on every exit path

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::InvocationError;
use crate::http::request::RequestContext;
use crate::http::response::ResponseSink;
use crate::invoker::context::InvocationContext;
use crate::observability::metrics::{self, InvocationOutcome};
use crate::routing::descriptor::ExceptionMapping;
use crate::routing::invocation::BoundInvocation;

/// Executes bound invocations against one `InvocationContext`.
#[derive(Clone)]
pub struct ExecutionPipeline {
    context: Arc<InvocationContext>,
}

impl ExecutionPipeline {
    pub fn new(context: Arc<InvocationContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<InvocationContext> {
        &self.context
    }

    /// Run the full lifecycle for `bound`.
    ///
    /// Precondition checks are the caller's job; this always attempts the
    /// handler unless a before-callback aborts.
    pub fn execute(
        &self,
        bound: &BoundInvocation,
        request: &dyn RequestContext,
        response: &mut dyn ResponseSink,
    ) -> Result<(), InvocationError> {
        let context = self.context.as_ref();
        let route = bound.descriptor().key();
        context.statistics().record_invocation();

        for (id, callback) in context.callbacks().before().snapshot().iter() {
            if let Err(source) = callback(bound, request) {
                tracing::warn!(
                    route = %route,
                    callback = id.get(),
                    error = %source,
                    "Before-execution callback aborted invocation"
                );
                metrics::record_invocation(route, InvocationOutcome::Aborted);
                return Err(InvocationError::Aborted {
                    callback: id.get(),
                    source,
                });
            }
        }

        let _timer = InvocationTimer {
            context,
            bound,
            request,
            started: Instant::now(),
        };

        match bound.invoke(request, response) {
            Ok(()) => {
                for (_, callback) in context.callbacks().after().snapshot().iter() {
                    callback(bound, request);
                }
                context.statistics().record_success(route);
                metrics::record_invocation(route, InvocationOutcome::Success);
                Ok(())
            }
            Err(err) => {
                context.statistics().record_error(route);

                if self.map_exception(bound, request, response, &err) == ExceptionMapping::Handled {
                    tracing::debug!(route = %route, error = %err, "Failure handled by exception mapper");
                    metrics::record_invocation(route, InvocationOutcome::Mapped);
                    return Ok(());
                }

                let observed: &(dyn Error + Send + Sync + 'static) = match &err {
                    InvocationError::Handler(source) => &**source,
                    other => other,
                };
                for (_, observer) in context.callbacks().exception_observers().snapshot().iter() {
                    observer(bound, request, observed);
                }
                metrics::record_invocation(route, InvocationOutcome::Error);
                Err(err)
            }
        }
    }

    /// Only handler failures reach the route's mapper.
    fn map_exception(
        &self,
        bound: &BoundInvocation,
        request: &dyn RequestContext,
        response: &mut dyn ResponseSink,
        err: &InvocationError,
    ) -> ExceptionMapping {
        let (InvocationError::Handler(source), Some(mapper)) =
            (err, bound.descriptor().exception_mapper())
        else {
            return ExceptionMapping::NotHandled;
        };

        response.reset();
        mapper.map_exception(bound, request, response, &**source)
    }
}

/// Records elapsed time when dropped, including during unwinding.
struct InvocationTimer<'a> {
    context: &'a InvocationContext,
    bound: &'a BoundInvocation,
    request: &'a dyn RequestContext,
    started: Instant,
}

impl InvocationTimer<'_> {
    fn exceeds_limit(&self, elapsed: Duration) -> bool {
        let limit = self.context.callbacks().long_running_limit_ms();
        limit > 0 && elapsed > Duration::from_millis(limit as u64)
    }
}

impl Drop for InvocationTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let route = self.bound.descriptor().key();
        self.context.statistics().record_timing(route, elapsed);
        metrics::record_duration(route, elapsed);

        // Callbacks must not run while a handler panic unwinds.
        if std::thread::panicking() || !self.exceeds_limit(elapsed) {
            return;
        }

        tracing::warn!(
            route = %route,
            path = %self.bound.path(),
            elapsed_ms = elapsed.as_millis() as u64,
            limit_ms = self.context.callbacks().long_running_limit_ms(),
            "Long-running invocation"
        );
        metrics::record_long_running(route);
        for (_, callback) in self.context.callbacks().long_running().snapshot().iter() {
            callback(self.bound, self.request, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::http::method::HttpMethod;
    use crate::http::request::HttpRequestContext;
    use crate::http::response::ResponseBuffer;
    use crate::routing::descriptor::{
        handler_fn, ConstantFactory, ExceptionMapper, HandlerFactory, SupplierFactory,
    };
    use crate::routing::router::RouteRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn bind(
        factory: impl HandlerFactory + 'static,
        mapper: Option<Arc<dyn ExceptionMapper>>,
    ) -> BoundInvocation {
        let registry = RouteRegistry::new();
        registry
            .register(HttpMethod::Get, "/work/{id}", factory, None::<&str>, None::<&str>, mapper)
            .unwrap();
        registry.resolve(HttpMethod::Get, "/work/1").unwrap()
    }

    fn failing() -> ConstantFactory {
        ConstantFactory::new(handler_fn(|_, _, _, resp| {
            resp.set_status(200);
            resp.write_body(b"partial");
            Err::<(), BoxError>("handler failed".into())
        }))
    }

    fn teapot(
        _: &BoundInvocation,
        _: &dyn RequestContext,
        response: &mut dyn ResponseSink,
        _: &(dyn Error + Send + Sync + 'static),
    ) -> ExceptionMapping {
        response.set_status(418);
        response.write_body(b"mapped");
        ExceptionMapping::Handled
    }

    fn decline(
        _: &BoundInvocation,
        _: &dyn RequestContext,
        _: &mut dyn ResponseSink,
        _: &(dyn Error + Send + Sync + 'static),
    ) -> ExceptionMapping {
        ExceptionMapping::NotHandled
    }

    fn request() -> HttpRequestContext {
        HttpRequestContext::new(HttpMethod::Get, "/work/1")
    }

    fn observed_messages(pipeline: &ExecutionPipeline) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        pipeline.context().callbacks().add_exception_observer(
            move |_: &BoundInvocation,
                  _: &dyn RequestContext,
                  err: &(dyn Error + Send + Sync + 'static)| {
                sink.lock().unwrap().push(err.to_string());
            },
        );
        seen
    }

    #[test]
    fn test_success_runs_after_callbacks_and_counts() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let after = Arc::new(AtomicUsize::new(0));
        let counter = after.clone();
        pipeline
            .context()
            .callbacks()
            .add_after(move |_: &BoundInvocation, _: &dyn RequestContext| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let bound = bind(ConstantFactory::new(handler_fn(|_, _, _, _| Ok(()))), None);
        pipeline.execute(&bound, &request(), &mut ResponseBuffer::new()).unwrap();

        assert_eq!(after.load(Ordering::SeqCst), 1);
        let stats = pipeline.context().statistics();
        assert_eq!(stats.invocations(), 1);
        let route = stats.for_route("GET /work/{id}").unwrap();
        assert_eq!(route.successes(), 1);
        assert_eq!(route.timed(), 1);
    }

    #[test]
    fn test_long_running_callback_fires_once() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        pipeline.context().callbacks().set_long_running_limit_ms(100);
        let elapsed = Arc::new(Mutex::new(Vec::new()));
        let sink = elapsed.clone();
        pipeline.context().callbacks().add_long_running(
            move |_: &BoundInvocation, _: &dyn RequestContext, took: Duration| {
                sink.lock().unwrap().push(took);
            },
        );

        let bound = bind(
            ConstantFactory::new(handler_fn(|_, _, _, _| {
                std::thread::sleep(Duration::from_millis(150));
                Ok(())
            })),
            None,
        );
        pipeline.execute(&bound, &request(), &mut ResponseBuffer::new()).unwrap();

        let elapsed = elapsed.lock().unwrap();
        assert_eq!(elapsed.len(), 1);
        assert!(elapsed[0] >= Duration::from_millis(150));
    }

    #[test]
    fn test_fast_invocation_is_not_long_running() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        pipeline.context().callbacks().add_long_running(
            move |_: &BoundInvocation, _: &dyn RequestContext, _: Duration| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        let bound = bind(ConstantFactory::new(handler_fn(|_, _, _, _| Ok(()))), None);
        pipeline.execute(&bound, &request(), &mut ResponseBuffer::new()).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handled_mapper_swallows_error() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let seen = observed_messages(&pipeline);
        let bound = bind(failing(), Some(Arc::new(teapot)));

        let mut response = ResponseBuffer::new();
        pipeline.execute(&bound, &request(), &mut response).unwrap();

        assert_eq!(response.status(), Some(418));
        assert_eq!(response.body_text(), "mapped");
        assert!(seen.lock().unwrap().is_empty());
        let route = pipeline.context().statistics().for_route("GET /work/{id}").unwrap();
        assert_eq!(route.errors(), 1);
        assert_eq!(route.successes(), 0);
    }

    #[test]
    fn test_declined_mapper_rethrows_after_observers() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let seen = observed_messages(&pipeline);
        let bound = bind(failing(), Some(Arc::new(decline)));

        let err = pipeline
            .execute(&bound, &request(), &mut ResponseBuffer::new())
            .unwrap_err();

        assert_eq!(err.to_string(), "handler failed");
        assert_eq!(*seen.lock().unwrap(), vec!["handler failed".to_string()]);
        let route = pipeline.context().statistics().for_route("GET /work/{id}").unwrap();
        assert_eq!(route.errors(), 1);
        assert_eq!(route.timed(), 1);
    }

    #[test]
    fn test_without_mapper_original_error_is_returned() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let seen = observed_messages(&pipeline);
        let bound = bind(failing(), None);

        let mut response = ResponseBuffer::new();
        let err = pipeline.execute(&bound, &request(), &mut response).unwrap_err();

        assert_eq!(err.into_handler_error().unwrap().to_string(), "handler failed");
        assert_eq!(seen.lock().unwrap().len(), 1);
        // Without a mapper the sink is left as the handler wrote it.
        assert_eq!(response.body_text(), "partial");
    }

    #[test]
    fn test_before_callback_aborts() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        pipeline
            .context()
            .callbacks()
            .add_before(|_: &BoundInvocation, _: &dyn RequestContext| Ok(()));
        let veto = pipeline
            .context()
            .callbacks()
            .add_before(|_: &BoundInvocation, _: &dyn RequestContext| Err("denied".into()));

        let bound = bind(
            ConstantFactory::new(handler_fn(move |_, _, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })),
            None,
        );
        let err = pipeline
            .execute(&bound, &request(), &mut ResponseBuffer::new())
            .unwrap_err();

        match err {
            InvocationError::Aborted { callback, source } => {
                assert_eq!(callback, veto.get());
                assert_eq!(source.to_string(), "denied");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.context().statistics().for_route("GET /work/{id}").is_none());
    }

    #[test]
    fn test_configuration_error_skips_mapper() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let seen = observed_messages(&pipeline);
        let bound = bind(SupplierFactory::new(|| None), Some(Arc::new(teapot)));

        let mut response = ResponseBuffer::new();
        let err = pipeline.execute(&bound, &request(), &mut response).unwrap_err();

        assert!(err.is_configuration());
        assert!(response.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
        let route = pipeline.context().statistics().for_route("GET /work/{id}").unwrap();
        assert_eq!(route.errors(), 1);
    }

    #[test]
    fn test_timing_recorded_when_handler_panics() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let bound = bind(
            ConstantFactory::new(handler_fn(|_, _, _, _| -> Result<(), BoxError> {
                panic!("handler panicked")
            })),
            None,
        );

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = pipeline.execute(&bound, &request(), &mut ResponseBuffer::new());
        }));

        assert!(outcome.is_err());
        let route = pipeline.context().statistics().for_route("GET /work/{id}").unwrap();
        assert_eq!(route.timed(), 1);
    }

    fn sleeping(duration: Duration) -> ConstantFactory {
        ConstantFactory::new(handler_fn(move |_, _, _, _| {
            std::thread::sleep(duration);
            Ok(())
        }))
    }

    fn count_long_running(pipeline: &ExecutionPipeline) -> Arc<AtomicUsize> {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        pipeline.context().callbacks().add_long_running(
            move |_: &BoundInvocation, _: &dyn RequestContext, _: Duration| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        fired
    }

    #[test]
    fn test_before_and_after_run_in_registration_order() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let callbacks = pipeline.context().callbacks();
        for n in 1..=3 {
            let before = log.clone();
            callbacks.add_before(move |_: &BoundInvocation, _: &dyn RequestContext| {
                before.lock().unwrap().push(format!("before-{n}"));
                Ok(())
            });
            let after = log.clone();
            callbacks.add_after(move |_: &BoundInvocation, _: &dyn RequestContext| {
                after.lock().unwrap().push(format!("after-{n}"));
            });
        }

        let handler_log = log.clone();
        let bound = bind(
            ConstantFactory::new(handler_fn(move |_, _, _, _| {
                handler_log.lock().unwrap().push("handler".to_string());
                Ok(())
            })),
            None,
        );
        pipeline.execute(&bound, &request(), &mut ResponseBuffer::new()).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["before-1", "before-2", "before-3", "handler", "after-1", "after-2", "after-3"]
        );
    }

    #[test]
    fn test_exception_observers_run_in_registration_order() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 1..=3 {
            let log = log.clone();
            pipeline.context().callbacks().add_exception_observer(
                move |_: &BoundInvocation,
                      _: &dyn RequestContext,
                      _: &(dyn Error + Send + Sync + 'static)| {
                    log.lock().unwrap().push(n);
                },
            );
        }

        let bound = bind(failing(), None);
        assert!(pipeline.execute(&bound, &request(), &mut ResponseBuffer::new()).is_err());
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_non_positive_limit_disables_long_running() {
        for limit in [0, -5] {
            let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
            pipeline.context().callbacks().set_long_running_limit_ms(limit);
            let fired = count_long_running(&pipeline);

            let bound = bind(sleeping(Duration::from_millis(20)), None);
            pipeline.execute(&bound, &request(), &mut ResponseBuffer::new()).unwrap();

            assert_eq!(fired.load(Ordering::SeqCst), 0, "limit {limit}");
            let route = pipeline.context().statistics().for_route("GET /work/{id}").unwrap();
            assert_eq!(route.timed(), 1);
        }
    }

    #[test]
    fn test_sub_millisecond_overrun_is_long_running() {
        let pipeline = ExecutionPipeline::new(Arc::new(InvocationContext::new()));
        pipeline.context().callbacks().set_long_running_limit_ms(1);
        let fired = count_long_running(&pipeline);

        let bound = bind(sleeping(Duration::from_micros(1500)), None);
        pipeline.execute(&bound, &request(), &mut ResponseBuffer::new()).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
