//! End-to-end invocation through registry and pipeline.

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use route_invoker::http::{HttpMethod, HttpRequestContext, RequestContext, ResponseBuffer, ResponseSink};
use route_invoker::routing::{BoundInvocation, ExceptionMapper, ExceptionMapping, RouteRegistry};

mod common;

fn not_found_mapper(
    bound: &BoundInvocation,
    _: &dyn RequestContext,
    response: &mut dyn ResponseSink,
    error: &(dyn Error + Send + Sync + 'static),
) -> ExceptionMapping {
    if error.to_string().contains("missing") {
        response.set_status(404);
        response.write_body(format!("no such record at {}", bound.path()).as_bytes());
        ExceptionMapping::Handled
    } else {
        ExceptionMapping::NotHandled
    }
}

fn registry() -> RouteRegistry {
    let registry = RouteRegistry::new();
    let mapper: Arc<dyn ExceptionMapper> = Arc::new(not_found_mapper);
    registry
        .register(HttpMethod::Get, "/ok", common::text_handler("fine"), None::<&str>, None::<&str>, None)
        .unwrap();
    registry
        .register(
            HttpMethod::Get,
            "/records/{id}",
            common::failing_handler("record missing"),
            None::<&str>,
            None::<&str>,
            Some(mapper.clone()),
        )
        .unwrap();
    registry
        .register(
            HttpMethod::Get,
            "/broken",
            common::failing_handler("disk on fire"),
            None::<&str>,
            None::<&str>,
            Some(mapper),
        )
        .unwrap();
    registry
}

fn run(
    registry: &RouteRegistry,
    pipeline: &route_invoker::ExecutionPipeline,
    path: &str,
) -> (Result<(), route_invoker::InvocationError>, ResponseBuffer) {
    let bound = registry.resolve(HttpMethod::Get, path).unwrap();
    let request = HttpRequestContext::new(HttpMethod::Get, path);
    let mut response = ResponseBuffer::new();
    let result = pipeline.execute(&bound, &request, &mut response);
    (result, response)
}

#[test]
fn test_statistics_after_mixed_traffic() {
    let registry = registry();
    let pipeline = common::isolated_pipeline();

    for _ in 0..3 {
        assert!(run(&registry, &pipeline, "/ok").0.is_ok());
    }
    let (result, response) = run(&registry, &pipeline, "/records/9");
    assert!(result.is_ok());
    assert_eq!(response.status(), Some(404));
    assert_eq!(response.body_text(), "no such record at /records/9");

    let (result, _) = run(&registry, &pipeline, "/broken");
    assert_eq!(result.unwrap_err().to_string(), "disk on fire");

    let snapshot = pipeline.context().statistics().snapshot();
    assert_eq!(snapshot.invocations, 5);
    assert_eq!(snapshot.paths["GET /ok"].successes, 3);
    assert_eq!(snapshot.paths["GET /ok"].invocations, 3);
    assert_eq!(snapshot.paths["GET /records/{id}"].errors, 1);
    assert_eq!(snapshot.paths["GET /broken"].errors, 1);
}

#[test]
fn test_removed_callback_no_longer_fires() {
    let registry = registry();
    let pipeline = common::isolated_pipeline();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = pipeline
        .context()
        .callbacks()
        .add_after(move |_: &BoundInvocation, _: &dyn RequestContext| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    run(&registry, &pipeline, "/ok").0.unwrap();
    assert!(pipeline.context().callbacks().remove_after(id));
    run(&registry, &pipeline, "/ok").0.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_callback_registered_during_invocation_applies_later() {
    let registry = registry();
    let pipeline = common::isolated_pipeline();
    let late_calls = Arc::new(AtomicUsize::new(0));

    let context = pipeline.context().clone();
    let late = late_calls.clone();
    pipeline
        .context()
        .callbacks()
        .add_before(move |_: &BoundInvocation, _: &dyn RequestContext| {
            let late = late.clone();
            context
                .callbacks()
                .add_before(move |_: &BoundInvocation, _: &dyn RequestContext| {
                    late.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            Ok(())
        });

    run(&registry, &pipeline, "/ok").0.unwrap();
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);

    run(&registry, &pipeline, "/ok").0.unwrap();
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_invocations_are_all_counted() {
    let registry = Arc::new(registry());
    let pipeline = common::isolated_pipeline();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let registry = registry.clone();
            let pipeline = pipeline.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    run(&registry, &pipeline, "/ok").0.unwrap();
                }
            });
        }
    });

    let stats = pipeline.context().statistics();
    assert_eq!(stats.invocations(), 400);
    assert_eq!(stats.for_route("GET /ok").unwrap().successes(), 400);
}
