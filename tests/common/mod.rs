//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use route_invoker::config::InvokerConfig;
use route_invoker::error::BoxError;
use route_invoker::http::ApiServer;
use route_invoker::invoker::{ExecutionPipeline, InvocationContext};
use route_invoker::routing::{handler_fn, ConstantFactory};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Handler answering 200 with a fixed body.
pub fn text_handler(body: &'static str) -> ConstantFactory {
    ConstantFactory::new(handler_fn(move |_, _, _, resp| {
        resp.set_status(200);
        resp.write_body(body.as_bytes());
        Ok(())
    }))
}

/// Handler that always fails with `message`.
pub fn failing_handler(message: &'static str) -> ConstantFactory {
    ConstantFactory::new(handler_fn(move |_, _, _, _| {
        Err::<(), BoxError>(message.into())
    }))
}

/// Pipeline over a fresh, isolated context.
pub fn isolated_pipeline() -> ExecutionPipeline {
    ExecutionPipeline::new(Arc::new(InvocationContext::new()))
}

/// Counts WARN events seen while installed.
#[derive(Clone, Default)]
pub struct WarnCounter {
    count: Arc<AtomicUsize>,
}

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Start a server on an ephemeral port. Dropping the sender shuts it down.
pub async fn start_server(
    config: InvokerConfig,
    registry: Arc<route_invoker::RouteRegistry>,
    pipeline: ExecutionPipeline,
) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let server = ApiServer::new(&config, registry, pipeline);
    tokio::spawn(async move {
        let _ = server
            .run(listener, async move {
                let _ = rx.await;
            })
            .await;
    });

    (addr, tx)
}
