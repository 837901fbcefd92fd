//! Route invoker demo host.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  ROUTE INVOKER                   │
//!                         │                                                  │
//!     Client Request      │  ┌─────────┐    ┌──────────┐    ┌────────────┐   │
//!     ────────────────────┼─▶│  http   │───▶│ routing  │───▶│  bound     │   │
//!                         │  │ server  │    │ registry │    │ invocation │   │
//!                         │  └─────────┘    └──────────┘    └─────┬──────┘   │
//!                         │                                       │          │
//!                         │                                       ▼          │
//!     Client Response     │  ┌─────────┐                   ┌────────────┐    │
//!     ◀───────────────────┼──│response │◀──────────────────│  invoker   │    │
//!                         │  │ buffer  │                   │  pipeline  │    │
//!                         │  └─────────┘                   └────────────┘    │
//!                         │                                                  │
//!                         │  ┌────────────────────────────────────────────┐  │
//!                         │  │          Cross-Cutting Concerns            │  │
//!                         │  │  config (+watcher)  observability  admin   │  │
//!                         │  └────────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use route_invoker::config::watcher::{apply_reload, ConfigWatcher};
use route_invoker::config::{load_config, InvokerConfig};
use route_invoker::http::{ApiServer, HttpMethod};
use route_invoker::invoker::{ExecutionPipeline, InvocationContext};
use route_invoker::observability::{logging, metrics};
use route_invoker::routing::{
    handler_fn, ConstantFactory, InvalidPathTemplateError, RouteDescriptor, RouteRegistry,
    TransientFactory,
};
use route_invoker::routing::template::PathTemplate;

#[derive(Parser)]
#[command(name = "route-invoker", version, about = "Path-template API invoker")]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => InvokerConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("route-invoker v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        long_running_limit_ms = config.invocation.long_running_limit_ms,
        ambiguity = ?config.invocation.ambiguity,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let context = if config.invocation.log_exceptions {
        InvocationContext::global()
    } else {
        Arc::new(InvocationContext::new())
    };
    context
        .callbacks()
        .set_long_running_limit_ms(config.invocation.long_running_limit_ms);

    let registry = Arc::new(config.invocation.ambiguity.registry());
    register_demo_routes(&registry)?;
    tracing::info!(routes = registry.len(), "Routes registered");

    // Kept alive for the lifetime of the server.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let context = context.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    apply_reload(&new_config, context.callbacks());
                }
            });
            Some(handle)
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = ApiServer::new(&config, registry, ExecutionPipeline::new(context));
    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_demo_routes(registry: &RouteRegistry) -> Result<(), InvalidPathTemplateError> {
    registry.register(
        HttpMethod::Get,
        "/health",
        ConstantFactory::new(handler_fn(|_, _, _, resp| {
            resp.set_status(200);
            resp.write_body(b"ok");
            Ok(())
        })),
        None::<&str>,
        None::<&str>,
        None,
    )?;

    registry.register(
        HttpMethod::Get,
        "/greet/{name}",
        TransientFactory::new(|| {
            handler_fn(|_, vars, req, resp| {
                let name = vars.get("name").map(String::as_str).unwrap_or_default();
                let greeting = req.parameter("greeting").unwrap_or("Hello");
                resp.set_header("Content-Type", "text/plain; charset=utf-8");
                resp.write_body(format!("{greeting}, {name}!").as_bytes());
                Ok(())
            })
        }),
        None::<&str>,
        None::<&str>,
        None,
    )?;

    registry.register(
        HttpMethod::Get,
        "/orders/{orderId:regex=[0-9]+}/items/{itemId}",
        ConstantFactory::new(handler_fn(|_, vars, req, resp| {
            let body = serde_json::json!({
                "tenant": req.header("X-Tenant"),
                "orderId": vars.get("orderId"),
                "itemId": vars.get("itemId"),
            });
            resp.set_header("Content-Type", "application/json");
            resp.write_body(body.to_string().as_bytes());
            Ok(())
        })),
        ["X-Tenant"],
        None::<&str>,
        None,
    )?;

    registry.register_route(
        RouteDescriptor::builder(
            PathTemplate::compile(HttpMethod::Post, "/echo")?,
            ConstantFactory::new(handler_fn(|_, _, req, resp| {
                if let Some(content_type) = req.content_type() {
                    resp.set_header("Content-Type", content_type);
                }
                resp.write_body(req.body());
                Ok(())
            })),
        )
        .allowed_mime_type("application/json")
        .allowed_mime_type("text/plain")
        .build(),
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
