use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::method::HttpMethod;
use crate::http::server::AppState;
use crate::invoker::statistics::StatisticsSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub routes: usize,
    pub invocations: u64,
    pub long_running_limit_ms: i64,
}

#[derive(Serialize)]
pub struct RouteSummary {
    pub method: HttpMethod,
    pub template: String,
    pub required_headers: Vec<String>,
    pub required_params: Vec<String>,
    pub allowed_mime_types: Vec<String>,
    pub has_exception_mapper: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let context = state.pipeline.context();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routes: state.registry.len(),
        invocations: context.statistics().invocations(),
        long_running_limit_ms: context.callbacks().long_running_limit_ms(),
    })
}

pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<RouteSummary>> {
    let routes = state
        .registry
        .descriptors()
        .iter()
        .map(|d| RouteSummary {
            method: d.method(),
            template: d.template().to_string(),
            required_headers: d.required_headers(),
            required_params: d.required_params(),
            allowed_mime_types: d.allowed_mime_types(),
            has_exception_mapper: d.exception_mapper().is_some(),
        })
        .collect();
    Json(routes)
}

pub async fn get_statistics(State(state): State<AppState>) -> Json<StatisticsSnapshot> {
    Json(state.pipeline.context().statistics().snapshot())
}
