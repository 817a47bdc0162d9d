//! Minimal operator-facing status/health surface (SPEC_FULL.md §2
//! "added" layer). Not the full REST API — that remains a Non-goal —
//! just enough of a shim that the process is observable, wired the
//! way `server::server::app::build_app` hands `axum` a small router
//! over shared state.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

use crawl_core::model::{AdapterKind, CrawlLogStatus, UserProfileSnapshot};
use crawl_core::orchestrator::{Orchestrator, RunType};
use crawl_core::scheduler::Scheduler;
use crawl_core::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn JobStore>,
    pub profile_provider: Arc<dyn Fn() -> UserProfileSnapshot + Send + Sync>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct StatusResponse {
    is_running: bool,
    processed: usize,
    total: usize,
    current_company: Option<String>,
    eta_seconds: Option<f64>,
    scheduler_next_run: Option<DateTime<Utc>>,
    scheduler_interval_minutes: u32,
    scheduler_paused: bool,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let orchestrator_status = state.orchestrator.status().await;
    let scheduler_snapshot = state.scheduler.snapshot().await;

    Json(StatusResponse {
        is_running: orchestrator_status.is_running,
        processed: orchestrator_status.processed,
        total: orchestrator_status.total,
        current_company: orchestrator_status.current_company,
        eta_seconds: orchestrator_status.eta_seconds,
        scheduler_next_run: scheduler_snapshot.next_run,
        scheduler_interval_minutes: scheduler_snapshot.interval_minutes,
        scheduler_paused: scheduler_snapshot.is_paused,
    })
}

#[derive(Serialize)]
struct RecentLogEntry {
    company_id: Option<uuid::Uuid>,
    adapter_kind: Option<AdapterKind>,
    status: CrawlLogStatus,
    jobs_found: i32,
    started_at: DateTime<Utc>,
}

async fn recent_logs(State(state): State<AppState>) -> Json<Vec<RecentLogEntry>> {
    let since = Utc::now() - ChronoDuration::hours(24);
    let logs = state.store.recent_logs(since, 20).await.unwrap_or_default();
    Json(
        logs.into_iter()
            .map(|l| RecentLogEntry {
                company_id: l.company_id,
                adapter_kind: l.adapter_kind,
                status: l.status,
                jobs_found: l.jobs_found,
                started_at: l.started_at,
            })
            .collect(),
    )
}

async fn trigger(State(state): State<AppState>) -> Json<serde_json::Value> {
    let profile = (state.profile_provider)();
    match state.scheduler.trigger_now(RunType::AllCompanies, profile).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })),
        Err(_busy) => Json(serde_json::json!({ "ok": false, "error": "busy" })),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/recent-logs", get(recent_logs))
        .route("/trigger", post(trigger))
        .with_state(state)
}
