//! Telemetry (C8) — per-adapter-kind health classification.
//!
//! `TelemetrySink` is the push side (one event per crawl outcome);
//! `AdapterHealth`/`classify_health` is the pull side, run over a
//! window of `AdapterAggregate` rows from the store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::AdapterKind;
use crate::store::AdapterAggregate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    /// success rate >= 90%
    Healthy,
    /// 70% <= success rate < 90%
    Degraded,
    /// success rate < 70%
    Unhealthy,
    /// no runs in the window
    Unknown,
}

/// Classify a window of runs for one adapter kind 
/// 90%/70% thresholds.
pub fn classify_health(aggregate: &AdapterAggregate) -> AdapterHealth {
    if aggregate.total_runs == 0 {
        return AdapterHealth::Unknown;
    }
    let success_rate = aggregate.success_count as f64 / aggregate.total_runs as f64;
    if success_rate >= 0.90 {
        AdapterHealth::Healthy
    } else if success_rate >= 0.70 {
        AdapterHealth::Degraded
    } else {
        AdapterHealth::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterHealthReport {
    pub adapter_kind: AdapterKind,
    pub health: AdapterHealth,
    pub total_runs: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub average_duration_seconds: f64,
}

pub fn build_health_report(aggregate: &AdapterAggregate) -> AdapterHealthReport {
    let average_duration_seconds = if aggregate.total_runs > 0 {
        aggregate.total_duration_seconds / aggregate.total_runs as f64
    } else {
        0.0
    };
    AdapterHealthReport {
        adapter_kind: aggregate.adapter_kind,
        health: classify_health(aggregate),
        total_runs: aggregate.total_runs,
        success_count: aggregate.success_count,
        error_count: aggregate.error_count,
        average_duration_seconds,
    }
}

/// One crawl-cycle event, as emitted by the orchestrator. A `TelemetrySink`
/// fans these out to logs/metrics backends; the default implementation
/// just logs via `tracing`, matching how this workspace treats telemetry
/// as an ambient concern rather than a first-class domain object.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    CompanyCrawlStarted {
        company_id: uuid::Uuid,
        adapter_kind: AdapterKind,
    },
    CompanyCrawlCompleted {
        company_id: uuid::Uuid,
        adapter_kind: AdapterKind,
        jobs_found: usize,
        duration_seconds: f64,
    },
    CompanyCrawlFailed {
        company_id: uuid::Uuid,
        adapter_kind: AdapterKind,
        error: String,
    },
    RunStarted {
        company_count: usize,
    },
    RunCompleted {
        companies_crawled: usize,
        jobs_discovered: usize,
        duration_seconds: f64,
    },
    RunCancelled {
        companies_remaining: usize,
    },
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, event: TelemetryEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

#[async_trait]
impl TelemetrySink for TracingTelemetrySink {
    async fn record(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::CompanyCrawlStarted { company_id, adapter_kind } => {
                tracing::debug!(%company_id, ?adapter_kind, "company crawl started");
            }
            TelemetryEvent::CompanyCrawlCompleted {
                company_id,
                adapter_kind,
                jobs_found,
                duration_seconds,
            } => {
                tracing::info!(%company_id, ?adapter_kind, jobs_found, duration_seconds, "company crawl completed");
            }
            TelemetryEvent::CompanyCrawlFailed {
                company_id,
                adapter_kind,
                error,
            } => {
                tracing::warn!(%company_id, ?adapter_kind, %error, "company crawl failed");
            }
            TelemetryEvent::RunStarted { company_count } => {
                tracing::info!(company_count, "crawl run started");
            }
            TelemetryEvent::RunCompleted {
                companies_crawled,
                jobs_discovered,
                duration_seconds,
            } => {
                tracing::info!(companies_crawled, jobs_discovered, duration_seconds, "crawl run completed");
            }
            TelemetryEvent::RunCancelled { companies_remaining } => {
                tracing::warn!(companies_remaining, "crawl run cancelled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(total: u64, success: u64, error: u64) -> AdapterAggregate {
        AdapterAggregate {
            adapter_kind: AdapterKind::StructuredA,
            total_runs: total,
            error_count: error,
            success_count: success,
            total_duration_seconds: (total as f64) * 2.0,
        }
    }

    #[test]
    fn healthy_at_or_above_90_percent() {
        assert_eq!(classify_health(&aggregate(10, 9, 1)), AdapterHealth::Healthy);
        assert_eq!(classify_health(&aggregate(10, 10, 0)), AdapterHealth::Healthy);
    }

    #[test]
    fn degraded_between_70_and_90_percent() {
        assert_eq!(classify_health(&aggregate(10, 7, 3)), AdapterHealth::Degraded);
        assert_eq!(classify_health(&aggregate(10, 8, 2)), AdapterHealth::Degraded);
    }

    #[test]
    fn unhealthy_below_70_percent() {
        assert_eq!(classify_health(&aggregate(10, 6, 4)), AdapterHealth::Unhealthy);
    }

    #[test]
    fn unknown_with_no_runs() {
        assert_eq!(classify_health(&aggregate(0, 0, 0)), AdapterHealth::Unknown);
    }

    #[test]
    fn health_report_averages_duration() {
        let report = build_health_report(&aggregate(10, 10, 0));
        assert_eq!(report.average_duration_seconds, 2.0);
    }
}
