//! Scheduler (C7).
//!
//! `kernel::scheduled_tasks::start_scheduler` arms one
//! `tokio_cron_scheduler::JobScheduler` with a fixed cron string and
//! never revisits it. This scheduler generalizes that to a full
//! pause/resume/interval-update contract: instead of a cron
//! expression, an interval-driven `tokio::time::interval` loop is
//! armed once and consults a shared, mutex-guarded `SchedulerState` on
//! every tick, so `update_interval`/`pause`/`resume` take effect
//! without tearing down and rebuilding a `JobScheduler`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::model::UserProfileSnapshot;
use crate::orchestrator::{Orchestrator, RunType, TriggerError};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval must be at least 1 minute")]
    TooShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Running,
    Paused,
}

#[derive(Debug, Clone)]
pub struct SchedulerSnapshot {
    pub next_run: Option<DateTime<Utc>>,
    pub interval_minutes: u32,
    pub is_paused: bool,
    pub status: SchedulerStatus,
}

struct SchedulerState {
    interval_minutes: u32,
    pending_interval_minutes: Option<u32>,
    is_paused: bool,
    next_fire: Option<DateTime<Utc>>,
}

/// Owns the periodic trigger for one orchestrator. One instance per
/// process; `start()` spawns its tick loop and returns a handle the
/// caller holds for the process lifetime (mirrors
/// `kernel::scheduled_tasks::start_scheduler`'s `Result<JobScheduler>`
/// return, minus the external crate's own task handle type).
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    profile_provider: Arc<dyn Fn() -> UserProfileSnapshot + Send + Sync>,
    state: Arc<Mutex<SchedulerState>>,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        initial_interval_minutes: u32,
        profile_provider: Arc<dyn Fn() -> UserProfileSnapshot + Send + Sync>,
    ) -> Self {
        Self {
            orchestrator,
            profile_provider,
            state: Arc::new(Mutex::new(SchedulerState {
                interval_minutes: initial_interval_minutes.max(1),
                pending_interval_minutes: None,
                is_paused: false,
                next_fire: None,
            })),
            shutdown: CancellationToken::new(),
        }
    }

    /// Arms the periodic timer with the current interval. Spawns the
    /// tick loop and returns immediately.
    pub fn start(&self) {
        let orchestrator = self.orchestrator.clone();
        let profile_provider = self.profile_provider.clone();
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let interval_minutes = {
                    let mut guard = state.lock().await;
                    if let Some(pending) = guard.pending_interval_minutes.take() {
                        guard.interval_minutes = pending;
                    }
                    guard.next_fire = Some(Utc::now() + chrono::Duration::minutes(guard.interval_minutes as i64));
                    guard.interval_minutes
                };

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(interval_minutes as u64 * 60)) => {}
                }

                if shutdown.is_cancelled() {
                    break;
                }

                let should_fire = !state.lock().await.is_paused;
                if should_fire {
                    let profile = profile_provider();
                    // §4.7: "else skip (no catch-up)" — a `Busy` result
                    // here means the orchestrator is still mid-run from
                    // a manual trigger; the tick is simply dropped.
                    let _ = orchestrator.trigger(RunType::AllCompanies, profile).await;
                }
            }
        });
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Rejects intervals under 1 minute; otherwise takes effect at the
    /// next fire, not the current pending one .
    pub async fn update_interval(&self, new_interval_minutes: u32) -> Result<(), IntervalError> {
        if new_interval_minutes < 1 {
            return Err(IntervalError::TooShort);
        }
        let mut state = self.state.lock().await;
        state.pending_interval_minutes = Some(new_interval_minutes);
        Ok(())
    }

    pub async fn pause(&self) {
        self.state.lock().await.is_paused = true;
    }

    pub async fn resume(&self) {
        self.state.lock().await.is_paused = false;
    }

    /// Bypasses pause but still respects the orchestrator's
    /// idle-only precondition : returns `Busy` the same
    /// way a periodic tick's dropped trigger would, just surfaced to
    /// the caller instead of silently skipped.
    pub async fn trigger_now(
        &self,
        run_type: RunType,
        profile: UserProfileSnapshot,
    ) -> Result<(), TriggerError> {
        self.orchestrator.trigger(run_type, profile).await
    }

    pub async fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.state.lock().await;
        SchedulerSnapshot {
            next_run: state.next_fire,
            interval_minutes: state.pending_interval_minutes.unwrap_or(state.interval_minutes),
            is_paused: state.is_paused,
            status: if state.is_paused {
                SchedulerStatus::Paused
            } else {
                SchedulerStatus::Running
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_interval_rejects_values_under_one_minute() {
        let orchestrator = Arc::new(crate::test_support::blank_orchestrator());
        let scheduler = Scheduler::new(
            orchestrator,
            30,
            Arc::new(|| std::sync::Arc::new(crate::model::UserProfile::default())),
        );
        assert_eq!(scheduler.update_interval(0).await, Err(IntervalError::TooShort));
        assert!(scheduler.update_interval(1).await.is_ok());
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_is_paused() {
        let orchestrator = Arc::new(crate::test_support::blank_orchestrator());
        let scheduler = Scheduler::new(
            orchestrator,
            30,
            Arc::new(|| std::sync::Arc::new(crate::model::UserProfile::default())),
        );
        scheduler.pause().await;
        assert!(scheduler.snapshot().await.is_paused);
        scheduler.resume().await;
        assert!(!scheduler.snapshot().await.is_paused);
    }
}
