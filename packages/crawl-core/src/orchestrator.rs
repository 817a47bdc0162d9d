//! Orchestrator (C6) — the crawl state machine.
//!
//! Grounded in two places in this workspace: `kernel::simple_scraper`'s
//! `Arc<Semaphore>` + `tokio::spawn`-per-unit worker pool, and
//! `kernel::jobs::worker::JobWorker`'s `CancellationToken`-based
//! cooperative shutdown. The ranker stage is a second worker pool
//! downstream of the crawl workers, connected by a bounded
//! `tokio::sync::mpsc` channel to apply backpressure.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::adapter::ListAdapter;
use crate::clock::Clock;
use crate::config::OrchestratorConfig;
use crate::fetcher::HttpFetcher;
use crate::model::{AdapterKind, Company, CrawlLogStatus, UserProfileSnapshot};
use crate::normalize;
use crate::ranker::Ranker;
use crate::store::{EmptyStreakUpdate, JobStore, StoreError, UpsertAction};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Paused,
    Cancelling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunType {
    AllCompanies,
    Search(Vec<Uuid>),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TriggerError {
    #[error("orchestrator is not idle")]
    Busy,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    #[error("orchestrator has no run in progress")]
    NotRunning,
}

struct RunProgress {
    run_type: RunType,
    total: usize,
    processed: usize,
    current_company_name: Option<String>,
    started_at: DateTime<Utc>,
    durations: VecDeque<f64>,
}

impl RunProgress {
    fn new(run_type: RunType, started_at: DateTime<Utc>) -> Self {
        Self {
            run_type,
            total: 0,
            processed: 0,
            current_company_name: None,
            started_at,
            durations: VecDeque::new(),
        }
    }

    fn record_duration(&mut self, seconds: f64, window: usize) {
        self.durations.push_back(seconds);
        while self.durations.len() > window {
            self.durations.pop_front();
        }
    }

    /// Rolling-mean ETA : null until at least 2 samples.
    fn eta_seconds(&self) -> Option<f64> {
        if self.durations.len() < 2 {
            return None;
        }
        let mean = self.durations.iter().sum::<f64>() / self.durations.len() as f64;
        let remaining = self.total.saturating_sub(self.processed);
        Some(mean * remaining as f64)
    }
}

struct RunState {
    phase: RunPhase,
    progress: Option<RunProgress>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            progress: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorStatus {
    pub is_running: bool,
    pub run_type: Option<RunType>,
    pub processed: usize,
    pub total: usize,
    pub current_company: Option<String>,
    pub eta_seconds: Option<f64>,
}

enum CompanyCrawlOutcome {
    /// Cancellation was observed before the crawl log was even opened;
    /// this company was never started.
    NotStarted,
    Completed { jobs_found: usize },
    Failed { error: String },
}

/// One job handed from a crawl worker to the ranker stage.
struct RankTask {
    job_id: Uuid,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    fetcher: Arc<dyn HttpFetcher>,
    adapters: HashMap<AdapterKind, Arc<dyn ListAdapter>>,
    ranker: Arc<dyn Ranker>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySink>,
    config: OrchestratorConfig,
    state: Arc<Mutex<RunState>>,
    cancel_token: Arc<Mutex<Option<CancellationToken>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<dyn HttpFetcher>,
        adapters: HashMap<AdapterKind, Arc<dyn ListAdapter>>,
        ranker: Arc<dyn Ranker>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            adapters,
            ranker,
            clock,
            telemetry,
            config,
            state: Arc::new(Mutex::new(RunState::default())),
            cancel_token: Arc::new(Mutex::new(None)),
        }
    }

    /// Triggers a run. Returns `Busy` immediately if a run is already
    /// in progress; otherwise arms the run state and spawns it,
    /// returning without waiting for completion.
    pub async fn trigger(
        &self,
        run_type: RunType,
        profile: UserProfileSnapshot,
    ) -> Result<(), TriggerError> {
        {
            let mut state = self.state.lock().await;
            if !matches!(state.phase, RunPhase::Idle) {
                return Err(TriggerError::Busy);
            }
            state.phase = RunPhase::Running;
            state.progress = Some(RunProgress::new(run_type.clone(), self.clock.now()));
        }

        let cancel_token = CancellationToken::new();
        *self.cancel_token.lock().await = Some(cancel_token.clone());

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run(run_type, profile, cancel_token).await;
        });

        Ok(())
    }

    pub async fn cancel(&self) -> Result<(), CancelError> {
        let mut state = self.state.lock().await;
        if !matches!(state.phase, RunPhase::Running) {
            return Err(CancelError::NotRunning);
        }
        state.phase = RunPhase::Cancelling;
        drop(state);

        if let Some(token) = self.cancel_token.lock().await.as_ref() {
            token.cancel();
        }
        Ok(())
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let state = self.state.lock().await;
        match &state.progress {
            Some(progress) => OrchestratorStatus {
                is_running: matches!(state.phase, RunPhase::Running | RunPhase::Cancelling),
                run_type: Some(progress.run_type.clone()),
                processed: progress.processed,
                total: progress.total,
                current_company: progress.current_company_name.clone(),
                eta_seconds: progress.eta_seconds(),
            },
            None => OrchestratorStatus {
                is_running: false,
                run_type: None,
                processed: 0,
                total: 0,
                current_company: None,
                eta_seconds: None,
            },
        }
    }

    async fn build_queue(&self, run_type: &RunType) -> Result<Vec<Company>, StoreError> {
        match run_type {
            RunType::AllCompanies => self.store.list_active_companies().await,
            RunType::Search(ids) => {
                let mut companies = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(company) = self.store.get_company(*id).await? {
                        if company.is_schedulable() {
                            companies.push(company);
                        }
                    }
                }
                Ok(companies)
            }
        }
    }

    async fn set_current_company(&self, name: Option<String>) {
        let mut state = self.state.lock().await;
        if let Some(progress) = state.progress.as_mut() {
            progress.current_company_name = name;
        }
    }

    async fn record_company_finished(&self, duration_seconds: f64) {
        let mut state = self.state.lock().await;
        if let Some(progress) = state.progress.as_mut() {
            progress.processed += 1;
            progress.current_company_name = None;
            progress.record_duration(duration_seconds, self.config.eta_window);
        }
    }

    async fn abort_run(&self, error: StoreError) {
        tracing::error!(%error, "orchestrator run aborted: store unavailable");
        if let Ok(log_id) = self.store.open_crawl_log(None, None).await {
            let _ = self
                .store
                .close_crawl_log(log_id, CrawlLogStatus::Failed, 0, Some(error.to_string()))
                .await;
        }
        let mut state = self.state.lock().await;
        state.phase = RunPhase::Idle;
        state.progress = None;
        drop(state);
        *self.cancel_token.lock().await = None;
    }

    /// Runs the crawl-then-rank pipeline end to end. Public so tests
    /// can await it directly instead of going through `trigger`'s spawn.
    pub async fn run(&self, run_type: RunType, profile: UserProfileSnapshot, cancel_token: CancellationToken) {
        let run_start = self.clock.now();

        let queue = match self.build_queue(&run_type).await {
            Ok(queue) => queue,
            Err(e) => {
                self.abort_run(e).await;
                return;
            }
        };

        let total = queue.len();
        self.telemetry
            .record(TelemetryEvent::RunStarted { company_count: total })
            .await;
        {
            let mut state = self.state.lock().await;
            if let Some(progress) = state.progress.as_mut() {
                progress.total = total;
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_company_crawls.max(1)));
        let channel_capacity = total.saturating_mul(2).max(1);
        let (tx, rx) = mpsc::channel::<RankTask>(channel_capacity);
        let jobs_discovered = Arc::new(AtomicUsize::new(0));

        let ranker_handle = tokio::spawn(run_ranker_stage(
            rx,
            self.ranker.clone(),
            self.store.clone(),
            self.telemetry.clone(),
            profile,
            self.config.ranker_parallelism.max(1),
        ));

        let mut worker_handles = Vec::with_capacity(queue.len());

        for company in queue {
            if cancel_token.is_cancelled() {
                break;
            }
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            self.set_current_company(Some(company.name.clone())).await;

            let orchestrator = self.clone();
            let tx = tx.clone();
            let cancel_token = cancel_token.clone();
            let jobs_discovered = jobs_discovered.clone();

            worker_handles.push(tokio::spawn(async move {
                orchestrator
                    .run_company_worker(company, permit, tx, cancel_token, jobs_discovered)
                    .await;
            }));
        }
        drop(tx);

        for handle in worker_handles {
            let _ = handle.await;
        }
        let _ = ranker_handle.await;

        let was_cancelled = cancel_token.is_cancelled();
        let (processed, final_total) = {
            let state = self.state.lock().await;
            state
                .progress
                .as_ref()
                .map(|p| (p.processed, p.total))
                .unwrap_or((0, 0))
        };

        {
            let mut state = self.state.lock().await;
            state.phase = RunPhase::Idle;
            state.progress = None;
        }
        *self.cancel_token.lock().await = None;

        let duration_seconds = (self.clock.now() - run_start).num_milliseconds() as f64 / 1000.0;
        if was_cancelled {
            self.telemetry
                .record(TelemetryEvent::RunCancelled {
                    companies_remaining: final_total.saturating_sub(processed),
                })
                .await;
        } else {
            self.telemetry
                .record(TelemetryEvent::RunCompleted {
                    companies_crawled: processed,
                    jobs_discovered: jobs_discovered.load(Ordering::Relaxed),
                    duration_seconds,
                })
                .await;
        }
    }

    async fn run_company_worker(
        &self,
        company: Company,
        _permit: OwnedSemaphorePermit,
        tx: mpsc::Sender<RankTask>,
        cancel_token: CancellationToken,
        jobs_discovered: Arc<AtomicUsize>,
    ) {
        let company_start = self.clock.now();
        let outcome = self.crawl_one_company(&company, &tx, &cancel_token).await;
        let duration_seconds = (self.clock.now() - company_start).num_milliseconds() as f64 / 1000.0;

        match outcome {
            CompanyCrawlOutcome::NotStarted => {}
            CompanyCrawlOutcome::Completed { jobs_found } => {
                jobs_discovered.fetch_add(jobs_found, Ordering::Relaxed);
                self.telemetry
                    .record(TelemetryEvent::CompanyCrawlCompleted {
                        company_id: company.id,
                        adapter_kind: company.adapter_kind,
                        jobs_found,
                        duration_seconds,
                    })
                    .await;
            }
            CompanyCrawlOutcome::Failed { error } => {
                self.telemetry
                    .record(TelemetryEvent::CompanyCrawlFailed {
                        company_id: company.id,
                        adapter_kind: company.adapter_kind,
                        error,
                    })
                    .await;
            }
        }

        self.record_company_finished(duration_seconds).await;
    }

    /// Steps 3a-3g of `run()`: open the log, call the adapter, upsert
    /// each posting, hand changed ids to the ranker, close the log.
    async fn crawl_one_company(
        &self,
        company: &Company,
        tx: &mpsc::Sender<RankTask>,
        cancel_token: &CancellationToken,
    ) -> CompanyCrawlOutcome {
        if cancel_token.is_cancelled() {
            return CompanyCrawlOutcome::NotStarted;
        }

        let log_id = match self
            .store
            .open_crawl_log(Some(company.id), Some(company.adapter_kind))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                return CompanyCrawlOutcome::Failed {
                    error: format!("failed to open crawl log: {e}"),
                };
            }
        };

        let adapter = match self.adapters.get(&company.adapter_kind) {
            Some(adapter) => adapter.clone(),
            None => {
                let message = format!("no adapter registered for {:?}", company.adapter_kind);
                let _ = self
                    .store
                    .close_crawl_log(log_id, CrawlLogStatus::Failed, 0, Some(message.clone()))
                    .await;
                let _ = self
                    .store
                    .update_company_stats(company.id, 0, self.clock.now(), EmptyStreakUpdate::Unchanged)
                    .await;
                return CompanyCrawlOutcome::Failed { error: message };
            }
        };

        let postings = match adapter.list_jobs(company, self.fetcher.as_ref()).await {
            Ok(postings) => postings,
            Err(e) => {
                let message = e.to_string();
                let _ = self
                    .store
                    .close_crawl_log(log_id, CrawlLogStatus::Failed, 0, Some(message.clone()))
                    .await;
                let _ = self
                    .store
                    .update_company_stats(company.id, 0, self.clock.now(), EmptyStreakUpdate::Unchanged)
                    .await;
                return CompanyCrawlOutcome::Failed { error: message };
            }
        };

        let mut jobs_found = 0usize;
        let mut saw_cancellation_before_insert = false;

        for raw in &postings {
            if cancel_token.is_cancelled() && jobs_found == 0 {
                saw_cancellation_before_insert = true;
            }

            let Some(normalized) = normalize::normalize(raw, self.config.max_description_chars) else {
                continue;
            };

            let outcome = match self.store.upsert_job(&normalized, company.id).await {
                Ok(outcome) => outcome,
                Err(_first_err) => match self.store.upsert_job(&normalized, company.id).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let message = format!("job store write failed twice: {e}");
                        let _ = self
                            .store
                            .close_crawl_log(log_id, CrawlLogStatus::Failed, jobs_found as i32, Some(message.clone()))
                            .await;
                        let _ = self
                            .store
                            .update_company_stats(company.id, 0, self.clock.now(), EmptyStreakUpdate::Unchanged)
                            .await;
                        return CompanyCrawlOutcome::Failed { error: message };
                    }
                },
            };

            if matches!(outcome.action, UpsertAction::Inserted | UpsertAction::Updated) {
                jobs_found += 1;
                let _ = tx.send(RankTask { job_id: outcome.job_id }).await;
            }
        }

        let log_status = if saw_cancellation_before_insert && jobs_found == 0 {
            CrawlLogStatus::Cancelled
        } else {
            CrawlLogStatus::Completed
        };

        let _ = self
            .store
            .close_crawl_log(log_id, log_status, jobs_found as i32, None)
            .await;

        let empty_streak = if jobs_found == 0 {
            EmptyStreakUpdate::Increment
        } else {
            EmptyStreakUpdate::Reset
        };
        let _ = self
            .store
            .update_company_stats(company.id, jobs_found as i64, self.clock.now(), empty_streak)
            .await;

        CompanyCrawlOutcome::Completed { jobs_found }
    }
}

/// The ranker stage of the pipeline : pulls ids
/// off the bounded channel and annotates with `ranker_parallelism`
/// concurrent calls, draining until the crawl workers have all
/// finished and closed their sender handles.
async fn run_ranker_stage(
    mut rx: mpsc::Receiver<RankTask>,
    ranker: Arc<dyn Ranker>,
    store: Arc<dyn JobStore>,
    telemetry: Arc<dyn TelemetrySink>,
    profile: UserProfileSnapshot,
    parallelism: usize,
) {
    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut handles = Vec::new();

    while let Some(task) = rx.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let ranker = ranker.clone();
        let store = store.clone();
        let telemetry = telemetry.clone();
        let profile = profile.clone();

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            rank_and_annotate(task.job_id, ranker, store, telemetry, profile).await;
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

async fn rank_and_annotate(
    job_id: Uuid,
    ranker: Arc<dyn Ranker>,
    store: Arc<dyn JobStore>,
    telemetry: Arc<dyn TelemetrySink>,
    profile: UserProfileSnapshot,
) {
    let job = match store.get_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::warn!(%job_id, "ranker stage could not find job to annotate");
            return;
        }
        Err(e) => {
            tracing::warn!(%job_id, %e, "ranker stage failed to load job");
            return;
        }
    };

    let mut annotation = ranker.rank(&profile, &job).await;
    annotation.enforce_invariant();

    if let Err(e) = store.annotate_job_ai(job_id, &annotation).await {
        tracing::warn!(%job_id, %e, "failed to persist ranker annotation");
        let _ = telemetry; // telemetry hook reserved for a ranker-error metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::test_util::{FailingAdapter, FixedAdapter};
    use crate::clock::test_util::FixedClock;
    use crate::fetcher::test_util::ScriptedFetcher;
    use crate::model::{AiAnnotation, UserProfile};
    use crate::ranker::test_util::FixedRanker;
    use crate::store::test_util::InMemoryJobStore;
    use crate::telemetry::TracingTelemetrySink;

    fn company(id: Uuid, name: &str, kind: AdapterKind) -> Company {
        Company {
            id,
            name: name.to_string(),
            career_endpoint: format!("https://{name}.example.com/careers"),
            adapter_kind: kind,
            active: true,
            last_crawled_at: None,
            consecutive_empty_crawls: 0,
            jobs_found_total: 0,
            viability_score: None,
        }
    }

    fn posting(url: &str, title: &str) -> crate::model::PostingRaw {
        crate::model::PostingRaw {
            external_id: None,
            title: Some(title.to_string()),
            location: None,
            url: Some(url.to_string()),
            description: Some("Build things.".to_string()),
            posted_at: None,
        }
    }

    fn test_orchestrator(
        store: Arc<InMemoryJobStore>,
        adapters: HashMap<AdapterKind, Arc<dyn ListAdapter>>,
        ranker: Arc<dyn Ranker>,
    ) -> Orchestrator {
        Orchestrator::new(
            store,
            Arc::new(ScriptedFetcher::new()),
            adapters,
            ranker,
            Arc::new(FixedClock::at(Utc::now())),
            Arc::new(TracingTelemetrySink),
            OrchestratorConfig::default(),
        )
    }

    #[tokio::test]
    async fn happy_path_inserts_and_ranks_every_posting() {
        let store = Arc::new(InMemoryJobStore::new());
        let company_a = company(Uuid::new_v4(), "alpha", AdapterKind::StructuredA);
        let company_b = company(Uuid::new_v4(), "beta", AdapterKind::StructuredB);
        store.seed_company(company_a.clone());
        store.seed_company(company_b.clone());

        let mut adapters: HashMap<AdapterKind, Arc<dyn ListAdapter>> = HashMap::new();
        adapters.insert(
            AdapterKind::StructuredA,
            Arc::new(FixedAdapter::new(vec![
                posting("https://alpha.example.com/jobs/1", "Engineer"),
                posting("https://alpha.example.com/jobs/2", "Designer"),
            ])),
        );
        adapters.insert(
            AdapterKind::StructuredB,
            Arc::new(FixedAdapter::new(vec![posting(
                "https://beta.example.com/jobs/1",
                "Analyst",
            )])),
        );

        let orchestrator = test_orchestrator(store.clone(), adapters, Arc::new(FixedRanker::recommended(80)));
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());
        let token = CancellationToken::new();

        orchestrator.run(RunType::AllCompanies, profile, token).await;

        assert_eq!(store.job_count(), 3);
        assert_eq!(store.jobs_for_company(company_a.id).len(), 2);
        assert_eq!(store.jobs_for_company(company_b.id).len(), 1);

        let status = orchestrator.status().await;
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn second_run_with_unchanged_source_yields_zero_inserts() {
        let store = Arc::new(InMemoryJobStore::new());
        let company_a = company(Uuid::new_v4(), "alpha", AdapterKind::StructuredA);
        store.seed_company(company_a.clone());

        let mut adapters: HashMap<AdapterKind, Arc<dyn ListAdapter>> = HashMap::new();
        adapters.insert(
            AdapterKind::StructuredA,
            Arc::new(FixedAdapter::new(vec![posting(
                "https://alpha.example.com/jobs/1",
                "Engineer",
            )])),
        );

        let orchestrator = test_orchestrator(store.clone(), adapters, Arc::new(FixedRanker::recommended(80)));
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());

        orchestrator
            .run(RunType::AllCompanies, profile.clone(), CancellationToken::new())
            .await;
        assert_eq!(store.job_count(), 1);

        orchestrator
            .run(RunType::AllCompanies, profile, CancellationToken::new())
            .await;
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn adapter_failure_does_not_fail_the_run() {
        let store = Arc::new(InMemoryJobStore::new());
        let failing = company(Uuid::new_v4(), "broken", AdapterKind::AiParsed);
        let healthy = company(Uuid::new_v4(), "healthy", AdapterKind::StructuredB);
        store.seed_company(failing.clone());
        store.seed_company(healthy.clone());

        let mut adapters: HashMap<AdapterKind, Arc<dyn ListAdapter>> = HashMap::new();
        adapters.insert(AdapterKind::AiParsed, Arc::new(FailingAdapter::new("boom")));
        adapters.insert(
            AdapterKind::StructuredB,
            Arc::new(FixedAdapter::new(vec![posting(
                "https://healthy.example.com/jobs/1",
                "Engineer",
            )])),
        );

        let orchestrator = test_orchestrator(store.clone(), adapters, Arc::new(FixedRanker::recommended(80)));
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());

        orchestrator
            .run(RunType::AllCompanies, profile, CancellationToken::new())
            .await;

        assert_eq!(store.job_count(), 1);
        let status = orchestrator.status().await;
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn trigger_returns_busy_while_a_run_is_in_progress() {
        let store = Arc::new(InMemoryJobStore::new());
        let slow = company(Uuid::new_v4(), "slow", AdapterKind::StructuredA);
        store.seed_company(slow);

        let mut adapters: HashMap<AdapterKind, Arc<dyn ListAdapter>> = HashMap::new();
        adapters.insert(AdapterKind::StructuredA, Arc::new(FixedAdapter::new(vec![])));

        let orchestrator = test_orchestrator(store, adapters, Arc::new(FixedRanker::recommended(80)));
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());

        orchestrator.trigger(RunType::AllCompanies, profile.clone()).await.unwrap();
        let second = orchestrator.trigger(RunType::AllCompanies, profile).await;
        assert_eq!(second, Err(TriggerError::Busy));
    }

    #[tokio::test]
    async fn cancel_mid_run_lets_the_in_flight_company_finish_but_skips_the_rest() {
        use crate::adapter::test_util::SlowAdapter;
        use std::time::Duration;

        let store = Arc::new(InMemoryJobStore::new());
        let first = company(Uuid::new_v4(), "first", AdapterKind::StructuredA);
        let second = company(Uuid::new_v4(), "second", AdapterKind::StructuredB);
        store.seed_company(first.clone());
        store.seed_company(second.clone());

        let mut adapters: HashMap<AdapterKind, Arc<dyn ListAdapter>> = HashMap::new();
        adapters.insert(
            AdapterKind::StructuredA,
            Arc::new(SlowAdapter::new(
                Duration::from_millis(150),
                vec![posting("https://first.example.com/jobs/1", "Engineer")],
            )),
        );
        adapters.insert(
            AdapterKind::StructuredB,
            Arc::new(FixedAdapter::new(vec![posting(
                "https://second.example.com/jobs/1",
                "Designer",
            )])),
        );

        let mut config = OrchestratorConfig::default();
        // One company at a time, so the queue loop's cancellation check
        // between companies is what's under test, not semaphore timing.
        config.max_concurrent_company_crawls = 1;

        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(ScriptedFetcher::new()),
            adapters,
            Arc::new(FixedRanker::recommended(80)),
            Arc::new(FixedClock::at(Utc::now())),
            Arc::new(TracingTelemetrySink),
            config,
        );

        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());
        let token = CancellationToken::new();

        let run_handle = tokio::spawn({
            let orchestrator = orchestrator.clone();
            let token = token.clone();
            async move {
                orchestrator.run(RunType::AllCompanies, profile, token).await;
            }
        });

        // "first" is mid-sleep when this fires; the queue loop has not
        // yet reached "second".
        tokio::time::sleep(Duration::from_millis(40)).await;
        token.cancel();
        run_handle.await.unwrap();

        assert_eq!(store.jobs_for_company(first.id).len(), 1);
        assert!(store.jobs_for_company(second.id).is_empty());
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn cancel_without_a_run_returns_not_running() {
        let store = Arc::new(InMemoryJobStore::new());
        let orchestrator = test_orchestrator(store, HashMap::new(), Arc::new(FixedRanker::new(AiAnnotation::default())));
        assert_eq!(orchestrator.cancel().await, Err(CancelError::NotRunning));
    }

    #[test]
    fn eta_is_null_before_two_samples() {
        let mut progress = RunProgress::new(RunType::AllCompanies, Utc::now());
        progress.total = 10;
        assert_eq!(progress.eta_seconds(), None);
        progress.record_duration(2.0, 10);
        assert_eq!(progress.eta_seconds(), None);
        progress.record_duration(4.0, 10);
        progress.processed = 2;
        assert_eq!(progress.eta_seconds(), Some(3.0 * 8.0));
    }

    #[test]
    fn eta_window_caps_rolling_durations() {
        let mut progress = RunProgress::new(RunType::AllCompanies, Utc::now());
        for i in 0..20 {
            progress.record_duration(i as f64, 10);
        }
        assert_eq!(progress.durations.len(), 10);
    }
}
