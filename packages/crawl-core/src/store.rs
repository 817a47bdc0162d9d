//! Job Store contract (C3).
//!
//! Shaped after `intelligent_crawler::traits::CrawlerStorage`: one
//! async trait, explicit methods per entity, no lazy relations, an
//! associated error type. Unlike `CrawlerStorage` this trait is not
//! generic over id types — there is exactly one production
//! implementation (`crawl-store-postgres`), so ids are concrete `Uuid`s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{AdapterKind, AiAnnotation, Company, CrawlLog, CrawlLogStatus, Job, PostingNormalized};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness race on upsert; the caller re-reads and treats the
    /// row as `unchanged`  — this variant is recovered
    /// locally and should not usually escape the store implementation.
    #[error("store conflict: {0}")]
    Conflict(String),

    /// The store could not be reached at all. Fatal for the run that
    /// observes it : the orchestrator aborts to `idle`.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy)]
pub struct UpsertOutcome {
    pub action: UpsertAction,
    pub job_id: Uuid,
}

/// How a crawl outcome affects `Company.consecutive_empty_crawls`:
/// success with postings resets the streak,
/// success with zero postings increments it, and a failed crawl
/// leaves it untouched (only `last_crawled_at` moves).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyStreakUpdate {
    Reset,
    Increment,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct AdapterAggregate {
    pub adapter_kind: AdapterKind,
    pub total_runs: u64,
    pub error_count: u64,
    pub success_count: u64,
    pub total_duration_seconds: f64,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Active companies ordered by `last_crawled_at` ascending, nulls
    /// first .
    async fn list_active_companies(&self) -> Result<Vec<Company>, StoreError>;

    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, StoreError>;

    /// Insert-or-update a normalized posting. Uniqueness is by
    /// `(company_id, external_id)` when present, else
    /// `(company_id, canonical_url)`; on a match, mutable fields
    /// refresh only if changed and `discovered_at` is preserved.
    async fn upsert_job(
        &self,
        posting: &PostingNormalized,
        company_id: Uuid,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Atomic replace of all AI fields for one job .
    async fn annotate_job_ai(&self, job_id: Uuid, ai: &AiAnnotation) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    async fn open_crawl_log(
        &self,
        company_id: Option<Uuid>,
        adapter_kind: Option<AdapterKind>,
    ) -> Result<Uuid, StoreError>;

    async fn close_crawl_log(
        &self,
        log_id: Uuid,
        status: CrawlLogStatus,
        jobs_found: i32,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    async fn update_company_stats(
        &self,
        company_id: Uuid,
        jobs_found_delta: i64,
        crawled_at: DateTime<Utc>,
        empty_streak: EmptyStreakUpdate,
    ) -> Result<(), StoreError>;

    async fn recent_logs(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<CrawlLog>, StoreError>;

    async fn aggregate_by_adapter_kind(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AdapterAggregate>, StoreError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    //! An in-memory `JobStore` double, in the shape of
    //! `kernel::jobs::manager::TestJobManager`: plain `RwLock`-guarded
    //! maps, inspectable from tests, no I/O.

    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryJobStore {
        companies: RwLock<HashMap<Uuid, Company>>,
        jobs: RwLock<HashMap<Uuid, Job>>,
        /// dedupe key -> job id, mirrors the unique index the Postgres
        /// implementation enforces at the database level.
        dedupe_index: RwLock<HashMap<String, Uuid>>,
        logs: RwLock<HashMap<Uuid, CrawlLog>>,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_company(&self, company: Company) {
            self.companies
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(company.id, company);
        }

        pub fn jobs_for_company(&self, company_id: Uuid) -> Vec<Job> {
            self.jobs
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .filter(|j| j.company_id == company_id)
                .cloned()
                .collect()
        }

        pub fn job_count(&self) -> usize {
            self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
        }

        pub fn log(&self, log_id: Uuid) -> Option<CrawlLog> {
            self.logs
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&log_id)
                .cloned()
        }

        pub fn running_logs_for_company(&self, company_id: Uuid) -> usize {
            self.logs
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .filter(|l| l.company_id == Some(company_id) && l.status == CrawlLogStatus::Running)
                .count()
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn list_active_companies(&self) -> Result<Vec<Company>, StoreError> {
            let mut companies: Vec<Company> = self
                .companies
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .filter(|c| c.active)
                .cloned()
                .collect();
            companies.sort_by(|a, b| match (a.last_crawled_at, b.last_crawled_at) {
                (None, None) => a.id.cmp(&b.id),
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
            });
            Ok(companies)
        }

        async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, StoreError> {
            Ok(self
                .companies
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&company_id)
                .cloned())
        }

        async fn upsert_job(
            &self,
            posting: &PostingNormalized,
            company_id: Uuid,
        ) -> Result<UpsertOutcome, StoreError> {
            let key = Job::dedupe_key(
                company_id,
                posting.external_id.as_deref(),
                &posting.canonical_url,
            );

            let mut dedupe_index = self.dedupe_index.write().unwrap_or_else(|e| e.into_inner());
            let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());

            if let Some(existing_id) = dedupe_index.get(&key).copied() {
                let job = jobs.get_mut(&existing_id).expect("dedupe index out of sync");
                let changed = job.title != posting.title
                    || job.location != posting.location
                    || job.description != posting.description
                    || job.posted_at != posting.posted_at
                    || job.canonical_url != posting.canonical_url;

                if changed {
                    job.title = posting.title.clone();
                    job.location = posting.location.clone();
                    job.description = posting.description.clone();
                    job.posted_at = posting.posted_at;
                    job.canonical_url = posting.canonical_url.clone();
                    return Ok(UpsertOutcome {
                        action: UpsertAction::Updated,
                        job_id: existing_id,
                    });
                }
                return Ok(UpsertOutcome {
                    action: UpsertAction::Unchanged,
                    job_id: existing_id,
                });
            }

            let job_id = Uuid::new_v4();
            let job = Job {
                id: job_id,
                company_id,
                external_id: posting.external_id.clone(),
                canonical_url: posting.canonical_url.clone(),
                title: posting.title.clone(),
                location: posting.location.clone(),
                description: posting.description.clone(),
                posted_at: posting.posted_at,
                discovered_at: Utc::now(),
                status: Default::default(),
                stage: Default::default(),
                ai: AiAnnotation::default(),
            };
            jobs.insert(job_id, job);
            dedupe_index.insert(key, job_id);

            Ok(UpsertOutcome {
                action: UpsertAction::Inserted,
                job_id,
            })
        }

        async fn annotate_job_ai(&self, job_id: Uuid, ai: &AiAnnotation) -> Result<(), StoreError> {
            let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
            let job = jobs
                .get_mut(&job_id)
                .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
            job.ai = ai.clone();
            Ok(())
        }

        async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
            Ok(self
                .jobs
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&job_id)
                .cloned())
        }

        async fn open_crawl_log(
            &self,
            company_id: Option<Uuid>,
            adapter_kind: Option<AdapterKind>,
        ) -> Result<Uuid, StoreError> {
            if let Some(cid) = company_id {
                if self.running_logs_for_company(cid) > 0 {
                    return Err(StoreError::Conflict(format!(
                        "company {cid} already has a running crawl log"
                    )));
                }
            }
            let id = Uuid::new_v4();
            let log = CrawlLog {
                id,
                company_id,
                adapter_kind,
                started_at: Utc::now(),
                ended_at: None,
                status: CrawlLogStatus::Running,
                jobs_found: 0,
                error: None,
            };
            self.logs.write().unwrap_or_else(|e| e.into_inner()).insert(id, log);
            Ok(id)
        }

        async fn close_crawl_log(
            &self,
            log_id: Uuid,
            status: CrawlLogStatus,
            jobs_found: i32,
            error: Option<String>,
        ) -> Result<(), StoreError> {
            let mut logs = self.logs.write().unwrap_or_else(|e| e.into_inner());
            let log = logs
                .get_mut(&log_id)
                .ok_or_else(|| StoreError::NotFound(log_id.to_string()))?;
            log.status = status;
            log.jobs_found = jobs_found;
            log.error = error;
            log.ended_at = Some(Utc::now());
            Ok(())
        }

        async fn update_company_stats(
            &self,
            company_id: Uuid,
            jobs_found_delta: i64,
            crawled_at: DateTime<Utc>,
            empty_streak: EmptyStreakUpdate,
        ) -> Result<(), StoreError> {
            let mut companies = self.companies.write().unwrap_or_else(|e| e.into_inner());
            let company = companies
                .get_mut(&company_id)
                .ok_or_else(|| StoreError::NotFound(company_id.to_string()))?;
            company.jobs_found_total += jobs_found_delta;
            company.last_crawled_at = Some(crawled_at);
            match empty_streak {
                EmptyStreakUpdate::Reset => company.consecutive_empty_crawls = 0,
                EmptyStreakUpdate::Increment => company.consecutive_empty_crawls += 1,
                EmptyStreakUpdate::Unchanged => {}
            }
            Ok(())
        }

        async fn recent_logs(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<CrawlLog>, StoreError> {
            let mut logs: Vec<CrawlLog> = self
                .logs
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .filter(|l| l.started_at >= since)
                .cloned()
                .collect();
            logs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            logs.truncate(limit);
            Ok(logs)
        }

        async fn aggregate_by_adapter_kind(
            &self,
            since: DateTime<Utc>,
        ) -> Result<Vec<AdapterAggregate>, StoreError> {
            use std::collections::HashMap as Map;
            let mut acc: Map<AdapterKind, (u64, u64, u64, f64)> = Map::new();
            for log in self
                .logs
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .filter(|l| l.started_at >= since && l.adapter_kind.is_some())
            {
                let kind = log.adapter_kind.unwrap();
                let entry = acc.entry(kind).or_insert((0, 0, 0, 0.0));
                entry.0 += 1;
                match log.status {
                    CrawlLogStatus::Completed => entry.2 += 1,
                    CrawlLogStatus::Failed => entry.1 += 1,
                    _ => {}
                }
                if let Some(ended) = log.ended_at {
                    entry.3 += (ended - log.started_at).num_milliseconds() as f64 / 1000.0;
                }
            }
            Ok(acc
                .into_iter()
                .map(
                    |(adapter_kind, (total_runs, error_count, success_count, total_duration_seconds))| {
                        AdapterAggregate {
                            adapter_kind,
                            total_runs,
                            error_count,
                            success_count,
                            total_duration_seconds,
                        }
                    },
                )
                .collect())
        }
    }
}
