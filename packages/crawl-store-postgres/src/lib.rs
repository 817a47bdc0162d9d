//! Postgres-backed `JobStore`, in the shape of
//! `extraction::stores::sqlite::SqliteStore`: a pool-owning struct, an
//! embedded migration on construction, `sqlx::query`/`query_as` per
//! operation, `FromRow` row structs that convert into the domain
//! model at the boundary.

mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crawl_core::model::{AdapterKind, AiAnnotation, Company, CrawlLog, CrawlLogStatus, Job, PostingNormalized};
use crawl_core::store::{AdapterAggregate, EmptyStreakUpdate, JobStore, StoreError, UpsertAction, UpsertOutcome};

use types::{AdapterKindSql, CrawlLogStatusSql, JobUserStatusSql, PipelineStageSql};

const MIGRATION_SQL: &str = include_str!("migrations/001_init.sql");

pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    /// Seeds a `Company` row directly, bypassing the `JobStore` trait
    /// (which has no `create_company` operation — companies are
    /// created by the external collaborator spec.md §1 scopes out).
    /// Integration tests use this to set up fixtures against a real
    /// database.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn seed_company_for_test(&self, company: &Company) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO companies (id, name, career_endpoint, adapter_kind, active, consecutive_empty_crawls, jobs_found_total)
            VALUES ($1, $2, $3, $4, $5, 0, 0)
            "#,
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(&company.career_endpoint)
        .bind(AdapterKindSql::from(company.adapter_kind))
        .bind(company.active)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

#[derive(FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    career_endpoint: String,
    adapter_kind: AdapterKindSql,
    active: bool,
    last_crawled_at: Option<DateTime<Utc>>,
    consecutive_empty_crawls: i32,
    jobs_found_total: i64,
    viability_score: Option<i32>,
}

impl From<CompanyRow> for Company {
    fn from(r: CompanyRow) -> Self {
        Company {
            id: r.id,
            name: r.name,
            career_endpoint: r.career_endpoint,
            adapter_kind: r.adapter_kind.into(),
            active: r.active,
            last_crawled_at: r.last_crawled_at,
            consecutive_empty_crawls: r.consecutive_empty_crawls,
            jobs_found_total: r.jobs_found_total,
            viability_score: r.viability_score,
        }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    company_id: Uuid,
    external_id: Option<String>,
    canonical_url: String,
    title: String,
    location: Option<String>,
    description: String,
    posted_at: Option<DateTime<Utc>>,
    discovered_at: DateTime<Utc>,
    status: JobUserStatusSql,
    stage: PipelineStageSql,
    ai_match_score: Option<i32>,
    ai_recommended: bool,
    ai_summary: Option<String>,
    ai_pros: Vec<String>,
    ai_cons: Vec<String>,
    ai_matched_keywords: Vec<String>,
    ai_rank: Option<i32>,
    ai_recommended_on: Option<DateTime<Utc>>,
}

impl From<JobRow> for Job {
    fn from(r: JobRow) -> Self {
        Job {
            id: r.id,
            company_id: r.company_id,
            external_id: r.external_id,
            canonical_url: r.canonical_url,
            title: r.title,
            location: r.location,
            description: r.description,
            posted_at: r.posted_at,
            discovered_at: r.discovered_at,
            status: r.status.into(),
            stage: r.stage.into(),
            ai: AiAnnotation {
                match_score: r.ai_match_score,
                recommended: r.ai_recommended,
                summary: r.ai_summary,
                pros: r.ai_pros,
                cons: r.ai_cons,
                matched_keywords: r.ai_matched_keywords,
                rank: r.ai_rank,
                recommended_on: r.ai_recommended_on,
            },
        }
    }
}

#[derive(FromRow)]
struct CrawlLogRow {
    id: Uuid,
    company_id: Option<Uuid>,
    adapter_kind: Option<AdapterKindSql>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    status: CrawlLogStatusSql,
    jobs_found: i32,
    error: Option<String>,
}

impl From<CrawlLogRow> for CrawlLog {
    fn from(r: CrawlLogRow) -> Self {
        CrawlLog {
            id: r.id,
            company_id: r.company_id,
            adapter_kind: r.adapter_kind.map(AdapterKind::from),
            started_at: r.started_at,
            ended_at: r.ended_at,
            status: r.status.into(),
            jobs_found: r.jobs_found,
            error: r.error,
        }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn list_active_companies(&self) -> Result<Vec<Company>, StoreError> {
        let rows: Vec<CompanyRow> = sqlx::query_as(
            r#"
            SELECT id, name, career_endpoint, adapter_kind, active, last_crawled_at,
                   consecutive_empty_crawls, jobs_found_total, viability_score
            FROM companies
            WHERE active
            ORDER BY last_crawled_at ASC NULLS FIRST, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(Company::from).collect())
    }

    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, StoreError> {
        let row: Option<CompanyRow> = sqlx::query_as(
            r#"
            SELECT id, name, career_endpoint, adapter_kind, active, last_crawled_at,
                   consecutive_empty_crawls, jobs_found_total, viability_score
            FROM companies WHERE id = $1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(row.map(Company::from))
    }

    async fn upsert_job(
        &self,
        posting: &PostingNormalized,
        company_id: Uuid,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let existing: Option<(Uuid, String, Option<String>, String, String, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT id, title, location, canonical_url, description, posted_at
            FROM jobs
            WHERE company_id = $1
              AND ((external_id IS NOT NULL AND external_id = $2)
                   OR (external_id IS NULL AND $2 IS NULL AND canonical_url = $3))
            FOR UPDATE
            "#,
        )
        .bind(company_id)
        .bind(&posting.external_id)
        .bind(&posting.canonical_url)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if let Some((job_id, title, location, canonical_url, description, posted_at)) = existing {
            let changed = title != posting.title
                || location != posting.location
                || canonical_url != posting.canonical_url
                || description != posting.description
                || posted_at != posting.posted_at;

            if !changed {
                tx.commit().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
                return Ok(UpsertOutcome { action: UpsertAction::Unchanged, job_id });
            }

            sqlx::query(
                r#"
                UPDATE jobs SET title = $1, location = $2, canonical_url = $3, description = $4, posted_at = $5
                WHERE id = $6
                "#,
            )
            .bind(&posting.title)
            .bind(&posting.location)
            .bind(&posting.canonical_url)
            .bind(&posting.description)
            .bind(posting.posted_at)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

            tx.commit().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            return Ok(UpsertOutcome { action: UpsertAction::Updated, job_id });
        }

        let job_id = Uuid::new_v4();
        let insert_result = sqlx::query(
            r#"
            INSERT INTO jobs (id, company_id, external_id, canonical_url, title, location, description, posted_at, discovered_at, status, stage)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), 'new', 'discover')
            "#,
        )
        .bind(job_id)
        .bind(company_id)
        .bind(&posting.external_id)
        .bind(&posting.canonical_url)
        .bind(&posting.title)
        .bind(&posting.location)
        .bind(&posting.description)
        .bind(posting.posted_at)
        .execute(&mut *tx)
        .await;

        match insert_result {
            Ok(_) => {
                tx.commit().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
                Ok(UpsertOutcome { action: UpsertAction::Inserted, job_id })
            }
            Err(e) if e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false) => {
                Err(StoreError::Conflict(e.to_string()))
            }
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    async fn annotate_job_ai(&self, job_id: Uuid, ai: &AiAnnotation) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                ai_match_score = $1, ai_recommended = $2, ai_summary = $3,
                ai_pros = $4, ai_cons = $5, ai_matched_keywords = $6,
                ai_rank = $7, ai_recommended_on = $8
            WHERE id = $9
            "#,
        )
        .bind(ai.match_score)
        .bind(ai.recommended)
        .bind(&ai.summary)
        .bind(&ai.pros)
        .bind(&ai.cons)
        .bind(&ai.matched_keywords)
        .bind(ai.rank)
        .bind(ai.recommended_on)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(job_id.to_string()));
        }
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT id, company_id, external_id, canonical_url, title, location, description,
                   posted_at, discovered_at, status, stage,
                   ai_match_score, ai_recommended, ai_summary, ai_pros, ai_cons,
                   ai_matched_keywords, ai_rank, ai_recommended_on
            FROM jobs WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(row.map(Job::from))
    }

    async fn open_crawl_log(
        &self,
        company_id: Option<Uuid>,
        adapter_kind: Option<AdapterKind>,
    ) -> Result<Uuid, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if let Some(cid) = company_id {
            let running: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM crawl_logs WHERE company_id = $1 AND status = 'running'",
            )
            .bind(cid)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

            if running.0 > 0 {
                return Err(StoreError::Conflict(format!("company {cid} already has a running crawl log")));
            }
        }

        let id = Uuid::new_v4();
        let insert_result = sqlx::query(
            r#"
            INSERT INTO crawl_logs (id, company_id, adapter_kind, started_at, status, jobs_found)
            VALUES ($1, $2, $3, now(), 'running', 0)
            "#,
        )
        .bind(id)
        .bind(company_id)
        .bind(adapter_kind.map(AdapterKindSql::from))
        .execute(&mut *tx)
        .await;

        match insert_result {
            Ok(_) => {}
            // `idx_crawl_logs_one_running_per_company` : a concurrent
            // opener won the race the pre-check above could not close.
            Err(e) if e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false) => {
                return Err(StoreError::Conflict(e.to_string()));
            }
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        }

        tx.commit().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(id)
    }

    async fn close_crawl_log(
        &self,
        log_id: Uuid,
        status: CrawlLogStatus,
        jobs_found: i32,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE crawl_logs SET status = $1, jobs_found = $2, error = $3, ended_at = now()
            WHERE id = $4
            "#,
        )
        .bind(CrawlLogStatusSql::from(status))
        .bind(jobs_found)
        .bind(&error)
        .bind(log_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(log_id.to_string()));
        }
        Ok(())
    }

    async fn update_company_stats(
        &self,
        company_id: Uuid,
        jobs_found_delta: i64,
        crawled_at: DateTime<Utc>,
        empty_streak: EmptyStreakUpdate,
    ) -> Result<(), StoreError> {
        let streak_clause = match empty_streak {
            EmptyStreakUpdate::Reset => "0",
            EmptyStreakUpdate::Increment => "consecutive_empty_crawls + 1",
            EmptyStreakUpdate::Unchanged => "consecutive_empty_crawls",
        };

        let query = format!(
            r#"
            UPDATE companies SET
                jobs_found_total = jobs_found_total + $1,
                last_crawled_at = $2,
                consecutive_empty_crawls = {streak_clause}
            WHERE id = $3
            "#
        );

        let result = sqlx::query(&query)
            .bind(jobs_found_delta)
            .bind(crawled_at)
            .bind(company_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(company_id.to_string()));
        }
        Ok(())
    }

    async fn recent_logs(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<CrawlLog>, StoreError> {
        let rows: Vec<CrawlLogRow> = sqlx::query_as(
            r#"
            SELECT id, company_id, adapter_kind, started_at, ended_at, status, jobs_found, error
            FROM crawl_logs
            WHERE started_at >= $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(CrawlLog::from).collect())
    }

    async fn aggregate_by_adapter_kind(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AdapterAggregate>, StoreError> {
        #[derive(FromRow)]
        struct AggRow {
            adapter_kind: AdapterKindSql,
            total_runs: i64,
            error_count: i64,
            success_count: i64,
            total_duration_seconds: f64,
        }

        let rows: Vec<AggRow> = sqlx::query_as(
            r#"
            SELECT
                adapter_kind,
                COUNT(*) AS total_runs,
                COUNT(*) FILTER (WHERE status = 'failed') AS error_count,
                COUNT(*) FILTER (WHERE status = 'completed') AS success_count,
                COALESCE(SUM(EXTRACT(EPOCH FROM (ended_at - started_at))), 0)::float8 AS total_duration_seconds
            FROM crawl_logs
            WHERE started_at >= $1 AND adapter_kind IS NOT NULL
            GROUP BY adapter_kind
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| AdapterAggregate {
                adapter_kind: r.adapter_kind.into(),
                total_runs: r.total_runs as u64,
                error_count: r.error_count as u64,
                success_count: r.success_count as u64,
                total_duration_seconds: r.total_duration_seconds,
            })
            .collect())
    }
}
