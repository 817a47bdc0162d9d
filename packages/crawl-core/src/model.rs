//! Core entities: Company, Job, CrawlLog, UserProfile.
//!
//! Mirrors this workspace's entity conventions: `Uuid` identifiers,
//! `chrono::DateTime<Utc>` timestamps, `sqlx::Type`-compatible enums
//! (the `Type` derive itself lives in `crawl-store-postgres`, which maps
//! these to Postgres enum types the way `kernel::jobs::job::JobStatus` does).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The strategy used to extract postings from a company's career endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    StructuredA,
    StructuredB,
    AiParsed,
}

#[derive(Debug, Clone)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub career_endpoint: String,
    pub adapter_kind: AdapterKind,
    pub active: bool,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub consecutive_empty_crawls: i32,
    pub jobs_found_total: i64,
    pub viability_score: Option<i32>,
}

impl Company {
    /// True if the orchestrator may schedule a crawl for this company.
    pub fn is_schedulable(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobUserStatus {
    #[default]
    New,
    Viewed,
    Applied,
    Rejected,
    Archived,
    Saved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Discover,
    Review,
    Prepare,
    Apply,
    FollowUp,
    Archive,
}

/// AI annotation attached to a job by the ranker (C5). Every field is
/// null/empty until the ranker has run at least once for this job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AiAnnotation {
    pub match_score: Option<i32>,
    pub recommended: bool,
    pub summary: Option<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub rank: Option<i32>,
    pub recommended_on: Option<DateTime<Utc>>,
}

impl AiAnnotation {
    /// Invariant: if `match_score` is null, `recommended` is false and
    /// `rank` is null.
    pub fn neutral(summary: impl Into<String>) -> Self {
        Self {
            match_score: None,
            recommended: false,
            summary: Some(summary.into()),
            pros: Vec::new(),
            cons: Vec::new(),
            matched_keywords: Vec::new(),
            rank: None,
            recommended_on: None,
        }
    }

    /// Re-assert the invariant after construction from an external
    /// (e.g. parsed LLM) source that may not uphold it.
    pub fn enforce_invariant(&mut self) {
        if self.match_score.is_none() {
            self.recommended = false;
            self.rank = None;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub company_id: Uuid,
    pub external_id: Option<String>,
    pub canonical_url: String,
    pub title: String,
    pub location: Option<String>,
    pub description: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
    pub status: JobUserStatus,
    pub stage: PipelineStage,
    pub ai: AiAnnotation,
}

impl Job {
    /// The uniqueness key for a job: `(company_id, external_id)` if
    /// `external_id` is present, else `(company_id, canonical_url)`.
    pub fn dedupe_key(company_id: Uuid, external_id: Option<&str>, canonical_url: &str) -> String {
        match external_id {
            Some(ext) if !ext.is_empty() => format!("{company_id}:ext:{ext}"),
            _ => format!("{company_id}:url:{canonical_url}"),
        }
    }
}

/// A posting as produced by an adapter, before normalization.
#[derive(Debug, Clone, Default)]
pub struct PostingRaw {
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// A posting after normalize() (C4) has run. Always has the fields a
/// valid upsert needs; `normalize` drops postings missing a title/url
/// rather than failing the whole page .
#[derive(Debug, Clone)]
pub struct PostingNormalized {
    pub external_id: Option<String>,
    pub title: String,
    pub location: Option<String>,
    pub canonical_url: String,
    pub description: String,
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlLogStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CrawlLog {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub adapter_kind: Option<AdapterKind>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: CrawlLogStatus,
    pub jobs_found: i32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Remote,
    Office,
    Hybrid,
    Any,
}

#[derive(Debug, Clone, Default)]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    pub years: Option<f32>,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct UserPreferences {
    pub keywords: Vec<String>,
    pub remote_preference: bool,
    pub work_type: WorkType,
    pub experience_level: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            remote_preference: false,
            work_type: WorkType::Any,
            experience_level: String::new(),
        }
    }
}

/// The single active profile the ranker scores jobs against.
/// Read-only within a crawl cycle : the orchestrator takes
/// one snapshot at run start (`UserProfileSnapshot`) and reuses it for
/// every job in that run.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub resume_text: String,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: String,
    pub preferences: UserPreferences,
}

/// An immutable copy of the user profile taken once per orchestrator
/// run so mid-run profile edits never change how jobs already being
/// scored are judged.
pub type UserProfileSnapshot = std::sync::Arc<UserProfile>;
