//! `sqlx::Type` mappings for the domain enums, following the same
//! `#[sqlx(type_name = "...", rename_all = "snake_case")]` convention
//! `kernel::jobs::job::JobStatus` uses for its own Postgres enums.

use crawl_core::model::{AdapterKind, CrawlLogStatus, JobUserStatus, PipelineStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "adapter_kind", rename_all = "snake_case")]
pub enum AdapterKindSql {
    StructuredA,
    StructuredB,
    AiParsed,
}

impl From<AdapterKind> for AdapterKindSql {
    fn from(v: AdapterKind) -> Self {
        match v {
            AdapterKind::StructuredA => AdapterKindSql::StructuredA,
            AdapterKind::StructuredB => AdapterKindSql::StructuredB,
            AdapterKind::AiParsed => AdapterKindSql::AiParsed,
        }
    }
}

impl From<AdapterKindSql> for AdapterKind {
    fn from(v: AdapterKindSql) -> Self {
        match v {
            AdapterKindSql::StructuredA => AdapterKind::StructuredA,
            AdapterKindSql::StructuredB => AdapterKind::StructuredB,
            AdapterKindSql::AiParsed => AdapterKind::AiParsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "job_user_status", rename_all = "snake_case")]
pub enum JobUserStatusSql {
    New,
    Viewed,
    Applied,
    Rejected,
    Archived,
    Saved,
}

impl From<JobUserStatus> for JobUserStatusSql {
    fn from(v: JobUserStatus) -> Self {
        match v {
            JobUserStatus::New => JobUserStatusSql::New,
            JobUserStatus::Viewed => JobUserStatusSql::Viewed,
            JobUserStatus::Applied => JobUserStatusSql::Applied,
            JobUserStatus::Rejected => JobUserStatusSql::Rejected,
            JobUserStatus::Archived => JobUserStatusSql::Archived,
            JobUserStatus::Saved => JobUserStatusSql::Saved,
        }
    }
}

impl From<JobUserStatusSql> for JobUserStatus {
    fn from(v: JobUserStatusSql) -> Self {
        match v {
            JobUserStatusSql::New => JobUserStatus::New,
            JobUserStatusSql::Viewed => JobUserStatus::Viewed,
            JobUserStatusSql::Applied => JobUserStatus::Applied,
            JobUserStatusSql::Rejected => JobUserStatus::Rejected,
            JobUserStatusSql::Archived => JobUserStatus::Archived,
            JobUserStatusSql::Saved => JobUserStatus::Saved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "pipeline_stage", rename_all = "snake_case")]
pub enum PipelineStageSql {
    Discover,
    Review,
    Prepare,
    Apply,
    FollowUp,
    Archive,
}

impl From<PipelineStage> for PipelineStageSql {
    fn from(v: PipelineStage) -> Self {
        match v {
            PipelineStage::Discover => PipelineStageSql::Discover,
            PipelineStage::Review => PipelineStageSql::Review,
            PipelineStage::Prepare => PipelineStageSql::Prepare,
            PipelineStage::Apply => PipelineStageSql::Apply,
            PipelineStage::FollowUp => PipelineStageSql::FollowUp,
            PipelineStage::Archive => PipelineStageSql::Archive,
        }
    }
}

impl From<PipelineStageSql> for PipelineStage {
    fn from(v: PipelineStageSql) -> Self {
        match v {
            PipelineStageSql::Discover => PipelineStage::Discover,
            PipelineStageSql::Review => PipelineStage::Review,
            PipelineStageSql::Prepare => PipelineStage::Prepare,
            PipelineStageSql::Apply => PipelineStage::Apply,
            PipelineStageSql::FollowUp => PipelineStage::FollowUp,
            PipelineStageSql::Archive => PipelineStage::Archive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "crawl_log_status", rename_all = "snake_case")]
pub enum CrawlLogStatusSql {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl From<CrawlLogStatus> for CrawlLogStatusSql {
    fn from(v: CrawlLogStatus) -> Self {
        match v {
            CrawlLogStatus::Running => CrawlLogStatusSql::Running,
            CrawlLogStatus::Completed => CrawlLogStatusSql::Completed,
            CrawlLogStatus::Failed => CrawlLogStatusSql::Failed,
            CrawlLogStatus::Cancelled => CrawlLogStatusSql::Cancelled,
        }
    }
}

impl From<CrawlLogStatusSql> for CrawlLogStatus {
    fn from(v: CrawlLogStatusSql) -> Self {
        match v {
            CrawlLogStatusSql::Running => CrawlLogStatus::Running,
            CrawlLogStatusSql::Completed => CrawlLogStatus::Completed,
            CrawlLogStatusSql::Failed => CrawlLogStatus::Failed,
            CrawlLogStatusSql::Cancelled => CrawlLogStatus::Cancelled,
        }
    }
}
