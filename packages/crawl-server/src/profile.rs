//! Loads the single `UserProfile` the ranker scores jobs against from
//! a JSON file on disk. The profile itself is maintained by an
//! external collaborator out of scope here; this is just the
//! narrowest reader needed to hand the orchestrator a snapshot.

use std::path::Path;

use serde::Deserialize;

use crawl_core::model::{ExperienceEntry, UserPreferences, UserProfile, WorkType};

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    resume_text: String,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    experience: Vec<ExperienceEntryFile>,
    #[serde(default)]
    education: String,
    #[serde(default)]
    preferences: PreferencesFile,
}

#[derive(Debug, Deserialize)]
struct ExperienceEntryFile {
    title: String,
    company: String,
    #[serde(default)]
    years: Option<f32>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct PreferencesFile {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    remote_preference: bool,
    #[serde(default)]
    work_type: WorkTypeFile,
    #[serde(default)]
    experience_level: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WorkTypeFile {
    Remote,
    Office,
    Hybrid,
    #[default]
    Any,
}

impl From<WorkTypeFile> for WorkType {
    fn from(v: WorkTypeFile) -> Self {
        match v {
            WorkTypeFile::Remote => WorkType::Remote,
            WorkTypeFile::Office => WorkType::Office,
            WorkTypeFile::Hybrid => WorkType::Hybrid,
            WorkTypeFile::Any => WorkType::Any,
        }
    }
}

pub fn load_profile(path: &Path) -> anyhow::Result<UserProfile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading profile file {}: {e}", path.display()))?;
    let parsed: ProfileFile = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parsing profile file {}: {e}", path.display()))?;

    Ok(UserProfile {
        resume_text: parsed.resume_text,
        skills: parsed.skills,
        experience: parsed
            .experience
            .into_iter()
            .map(|e| ExperienceEntry {
                title: e.title,
                company: e.company,
                years: e.years,
                description: e.description,
            })
            .collect(),
        education: parsed.education,
        preferences: UserPreferences {
            keywords: parsed.preferences.keywords,
            remote_preference: parsed.preferences.remote_preference,
            work_type: parsed.preferences.work_type.into(),
            experience_level: parsed.preferences.experience_level,
        },
    })
}
