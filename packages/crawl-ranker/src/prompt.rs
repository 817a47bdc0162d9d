//! Deterministic prompt composition for the ranker: composition is
//! deterministic from (profile snapshot, job) — no randomness added
//! by the ranker.

use crawl_core::model::{Job, UserProfile};

pub fn compose(profile: &UserProfile, job: &Job) -> String {
    let skills = profile.skills.join(", ");
    let experience: String = profile
        .experience
        .iter()
        .map(|e| match e.years {
            Some(years) => format!("- {} at {} ({years} years): {}", e.title, e.company, e.description),
            None => format!("- {} at {}: {}", e.title, e.company, e.description),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are scoring how well a job posting matches a candidate's profile.\n\n\
         Candidate skills: {skills}\n\
         Candidate experience:\n{experience}\n\
         Candidate education: {education}\n\n\
         Job title: {title}\n\
         Job location: {location}\n\
         Job description:\n{description}\n\n\
         Return ONLY a JSON object with these keys: \
         score (integer 0-100), recommended (boolean), summary (string), \
         pros (array of strings), cons (array of strings), \
         keywords_matched (array of strings). No other text.",
        skills = if skills.is_empty() { "(none listed)".to_string() } else { skills },
        experience = if experience.is_empty() { "(none listed)".to_string() } else { experience },
        education = profile.education,
        title = job.title,
        location = job.location.as_deref().unwrap_or("(unspecified)"),
        description = job.description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crawl_core::model::{AiAnnotation, ExperienceEntry, JobUserStatus, PipelineStage};
    use uuid::Uuid;

    fn sample_job() -> Job {
        Job {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            external_id: None,
            canonical_url: "https://x.com/1".to_string(),
            title: "Backend Engineer".to_string(),
            location: Some("Remote".to_string()),
            description: "Build APIs in Rust".to_string(),
            posted_at: None,
            discovered_at: Utc::now(),
            status: JobUserStatus::New,
            stage: PipelineStage::Discover,
            ai: AiAnnotation::neutral("unranked"),
        }
    }

    #[test]
    fn prompt_includes_job_and_profile_fields() {
        let mut profile = UserProfile::default();
        profile.skills = vec!["Rust".to_string(), "Postgres".to_string()];
        profile.experience = vec![ExperienceEntry {
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            years: Some(2.0),
            description: "Built internal tools".to_string(),
        }];
        profile.education = "BS Computer Science".to_string();

        let prompt = compose(&profile, &sample_job());
        assert!(prompt.contains("Rust"));
        assert!(prompt.contains("Backend Engineer"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("BS Computer Science"));
    }

    #[test]
    fn composition_is_deterministic() {
        let profile = UserProfile::default();
        let job = sample_job();
        assert_eq!(compose(&profile, &job), compose(&profile, &job));
    }
}
