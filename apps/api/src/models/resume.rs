use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::Domain;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    #[default]
    Unknown,
}

impl ExperienceLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "entry" | "junior" | "entry-level" | "entry level" => ExperienceLevel::Entry,
            "mid" | "mid-level" | "mid level" | "intermediate" => ExperienceLevel::Mid,
            "senior" | "lead" | "principal" | "staff" => ExperienceLevel::Senior,
            _ => ExperienceLevel::Unknown,
        }
    }
}

/// Structured candidate profile. Read-only input to interview planning.
///
/// `recommended_domains` is ordered by relevance; `key_strengths` is free text and
/// only contributes to the plan where an entry names a known domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeSummary {
    pub candidate_overview: String,
    pub key_experiences: Vec<String>,
    pub technical_skills: Vec<String>,
    pub recommended_domains: Vec<Domain>,
    pub key_strengths: Vec<String>,
    pub experience_level: ExperienceLevel,
}

/// A processed resume: metadata plus the summary produced at upload time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_hash: String,
    pub summary: ResumeSummary,
    pub num_chunks: i32,
    pub matched_domains: Vec<Domain>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_tolerates_missing_fields() {
        let summary: ResumeSummary =
            serde_json::from_value(json!({ "recommended_domains": ["SQL"] })).unwrap();
        assert_eq!(summary.recommended_domains, vec![Domain::Sql]);
        assert_eq!(summary.experience_level, ExperienceLevel::Unknown);
        assert!(summary.key_strengths.is_empty());
    }

    #[test]
    fn test_experience_level_parse() {
        assert_eq!(ExperienceLevel::parse("Senior"), ExperienceLevel::Senior);
        assert_eq!(ExperienceLevel::parse("junior"), ExperienceLevel::Entry);
        assert_eq!(ExperienceLevel::parse("guru"), ExperienceLevel::Unknown);
    }
}
