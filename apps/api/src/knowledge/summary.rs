use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::knowledge::classifier::allowed_domains;
use crate::knowledge::prompts::{SUMMARY_PROMPT, SUMMARY_SYSTEM};
use crate::llm_client::prompts::{fill, json_system};
use crate::llm_client::{with_timeout, GenerationParams, GenerationRequest, TextGenerator};
use crate::models::domain::Domain;
use crate::models::resume::{ExperienceLevel, ResumeSummary};

/// Only the head of the resume is summarized; it carries the profile and recent roles.
pub const SUMMARY_INPUT_CHARS: usize = 4000;
pub const MAX_RECOMMENDED_DOMAINS: usize = 6;

const SUMMARY_PARAMS: GenerationParams = GenerationParams::new(1024, 0.3);

const SKILL_KEYWORDS: [&str; 30] = [
    "python", "java", "sql", "javascript", "react", "node", "typescript",
    "machine learning", "data science", "aws", "docker", "kubernetes",
    "tensorflow", "pytorch", "flask", "django", "fastapi", "spring",
    "mongodb", "postgresql", "redis", "elasticsearch", "kafka",
    "gcp", "azure", "terraform", "ansible", "jenkins", "git", "spark",
];

pub struct ResumeSummarizer {
    llm: Arc<dyn TextGenerator>,
    stage_timeout: Duration,
}

impl ResumeSummarizer {
    pub fn new(llm: Arc<dyn TextGenerator>, stage_timeout: Duration) -> Self {
        Self { llm, stage_timeout }
    }

    /// Never fails: an unusable model answer yields `fallback_summary`.
    pub async fn summarize(&self, text: &str) -> ResumeSummary {
        let head: String = text.chars().take(SUMMARY_INPUT_CHARS).collect();
        let prompt = fill(
            SUMMARY_PROMPT,
            &[("domains", allowed_domains().as_str()), ("resume", head.as_str())],
        );
        let request =
            GenerationRequest::prompt(&json_system(SUMMARY_SYSTEM), prompt, SUMMARY_PARAMS);

        match with_timeout(self.stage_timeout, self.llm.generate_structured(&request)).await {
            Ok(value) => match parse_summary(&value) {
                Some(summary) => return summary,
                None => warn!("Resume summary missing required fields; using keyword summary"),
            },
            Err(e) => warn!("Resume summarization failed, using keyword summary: {e}"),
        }
        fallback_summary(text)
    }
}

/// Lenient field-by-field read. Domains are validated against the closed set; the
/// summary is rejected only when it has neither an overview nor any usable domain.
pub fn parse_summary(value: &Value) -> Option<ResumeSummary> {
    let strings = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut recommended_domains = Vec::new();
    for domain in strings("recommended_domains")
        .iter()
        .filter_map(|d| Domain::parse(d))
    {
        if !recommended_domains.contains(&domain) {
            recommended_domains.push(domain);
        }
    }
    recommended_domains.truncate(MAX_RECOMMENDED_DOMAINS);

    let candidate_overview = value
        .get("candidate_overview")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    if candidate_overview.is_empty() && recommended_domains.is_empty() {
        return None;
    }

    Some(ResumeSummary {
        candidate_overview,
        key_experiences: strings("key_experiences"),
        technical_skills: strings("technical_skills"),
        recommended_domains,
        key_strengths: strings("key_strengths"),
        experience_level: value
            .get("experience_level")
            .and_then(Value::as_str)
            .map(ExperienceLevel::parse)
            .unwrap_or_default(),
    })
}

/// Keyword-extracted skills and the default domain triple.
pub fn fallback_summary(text: &str) -> ResumeSummary {
    let lower = text.to_lowercase();
    let technical_skills: Vec<String> = SKILL_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .map(|k| title_case(k))
        .take(15)
        .collect();

    let candidate_overview = if technical_skills.is_empty() {
        "Candidate profile extracted from resume.".to_string()
    } else {
        format!(
            "Candidate with experience in {}.",
            technical_skills
                .iter()
                .take(5)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    ResumeSummary {
        candidate_overview,
        key_experiences: vec![],
        technical_skills,
        recommended_domains: Domain::DEFAULT_TRIPLE.to_vec(),
        key_strengths: vec![],
        experience_level: ExperienceLevel::Unknown,
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
