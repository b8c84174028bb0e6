use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::knowledge::prompts::{CLASSIFY_PROMPT, CLASSIFY_SYSTEM};
use crate::llm_client::prompts::{fill, json_system};
use crate::llm_client::{with_timeout, GenerationParams, GenerationRequest, TextGenerator};
use crate::models::domain::Domain;

pub const MAX_DOMAINS_PER_ENTRY: usize = 3;

const CLASSIFY_PARAMS: GenerationParams = GenerationParams::new(128, 0.1);

/// Tags resume entries with up to three domains. The LLM answer is validated against the
/// closed domain set; keyword matching takes over when the call fails or yields nothing.
pub struct DomainClassifier {
    llm: Arc<dyn TextGenerator>,
    stage_timeout: Duration,
}

impl DomainClassifier {
    pub fn new(llm: Arc<dyn TextGenerator>, stage_timeout: Duration) -> Self {
        Self { llm, stage_timeout }
    }

    pub async fn classify(&self, entry: &str) -> Vec<Domain> {
        let prompt = fill(
            CLASSIFY_PROMPT,
            &[("domains", allowed_domains().as_str()), ("entry", entry)],
        );
        let request =
            GenerationRequest::prompt(&json_system(CLASSIFY_SYSTEM), prompt, CLASSIFY_PARAMS);

        match with_timeout(self.stage_timeout, self.llm.generate_structured(&request)).await {
            Ok(value) => {
                let domains = parse_domains(&value);
                if !domains.is_empty() {
                    return domains;
                }
                debug!("Classifier returned no valid domains; using keyword match");
            }
            Err(e) => warn!("Domain classification failed, using keyword match: {e}"),
        }
        keyword_domains(entry)
    }
}

/// Comma-separated list of every allowed label, for prompts.
pub fn allowed_domains() -> String {
    Domain::ALL
        .iter()
        .map(|d| d.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads `{"domains": [...]}`, dropping unknown labels and duplicates, keeping order.
pub fn parse_domains(value: &Value) -> Vec<Domain> {
    let Some(labels) = value.get("domains").and_then(Value::as_array) else {
        return vec![];
    };
    let mut domains = Vec::new();
    for domain in labels.iter().filter_map(Value::as_str).filter_map(Domain::parse) {
        if !domains.contains(&domain) {
            domains.push(domain);
        }
        if domains.len() == MAX_DOMAINS_PER_ENTRY {
            break;
        }
    }
    domains
}

/// Domains ranked by keyword hits in `text`; ties keep the canonical domain order.
pub fn keyword_domains(text: &str) -> Vec<Domain> {
    let lower = text.to_lowercase();
    let mut hits: Vec<(usize, Domain)> = Domain::ALL
        .iter()
        .map(|d| {
            let count = d.keywords().iter().filter(|k| lower.contains(*k)).count();
            (count, *d)
        })
        .filter(|(count, _)| *count > 0)
        .collect();
    hits.sort_by(|a, b| b.0.cmp(&a.0));
    hits.into_iter()
        .take(MAX_DOMAINS_PER_ENTRY)
        .map(|(_, d)| d)
        .collect()
}
