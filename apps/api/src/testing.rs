//! Deterministic test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::interview::evaluation::EvaluationPipeline;
use crate::interview::orchestrator::TurnOrchestrator;
use crate::interview::question::QuestionPipeline;
use crate::interview::report::ReportBuilder;
use crate::llm_client::{GenerationRequest, HashingEmbedder, LlmError, TextGenerator};
use crate::retrieval::MemoryVectorIndex;

pub const STAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// A 28-word question that passes personalization validation.
pub const PERSONALIZED_QUESTION: &str = "In your reporting work you tuned Postgres query plans \
and composite indexes, so how would you diagnose and speed up a slow SQL join between two \
large tables?";

pub const RAW_QUESTION: &str = "How would you speed up a slow SQL join between two large tables?";

pub const INTRO_QUESTION: &str =
    "Could you walk me through your background and what brings you to this role?";

pub const JUDGMENT: &str = r#"{"technical_accuracy": 0.8, "completeness": 0.7, "clarity": 0.9, "overall_score": 0.8, "feedback": "Clear and mostly complete.", "analysis": "Covers the main points."}"#;

enum Reply {
    Texts(Vec<String>),
    Fail,
}

struct Route {
    marker: String,
    reply: Reply,
    served: AtomicUsize,
}

/// Routes each call by the first line of its last user message: the first registered
/// marker contained in that line decides the reply. Unmatched prompts are errors, so a
/// test fails loudly when a pipeline sends something unexpected.
#[derive(Default)]
pub struct ScriptedGenerator {
    routes: Vec<Route>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, marker: &str, reply: &str) -> Self {
        self.on_sequence(marker, vec![reply])
    }

    /// Replies in order; the last reply repeats once the sequence is exhausted.
    pub fn on_sequence(mut self, marker: &str, replies: Vec<&str>) -> Self {
        self.routes.push(Route {
            marker: marker.to_string(),
            reply: Reply::Texts(replies.into_iter().map(str::to_string).collect()),
            served: AtomicUsize::new(0),
        });
        self
    }

    pub fn fail_on(mut self, marker: &str) -> Self {
        self.routes.push(Route {
            marker: marker.to_string(),
            reply: Reply::Fail,
            served: AtomicUsize::new(0),
        });
        self
    }

    /// Appends `other`'s routes after this one's, so earlier markers take precedence.
    pub fn merge(mut self, other: ScriptedGenerator) -> Self {
        self.routes.extend(other.routes);
        self
    }

    /// Total number of `generate` calls, shared so it can be read after the double moves.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        // Suspend once so concurrent turns interleave like real network calls.
        tokio::task::yield_now().await;
        self.calls.fetch_add(1, Ordering::SeqCst);

        let first_line = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .and_then(|m| m.content.lines().next())
            .unwrap_or_default();

        let Some(route) = self.routes.iter().find(|r| first_line.contains(&r.marker)) else {
            return Err(LlmError::Api {
                status: 404,
                message: format!("no scripted reply for prompt: {first_line}"),
            });
        };

        match &route.reply {
            Reply::Fail => Err(LlmError::Api {
                status: 503,
                message: format!("scripted failure for '{}'", route.marker),
            }),
            Reply::Texts(texts) => {
                let n = route.served.fetch_add(1, Ordering::SeqCst);
                texts
                    .get(n.min(texts.len().saturating_sub(1)))
                    .cloned()
                    .ok_or(LlmError::EmptyContent)
            }
        }
    }
}

/// Every prompt an interview sends, answered with valid output.
pub fn interview_generator() -> ScriptedGenerator {
    ScriptedGenerator::new()
        .on("Write the opening question", INTRO_QUESTION)
        .on("technical interview question about", RAW_QUESTION)
        .on("Rewrite the interview question", PERSONALIZED_QUESTION)
        .on("Rephrase this interview question", PERSONALIZED_QUESTION)
        .on("Write a concise, accurate expert answer", "Use indexes on the join keys.")
        .on("Grade the candidate's answer", JUDGMENT)
        .on(
            "Based on this interview performance",
            r#"{"overall_summary": "Consistent performance.", "strengths": ["SQL"], "hiring_recommendation": {"decision": "Recommend", "confidence": 0.8, "reasoning": "Solid."}}"#,
        )
}

/// An orchestrator over `llm`, the hashing embedder and an empty in-memory index.
pub fn test_orchestrator(llm: Arc<dyn TextGenerator>) -> TurnOrchestrator {
    TurnOrchestrator::new(
        QuestionPipeline::new(
            llm.clone(),
            Arc::new(HashingEmbedder::default()),
            Arc::new(MemoryVectorIndex::default()),
            STAGE_TIMEOUT,
        ),
        EvaluationPipeline::new(llm.clone(), STAGE_TIMEOUT),
        ReportBuilder::new(llm, STAGE_TIMEOUT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::GenerationParams;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest::prompt("system", prompt, GenerationParams::default())
    }

    #[test]
    fn test_personalized_question_word_count() {
        assert_eq!(PERSONALIZED_QUESTION.split_whitespace().count(), 28);
    }

    #[tokio::test]
    async fn test_sequence_repeats_last_reply() {
        let llm = ScriptedGenerator::new().on_sequence("ask", vec!["one", "two"]);
        assert_eq!(llm.generate(&request("ask me")).await.unwrap(), "one");
        assert_eq!(llm.generate(&request("ask me")).await.unwrap(), "two");
        assert_eq!(llm.generate(&request("ask me")).await.unwrap(), "two");
        assert_eq!(llm.call_counter().load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_routes_on_first_line_only() {
        let llm = ScriptedGenerator::new().on("grade", "ok").fail_on("ask");
        assert!(llm.generate(&request("please ask\ngrade")).await.is_err());
        assert!(llm.generate(&request("unknown\ngrade")).await.is_err());
        assert_eq!(llm.generate(&request("grade this")).await.unwrap(), "ok");
    }
}
