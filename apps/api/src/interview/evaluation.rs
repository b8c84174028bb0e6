//! Evaluation pipeline: reference answer, then comparative judgment.
//!
//! Both calls run at low temperature. `evaluate` never fails: a missing reference answer
//! only weakens the judge prompt, and an unparseable judgment falls back to a length
//! heuristic with `degraded = true`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::interview::models::{Evaluation, EvaluationContext};
use crate::interview::prompts::{
    JUDGE_PROMPT, JUDGE_SYSTEM, REFERENCE_ANSWER_PROMPT, REFERENCE_ANSWER_SYSTEM,
};
use crate::llm_client::prompts::{fill, json_system};
use crate::llm_client::{with_timeout, GenerationParams, GenerationRequest, TextGenerator};

const REFERENCE_PARAMS: GenerationParams = GenerationParams::new(256, 0.2);
const JUDGE_PARAMS: GenerationParams = GenerationParams::new(512, 0.1);

pub const DEGRADED_FEEDBACK: &str = "Automated evaluation was degraded for this answer; \
    the score is an estimate based on response length.";

/// Scores parsed from the judge. All values are clamped to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub technical_accuracy: f64,
    pub completeness: f64,
    pub clarity: f64,
    pub overall_score: f64,
    pub feedback: String,
    pub analysis: String,
}

pub struct EvaluationPipeline {
    llm: Arc<dyn TextGenerator>,
    stage_timeout: Duration,
}

impl EvaluationPipeline {
    pub fn new(llm: Arc<dyn TextGenerator>, stage_timeout: Duration) -> Self {
        Self { llm, stage_timeout }
    }

    pub async fn evaluate(&self, context: &EvaluationContext) -> Evaluation {
        let reference = self.reference_answer(context).await;
        let judgment = match self.judge(context, &reference).await {
            Some(judgment) => judgment,
            None => {
                warn!(
                    "Judgment for question {} unusable; scoring by answer length",
                    context.question.index
                );
                return heuristic_evaluation(context, reference);
            }
        };

        Evaluation {
            question_index: context.question.index,
            question: context.question.text.clone(),
            answer: context.answer.clone(),
            kind: context.question.kind,
            domain: context.question.domain,
            difficulty: context.question.difficulty,
            technical_accuracy: judgment.technical_accuracy,
            completeness: judgment.completeness,
            clarity: judgment.clarity,
            overall_score: judgment.overall_score,
            feedback: judgment.feedback,
            analysis: judgment.analysis,
            reference_answer: reference,
            degraded: false,
            evaluated_at: Utc::now(),
        }
    }

    /// Stage A. An empty string when the call fails.
    async fn reference_answer(&self, context: &EvaluationContext) -> String {
        let system = fill(
            REFERENCE_ANSWER_SYSTEM,
            &[("domain", context.question.domain_label())],
        );
        let prompt = fill(
            REFERENCE_ANSWER_PROMPT,
            &[("question", context.question.text.as_str())],
        );
        let request = GenerationRequest::prompt(&system, prompt, REFERENCE_PARAMS);
        match with_timeout(self.stage_timeout, self.llm.generate(&request)).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Reference answer generation failed: {e}");
                String::new()
            }
        }
    }

    /// Stage B. `generate_structured` already retries extraction with a scan for the
    /// first well-formed object, so `None` here means no usable record exists.
    async fn judge(&self, context: &EvaluationContext, reference: &str) -> Option<Judgment> {
        let reference = if reference.is_empty() {
            "(not available; grade on technical merit)"
        } else {
            reference
        };
        let prompt = fill(
            JUDGE_PROMPT,
            &[
                ("question", context.question.text.as_str()),
                ("reference", reference),
                ("answer", context.answer.as_str()),
            ],
        );
        let request = GenerationRequest::prompt(&json_system(JUDGE_SYSTEM), prompt, JUDGE_PARAMS);

        match with_timeout(self.stage_timeout, self.llm.generate_structured(&request)).await {
            Ok(value) => {
                let judgment = parse_judgment(&value);
                if judgment.is_none() {
                    debug!("Judge output lacked scores: {value}");
                }
                judgment
            }
            Err(e) => {
                warn!("Judge call failed: {e}");
                None
            }
        }
    }
}

/// Requires the three sub-metrics; `overall_score` defaults to their mean.
/// Accepts numbers or numeric strings, and 0–10 / 0–100 scales are normalised.
pub fn parse_judgment(value: &Value) -> Option<Judgment> {
    let technical_accuracy = score_field(value, "technical_accuracy")?;
    let completeness = score_field(value, "completeness")?;
    let clarity = score_field(value, "clarity")?;
    let overall_score = score_field(value, "overall_score")
        .unwrap_or((technical_accuracy + completeness + clarity) / 3.0);

    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    Some(Judgment {
        technical_accuracy,
        completeness,
        clarity,
        overall_score,
        feedback: text("feedback"),
        analysis: text("analysis"),
    })
}

fn score_field(value: &Value, key: &str) -> Option<f64> {
    let raw = match value.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    let normalized = if raw > 10.0 {
        raw / 100.0
    } else if raw > 1.0 {
        raw / 10.0
    } else {
        raw
    };
    Some(normalized.clamp(0.0, 1.0))
}

/// Deterministic score bucket from answer length in characters.
pub fn heuristic_score(answer: &str) -> f64 {
    match answer.trim().chars().count() {
        n if n < 20 => 0.3,
        n if n < 50 => 0.5,
        n if n < 150 => 0.65,
        _ => 0.75,
    }
}

pub fn heuristic_evaluation(context: &EvaluationContext, reference_answer: String) -> Evaluation {
    let score = heuristic_score(&context.answer);
    Evaluation {
        question_index: context.question.index,
        question: context.question.text.clone(),
        answer: context.answer.clone(),
        kind: context.question.kind,
        domain: context.question.domain,
        difficulty: context.question.difficulty,
        technical_accuracy: score,
        completeness: score,
        clarity: score,
        overall_score: score,
        feedback: DEGRADED_FEEDBACK.to_string(),
        analysis: String::new(),
        reference_answer,
        degraded: true,
        evaluated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::models::{AskedQuestion, QuestionKind};
    use crate::models::domain::{Difficulty, Domain};
    use crate::testing::ScriptedGenerator;
    use serde_json::json;

    fn context(answer: &str) -> EvaluationContext {
        EvaluationContext {
            question: AskedQuestion {
                index: 3,
                text: "What is a window function?".into(),
                kind: QuestionKind::Technical,
                domain: Some(Domain::Sql),
                difficulty: Difficulty::Medium,
            },
            answer: answer.into(),
        }
    }

    fn pipeline(llm: ScriptedGenerator) -> EvaluationPipeline {
        EvaluationPipeline::new(Arc::new(llm), Duration::from_secs(5))
    }

    #[test]
    fn test_heuristic_buckets() {
        assert_eq!(heuristic_score("short"), 0.3);
        assert_eq!(heuristic_score(&"a".repeat(20)), 0.5);
        assert_eq!(heuristic_score(&"a".repeat(49)), 0.5);
        assert_eq!(heuristic_score(&"a".repeat(50)), 0.65);
        assert_eq!(heuristic_score(&"a".repeat(150)), 0.75);
    }

    #[test]
    fn test_parse_judgment_clamps_and_normalises() {
        let j = parse_judgment(&json!({
            "technical_accuracy": 8,
            "completeness": "0.5",
            "clarity": 1.7,
            "feedback": "Good."
        }))
        .unwrap();
        assert!((j.technical_accuracy - 0.8).abs() < 1e-9);
        assert_eq!(j.completeness, 0.5);
        assert!((j.clarity - 0.17).abs() < 1e-9);
        assert!((j.overall_score - (0.8 + 0.5 + 0.17) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_judgment_requires_metrics() {
        assert!(parse_judgment(&json!({"overall_score": 0.9})).is_none());
        assert!(parse_judgment(&json!({
            "technical_accuracy": "high", "completeness": 0.5, "clarity": 0.5
        }))
        .is_none());
    }

    #[tokio::test]
    async fn test_unparseable_judgment_yields_bounded_degraded_record() {
        let llm = ScriptedGenerator::new()
            .on("Write a concise, accurate expert answer", "Window functions compute over partitions.")
            .on("Grade the candidate's answer", "I think this answer is pretty good overall!!");
        let evaluation = pipeline(llm)
            .evaluate(&context("It aggregates over a window of rows without collapsing them."))
            .await;

        assert!(evaluation.degraded);
        assert_eq!(evaluation.overall_score, 0.65);
        for score in [
            evaluation.technical_accuracy,
            evaluation.completeness,
            evaluation.clarity,
            evaluation.overall_score,
        ] {
            assert!((0.0..=1.0).contains(&score));
            assert_eq!(score, evaluation.overall_score);
        }
        assert_eq!(evaluation.feedback, DEGRADED_FEEDBACK);
        assert_eq!(evaluation.reference_answer, "Window functions compute over partitions.");
    }

    #[tokio::test]
    async fn test_judgment_embedded_in_prose_is_recovered() {
        let llm = ScriptedGenerator::new()
            .on("Write a concise, accurate expert answer", "Reference.")
            .on(
                "Grade the candidate's answer",
                r#"Sure! {"technical_accuracy": 0.9, "completeness": 0.7, "clarity": 0.8, "overall_score": 0.82, "feedback": "Solid.", "analysis": "Covers partitions."} Hope that helps."#,
            );
        let evaluation = pipeline(llm).evaluate(&context("answer")).await;
        assert!(!evaluation.degraded);
        assert_eq!(evaluation.overall_score, 0.82);
        assert_eq!(evaluation.feedback, "Solid.");
        assert_eq!(evaluation.domain, Some(Domain::Sql));
        assert_eq!(evaluation.question_index, 3);
    }

    #[tokio::test]
    async fn test_all_calls_failing_still_scores() {
        let llm = ScriptedGenerator::new()
            .fail_on("Write a concise, accurate expert answer")
            .fail_on("Grade the candidate's answer");
        let evaluation = pipeline(llm).evaluate(&context("")).await;
        assert!(evaluation.degraded);
        assert_eq!(evaluation.overall_score, 0.3);
        assert!(evaluation.reference_answer.is_empty());
    }
}
