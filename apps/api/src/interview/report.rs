//! Aggregate interview report, built once when the interview completes.
//!
//! The statistics are a pure function of `evaluation_history`. Only the insights section
//! calls the model, and it has a data-driven fallback, so building a report never fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::interview::models::{Evaluation, InterviewState, QuestionKind};
use crate::interview::prompts::{INSIGHTS_PROMPT, INSIGHTS_SYSTEM};
use crate::llm_client::prompts::{fill, json_system};
use crate::llm_client::{with_timeout, GenerationParams, GenerationRequest, TextGenerator};
use crate::models::domain::{Difficulty, Domain};

const INSIGHTS_PARAMS: GenerationParams = GenerationParams::new(1000, 0.5);
const ANSWER_PREVIEW_CHARS: usize = 500;
const MAX_INSIGHT_ITEMS: usize = 3;
const TREND_THRESHOLD: f64 = 0.1;
const MIN_TREND_POINTS: usize = 3;

// ─── Report records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewReport {
    pub session_id: Uuid,
    pub job_role: String,
    pub generated_at: DateTime<Utc>,
    pub executive_summary: ExecutiveSummary,
    pub metric_breakdown: MetricBreakdown,
    pub domain_performance: DomainPerformance,
    pub difficulty_performance: BTreeMap<Difficulty, ScoreSlice>,
    pub question_breakdown: Vec<QuestionBreakdown>,
    pub progression: ScoreProgression,
    pub insights: Insights,
    pub evaluation_history: Vec<Evaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub overall_score: f64,
    pub overall_percentage: f64,
    pub performance_level: String,
    pub questions_answered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBreakdown {
    pub technical_accuracy: f64,
    pub completeness: f64,
    pub clarity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSlice {
    pub score: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainPerformance {
    pub scores: BTreeMap<Domain, ScoreSlice>,
    pub strongest: Option<Domain>,
    /// Only set when at least two domains were covered.
    pub weakest: Option<Domain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBreakdown {
    pub number: usize,
    pub question: String,
    pub answer: String,
    pub domain: String,
    pub difficulty: Difficulty,
    pub score: f64,
    pub technical_accuracy: f64,
    pub completeness: f64,
    pub clarity: f64,
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Consistent,
    TooFewQuestions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionPoint {
    pub question_number: usize,
    pub score: f64,
    pub domain: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreProgression {
    pub scores: Vec<ProgressionPoint>,
    pub trend: Trend,
    pub highest_score: f64,
    pub lowest_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiringRecommendation {
    pub decision: String,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub overall_summary: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommendations: Vec<String>,
    pub hiring_recommendation: HiringRecommendation,
    /// False when the data-driven fallback was used.
    pub generated: bool,
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Everything in the report that is derived from scores alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportStatistics {
    pub executive_summary: ExecutiveSummary,
    pub metric_breakdown: MetricBreakdown,
    pub domain_performance: DomainPerformance,
    pub difficulty_performance: BTreeMap<Difficulty, ScoreSlice>,
    pub question_breakdown: Vec<QuestionBreakdown>,
    pub progression: ScoreProgression,
    /// Unrounded mean overall score, used for thresholds.
    pub overall_score: f64,
}

pub fn compute_statistics(evaluations: &[Evaluation]) -> ReportStatistics {
    let overall_score = mean(evaluations.iter().map(|e| e.overall_score));

    let executive_summary = ExecutiveSummary {
        overall_score: round2(overall_score),
        overall_percentage: (overall_score * 1000.0).round() / 10.0,
        performance_level: performance_level(overall_score).to_string(),
        questions_answered: evaluations.len(),
    };

    let metric_breakdown = MetricBreakdown {
        technical_accuracy: round2(mean(evaluations.iter().map(|e| e.technical_accuracy))),
        completeness: round2(mean(evaluations.iter().map(|e| e.completeness))),
        clarity: round2(mean(evaluations.iter().map(|e| e.clarity))),
    };

    let technical: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|e| e.kind == QuestionKind::Technical)
        .collect();

    let mut by_domain: BTreeMap<Domain, Vec<f64>> = BTreeMap::new();
    for evaluation in &technical {
        if let Some(domain) = evaluation.domain {
            by_domain.entry(domain).or_default().push(evaluation.overall_score);
        }
    }
    let scores: BTreeMap<Domain, ScoreSlice> = by_domain
        .into_iter()
        .map(|(domain, scores)| (domain, slice(&scores)))
        .collect();
    let mut ranked: Vec<(Domain, f64)> = scores.iter().map(|(d, s)| (*d, s.score)).collect();
    // Stable sort keeps the canonical domain order among equal scores.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let domain_performance = DomainPerformance {
        strongest: ranked.first().map(|(d, _)| *d),
        weakest: if ranked.len() > 1 {
            ranked.last().map(|(d, _)| *d)
        } else {
            None
        },
        scores,
    };

    let difficulty_performance = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
        .into_iter()
        .map(|difficulty| {
            let scores: Vec<f64> = technical
                .iter()
                .filter(|e| e.difficulty == difficulty)
                .map(|e| e.overall_score)
                .collect();
            (difficulty, slice(&scores))
        })
        .collect();

    let question_breakdown = evaluations
        .iter()
        .enumerate()
        .map(|(i, e)| QuestionBreakdown {
            number: i + 1,
            question: e.question.clone(),
            answer: e.answer.chars().take(ANSWER_PREVIEW_CHARS).collect(),
            domain: e.domain_label().to_string(),
            difficulty: e.difficulty,
            score: round2(e.overall_score),
            technical_accuracy: round2(e.technical_accuracy),
            completeness: round2(e.completeness),
            clarity: round2(e.clarity),
            feedback: e.feedback.clone(),
        })
        .collect();

    let points: Vec<ProgressionPoint> = evaluations
        .iter()
        .enumerate()
        .map(|(i, e)| ProgressionPoint {
            question_number: i + 1,
            score: round2(e.overall_score),
            domain: e.domain_label().to_string(),
            difficulty: e.difficulty,
        })
        .collect();
    let point_scores: Vec<f64> = points.iter().map(|p| p.score).collect();
    let progression = ScoreProgression {
        trend: trend(&point_scores),
        highest_score: point_scores.iter().copied().fold(0.0, f64::max),
        lowest_score: if point_scores.is_empty() {
            0.0
        } else {
            point_scores.iter().copied().fold(f64::INFINITY, f64::min)
        },
        scores: points,
    };

    ReportStatistics {
        executive_summary,
        metric_breakdown,
        domain_performance,
        difficulty_performance,
        question_breakdown,
        progression,
        overall_score,
    }
}

/// Compares the mean of the second half against the first half.
pub fn trend(scores: &[f64]) -> Trend {
    if scores.len() < MIN_TREND_POINTS {
        return Trend::TooFewQuestions;
    }
    let (first, second) = scores.split_at(scores.len() / 2);
    let first_avg = mean(first.iter().copied());
    let second_avg = mean(second.iter().copied());
    if second_avg > first_avg + TREND_THRESHOLD {
        Trend::Improving
    } else if second_avg < first_avg - TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Consistent
    }
}

pub fn performance_level(score: f64) -> &'static str {
    match score {
        s if s >= 0.9 => "Outstanding",
        s if s >= 0.8 => "Excellent",
        s if s >= 0.7 => "Strong",
        s if s >= 0.6 => "Good",
        s if s >= 0.5 => "Developing",
        _ => "Needs Improvement",
    }
}

fn slice(scores: &[f64]) -> ScoreSlice {
    ScoreSlice {
        score: round2(mean(scores.iter().copied())),
        count: scores.len(),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn pct(value: f64) -> String {
    format!("{:.0}", value * 100.0)
}

// ─── Insights ────────────────────────────────────────────────────────────────

/// Derived from the statistics alone, for when the model is unavailable.
pub fn fallback_insights(stats: &ReportStatistics) -> Insights {
    let overall = stats.overall_score;
    let domains = &stats.domain_performance;
    let strongest = domains
        .strongest
        .and_then(|d| domains.scores.get(&d).map(|s| (d.label(), s.score)));
    let weakest = domains
        .weakest
        .and_then(|d| domains.scores.get(&d).map(|s| (d.label(), s.score)));
    let strongest_label = strongest.map_or("N/A", |(label, _)| label);
    let weakest_label = weakest.map_or("N/A", |(label, _)| label);
    let metrics = &stats.metric_breakdown;

    let mut strengths = Vec::new();
    if let Some((label, score)) = strongest.filter(|(_, s)| *s >= 0.7) {
        strengths.push(format!("Strong performance in {label} ({}%)", pct(score)));
    }
    if metrics.clarity >= 0.7 {
        strengths.push("Clear and articulate communication".to_string());
    }
    if metrics.technical_accuracy >= 0.7 {
        strengths.push("Technically accurate responses".to_string());
    }
    if strengths.is_empty() {
        strengths = vec![
            "Completed all questions".to_string(),
            "Showed effort throughout the interview".to_string(),
        ];
    }

    let mut improvements = Vec::new();
    if weakest.map_or(true, |(_, score)| score < 0.6) {
        improvements.push(format!("Deepen knowledge in {weakest_label}"));
    }
    if metrics.completeness < 0.6 {
        improvements.push("Provide more comprehensive answers covering all key points".to_string());
    }
    let hard = stats
        .difficulty_performance
        .get(&Difficulty::Hard)
        .map_or(0.0, |s| s.score);
    if hard < 0.5 {
        improvements.push("Practice with more challenging technical problems".to_string());
    }
    if improvements.is_empty() {
        improvements = vec![
            "Continue exploring advanced topics".to_string(),
            "Gain more hands-on experience".to_string(),
        ];
    }

    let recommendations = vec![
        format!("Focus on improving {weakest_label} skills with practical projects"),
        "Practice explaining complex concepts with real-world examples".to_string(),
        "Review technical fundamentals in weaker areas".to_string(),
    ];

    let (decision, confidence) = match overall {
        s if s >= 0.8 => ("Strongly Recommend", 0.9),
        s if s >= 0.7 => ("Recommend", 0.75),
        s if s >= 0.6 => ("Consider", 0.6),
        _ => ("Not Recommended", 0.7),
    };

    strengths.truncate(MAX_INSIGHT_ITEMS);
    improvements.truncate(MAX_INSIGHT_ITEMS);

    Insights {
        overall_summary: format!(
            "The candidate scored {}% overall, showing {} performance. Strongest in {strongest_label}, with room to improve in {weakest_label}.",
            pct(overall),
            performance_level(overall).to_lowercase(),
        ),
        strengths,
        areas_for_improvement: improvements,
        recommendations,
        hiring_recommendation: HiringRecommendation {
            decision: decision.to_string(),
            confidence,
            reasoning: format!(
                "Based on {}% overall score with notable strength in {strongest_label}.",
                pct(overall)
            ),
        },
        generated: false,
    }
}

/// Requires a summary and a hiring decision; list fields are optional and capped.
pub fn parse_insights(value: &Value) -> Option<Insights> {
    let text = |v: &Value, key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let list = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .take(MAX_INSIGHT_ITEMS)
                    .collect()
            })
            .unwrap_or_default()
    };

    let overall_summary = text(value, "overall_summary")?;
    let hiring = value.get("hiring_recommendation")?;
    let decision = text(hiring, "decision")?;
    let confidence = hiring
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);

    Some(Insights {
        overall_summary,
        strengths: list("strengths"),
        areas_for_improvement: list("areas_for_improvement"),
        recommendations: list("recommendations"),
        hiring_recommendation: HiringRecommendation {
            decision,
            confidence,
            reasoning: text(hiring, "reasoning").unwrap_or_default(),
        },
        generated: true,
    })
}

// ─── Builder ─────────────────────────────────────────────────────────────────

pub struct ReportBuilder {
    llm: Arc<dyn TextGenerator>,
    stage_timeout: Duration,
}

impl ReportBuilder {
    pub fn new(llm: Arc<dyn TextGenerator>, stage_timeout: Duration) -> Self {
        Self { llm, stage_timeout }
    }

    pub async fn build(&self, state: &InterviewState) -> InterviewReport {
        let stats = compute_statistics(&state.evaluation_history);
        let insights = self.insights(&state.job_role, &stats).await;
        info!(
            "Report for session {}: {} answers, overall {:.2} ({})",
            state.session_id,
            stats.executive_summary.questions_answered,
            stats.overall_score,
            stats.executive_summary.performance_level
        );

        InterviewReport {
            session_id: state.session_id,
            job_role: state.job_role.clone(),
            generated_at: Utc::now(),
            executive_summary: stats.executive_summary,
            metric_breakdown: stats.metric_breakdown,
            domain_performance: stats.domain_performance,
            difficulty_performance: stats.difficulty_performance,
            question_breakdown: stats.question_breakdown,
            progression: stats.progression,
            insights,
            evaluation_history: state.evaluation_history.clone(),
        }
    }

    async fn insights(&self, job_role: &str, stats: &ReportStatistics) -> Insights {
        let domains = stats
            .domain_performance
            .scores
            .iter()
            .map(|(domain, s)| format!("- {domain}: {}%", pct(s.score)))
            .collect::<Vec<_>>()
            .join("\n");
        let difficulties = stats
            .difficulty_performance
            .iter()
            .map(|(difficulty, s)| format!("- {difficulty}: {}%", pct(s.score)))
            .collect::<Vec<_>>()
            .join("\n");
        let overall = format!("{:.1}", stats.overall_score * 100.0);
        let accuracy = pct(stats.metric_breakdown.technical_accuracy);
        let completeness = pct(stats.metric_breakdown.completeness);
        let clarity = pct(stats.metric_breakdown.clarity);

        let prompt = fill(
            INSIGHTS_PROMPT,
            &[
                ("job_role", job_role),
                ("overall", overall.as_str()),
                ("domains", domains.as_str()),
                ("difficulties", difficulties.as_str()),
                ("accuracy", accuracy.as_str()),
                ("completeness", completeness.as_str()),
                ("clarity", clarity.as_str()),
            ],
        );
        let request =
            GenerationRequest::prompt(&json_system(INSIGHTS_SYSTEM), prompt, INSIGHTS_PARAMS);

        match with_timeout(self.stage_timeout, self.llm.generate_structured(&request)).await {
            Ok(value) => match parse_insights(&value) {
                Some(insights) => return insights,
                None => warn!("Report insights missing required fields; using data-driven insights"),
            },
            Err(e) => warn!("Report insights generation failed, using data-driven insights: {e}"),
        }
        fallback_insights(stats)
    }
}
