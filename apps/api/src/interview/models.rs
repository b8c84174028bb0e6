//! Persisted interview workflow state and the per-stage payload records.
//!
//! `InterviewState` is the single unit of persisted state: loaded, mutated by one turn
//! of the orchestrator, and written back as a whole.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interview::report::InterviewReport;
use crate::models::domain::{Difficulty, Domain};
use crate::models::resume::ResumeSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    Welcome,
    Intro,
    /// Reserved for a resume walk-through round; persisted states may carry it.
    #[allow(dead_code)]
    ResumeDiscussion,
    TechnicalDeepDive,
    Completed,
}

impl Round {
    pub fn as_str(self) -> &'static str {
        match self {
            Round::Welcome => "welcome",
            Round::Intro => "intro",
            Round::ResumeDiscussion => "resume_discussion",
            Round::TechnicalDeepDive => "technical_deep_dive",
            Round::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Greeting,
    IntroQuestion,
    /// Phase of the reserved resume walk-through round; kept so persisted states still load.
    #[allow(dead_code)]
    ResumePoint,
    TechnicalQuestion,
    Closing,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Greeting => "greeting",
            Phase::IntroQuestion => "intro_question",
            Phase::ResumePoint => "resume_point",
            Phase::TechnicalQuestion => "technical_question",
            Phase::Closing => "closing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    GenerateQuestion,
    Evaluate,
    Complete,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Intro,
    Technical,
}

/// A question as emitted to the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskedQuestion {
    pub index: usize,
    pub text: String,
    pub kind: QuestionKind,
    pub domain: Option<Domain>,
    pub difficulty: Difficulty,
}

impl AskedQuestion {
    pub fn domain_label(&self) -> &'static str {
        match (self.kind, self.domain) {
            (QuestionKind::Intro, _) | (_, None) => INTRO_DOMAIN_LABEL,
            (QuestionKind::Technical, Some(domain)) => domain.label(),
        }
    }
}

pub const INTRO_DOMAIN_LABEL: &str = "Introduction";

/// Input to the question pipeline for the next technical question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionContext {
    pub technical_index: usize,
    pub domain: Domain,
    pub difficulty: Difficulty,
}

/// Input to the evaluation pipeline: the open question and the answer just received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub question: AskedQuestion,
    pub answer: String,
}

/// One scored answer. Appended to `evaluation_history` in question order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub question_index: usize,
    pub question: String,
    pub answer: String,
    pub kind: QuestionKind,
    pub domain: Option<Domain>,
    pub difficulty: Difficulty,
    pub technical_accuracy: f64,
    pub completeness: f64,
    pub clarity: f64,
    pub overall_score: f64,
    pub feedback: String,
    pub analysis: String,
    pub reference_answer: String,
    /// Set when the judgment could not be parsed and the length heuristic was used.
    pub degraded: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn domain_label(&self) -> &'static str {
        match (self.kind, self.domain) {
            (QuestionKind::Technical, Some(domain)) => domain.label(),
            _ => INTRO_DOMAIN_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewState {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub resume_id: Uuid,
    pub job_role: String,

    pub current_round: Round,
    pub conversation_phase: Phase,
    pub status: SessionStatus,

    /// Answered questions, intro included.
    pub question_count: usize,
    /// Technical questions in the interview; the intro is extra.
    pub total_questions: usize,
    pub difficulty: Difficulty,

    /// Empty until the plan is built after the intro answer.
    pub planned_domains: Vec<Domain>,
    pub difficulty_sequence: Vec<Difficulty>,
    pub domain_coverage: BTreeMap<Domain, usize>,

    pub resume_summary: ResumeSummary,

    pub previous_questions: Vec<AskedQuestion>,
    pub user_answers: Vec<String>,
    pub evaluation_history: Vec<Evaluation>,

    pub next_action: NextAction,
    pub report: Option<InterviewReport>,

    // Turn-scoped payloads. Cleared at the start of every turn.
    #[serde(default)]
    pub question_context: Option<QuestionContext>,
    #[serde(default)]
    pub evaluation_context: Option<EvaluationContext>,
    #[serde(default)]
    pub orchestrator_intent: Option<String>,
    #[serde(default)]
    pub pending_question: Option<String>,
}

impl InterviewState {
    pub fn new(
        session_id: Uuid,
        user_id: Uuid,
        resume_id: Uuid,
        job_role: &str,
        resume_summary: ResumeSummary,
        total_questions: usize,
    ) -> Self {
        Self {
            session_id,
            user_id,
            resume_id,
            job_role: job_role.to_string(),
            current_round: Round::Welcome,
            conversation_phase: Phase::Greeting,
            status: SessionStatus::Active,
            question_count: 0,
            total_questions,
            difficulty: Difficulty::Easy,
            planned_domains: vec![],
            difficulty_sequence: vec![],
            domain_coverage: BTreeMap::new(),
            resume_summary,
            previous_questions: vec![],
            user_answers: vec![],
            evaluation_history: vec![],
            next_action: NextAction::Wait,
            report: None,
            question_context: None,
            evaluation_context: None,
            orchestrator_intent: None,
            pending_question: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// The emitted question still waiting for an answer, if any.
    pub fn open_question(&self) -> Option<&AskedQuestion> {
        if self.previous_questions.len() > self.user_answers.len() {
            self.previous_questions.last()
        } else {
            None
        }
    }

    pub fn has_plan(&self) -> bool {
        !self.planned_domains.is_empty() && self.difficulty_sequence.len() == self.total_questions
    }

    pub fn technical_questions_asked(&self) -> usize {
        self.previous_questions
            .iter()
            .filter(|q| q.kind == QuestionKind::Technical)
            .count()
    }

    pub fn clear_transient(&mut self) {
        self.question_context = None;
        self.evaluation_context = None;
        self.orchestrator_intent = None;
        self.pending_question = None;
    }
}
