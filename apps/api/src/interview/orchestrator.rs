//! Turn orchestrator: the interview state machine.
//!
//! One call to `run_turn` consumes one candidate reply and advances the state by exactly
//! one transition. Within a turn the previous answer is always evaluated before the next
//! question's domain and difficulty are chosen. The state is mutated in place; callers
//! persist it only when the turn returns `Ok`.

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::interview::evaluation::EvaluationPipeline;
use crate::interview::models::{
    AskedQuestion, Evaluation, EvaluationContext, InterviewState, NextAction, Phase,
    QuestionContext, QuestionKind, Round, SessionStatus,
};
use crate::interview::plan::{build_plan, round_robin};
use crate::interview::question::{assessment_intent, QuestionPipeline};
use crate::interview::report::{InterviewReport, ReportBuilder};
use crate::models::domain::Difficulty;

/// Upper bound on routing steps in one turn. A normal turn takes at most two.
const MAX_STEPS: usize = 8;

const AFFIRMATIVE_WORDS: [&str; 9] = [
    "yes", "yeah", "yep", "sure", "okay", "ok", "start", "begin", "ready",
];
const NEGATIVE_WORDS: [&str; 6] = ["no", "nope", "not", "wait", "later", "cancel"];

pub const WAIT_MESSAGE: &str = "No problem at all! Take your time. Just let me know when \
    you're ready - I'll be here whenever you want to start.";
pub const CLARIFY_MESSAGE: &str = "Hmm, I wasn't quite sure what you meant. Could you let me \
    know if you'd like to start now? A simple 'yes' or 'no' would be perfect!";
pub const CLOSING_MESSAGE: &str = "Thank you for your time today! That concludes the \
    interview. Your detailed report is ready.";

pub fn welcome_message(job_role: &str) -> String {
    format!(
        "Hello! I'm your AI interviewer.\n\n\
         I've had a chance to look through your resume, and I'm looking forward to talking \
         with you about your experience for this {job_role} role.\n\n\
         We'll start with a short introduction and then move on to technical questions.\n\n\
         Would you like to get started? Just say \"yes\" when you're ready, or \"no\" if you \
         need a moment."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Evaluate,
    GenerateQuestion,
    Complete,
}

/// Pure routing on `status` and `next_action`. `Complete` ends the turn; the interview
/// itself is over only when `status` says so.
pub fn should_continue(state: &InterviewState) -> Route {
    if state.status == SessionStatus::Completed {
        return Route::Complete;
    }
    match state.next_action {
        NextAction::Evaluate => Route::Evaluate,
        NextAction::GenerateQuestion => Route::GenerateQuestion,
        NextAction::Complete | NextAction::Wait => Route::Complete,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomeReply {
    Affirmative,
    Negative,
    Ambiguous,
}

/// Whole-word match; any negative word outweighs affirmative ones ("not ready").
pub fn classify_welcome_reply(reply: &str) -> WelcomeReply {
    let lower = reply.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.iter().any(|w| NEGATIVE_WORDS.contains(w)) {
        WelcomeReply::Negative
    } else if words.iter().any(|w| AFFIRMATIVE_WORDS.contains(w)) {
        WelcomeReply::Affirmative
    } else {
        WelcomeReply::Ambiguous
    }
}

/// What one turn produced for the candidate.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub message: Option<String>,
    pub evaluation: Option<Evaluation>,
    pub next_question: Option<String>,
    pub completed: bool,
    pub report: Option<InterviewReport>,
    /// The session was already over; nothing changed and nothing needs saving.
    pub already_completed: bool,
}

pub struct TurnOrchestrator {
    questions: QuestionPipeline,
    evaluator: EvaluationPipeline,
    reporter: ReportBuilder,
}

impl TurnOrchestrator {
    pub fn new(
        questions: QuestionPipeline,
        evaluator: EvaluationPipeline,
        reporter: ReportBuilder,
    ) -> Self {
        Self {
            questions,
            evaluator,
            reporter,
        }
    }

    pub async fn run_turn(
        &self,
        state: &mut InterviewState,
        answer: &str,
    ) -> Result<TurnOutcome, AppError> {
        if state.is_completed() {
            debug!("Session {} already completed; replaying completion", state.session_id);
            return Ok(TurnOutcome {
                message: Some(CLOSING_MESSAGE.to_string()),
                evaluation: state.evaluation_history.last().cloned(),
                next_question: None,
                completed: true,
                report: state.report.clone(),
                already_completed: true,
            });
        }

        state.clear_transient();
        info!(
            "Turn start: session={} round={} answered={}",
            state.session_id,
            state.current_round.as_str(),
            state.question_count
        );
        let mut outcome = TurnOutcome::default();

        if state.current_round == Round::Welcome {
            match classify_welcome_reply(answer) {
                WelcomeReply::Affirmative => {
                    state.current_round = Round::Intro;
                    state.conversation_phase = Phase::Greeting;
                    self.emit_intro(state, &mut outcome).await;
                }
                WelcomeReply::Negative => outcome.message = Some(WAIT_MESSAGE.to_string()),
                WelcomeReply::Ambiguous => outcome.message = Some(CLARIFY_MESSAGE.to_string()),
            }
            return Ok(outcome);
        }

        match state.open_question().cloned() {
            Some(question) => {
                state.user_answers.push(answer.to_string());
                state.evaluation_context = Some(EvaluationContext {
                    question,
                    answer: answer.to_string(),
                });
                state.next_action = NextAction::Evaluate;
            }
            None if state.previous_questions.is_empty() => {
                warn!(
                    "Session {} has no intro question outside the welcome round; asking it now",
                    state.session_id
                );
                self.emit_intro(state, &mut outcome).await;
                return Ok(outcome);
            }
            None => {
                warn!(
                    "Session {} has no open question; resuming from the plan",
                    state.session_id
                );
                plan_next(state);
            }
        }

        let mut steps = 0;
        loop {
            match should_continue(state) {
                Route::Complete => break,
                Route::Evaluate => self.evaluate_step(state, &mut outcome).await,
                Route::GenerateQuestion => self.question_step(state, &mut outcome).await?,
            }
            steps += 1;
            if steps >= MAX_STEPS {
                return Err(AppError::Internal(anyhow!(
                    "turn for session {} did not settle after {MAX_STEPS} steps",
                    state.session_id
                )));
            }
        }

        if state.next_action == NextAction::Complete && !state.is_completed() {
            self.finish(state, &mut outcome).await;
        }

        info!(
            "Turn end: session={} answered={} status={}",
            state.session_id,
            state.question_count,
            state.status.as_str()
        );
        Ok(outcome)
    }

    async fn emit_intro(&self, state: &mut InterviewState, outcome: &mut TurnOutcome) {
        let text = self
            .questions
            .intro_question(&state.job_role, &state.resume_summary)
            .await;
        state.previous_questions.push(AskedQuestion {
            index: state.previous_questions.len(),
            text: text.clone(),
            kind: QuestionKind::Intro,
            domain: None,
            difficulty: Difficulty::Easy,
        });
        state.conversation_phase = Phase::IntroQuestion;
        state.next_action = NextAction::Wait;
        state.pending_question = Some(text.clone());
        outcome.next_question = Some(text);
    }

    async fn evaluate_step(&self, state: &mut InterviewState, outcome: &mut TurnOutcome) {
        let Some(context) = state.evaluation_context.clone() else {
            warn!("Evaluate routed without an answer for session {}", state.session_id);
            state.next_action = NextAction::Wait;
            return;
        };

        let evaluation = self.evaluator.evaluate(&context).await;
        info!(
            "Evaluated question {} ({}): score={:.2} degraded={}",
            evaluation.question_index,
            evaluation.domain_label(),
            evaluation.overall_score,
            evaluation.degraded
        );
        state.evaluation_history.push(evaluation.clone());
        state.question_count += 1;
        outcome.evaluation = Some(evaluation);

        plan_next(state);
    }

    async fn question_step(
        &self,
        state: &mut InterviewState,
        outcome: &mut TurnOutcome,
    ) -> Result<(), AppError> {
        let context = state.question_context.clone().ok_or_else(|| {
            AppError::Internal(anyhow!(
                "question routed without a context for session {}",
                state.session_id
            ))
        })?;
        let intent = state
            .orchestrator_intent
            .clone()
            .unwrap_or_else(|| assessment_intent(context.domain, context.difficulty));

        let generated = self
            .questions
            .generate(&context, &intent, &state.job_role, state.resume_id)
            .await?;
        if !generated.personalized {
            debug!("Emitting raw question for {}", context.domain);
        }

        state.previous_questions.push(AskedQuestion {
            index: state.previous_questions.len(),
            text: generated.text.clone(),
            kind: QuestionKind::Technical,
            domain: Some(context.domain),
            difficulty: context.difficulty,
        });
        *state.domain_coverage.entry(context.domain).or_insert(0) += 1;
        state.pending_question = Some(generated.text.clone());
        state.next_action = NextAction::Wait;
        outcome.next_question = Some(generated.text);
        Ok(())
    }

    async fn finish(&self, state: &mut InterviewState, outcome: &mut TurnOutcome) {
        let report = self.reporter.build(state).await;
        state.report = Some(report.clone());
        state.conversation_phase = Phase::Closing;
        state.current_round = Round::Completed;
        state.status = SessionStatus::Completed;
        info!(
            "Session {} completed after {} answers",
            state.session_id, state.question_count
        );

        outcome.completed = true;
        outcome.report = Some(report);
        outcome.message = Some(CLOSING_MESSAGE.to_string());
    }
}

/// Chooses what follows the answer just evaluated. Builds the plan when it is missing,
/// which is expected right after the intro and a rebuild anywhere later.
fn plan_next(state: &mut InterviewState) {
    if !state.has_plan() {
        if state.conversation_phase != Phase::IntroQuestion {
            warn!(
                "Plan missing past the intro for session {}; rebuilding from resume summary",
                state.session_id
            );
        }
        let plan = build_plan(&state.resume_summary, state.total_questions);
        info!(
            "Plan for session {}: domains={:?} difficulties={:?}",
            state.session_id, plan.domains, plan.difficulty_sequence
        );
        state.planned_domains = plan.domains;
        state.difficulty_sequence = plan.difficulty_sequence;
    }

    if state.conversation_phase == Phase::IntroQuestion {
        state.conversation_phase = Phase::TechnicalQuestion;
        state.current_round = Round::TechnicalDeepDive;
    }

    let technical_index = state.question_count.saturating_sub(1);
    if technical_index >= state.total_questions {
        state.next_action = NextAction::Complete;
        return;
    }

    let domain = round_robin(&state.planned_domains, technical_index);
    let difficulty = state
        .difficulty_sequence
        .get(technical_index)
        .copied()
        .unwrap_or(Difficulty::Hard);
    state.difficulty = difficulty;
    state.question_context = Some(QuestionContext {
        technical_index,
        domain,
        difficulty,
    });
    state.orchestrator_intent = Some(assessment_intent(domain, difficulty));
    state.next_action = NextAction::GenerateQuestion;
}
