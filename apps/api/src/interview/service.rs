//! Interview service: the operations the HTTP layer calls.
//!
//! `submit_answer` is the only writer of session state. It takes the session's turn lock,
//! runs one orchestrator turn on a copy of the stored state, and persists the copy with a
//! version check. Nothing is written unless the whole turn succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::lock::TurnLock;
use crate::interview::models::{Evaluation, InterviewState};
use crate::interview::orchestrator::{welcome_message, TurnOrchestrator};
use crate::interview::report::InterviewReport;
use crate::interview::store::{SessionStore, StoredSession};
use crate::knowledge::ResumeStore;
use crate::models::domain::Domain;
use crate::models::session::{MessageRecord, NewMessage, SessionRecord};

#[derive(Debug, Serialize)]
pub struct StartedInterview {
    pub session_id: Uuid,
    pub welcome_message: String,
    pub total_questions: usize,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub session_id: Uuid,
    pub message: Option<String>,
    pub evaluation: Option<Evaluation>,
    pub next_question: Option<String>,
    pub completed: bool,
    pub report: Option<InterviewReport>,
    pub question_count: usize,
    pub total_questions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub record: SessionRecord,
    pub conversation_phase: String,
    pub question_count: usize,
    pub total_questions: usize,
    pub planned_domains: Vec<Domain>,
    pub domain_coverage: BTreeMap<Domain, usize>,
    pub pending_question: Option<String>,
}

impl From<StoredSession> for SessionView {
    fn from(stored: StoredSession) -> Self {
        let StoredSession { record, state } = stored;
        let pending_question = state.open_question().map(|q| q.text.clone());
        SessionView {
            record,
            conversation_phase: state.conversation_phase.as_str().to_string(),
            question_count: state.question_count,
            total_questions: state.total_questions,
            planned_domains: state.planned_domains,
            domain_coverage: state.domain_coverage,
            pending_question,
        }
    }
}

pub struct InterviewService {
    orchestrator: TurnOrchestrator,
    sessions: Arc<dyn SessionStore>,
    resumes: Arc<dyn ResumeStore>,
    lock: Arc<dyn TurnLock>,
    total_questions: usize,
}

impl InterviewService {
    pub fn new(
        orchestrator: TurnOrchestrator,
        sessions: Arc<dyn SessionStore>,
        resumes: Arc<dyn ResumeStore>,
        lock: Arc<dyn TurnLock>,
        total_questions: usize,
    ) -> Self {
        Self {
            orchestrator,
            sessions,
            resumes,
            lock,
            total_questions,
        }
    }

    pub async fn start_interview(
        &self,
        user_id: Uuid,
        resume_id: Uuid,
        job_role: &str,
    ) -> Result<StartedInterview, AppError> {
        let job_role = job_role.trim();
        if job_role.is_empty() {
            return Err(AppError::Validation("job_role must not be empty".into()));
        }
        let resume = self
            .resumes
            .get(resume_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

        let state = InterviewState::new(
            Uuid::new_v4(),
            user_id,
            resume_id,
            job_role,
            resume.summary,
            self.total_questions,
        );
        let welcome = welcome_message(job_role);
        self.sessions
            .create(&state, &[NewMessage::assistant(welcome.clone())])
            .await?;
        info!(
            "Started session {} for user {user_id} ({job_role}, {} questions)",
            state.session_id, self.total_questions
        );

        Ok(StartedInterview {
            session_id: state.session_id,
            welcome_message: welcome,
            total_questions: self.total_questions,
        })
    }

    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        answer: &str,
    ) -> Result<AnswerResponse, AppError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AppError::Validation("answer must not be empty".into()));
        }

        let _guard = self.lock.try_acquire(session_id).await?.ok_or_else(|| {
            AppError::Conflict(format!(
                "Another answer for session {session_id} is being processed"
            ))
        })?;

        let stored = self
            .sessions
            .load(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

        let mut state = stored.state.clone();
        let outcome = self.orchestrator.run_turn(&mut state, answer).await?;

        if !outcome.already_completed {
            let mut messages = vec![NewMessage::user(answer)];
            if let Some(question) = &outcome.next_question {
                messages.push(NewMessage::assistant(question.clone()));
            }
            if let Some(message) = &outcome.message {
                messages.push(NewMessage::assistant(message.clone()));
            }
            self.sessions
                .save_turn(session_id, stored.record.version, &state, &messages)
                .await?;
        }

        Ok(AnswerResponse {
            session_id,
            message: outcome.message,
            evaluation: outcome.evaluation,
            next_question: outcome.next_question,
            completed: outcome.completed,
            report: outcome.report,
            question_count: state.question_count,
            total_questions: state.total_questions,
        })
    }

    pub async fn get_report(&self, session_id: Uuid) -> Result<InterviewReport, AppError> {
        let stored = self.load(session_id).await?;
        if !stored.state.is_completed() {
            return Err(AppError::NotCompleted(format!(
                "Session {session_id} has answered {} of {} questions",
                stored.state.question_count,
                stored.state.total_questions + 1
            )));
        }
        stored.state.report.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Completed session {session_id} has no stored report"
            ))
        })
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<SessionView, AppError> {
        Ok(self.load(session_id).await?.into())
    }

    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError> {
        self.sessions.list_for_user(user_id).await
    }

    pub async fn list_messages(&self, session_id: Uuid) -> Result<Vec<MessageRecord>, AppError> {
        self.load(session_id).await?;
        self.sessions.messages(session_id).await
    }

    pub async fn delete_session(&self, session_id: Uuid) -> Result<(), AppError> {
        if !self.sessions.delete(session_id).await? {
            return Err(AppError::NotFound(format!("Session {session_id} not found")));
        }
        info!("Deleted session {session_id}");
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<StoredSession, AppError> {
        self.sessions
            .load(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::interview::lock::LocalTurnLock;
    use crate::interview::models::SessionStatus;
    use crate::interview::store::MemorySessionStore;
    use crate::knowledge::MemoryResumeStore;
    use crate::models::resume::{ResumeRecord, ResumeSummary};
    use crate::testing::{interview_generator, test_orchestrator, ScriptedGenerator};

    struct Fixture {
        service: InterviewService,
        sessions: Arc<MemorySessionStore>,
        user_id: Uuid,
        resume_id: Uuid,
    }

    async fn fixture(llm: ScriptedGenerator, total_questions: usize) -> Fixture {
        let resumes = Arc::new(MemoryResumeStore::default());
        let user_id = Uuid::new_v4();
        let resume = ResumeRecord {
            id: Uuid::new_v4(),
            user_id,
            file_name: "cv.pdf".into(),
            file_hash: "hash".into(),
            summary: ResumeSummary {
                candidate_overview: "Analyst with SQL and Python.".into(),
                recommended_domains: vec![Domain::Python, Domain::Sql],
                ..Default::default()
            },
            num_chunks: 0,
            matched_domains: vec![],
            created_at: Utc::now(),
        };
        resumes.insert_if_absent(&resume).await.unwrap();

        let sessions = Arc::new(MemorySessionStore::default());
        let service = InterviewService::new(
            test_orchestrator(Arc::new(llm)),
            sessions.clone(),
            resumes,
            Arc::new(LocalTurnLock::default()),
            total_questions,
        );
        Fixture {
            service,
            sessions,
            user_id,
            resume_id: resume.id,
        }
    }

    #[tokio::test]
    async fn test_intro_plus_five_answers_completes_with_report() {
        let f = fixture(interview_generator(), 5).await;
        let started = f
            .service
            .start_interview(f.user_id, f.resume_id, "Data Analyst")
            .await
            .unwrap();
        assert!(started.welcome_message.contains("Data Analyst"));
        let id = started.session_id;

        let ready = f.service.submit_answer(id, "Yes, ready").await.unwrap();
        assert!(ready.next_question.is_some());

        for call in 1..=6 {
            let response = f
                .service
                .submit_answer(id, "I would index the join keys and read the query plan.")
                .await
                .unwrap();
            assert_eq!(response.completed, call == 6, "call {call}");
            assert_eq!(response.question_count, call);
            if call < 6 {
                assert!(matches!(
                    f.service.get_report(id).await,
                    Err(AppError::NotCompleted(_))
                ));
            }
        }

        let report = f.service.get_report(id).await.unwrap();
        assert_eq!(report.evaluation_history.len(), 6);
        assert_eq!(report.executive_summary.questions_answered, 6);
        assert!(report.insights.generated);

        let view = f.service.get_session(id).await.unwrap();
        assert_eq!(view.record.status, "completed");
        assert_eq!(view.domain_coverage.values().sum::<usize>(), 5);

        // welcome + (yes, intro) + 5 x (answer, question) + (answer, closing)
        let messages = f.service.list_messages(id).await.unwrap();
        assert_eq!(messages.len(), 1 + 2 + 10 + 2);
        assert_eq!(messages[0].role, "assistant");
    }

    #[tokio::test]
    async fn test_concurrent_answers_conflict() {
        let f = fixture(interview_generator(), 5).await;
        let id = f
            .service
            .start_interview(f.user_id, f.resume_id, "Data Analyst")
            .await
            .unwrap()
            .session_id;
        f.service.submit_answer(id, "yes").await.unwrap();

        let (first, second) = tokio::join!(
            f.service.submit_answer(id, "First answer about my background."),
            f.service.submit_answer(id, "Second answer about my background.")
        );
        let conflicts = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(AppError::Conflict(_))))
            .count();
        assert_eq!(conflicts, 1);
        assert_eq!(first.is_ok() as usize + second.is_ok() as usize, 1);

        let stored = f.sessions.load(id).await.unwrap().unwrap();
        assert_eq!(stored.state.question_count, 1);
        assert_eq!(stored.state.user_answers.len(), 1);
        assert_eq!(stored.record.version, 2);
    }

    #[tokio::test]
    async fn test_completed_session_replays_without_writing() {
        let f = fixture(interview_generator(), 1).await;
        let id = f
            .service
            .start_interview(f.user_id, f.resume_id, "Data Analyst")
            .await
            .unwrap()
            .session_id;
        for answer in ["yes", "intro", "answer"] {
            f.service.submit_answer(id, answer).await.unwrap();
        }
        let before = f.sessions.load(id).await.unwrap().unwrap();
        assert_eq!(before.state.status, SessionStatus::Completed);

        let replay = f.service.submit_answer(id, "hello?").await.unwrap();
        assert!(replay.completed);
        assert_eq!(replay.report, before.state.report);

        let after = f.sessions.load(id).await.unwrap().unwrap();
        assert_eq!(after.record.version, before.record.version);
        assert_eq!(after.state, before.state);
    }

    #[tokio::test]
    async fn test_failed_question_generation_persists_nothing() {
        let llm = ScriptedGenerator::new()
            .fail_on("technical interview question about")
            .merge(interview_generator());
        let f = fixture(llm, 5).await;
        let id = f
            .service
            .start_interview(f.user_id, f.resume_id, "Data Analyst")
            .await
            .unwrap()
            .session_id;
        f.service.submit_answer(id, "yes").await.unwrap();
        let before = f.sessions.load(id).await.unwrap().unwrap();

        let result = f.service.submit_answer(id, "My background is analytics.").await;
        assert!(matches!(result, Err(AppError::QuestionGenerationFailed(_))));

        let after = f.sessions.load(id).await.unwrap().unwrap();
        assert_eq!(after.record.version, before.record.version);
        assert_eq!(after.state, before.state);
        // The lock was released with the failed turn.
        assert!(matches!(
            f.service.submit_answer(id, "retry").await,
            Err(AppError::QuestionGenerationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_input_and_lookup_errors() {
        let f = fixture(interview_generator(), 5).await;
        assert!(matches!(
            f.service
                .start_interview(f.user_id, Uuid::new_v4(), "Analyst")
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.service
                .start_interview(Uuid::new_v4(), f.resume_id, "Analyst")
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.service.submit_answer(Uuid::new_v4(), "hi").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.service.submit_answer(Uuid::new_v4(), "   ").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            f.service.delete_session(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
