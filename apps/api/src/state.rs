use std::sync::Arc;
use std::time::Duration;

use crate::interview::evaluation::EvaluationPipeline;
use crate::interview::question::QuestionPipeline;
use crate::interview::report::ReportBuilder;
use crate::interview::{
    InterviewService, LocalTurnLock, MemorySessionStore, SessionStore, TurnLock, TurnOrchestrator,
};
use crate::knowledge::{MemoryResumeStore, ResumeIngestor, ResumeStore};
use crate::llm_client::{Embedder, HashingEmbedder, TextGenerator};
use crate::retrieval::{MemoryVectorIndex, VectorIndex};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<ResumeIngestor>,
    pub resumes: Arc<dyn ResumeStore>,
    pub interviews: Arc<InterviewService>,
}

/// The capability implementations the service runs on.
pub struct Backends {
    pub llm: Arc<dyn TextGenerator>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub resumes: Arc<dyn ResumeStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub lock: Arc<dyn TurnLock>,
}

impl Backends {
    /// Everything in process: hashing embedder, memory stores and index, local lock.
    pub fn in_memory(llm: Arc<dyn TextGenerator>) -> Self {
        Self {
            llm,
            embedder: Arc::new(HashingEmbedder::default()),
            index: Arc::new(MemoryVectorIndex::default()),
            resumes: Arc::new(MemoryResumeStore::default()),
            sessions: Arc::new(MemorySessionStore::default()),
            lock: Arc::new(LocalTurnLock::default()),
        }
    }
}

impl AppState {
    pub fn assemble(backends: Backends, total_questions: usize, stage_timeout: Duration) -> Self {
        let Backends {
            llm,
            embedder,
            index,
            resumes,
            sessions,
            lock,
        } = backends;

        let ingestor = ResumeIngestor::new(
            llm.clone(),
            embedder.clone(),
            index.clone(),
            resumes.clone(),
            stage_timeout,
        );
        let orchestrator = TurnOrchestrator::new(
            QuestionPipeline::new(llm.clone(), embedder, index, stage_timeout),
            EvaluationPipeline::new(llm.clone(), stage_timeout),
            ReportBuilder::new(llm, stage_timeout),
        );
        let interviews =
            InterviewService::new(orchestrator, sessions, resumes.clone(), lock, total_questions);

        AppState {
            ingestor: Arc::new(ingestor),
            resumes,
            interviews: Arc::new(interviews),
        }
    }
}
