//! Interview orchestration core: planning, the turn state machine, the question and
//! evaluation pipelines, the final report, and session persistence.

pub mod evaluation;
pub mod handlers;
pub mod lock;
pub mod models;
pub mod orchestrator;
pub mod plan;
pub mod prompts;
pub mod question;
pub mod report;
pub mod service;
pub mod store;

pub use lock::{LocalTurnLock, RedisTurnLock, TurnLock};
pub use orchestrator::TurnOrchestrator;
pub use service::InterviewService;
pub use store::{MemorySessionStore, PgSessionStore, SessionStore};
