//! Question pipeline.
//!
//! Stage A writes a generic question from `(domain, difficulty, job_role)` only and has no
//! fallback: exhausting its attempts is `QuestionGenerationFailed`. Stage B blends the raw
//! question with retrieved resume chunks and falls back to the raw question on any failure
//! or invalid output.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::models::QuestionContext;
use crate::interview::prompts::{
    INTERVIEWER_SYSTEM, INTRO_QUESTION_PROMPT, PERSONALIZE_PROMPT, PERSONALIZE_SYSTEM,
    RAW_QUESTION_PROMPT, STANDALONE_PROMPT,
};
use crate::llm_client::prompts::{fill, SINGLE_QUESTION_INSTRUCTION};
use crate::llm_client::{with_timeout, Embedder, GenerationParams, GenerationRequest, TextGenerator};
use crate::models::domain::{Difficulty, Domain};
use crate::models::resume::ResumeSummary;
use crate::retrieval::{retrieve_for_domain, VectorIndex};

pub const MIN_RAW_QUESTION_CHARS: usize = 10;
pub const RAW_QUESTION_ATTEMPTS: usize = 2;
pub const RETRIEVAL_TOP_K: usize = 3;
/// Below this much retrieved text Stage B rephrases without resume context.
pub const MIN_CONTEXT_CHARS: usize = 20;
pub const MIN_QUESTION_WORDS: usize = 20;
pub const MAX_QUESTION_WORDS: usize = 80;

pub const FALLBACK_INTRO_QUESTION: &str = "To get us started, could you tell me a little \
    about yourself, your background, and what drew you to this role?";

const INTRO_PARAMS: GenerationParams = GenerationParams::new(150, 0.7);
const RAW_PARAMS: GenerationParams = GenerationParams::new(200, 0.8);
const PERSONALIZE_PARAMS: GenerationParams = GenerationParams::new(300, 0.7);

const SPECIAL_TOKENS: [&str; 7] = [
    "<|end_of_text|>",
    "<|endoftext|>",
    "<|im_end|>",
    "</s>",
    "<eos>",
    "[END]",
    "###",
];

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub raw: String,
    pub text: String,
    pub personalized: bool,
}

pub struct QuestionPipeline {
    llm: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    stage_timeout: Duration,
}

impl QuestionPipeline {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            embedder,
            index,
            stage_timeout,
        }
    }

    /// The "tell me about yourself" opener. Falls back to a fixed question.
    pub async fn intro_question(&self, job_role: &str, summary: &ResumeSummary) -> String {
        let prompt = fill(
            INTRO_QUESTION_PROMPT,
            &[
                ("job_role", job_role),
                ("overview", summary.candidate_overview.as_str()),
                ("single_question", SINGLE_QUESTION_INSTRUCTION),
            ],
        );
        let request = GenerationRequest::prompt(INTERVIEWER_SYSTEM, prompt, INTRO_PARAMS);

        match with_timeout(self.stage_timeout, self.llm.generate(&request)).await {
            Ok(text) => {
                let first_line = strip_prompt_echo(&text)
                    .lines()
                    .map(clean_raw_output)
                    .find(|l| !l.is_empty())
                    .unwrap_or_default();
                if first_line.chars().count() >= MIN_RAW_QUESTION_CHARS {
                    return first_line;
                }
                warn!("Intro question too short; using fixed intro");
            }
            Err(e) => warn!("Intro question generation failed, using fixed intro: {e}"),
        }
        FALLBACK_INTRO_QUESTION.to_string()
    }

    /// Stage A. Resume content is deliberately absent from the prompt.
    pub async fn generate_raw(
        &self,
        domain: Domain,
        difficulty: Difficulty,
        job_role: &str,
    ) -> Result<String, AppError> {
        let prompt = fill(
            RAW_QUESTION_PROMPT,
            &[
                ("difficulty", difficulty.as_str()),
                ("domain", domain.label()),
                ("job_role", job_role),
                ("single_question", SINGLE_QUESTION_INSTRUCTION),
            ],
        );
        let request = GenerationRequest::prompt(INTERVIEWER_SYSTEM, prompt, RAW_PARAMS);

        let mut last_failure = String::new();
        for attempt in 1..=RAW_QUESTION_ATTEMPTS {
            match with_timeout(self.stage_timeout, self.llm.generate(&request)).await {
                Ok(text) => {
                    let cleaned = clean_raw_output(&text);
                    if cleaned.chars().count() >= MIN_RAW_QUESTION_CHARS {
                        return Ok(cleaned);
                    }
                    last_failure = format!("output too short ({} chars)", cleaned.chars().count());
                }
                Err(e) => last_failure = e.to_string(),
            }
            warn!("Raw {domain} question attempt {attempt}/{RAW_QUESTION_ATTEMPTS} failed: {last_failure}");
        }

        Err(AppError::QuestionGenerationFailed(format!(
            "{domain} ({difficulty}) question: {last_failure}"
        )))
    }

    /// Stage B. Never fails; any problem yields `raw` unchanged.
    pub async fn personalize(
        &self,
        raw: &str,
        domain: Domain,
        resume_id: Uuid,
        intent: &str,
    ) -> (String, bool) {
        let context = self.resume_context(raw, domain, resume_id).await;
        let template = if context.trim().chars().count() < MIN_CONTEXT_CHARS {
            debug!("No usable {domain} resume context; rephrasing standalone");
            STANDALONE_PROMPT
        } else {
            PERSONALIZE_PROMPT
        };
        let prompt = fill(
            template,
            &[
                ("raw_question", raw),
                ("domain", domain.label()),
                ("intent", intent),
                ("context", context.as_str()),
                ("single_question", SINGLE_QUESTION_INSTRUCTION),
            ],
        );
        let request = GenerationRequest::prompt(PERSONALIZE_SYSTEM, prompt, PERSONALIZE_PARAMS);

        match with_timeout(self.stage_timeout, self.llm.generate(&request)).await {
            Ok(text) => match clean_personalized(&text) {
                Some(question) => return (question, true),
                None => warn!("Personalized question failed validation; using raw question"),
            },
            Err(e) => warn!("Personalization failed, using raw question: {e}"),
        }
        (raw.to_string(), false)
    }

    /// Stage A then Stage B for the planned question.
    pub async fn generate(
        &self,
        context: &QuestionContext,
        intent: &str,
        job_role: &str,
        resume_id: Uuid,
    ) -> Result<GeneratedQuestion, AppError> {
        let raw = self
            .generate_raw(context.domain, context.difficulty, job_role)
            .await?;
        let (text, personalized) = self
            .personalize(&raw, context.domain, resume_id, intent)
            .await;
        Ok(GeneratedQuestion {
            raw,
            text,
            personalized,
        })
    }

    async fn resume_context(&self, raw: &str, domain: Domain, resume_id: Uuid) -> String {
        let retrieval = retrieve_for_domain(
            self.index.as_ref(),
            self.embedder.as_ref(),
            raw,
            resume_id,
            domain,
            RETRIEVAL_TOP_K,
        );
        match tokio::time::timeout(self.stage_timeout, retrieval).await {
            Ok(Ok(hits)) => hits
                .into_iter()
                .map(|hit| format!("[{}] {}", hit.parent_section, hit.text))
                .collect::<Vec<_>>()
                .join("\n\n"),
            Ok(Err(e)) => {
                warn!("Resume retrieval failed: {e}");
                String::new()
            }
            Err(_) => {
                warn!("Resume retrieval timed out after {:?}", self.stage_timeout);
                String::new()
            }
        }
    }
}

pub fn assessment_intent(domain: Domain, difficulty: Difficulty) -> String {
    format!("Assess {domain} skills at {difficulty} difficulty")
}

fn preamble_pattern() -> &'static Regex {
    static PREAMBLE_RE: OnceLock<Regex> = OnceLock::new();
    PREAMBLE_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:sure[!,.]?\s*)?(?:here(?:'s| is)[^:\n]*:|(?:personali[sz]ed |rewritten |rephrased |final |interview )?question\s*\d*\s*:)\s*",
        )
        .expect("preamble pattern is valid")
    })
}

fn strip_preamble(line: &str) -> &str {
    match preamble_pattern().find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

fn strip_wrapping(text: &str) -> &str {
    text.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '`')
        .trim()
}

fn strip_prompt_echo(text: &str) -> &str {
    match text.rfind("### Response:") {
        Some(pos) => &text[pos + "### Response:".len()..],
        None => text,
    }
}

/// Stage A cleanup: drop prompt echoes, special tokens and preambles; collapse whitespace.
pub fn clean_raw_output(text: &str) -> String {
    let mut text = strip_prompt_echo(text).to_string();
    for token in SPECIAL_TOKENS {
        text = text.replace(token, "");
    }
    let text = strip_wrapping(strip_preamble(text.trim()));
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stage B cleanup and validation. Keeps the first line that asks something, cut at its
/// last question mark, and accepts it only within the word bounds.
pub fn clean_personalized(text: &str) -> Option<String> {
    let mut text = text.to_string();
    for token in SPECIAL_TOKENS {
        text = text.replace(token, "");
    }

    let line = text
        .lines()
        .map(|l| strip_wrapping(strip_preamble(l)))
        .find(|l| l.contains('?'))?;
    let end = line.rfind('?')?;
    let question = strip_wrapping(&line[..=end]);
    let question = question.split_whitespace().collect::<Vec<_>>().join(" ");

    let words = question.split_whitespace().count();
    let valid = question.ends_with('?') && (MIN_QUESTION_WORDS..=MAX_QUESTION_WORDS).contains(&words);
    valid.then_some(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::HashingEmbedder;
    use crate::retrieval::{MemoryVectorIndex, ResumeChunk};
    use crate::testing::{ScriptedGenerator, PERSONALIZED_QUESTION};

    fn pipeline(llm: ScriptedGenerator, index: Arc<MemoryVectorIndex>) -> QuestionPipeline {
        QuestionPipeline::new(
            Arc::new(llm),
            Arc::new(HashingEmbedder::default()),
            index,
            Duration::from_secs(5),
        )
    }

    fn context() -> QuestionContext {
        QuestionContext {
            technical_index: 0,
            domain: Domain::Sql,
            difficulty: Difficulty::Medium,
        }
    }

    #[test]
    fn test_clean_raw_output_strips_tokens_and_echo() {
        let raw = "### Instruction: ask\n### Response: Question: What is a LEFT JOIN?<|end_of_text|></s>";
        assert_eq!(clean_raw_output(raw), "What is a LEFT JOIN?");
    }

    #[test]
    fn test_clean_personalized_strips_preamble_and_trailing_text() {
        let text = format!("Here is the personalized question:\n\"{PERSONALIZED_QUESTION}\" Good luck!");
        assert_eq!(clean_personalized(&text).as_deref(), Some(PERSONALIZED_QUESTION));
    }

    #[test]
    fn test_clean_personalized_rejects_missing_question_mark() {
        assert_eq!(clean_personalized("Describe your experience with indexing in detail."), None);
    }

    #[test]
    fn test_clean_personalized_enforces_word_bounds() {
        assert_eq!(clean_personalized("What is SQL?"), None);
        let long = format!("{} ok?", "word ".repeat(90));
        assert_eq!(clean_personalized(&long), None);
    }

    #[test]
    fn test_assessment_intent_wording() {
        assert_eq!(
            assessment_intent(Domain::MachineLearning, Difficulty::Hard),
            "Assess Machine Learning skills at hard difficulty"
        );
    }

    #[tokio::test]
    async fn test_raw_generation_retries_once_then_fails() {
        let llm = ScriptedGenerator::new().on("technical interview question about", "Hm?");
        let calls = llm.call_counter();
        let result = pipeline(llm, Arc::default())
            .generate_raw(Domain::Sql, Difficulty::Easy, "Analyst")
            .await;
        assert!(matches!(result, Err(AppError::QuestionGenerationFailed(_))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), RAW_QUESTION_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_raw_generation_recovers_on_second_attempt() {
        let llm = ScriptedGenerator::new().on_sequence(
            "technical interview question about",
            vec!["short", "What does GROUP BY do in SQL?"],
        );
        let raw = pipeline(llm, Arc::default())
            .generate_raw(Domain::Sql, Difficulty::Easy, "Analyst")
            .await
            .unwrap();
        assert_eq!(raw, "What does GROUP BY do in SQL?");
    }

    #[tokio::test]
    async fn test_personalization_failure_returns_raw_verbatim() {
        let llm = ScriptedGenerator::new()
            .on("technical interview question about", "How would you speed up a slow SQL join?")
            .fail_on("Rewrite the interview question")
            .fail_on("Rephrase this interview question");
        let generated = pipeline(llm, Arc::default())
            .generate(&context(), "Assess SQL", "Analyst", Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(generated.text, generated.raw);
        assert_eq!(generated.text, "How would you speed up a slow SQL join?");
        assert!(!generated.personalized);
    }

    #[tokio::test]
    async fn test_personalization_uses_resume_context_when_available() {
        let resume_id = Uuid::new_v4();
        let index = Arc::new(MemoryVectorIndex::default());
        let text = "Tuned Postgres query plans and composite indexes for reporting";
        index
            .upsert(&[ResumeChunk {
                id: Uuid::new_v4(),
                resume_id,
                chunk_index: 0,
                text: text.into(),
                parent_section: "experience".into(),
                entry_index: 0,
                domains: vec![Domain::Sql],
                primary_domain: Some(Domain::Sql),
                embedding: HashingEmbedder::default().embed_text(text),
            }])
            .await
            .unwrap();

        let llm = ScriptedGenerator::new()
            .on("technical interview question about", "How would you speed up a slow SQL join?")
            .on("Rewrite the interview question", PERSONALIZED_QUESTION)
            .on("Rephrase this interview question", "standalone should not be used");
        let generated = pipeline(llm, index)
            .generate(&context(), "Assess SQL", "Analyst", resume_id)
            .await
            .unwrap();
        assert!(generated.personalized);
        assert_eq!(generated.text, PERSONALIZED_QUESTION);
    }

    #[tokio::test]
    async fn test_intro_question_keeps_first_line_only() {
        let llm = ScriptedGenerator::new().on(
            "Write the opening question",
            "\"Could you tell me about yourself and your background?\"\nThis helps me tailor the interview.",
        );
        let intro = pipeline(llm, Arc::default())
            .intro_question("Analyst", &ResumeSummary::default())
            .await;
        assert_eq!(intro, "Could you tell me about yourself and your background?");
    }

    #[tokio::test]
    async fn test_intro_question_falls_back_to_fixed_text() {
        let llm = ScriptedGenerator::new().fail_on("Write the opening question");
        let intro = pipeline(llm, Arc::default())
            .intro_question("Analyst", &ResumeSummary::default())
            .await;
        assert_eq!(intro, FALLBACK_INTRO_QUESTION);
    }
}
