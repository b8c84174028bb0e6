// Interview LLM prompt templates.
// All prompts for the interview module are defined here.

pub const INTERVIEWER_SYSTEM: &str = "\
You are a friendly, professional technical interviewer. \
You ask exactly one clear question at a time.";

pub const INTRO_QUESTION_PROMPT: &str = r#"Write the opening question of an interview for a {job_role} role.

CANDIDATE OVERVIEW:
{overview}

Ask the candidate to introduce themselves and their background in one or two warm sentences.
{single_question}"#;

pub const RAW_QUESTION_PROMPT: &str = r#"Write one {difficulty} technical interview question about {domain} for a {job_role} candidate.

Difficulty guide:
- easy: core concepts and definitions
- medium: applying concepts to a realistic scenario
- hard: trade-offs, edge cases, design or optimisation under constraints

{single_question}"#;

pub const PERSONALIZE_SYSTEM: &str = "\
You adapt technical interview questions to a candidate's own experience \
without changing what the question assesses.";

pub const PERSONALIZE_PROMPT: &str = r#"Rewrite the interview question so it connects to the candidate's experience.

ORIGINAL QUESTION:
{raw_question}

DOMAIN: {domain}
ASSESSMENT INTENT: {intent}

CANDIDATE EXPERIENCE (from resume):
{context}

Rules:
- Keep the same technical concept and difficulty.
- Reference one concrete project, tool or role from the experience above.
- Between 20 and 80 words, ending with a single question mark.
{single_question}"#;

pub const STANDALONE_PROMPT: &str = r#"Rephrase this interview question so it reads naturally in a spoken interview.

ORIGINAL QUESTION:
{raw_question}

DOMAIN: {domain}
ASSESSMENT INTENT: {intent}

Rules:
- Keep the same technical concept and difficulty.
- Between 20 and 80 words, ending with a single question mark.
{single_question}"#;

pub const REFERENCE_ANSWER_SYSTEM: &str = "\
You are a senior {domain} expert writing concise model answers used to grade interviews.";

pub const REFERENCE_ANSWER_PROMPT: &str = r#"Write a concise, accurate expert answer (at most 150 words) to this interview question.

QUESTION:
{question}"#;

pub const JUDGE_SYSTEM: &str = "\
You are a strict but fair technical interview grader. \
Score only what the candidate actually said.";

pub const JUDGE_PROMPT: &str = r#"Grade the candidate's answer against the reference answer.

QUESTION:
{question}

REFERENCE ANSWER:
{reference}

CANDIDATE ANSWER:
{answer}

Return exactly this JSON structure, every score between 0.0 and 1.0:
{
  "technical_accuracy": 0.0,
  "completeness": 0.0,
  "clarity": 0.0,
  "overall_score": 0.0,
  "feedback": "2-3 sentences of constructive feedback addressed to the candidate",
  "analysis": "short analysis of strengths and gaps"
}"#;

pub const INSIGHTS_SYSTEM: &str = "\
You are an expert technical interviewer providing actionable feedback.";

pub const INSIGHTS_PROMPT: &str = r#"Based on this interview performance data for a {job_role} position, write insights for the candidate.

Overall score: {overall}%

Domain scores:
{domains}

Difficulty scores:
{difficulties}

Metrics:
- Technical accuracy: {accuracy}%
- Completeness: {completeness}%
- Clarity: {clarity}%

Return exactly this JSON structure:
{
  "overall_summary": "2-3 sentence summary of performance",
  "strengths": ["...", "...", "..."],
  "areas_for_improvement": ["...", "...", "..."],
  "recommendations": ["...", "...", "..."],
  "hiring_recommendation": {
    "decision": "Strongly Recommend" | "Recommend" | "Consider" | "Not Recommended",
    "confidence": 0.0,
    "reasoning": "brief reasoning"
  }
}

Be specific and use the data provided."#;
