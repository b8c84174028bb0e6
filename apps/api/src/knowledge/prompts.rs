// Resume knowledge LLM prompt templates.
// All prompts for the knowledge module are defined here.

pub const CLASSIFY_SYSTEM: &str = "\
You are a technical recruiter tagging resume entries with skill domains. \
Only use domains from the allowed list. Never invent new labels.";

pub const CLASSIFY_PROMPT: &str = r#"Classify this resume entry into at most 3 technical domains.

ALLOWED DOMAINS:
{domains}

RESUME ENTRY:
{entry}

Return exactly this JSON structure, most relevant domain first:
{"domains": ["<domain>", "..."]}

If the entry has no technical content, return {"domains": []}."#;

pub const SUMMARY_SYSTEM: &str = "\
You are an experienced technical interviewer preparing for an interview. \
Summarize the candidate's resume factually. Do not invent experience that is not in the text.";

pub const SUMMARY_PROMPT: &str = r#"Summarize this resume for interview planning.

ALLOWED DOMAINS (for recommended_domains):
{domains}

RESUME:
{resume}

Return exactly this JSON structure:
{
  "candidate_overview": "2-3 sentence overview of the candidate",
  "key_experiences": ["most relevant role or project", "..."],
  "technical_skills": ["skill", "..."],
  "recommended_domains": ["<domain>", "..."],
  "key_strengths": ["strength", "..."],
  "experience_level": "entry" | "mid" | "senior"
}

recommended_domains must be ordered from strongest evidence to weakest and contain between
1 and 6 entries from the allowed list."#;
