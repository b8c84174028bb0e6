// Shared prompt constants and prompt-building utilities.
// Each module that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction appended to prompts whose output is shown to the candidate verbatim.
pub const SINGLE_QUESTION_INSTRUCTION: &str = "\
    Return ONLY the question text. No preamble such as \"Here is the question:\", \
    no numbering, no quotes, no explanations.";

/// Fills `{key}` placeholders in a template. Placeholders without a value are left as-is.
/// Substituted values are never rescanned, so braces inside them survive untouched.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = tail.find('}').and_then(|close| {
            let key = &tail[1..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Joins a system prompt with the shared JSON-only fragment.
pub fn json_system(base: &str) -> String {
    format!("{base} {JSON_ONLY_SYSTEM}")
}
