// Shared prompt fragments. Each service that needs LLM calls defines its own
// prompts.rs alongside it and composes these in.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every rewriting prompt.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Rewrite only what the candidate's resume already states. \
    Do NOT invent employers, titles, dates, metrics or technologies. \
    A JD keyword the resume does not support belongs in missing_keywords, never in a bullet.";
