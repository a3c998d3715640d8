// Prompt constants for resume tailoring.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};

/// System prompt for tailoring. Composed at call time so the JSON rule stays in one place.
pub fn tailor_system() -> String {
    format!(
        "You are an expert resume coach who tailors resumes to a specific job description. \
         {JSON_ONLY_SYSTEM}"
    )
}

/// Tailoring prompt template. Replace `{blocks_json}`, `{keywords}` and `{jd_text}` before sending.
pub const TAILOR_PROMPT_TEMPLATE: &str = r#"Tailor the resume blocks below to the job description.

Return a JSON object with this EXACT schema (no extra fields):
{
  "rewritten_blocks": [
    {
      "title": "Software Engineer, Acme",
      "bullets": ["Built Python services handling 2M requests/day"],
      "matched_keywords": ["python"],
      "missing_keywords": ["aws"]
    }
  ],
  "ats_score": 78,
  "gap_suggestions": ["Add any AWS experience you have"]
}

Rules:
- Return exactly one rewritten block per input block, in the same order, with the same title.
- Bullets start with a strong action verb and stay under 25 words.
- matched_keywords: JD keywords the block genuinely demonstrates.
- missing_keywords: at most 3 JD keywords the block does not demonstrate.
- ats_score: integer 0-100, how well the whole resume covers the JD keywords.
- gap_suggestions: at most 5 concrete, honest suggestions for closing gaps.

{grounding}

JD KEYWORDS:
{keywords}

RESUME BLOCKS:
{blocks_json}

JOB DESCRIPTION:
{jd_text}"#;

pub fn build_tailor_prompt(blocks_json: &str, keywords: &[String], jd_text: &str) -> String {
    TAILOR_PROMPT_TEMPLATE
        .replace("{grounding}", GROUNDING_INSTRUCTION)
        .replace("{keywords}", &keywords.join(", "))
        .replace("{blocks_json}", blocks_json)
        .replace("{jd_text}", jd_text)
}
