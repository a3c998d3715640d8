use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::prompts::{build_tailor_prompt, tailor_system};
use super::{JdTarget, Tailor, TailorBackend, TailorError, TailoringResult};
use crate::llm_client::{complete_json, Completion, LlmError};
use crate::models::resume::{ResumeBlock, RewrittenBlock};

#[derive(Debug, Deserialize)]
struct LlmTailoring {
    rewritten_blocks: Vec<RewrittenBlock>,
    ats_score: f64,
    #[serde(default)]
    gap_suggestions: Vec<String>,
}

/// Tailors through the LLM. Any provider or parse failure surfaces as an error
/// so the caller can fall back.
#[derive(Clone)]
pub struct LlmTailor {
    llm: Arc<dyn Completion>,
}

impl LlmTailor {
    pub fn new(llm: Arc<dyn Completion>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tailor for LlmTailor {
    async fn tailor(
        &self,
        blocks: &[ResumeBlock],
        jd: &JdTarget,
    ) -> Result<TailoringResult, TailorError> {
        let blocks_json = serde_json::to_string_pretty(blocks).map_err(LlmError::Parse)?;
        let prompt = build_tailor_prompt(&blocks_json, &jd.keywords, &jd.text);
        debug!("Tailoring {} blocks against {} keywords", blocks.len(), jd.keywords.len());

        let parsed: LlmTailoring =
            complete_json(self.llm.as_ref(), &prompt, &tailor_system()).await?;
        if parsed.rewritten_blocks.is_empty() {
            return Err(TailorError::EmptyRewrite);
        }

        Ok(TailoringResult {
            rewritten_blocks: parsed.rewritten_blocks,
            ats_score: parsed.ats_score.clamp(0.0, 100.0).round() as i32,
            gap_suggestions: parsed.gap_suggestions,
            backend: TailorBackend::Llm,
        })
    }
}
