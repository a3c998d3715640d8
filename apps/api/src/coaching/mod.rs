//! AI coaching: rewrites resume blocks against a job description.
//!
//! Two backends share the `Tailor` trait:
//! - `LlmTailor`: asks the model for rewritten bullets, keyword coverage and a score.
//! - `HeuristicTailor`: deterministic keyword matching, always available.
//!
//! `Coach` wraps them so a tailoring pass never fails because the LLM is down.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::{Completion, LlmError};
use crate::models::resume::{ResumeBlock, RewrittenBlock};

pub mod handlers;
pub mod heuristic;
pub mod llm;
pub mod prompts;

pub use heuristic::HeuristicTailor;
pub use llm::LlmTailor;

/// The job description a tailoring pass targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JdTarget {
    pub text: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailorBackend {
    Llm,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailoringResult {
    pub rewritten_blocks: Vec<RewrittenBlock>,
    pub ats_score: i32,
    pub gap_suggestions: Vec<String>,
    pub backend: TailorBackend,
}

impl TailoringResult {
    /// Distinct JD keywords matched anywhere in the resume, in first-seen order.
    pub fn matched_keywords(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for kw in self
            .rewritten_blocks
            .iter()
            .flat_map(|b| b.matched_keywords.iter())
        {
            if !seen.contains(&kw.as_str()) {
                seen.push(kw.as_str());
            }
        }
        seen
    }
}

#[derive(Debug, Error)]
pub enum TailorError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM response had no rewritten blocks")]
    EmptyRewrite,
}

#[async_trait]
pub trait Tailor: Send + Sync {
    async fn tailor(
        &self,
        blocks: &[ResumeBlock],
        jd: &JdTarget,
    ) -> Result<TailoringResult, TailorError>;
}

/// Where resume content may be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachingMode {
    #[default]
    Remote,
    /// Consent or regional policy forbids sending content to the LLM.
    LocalOnly,
}

/// Runs the primary tailor and degrades to the heuristic on any failure.
#[derive(Clone)]
pub struct Coach {
    primary: Option<Arc<dyn Tailor>>,
    fallback: HeuristicTailor,
    mode: CoachingMode,
}

impl Coach {
    pub fn new(llm: Option<Arc<dyn Completion>>, mode: CoachingMode) -> Self {
        Self {
            primary: llm.map(|llm| Arc::new(LlmTailor::new(llm)) as Arc<dyn Tailor>),
            fallback: HeuristicTailor,
            mode,
        }
    }

    /// A coach that never leaves the process.
    pub fn local_only() -> Self {
        Self::new(None, CoachingMode::LocalOnly)
    }

    pub fn mode(&self) -> CoachingMode {
        self.mode
    }

    pub async fn tailor(&self, blocks: &[ResumeBlock], jd: &JdTarget) -> TailoringResult {
        self.tailor_with_mode(blocks, jd, self.mode).await
    }

    /// Like [`Coach::tailor`], with a per-call mode; `LocalOnly` always wins.
    pub async fn tailor_with_mode(
        &self,
        blocks: &[ResumeBlock],
        jd: &JdTarget,
        mode: CoachingMode,
    ) -> TailoringResult {
        let local_only =
            self.mode == CoachingMode::LocalOnly || mode == CoachingMode::LocalOnly;

        if let (false, Some(primary)) = (local_only, &self.primary) {
            match primary.tailor(blocks, jd).await {
                Ok(result) => {
                    info!("LLM tailoring succeeded: ats_score={}", result.ats_score);
                    return result;
                }
                Err(e) => warn!("LLM tailoring failed, using heuristic fallback: {e}"),
            }
        }

        self.fallback.tailor_blocks(blocks, jd)
    }
}
