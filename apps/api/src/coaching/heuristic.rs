//! Deterministic tailoring used when the LLM is unavailable or not allowed.

use async_trait::async_trait;

use super::{JdTarget, Tailor, TailorBackend, TailorError, TailoringResult};
use crate::models::resume::{ResumeBlock, RewrittenBlock};

/// Verbs prefixed onto bullets, cycling across the whole resume.
pub const ACTION_VERBS: &[&str] = &[
    "Led",
    "Built",
    "Delivered",
    "Improved",
    "Designed",
    "Implemented",
    "Optimized",
    "Streamlined",
];

pub const MAX_BULLET_CHARS: usize = 80;
pub const MAX_MISSING_KEYWORDS: usize = 3;
pub const SCORE_FLOOR: f64 = 60.0;
pub const SCORE_CEILING: f64 = 95.0;

pub const GAP_SUGGESTIONS: &[&str] = &[
    "Add quantified results (numbers, percentages, scale) to your strongest bullets.",
    "Include technical skills from the job description that you have but have not listed.",
    "Highlight leadership, ownership, or cross-team collaboration.",
];

/// Keyword-matching tailor. Never fails and never leaves the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTailor;

impl HeuristicTailor {
    pub fn tailor_blocks(&self, blocks: &[ResumeBlock], jd: &JdTarget) -> TailoringResult {
        let keywords: Vec<String> = jd.keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut verb_cursor = 0usize;
        let mut matched_count = 0usize;

        let rewritten_blocks = blocks
            .iter()
            .map(|block| {
                let details_lower: Vec<String> =
                    block.details.iter().map(|d| d.to_lowercase()).collect();

                let (matched, missing): (Vec<String>, Vec<String>) = keywords
                    .iter()
                    .cloned()
                    .partition(|kw| details_lower.iter().any(|d| d.contains(kw.as_str())));
                matched_count += matched.len();

                let bullets = block
                    .details
                    .iter()
                    .map(|detail| {
                        let verb = ACTION_VERBS[verb_cursor % ACTION_VERBS.len()];
                        verb_cursor += 1;
                        truncate_bullet(&format!("{verb} {}", lower_first(detail.trim())))
                    })
                    .collect();

                RewrittenBlock {
                    title: block.title.clone(),
                    bullets,
                    matched_keywords: matched,
                    missing_keywords: missing.into_iter().take(MAX_MISSING_KEYWORDS).collect(),
                }
            })
            .collect();

        TailoringResult {
            rewritten_blocks,
            ats_score: ats_score(matched_count, keywords.len()),
            gap_suggestions: GAP_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            backend: TailorBackend::Heuristic,
        }
    }
}

#[async_trait]
impl Tailor for HeuristicTailor {
    async fn tailor(
        &self,
        blocks: &[ResumeBlock],
        jd: &JdTarget,
    ) -> Result<TailoringResult, TailorError> {
        Ok(self.tailor_blocks(blocks, jd))
    }
}

/// `round(min(95, max(60, matched / total * 100)))`; the floor when there are no keywords.
pub fn ats_score(matched: usize, total_keywords: usize) -> i32 {
    if total_keywords == 0 {
        return SCORE_FLOOR as i32;
    }
    let ratio = matched as f64 / total_keywords as f64 * 100.0;
    ratio.clamp(SCORE_FLOOR, SCORE_CEILING).round() as i32
}

/// Lowercases the first letter unless the word looks like an acronym or proper noun run.
fn lower_first(detail: &str) -> String {
    let mut chars = detail.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_lowercase() => {
            first.to_lowercase().chain(detail.chars().skip(1)).collect()
        }
        _ => detail.to_string(),
    }
}

fn truncate_bullet(bullet: &str) -> String {
    if bullet.chars().count() <= MAX_BULLET_CHARS {
        return bullet.to_string();
    }
    let kept: String = bullet.chars().take(MAX_BULLET_CHARS - 1).collect();
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::BlockKind;

    fn block(title: &str, details: &[&str]) -> ResumeBlock {
        ResumeBlock {
            kind: BlockKind::Experience,
            title: title.to_string(),
            start_date: None,
            end_date: None,
            details: details.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn jd(keywords: &[&str]) -> JdTarget {
        JdTarget {
            text: keywords.join(" "),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_single_python_block_against_python_aws() {
        let result = HeuristicTailor.tailor_blocks(
            &[block("Engineer, Acme", &["Built Python services"])],
            &jd(&["python", "aws"]),
        );
        let rewritten = &result.rewritten_blocks[0];
        assert_eq!(rewritten.matched_keywords, vec!["python"]);
        assert_eq!(rewritten.missing_keywords, vec!["aws"]);
        // 1/2 * 100 = 50, clamped up to 60
        assert_eq!(result.ats_score, 60);
        assert_eq!(result.backend, TailorBackend::Heuristic);
    }

    #[test]
    fn test_score_is_clamped_to_ceiling() {
        let result = HeuristicTailor.tailor_blocks(
            &[block("Engineer", &["Rust and Kafka in production"])],
            &jd(&["rust", "kafka"]),
        );
        assert_eq!(result.ats_score, 95);
    }

    #[test]
    fn test_score_always_within_bounds() {
        for total in 1..=30 {
            for matched in 0..=(total * 2) {
                let score = ats_score(matched, total);
                assert!((60..=95).contains(&score), "{matched}/{total} -> {score}");
            }
        }
    }

    #[test]
    fn test_score_in_band_is_rounded_ratio() {
        assert_eq!(ats_score(2, 3), 67);
        assert_eq!(ats_score(4, 5), 80);
    }

    #[test]
    fn test_missing_keywords_capped_at_three() {
        let result = HeuristicTailor.tailor_blocks(
            &[block("Engineer", &["Wrote documentation"])],
            &jd(&["rust", "go", "java", "scala", "kotlin"]),
        );
        assert_eq!(
            result.rewritten_blocks[0].missing_keywords,
            vec!["rust", "go", "java"]
        );
    }

    #[test]
    fn test_matching_is_case_insensitive_substring() {
        let result = HeuristicTailor.tailor_blocks(
            &[block("Engineer", &["Migrated services to PostgreSQL 15"])],
            &jd(&["postgresql", "Services"]),
        );
        assert_eq!(
            result.rewritten_blocks[0].matched_keywords,
            vec!["postgresql", "services"]
        );
    }

    #[test]
    fn test_verbs_cycle_across_blocks() {
        let result = HeuristicTailor.tailor_blocks(
            &[
                block("A", &["Shipped the app", "Ran the on-call rotation"]),
                block("B", &["Mentored interns"]),
            ],
            &jd(&["app"]),
        );
        assert_eq!(
            result.rewritten_blocks[0].bullets,
            vec!["Led shipped the app", "Built ran the on-call rotation"]
        );
        assert_eq!(result.rewritten_blocks[1].bullets, vec!["Delivered mentored interns"]);
    }

    #[test]
    fn test_acronyms_keep_their_case() {
        assert_eq!(lower_first("AWS migration"), "AWS migration");
        assert_eq!(lower_first("Built APIs"), "built APIs");
    }

    #[test]
    fn test_long_bullets_are_truncated_with_ellipsis() {
        let long = "x".repeat(200);
        let result =
            HeuristicTailor.tailor_blocks(&[block("Engineer", &[long.as_str()])], &jd(&["x"]));
        let bullet = &result.rewritten_blocks[0].bullets[0];
        assert!(bullet.chars().count() <= MAX_BULLET_CHARS);
        assert!(bullet.ends_with('…'));
    }

    #[test]
    fn test_gap_suggestions_are_generic() {
        let result = HeuristicTailor.tailor_blocks(&[], &jd(&["rust"]));
        assert_eq!(result.gap_suggestions.len(), GAP_SUGGESTIONS.len());
        assert_eq!(result.ats_score, 60);
    }
}
