//! Cover letter and outreach text built from a tailoring pass. Pure string work.

use serde::Serialize;

use crate::coaching::TailoringResult;

pub const MAX_INMAIL_CHARS: usize = 300;
const MAX_HIGHLIGHTS: usize = 3;
const MAX_ALIGNED_KEYWORDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutreachMessages {
    pub email_subject: String,
    pub email_body: String,
    pub inmail: String,
}

/// Who the text is addressed to. Either part may be unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct Target<'a> {
    pub company: Option<&'a str>,
    pub role: Option<&'a str>,
}

impl<'a> Target<'a> {
    pub fn new(company: Option<&'a str>, role: Option<&'a str>) -> Self {
        let non_blank = |v: Option<&'a str>| v.map(str::trim).filter(|v| !v.is_empty());
        Self {
            company: non_blank(company),
            role: non_blank(role),
        }
    }

    /// "the Backend Engineer role at Acme", "the Backend Engineer role", "a role at Acme", "this role"
    fn position_phrase(&self) -> String {
        match (self.role, self.company) {
            (Some(role), Some(company)) => format!("the {role} role at {company}"),
            (Some(role), None) => format!("the {role} role"),
            (None, Some(company)) => format!("a role at {company}"),
            (None, None) => "this role".to_string(),
        }
    }
}

/// Bullets from the blocks with the most matched keywords first.
fn strongest_bullets(tailoring: &TailoringResult) -> Vec<&str> {
    let mut blocks: Vec<_> = tailoring.rewritten_blocks.iter().collect();
    blocks.sort_by_key(|b| std::cmp::Reverse(b.matched_keywords.len()));
    blocks
        .into_iter()
        .flat_map(|b| b.bullets.iter().map(String::as_str))
        .filter(|b| !b.trim().is_empty())
        .take(MAX_HIGHLIGHTS)
        .collect()
}

/// "a", "a and b", "a, b and c"
fn join_words(words: &[&str]) -> String {
    match words {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

fn aligned_keywords(tailoring: &TailoringResult) -> Vec<&str> {
    tailoring
        .matched_keywords()
        .into_iter()
        .take(MAX_ALIGNED_KEYWORDS)
        .collect()
}

pub fn cover_letter(full_name: &str, target: Target<'_>, tailoring: &TailoringResult) -> String {
    let greeting = match target.company {
        Some(company) => format!("Dear {company} Hiring Team,"),
        None => "Dear Hiring Manager,".to_string(),
    };

    let mut letter = format!(
        "{greeting}\n\nI am excited to apply for {}. A few highlights from my experience:\n",
        target.position_phrase()
    );
    for bullet in strongest_bullets(tailoring) {
        letter.push_str(&format!("\n- {bullet}"));
    }

    let keywords = aligned_keywords(tailoring);
    if keywords.is_empty() {
        letter.push_str(
            "\n\nI would welcome the chance to discuss how my background fits your team.",
        );
    } else {
        letter.push_str(&format!(
            "\n\nMy background aligns closely with your focus on {}.",
            join_words(&keywords)
        ));
    }

    letter.push_str(&format!(
        "\n\nThank you for your time and consideration.\n\nSincerely,\n{full_name}"
    ));
    letter
}

pub fn compose(full_name: &str, target: Target<'_>, tailoring: &TailoringResult) -> OutreachMessages {
    let email_subject = match (target.role, target.company) {
        (Some(role), Some(company)) => format!("Application: {role} at {company} - {full_name}"),
        (Some(role), None) => format!("Application: {role} - {full_name}"),
        _ => format!("Application from {full_name}"),
    };

    let keywords = aligned_keywords(tailoring);
    let fit_line = if keywords.is_empty() {
        String::new()
    } else {
        format!(" My experience with {} lines up well with it.", join_words(&keywords))
    };

    let email_body = format!(
        "Hello,\n\nI recently applied for {}.{fit_line} \
         I have attached my resume and a cover letter, and would be glad to talk \
         about how I can help.\n\nBest regards,\n{full_name}",
        target.position_phrase()
    );

    let inmail = truncate_chars(
        &format!(
            "Hi! I'm {full_name} and I'm interested in {}.{fit_line} \
             Would you be open to a quick chat?",
            target.position_phrase()
        ),
        MAX_INMAIL_CHARS,
    );

    OutreachMessages {
        email_subject,
        email_body,
        inmail,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max - 1).collect();
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::TailorBackend;
    use crate::models::resume::RewrittenBlock;

    fn tailoring() -> TailoringResult {
        TailoringResult {
            rewritten_blocks: vec![
                RewrittenBlock {
                    title: "Intern".to_string(),
                    bullets: vec!["Led weekly demos".to_string()],
                    matched_keywords: vec![],
                    missing_keywords: vec!["rust".to_string()],
                },
                RewrittenBlock {
                    title: "Engineer".to_string(),
                    bullets: vec![
                        "Built Python services on Kubernetes".to_string(),
                        "Designed PostgreSQL schemas".to_string(),
                    ],
                    matched_keywords: vec!["python".to_string(), "kubernetes".to_string()],
                    missing_keywords: vec![],
                },
            ],
            ats_score: 75,
            gap_suggestions: vec![],
            backend: TailorBackend::Heuristic,
        }
    }

    #[test]
    fn test_cover_letter_leads_with_strongest_block() {
        let letter = cover_letter(
            "Ada Lovelace",
            Target::new(Some("Acme"), Some("Backend Engineer")),
            &tailoring(),
        );
        assert!(letter.starts_with("Dear Acme Hiring Team,"));
        assert!(letter.contains("the Backend Engineer role at Acme"));
        let python = letter.find("Built Python services").unwrap();
        let demos = letter.find("Led weekly demos").unwrap();
        assert!(python < demos);
        assert!(letter.contains("your focus on python and kubernetes."));
        assert!(letter.ends_with("Sincerely,\nAda Lovelace"));
    }

    #[test]
    fn test_missing_company_and_role_use_neutral_wording() {
        let letter = cover_letter("Ada", Target::new(None, Some("  ")), &tailoring());
        assert!(letter.starts_with("Dear Hiring Manager,"));
        assert!(letter.contains("apply for this role."));

        let messages = compose("Ada", Target::default(), &tailoring());
        assert_eq!(messages.email_subject, "Application from Ada");
    }

    #[test]
    fn test_no_matches_skips_alignment_sentence() {
        let mut result = tailoring();
        for block in &mut result.rewritten_blocks {
            block.matched_keywords.clear();
        }
        let letter = cover_letter("Ada", Target::default(), &result);
        assert!(!letter.contains("your focus on"));
        assert!(letter.contains("welcome the chance"));
    }

    #[test]
    fn test_compose_subject_and_body() {
        let messages = compose(
            "Ada Lovelace",
            Target::new(Some("Acme"), Some("Backend Engineer")),
            &tailoring(),
        );
        assert_eq!(
            messages.email_subject,
            "Application: Backend Engineer at Acme - Ada Lovelace"
        );
        assert!(messages.email_body.contains("python and kubernetes"));
        assert!(messages.inmail.contains("Backend Engineer"));
    }

    #[test]
    fn test_inmail_is_capped() {
        let long_role = "Principal Distributed Systems Engineer ".repeat(10);
        let messages = compose(
            "Ada Lovelace",
            Target::new(Some("Acme"), Some(long_role.as_str())),
            &tailoring(),
        );
        assert!(messages.inmail.chars().count() <= MAX_INMAIL_CHARS);
        assert!(messages.inmail.ends_with('…'));
    }

    #[test]
    fn test_join_words() {
        assert_eq!(join_words(&["a"]), "a");
        assert_eq!(join_words(&["a", "b"]), "a and b");
        assert_eq!(join_words(&["a", "b", "c"]), "a, b and c");
    }
}
