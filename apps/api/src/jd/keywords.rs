//! Stop-word filtered frequency counting over JD text.

use std::collections::HashMap;

/// Number of keywords returned per job description.
pub const MAX_KEYWORDS: usize = 25;
const MIN_TOKEN_CHARS: usize = 3;
const MAX_TOKEN_CHARS: usize = 20;

const STOP_WORDS: &[&str] = &[
    "about", "above", "across", "after", "again", "all", "also", "and", "any", "are", "because",
    "been", "before", "being", "below", "between", "both", "but", "can", "could", "did", "does",
    "doing", "down", "during", "each", "etc", "few", "for", "from", "further", "had", "has",
    "have", "having", "her", "here", "hers", "him", "his", "how", "into", "its", "itself",
    "just", "know", "like", "may", "might", "more", "most", "must", "need", "needed", "needs",
    "nor", "not", "now", "off", "once", "one", "only", "other", "our", "ours", "out", "over",
    "own", "per", "same", "shall", "she", "should", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "then", "there", "these", "they", "this", "those", "through",
    "too", "under", "until", "upon", "very", "via", "want", "was", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "within", "without",
    "would", "you", "your", "yours", "yourself",
    // job-posting filler
    "ability", "able", "apply", "candidate", "candidates", "company", "including", "join",
    "looking", "opportunity", "plus", "position", "preferred", "required", "requirements",
    "responsibilities", "role", "strong", "well", "work", "working", "years",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Extracts up to [`MAX_KEYWORDS`] keyword candidates, most frequent first.
///
/// Ties keep first-occurrence order, so identical input always yields the
/// identical list.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut counts: Vec<(String, u32)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for token in cleaned.split_whitespace() {
        let len = token.chars().count();
        if !(MIN_TOKEN_CHARS..=MAX_TOKEN_CHARS).contains(&len)
            || is_stop_word(token)
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        match index.get(token) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(token.to_string(), counts.len());
                counts.push((token.to_string(), 1));
            }
        }
    }

    // Stable sort keeps first-occurrence order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(token, _)| token)
        .collect()
}
