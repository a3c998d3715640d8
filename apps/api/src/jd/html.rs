//! Markup stripping and best-effort company/role guesses.
//!
//! The guesses are hints only. Nothing downstream may rely on them being right.

use std::sync::LazyLock;

use regex::Regex;

static NON_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>",
    )
    .expect("non-content regex is valid")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex is valid"));
static H1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("h1 regex is valid"));
static META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<meta\b[^>]*(?:name|property)\s*=\s*["'](?:description|og:title|og:description)["'][^>]*>"#,
    )
    .expect("meta regex is valid")
});
static META_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)content\s*=\s*["']([^"']*)["']"#).expect("meta content regex is valid")
});

// "<Role> at <Company>" / "<Role> @ <Company>" in a header line.
static HEADER_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<role>.{2,80}?)\s+(?:at|@)\s+(?P<company>[^|–—:,(]{2,60})")
        .expect("header-at regex is valid")
});
// "<Role> - <Company>" / "<Role> | <Company>"
static HEADER_SEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<role>[^|–—]{2,80}?)\s+[-|–—]\s+(?P<company>[^|–—]{2,60})")
        .expect("header-separator regex is valid")
});
static BODY_ROLE_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<role>[A-Z][\w+#/.]*(?:\s+[A-Z][\w+#/.]*){0,5})\s+(?:at|@)\s+(?P<company>[A-Z][\w&'-]*(?:\s+[A-Z][\w&'-]*){0,3})",
    )
    .expect("body role regex is valid")
});
static BODY_COMPANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:at|join)\s+(?P<company>[A-Z][\w&'-]*(?:\s+[A-Z][\w&'-]*){0,3})")
        .expect("body company regex is valid")
});
static BODY_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<role>(?:[A-Z][\w+#/.-]*\s+){0,3}(?:Engineer|Developer|Designer|Analyst|Scientist|Manager|Architect|Intern|Specialist|Consultant|Administrator|Coordinator|Associate))\b",
    )
    .expect("body title regex is valid")
});

/// Whether the text carries HTML markup worth stripping.
pub fn looks_like_html(text: &str) -> bool {
    TAG.is_match(text) && text.contains("</")
}

/// Reduces an HTML document (or fragment) to whitespace-collapsed plain text.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = NON_CONTENT.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_blocks, " ");
    let decoded = decode_entities(&without_tags);
    collapse_whitespace(&decoded)
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoleGuess {
    pub company: Option<String>,
    pub role: Option<String>,
}

impl RoleGuess {
    fn is_complete(&self) -> bool {
        self.company.is_some() && self.role.is_some()
    }

    fn fill_from(&mut self, other: RoleGuess) {
        if self.company.is_none() {
            self.company = other.company;
        }
        if self.role.is_none() {
            self.role = other.role;
        }
    }
}

/// Header candidates in priority order: `<title>`, `<h1>`, meta description/og tags.
fn header_candidates(html: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    for re in [&*TITLE, &*H1] {
        if let Some(caps) = re.captures(html) {
            candidates.push(html_to_text(&caps[1]));
        }
    }
    for meta in META.find_iter(html) {
        if let Some(caps) = META_CONTENT.captures(meta.as_str()) {
            candidates.push(collapse_whitespace(&decode_entities(&caps[1])));
        }
    }
    candidates.retain(|c| !c.is_empty());
    candidates
}

fn clean(fragment: &str) -> Option<String> {
    let trimmed = fragment
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '-'))
        .trim();
    (trimmed.chars().count() >= 2).then(|| trimmed.to_string())
}

fn parse_header(line: &str) -> RoleGuess {
    for re in [&*HEADER_AT, &*HEADER_SEP] {
        if let Some(caps) = re.captures(line) {
            return RoleGuess {
                company: clean(&caps["company"]),
                role: clean(&caps["role"]),
            };
        }
    }
    RoleGuess::default()
}

fn parse_body(text: &str) -> RoleGuess {
    let mut guess = RoleGuess::default();
    if let Some(caps) = BODY_ROLE_AT.captures(text) {
        guess.role = clean(&caps["role"]);
        guess.company = clean(&caps["company"]);
    }
    if guess.company.is_none() {
        guess.company = BODY_COMPANY
            .captures(text)
            .and_then(|caps| clean(&caps["company"]));
    }
    if guess.role.is_none() {
        guess.role = BODY_TITLE
            .captures(text)
            .and_then(|caps| clean(&caps["role"]));
    }
    guess
}

/// Guesses company and role from page headers first, then from body text.
pub fn guess_company_and_role(html: Option<&str>, text: &str) -> RoleGuess {
    let mut guess = RoleGuess::default();
    if let Some(html) = html {
        for candidate in header_candidates(html) {
            guess.fill_from(parse_header(&candidate));
            if guess.is_complete() {
                return guess;
            }
        }
    }
    guess.fill_from(parse_body(text));
    guess
}
