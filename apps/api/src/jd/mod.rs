//! JD normalizer. Turns a posting URL or raw text into `{company, role, jd_text, keywords}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod fetch;
pub mod handlers;
pub mod html;
pub mod keywords;

pub use fetch::{FetchError, HttpJdFetcher, JdFetcher};
pub use keywords::extract_keywords;

/// Upper bound on stored JD text; keeps prompt and storage cost bounded.
pub const MAX_JD_CHARS: usize = 20_000;
pub const TRUNCATION_MARKER: &str = "\n…[truncated]";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JdInput {
    pub url: Option<String>,
    pub text: Option<String>,
    /// Caller-supplied hints win over the heuristics.
    pub company: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedJd {
    pub company: Option<String>,
    pub role: Option<String>,
    pub jd_text: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no job description text supplied")]
    NoText,

    #[error("could not fetch job description from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("job description is empty after removing markup")]
    Empty,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolves the JD text (literal text first, otherwise the fetched URL) and normalizes it.
pub async fn normalize(
    input: &JdInput,
    fetcher: &dyn JdFetcher,
) -> Result<NormalizedJd, NormalizeError> {
    if let Some(text) = non_blank(input.text.as_deref()) {
        return normalize_text(text, input.company.as_deref(), input.role.as_deref());
    }

    let url = non_blank(input.url.as_deref()).ok_or(NormalizeError::NoText)?;
    let body = fetcher.fetch(url).await.map_err(|source| {
        warn!("JD fetch failed for {url}: {source}");
        NormalizeError::Fetch {
            url: url.to_string(),
            source,
        }
    })?;
    debug!("Normalizing {} bytes fetched from {url}", body.len());

    normalize_text(&body, input.company.as_deref(), input.role.as_deref())
}

/// Normalizes already-resolved text (HTML or plain). No network access.
pub fn normalize_text(
    raw: &str,
    company: Option<&str>,
    role: Option<&str>,
) -> Result<NormalizedJd, NormalizeError> {
    let is_html = html::looks_like_html(raw);
    let plain = if is_html {
        html::html_to_text(raw)
    } else {
        raw.trim().to_string()
    };
    if plain.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let jd_text = truncate(plain);
    let guess = html::guess_company_and_role(is_html.then_some(raw), &jd_text);
    let keywords = extract_keywords(&jd_text);

    Ok(NormalizedJd {
        company: non_blank(company).map(str::to_string).or(guess.company),
        role: non_blank(role).map(str::to_string).or(guess.role),
        jd_text,
        keywords,
    })
}

fn truncate(text: String) -> String {
    match text.char_indices().nth(MAX_JD_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text,
    }
}
