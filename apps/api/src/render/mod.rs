//! PDF rendering for tailored resumes and cover letters.
//!
//! The pipeline only sees the `PdfRenderer` trait. `LatexRenderer` is the
//! production backend; it shells out to a LaTeX engine.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::models::resume::{BlockKind, Resume, ResumeBlock, RewrittenBlock};

pub mod latex;

pub use latex::LatexRenderer;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error while rendering: {0}")]
    Io(#[from] std::io::Error),

    #[error("LaTeX engine `{bin}` could not be started: {source}")]
    EngineUnavailable {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("LaTeX engine exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("LaTeX engine timed out")]
    Timeout,

    #[error("LaTeX engine produced no PDF")]
    MissingOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub title: String,
    pub dates: Option<String>,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeDocument {
    pub full_name: String,
    pub email: Option<String>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverLetterDocument {
    pub full_name: String,
    pub email: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Resume(ResumeDocument),
    CoverLetter(CoverLetterDocument),
}

impl Document {
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Resume(_) => "resume",
            Document::CoverLetter(_) => "cover_letter",
        }
    }
}

impl ResumeDocument {
    /// Lays out `blocks` grouped by kind, in first-seen order, using the
    /// rewritten bullets where the tailoring pass produced them.
    pub fn tailored(resume: &Resume, blocks: &[ResumeBlock], rewritten: &[RewrittenBlock]) -> Self {
        let mut sections: Vec<(BlockKind, Section)> = Vec::new();

        for (index, block) in blocks.iter().enumerate() {
            let bullets = rewritten_for(index, block, rewritten)
                .map(|r| r.bullets.clone())
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| block.details.clone());

            let entry = Entry {
                title: block.title.clone(),
                dates: date_range(block),
                bullets,
            };

            match sections.iter_mut().find(|(kind, _)| *kind == block.kind) {
                Some((_, section)) => section.entries.push(entry),
                None => sections.push((
                    block.kind,
                    Section {
                        heading: block.kind.heading().to_string(),
                        entries: vec![entry],
                    },
                )),
            }
        }

        Self {
            full_name: resume.full_name.clone(),
            email: resume.email.clone(),
            sections: sections.into_iter().map(|(_, s)| s).collect(),
        }
    }
}

/// Same position with the same title first, then any block with that title.
fn rewritten_for<'a>(
    index: usize,
    block: &ResumeBlock,
    rewritten: &'a [RewrittenBlock],
) -> Option<&'a RewrittenBlock> {
    rewritten
        .get(index)
        .filter(|r| r.title == block.title)
        .or_else(|| rewritten.iter().find(|r| r.title == block.title))
}

fn date_range(block: &ResumeBlock) -> Option<String> {
    match (block.start_date.as_deref(), block.end_date.as_deref()) {
        (Some(start), Some(end)) => Some(format!("{start} - {end}")),
        (Some(start), None) => Some(format!("{start} - Present")),
        (None, Some(end)) => Some(end.to_string()),
        (None, None) => None,
    }
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, document: &Document) -> Result<Bytes, RenderError>;
}
