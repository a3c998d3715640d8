use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Education,
    Experience,
    Project,
    Volunteer,
    Skill,
}

impl BlockKind {
    pub fn heading(&self) -> &'static str {
        match self {
            BlockKind::Education => "Education",
            BlockKind::Experience => "Experience",
            BlockKind::Project => "Projects",
            BlockKind::Volunteer => "Volunteering",
            BlockKind::Skill => "Skills",
        }
    }
}

/// One structured unit of resume content. Immutable once embedded in a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeBlock {
    pub kind: BlockKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
}

/// A block after one coaching pass: rewritten bullets plus keyword coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewrittenBlock {
    pub title: String,
    pub bullets: Vec<String>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
}

/// Output of one coaching pass, embedded in the version it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailoredContent {
    pub rewritten_blocks: Vec<RewrittenBlock>,
    pub ats_score: i32,
    pub gap_suggestions: Vec<String>,
    pub jd_keywords: Vec<String>,
    pub jd_text: String,
}

/// Content of a resume version: either the structured blocks alone, or the
/// blocks together with the tailoring pass that produced this version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumeContent {
    Structured {
        blocks: Vec<ResumeBlock>,
    },
    Tailored {
        blocks: Vec<ResumeBlock>,
        tailored: TailoredContent,
    },
}

impl ResumeContent {
    /// The source blocks, regardless of whether the version was tailored.
    pub fn blocks(&self) -> &[ResumeBlock] {
        match self {
            ResumeContent::Structured { blocks } | ResumeContent::Tailored { blocks, .. } => {
                blocks
            }
        }
    }

    pub fn tailored(&self) -> Option<&TailoredContent> {
        match self {
            ResumeContent::Structured { .. } => None,
            ResumeContent::Tailored { tailored, .. } => Some(tailored),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub full_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of a resume. Tailoring always inserts a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeVersion {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub version: i32,
    pub content: ResumeContent,
    pub ats_score: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResume {
    pub user_id: Uuid,
    pub title: String,
    pub full_name: String,
    pub email: Option<String>,
    pub blocks: Vec<ResumeBlock>,
}
