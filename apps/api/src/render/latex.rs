use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CoverLetterDocument, Document, PdfRenderer, RenderError, ResumeDocument};

const SOURCE_FILE: &str = "document.tex";
const OUTPUT_FILE: &str = "document.pdf";
const COMPILE_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_STDERR_CHARS: usize = 2_000;

/// Compiles a generated LaTeX source with an external engine in a scratch directory.
///
/// `tectonic` is the default; anything whose file name starts with `pdflatex`
/// gets the classic pdflatex flags.
#[derive(Debug, Clone)]
pub struct LatexRenderer {
    bin: String,
    timeout: Duration,
}

impl LatexRenderer {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            timeout: COMPILE_TIMEOUT,
        }
    }

    fn is_pdflatex(&self) -> bool {
        Path::new(&self.bin)
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("pdflatex"))
    }

    fn command(&self, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.bin);
        if self.is_pdflatex() {
            cmd.args(["-interaction=nonstopmode", "-halt-on-error", SOURCE_FILE]);
        } else {
            cmd.args(["--outdir", "."]).arg(SOURCE_FILE);
        }
        cmd.current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn compile(&self, source: &str) -> Result<Bytes, RenderError> {
        let workdir = tempfile::tempdir()?;
        tokio::fs::write(workdir.path().join(SOURCE_FILE), source).await?;

        let child = self
            .command(workdir.path())
            .spawn()
            .map_err(|source| RenderError::EngineUnavailable {
                bin: self.bin.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout)??;

        if !output.status.success() {
            // pdflatex reports errors on stdout, tectonic on stderr.
            let mut log = String::from_utf8_lossy(&output.stderr).into_owned();
            if log.trim().is_empty() {
                log = String::from_utf8_lossy(&output.stdout).into_owned();
            }
            let stderr = tail(&log, MAX_STDERR_CHARS);
            warn!("{} failed with {}", self.bin, output.status);
            return Err(RenderError::EngineFailed {
                status: output.status.to_string(),
                stderr,
            });
        }

        match tokio::fs::read(workdir.path().join(OUTPUT_FILE)).await {
            Ok(pdf) if !pdf.is_empty() => {
                debug!("Compiled {} byte PDF with {}", pdf.len(), self.bin);
                Ok(Bytes::from(pdf))
            }
            Ok(_) => Err(RenderError::MissingOutput),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RenderError::MissingOutput),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PdfRenderer for LatexRenderer {
    async fn render(&self, document: &Document) -> Result<Bytes, RenderError> {
        let source = match document {
            Document::Resume(doc) => resume_source(doc),
            Document::CoverLetter(doc) => cover_letter_source(doc),
        };
        self.compile(&source).await
    }
}

/// Last `max` characters; engine logs put the actual error at the end.
fn tail(text: &str, max: usize) -> String {
    let skip = text.chars().count().saturating_sub(max);
    text.chars().skip(skip).collect()
}

/// Escapes LaTeX special characters in user-supplied text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '<' => out.push_str(r"\textless{}"),
            '>' => out.push_str(r"\textgreater{}"),
            _ => out.push(c),
        }
    }
    out
}

const PREAMBLE: &str = r"\documentclass[11pt,letterpaper]{article}
\usepackage[margin=1in]{geometry}
\usepackage[T1]{fontenc}
\usepackage[utf8]{inputenc}
\usepackage{enumitem}
\setlist[itemize]{leftmargin=*,itemsep=1pt,topsep=2pt}
\pagestyle{empty}
\setlength{\parindent}{0pt}
";

fn contact_header(out: &mut String, full_name: &str, email: Option<&str>) {
    out.push_str("\\begin{center}\n");
    out.push_str(&format!("{{\\LARGE\\bfseries {}}}\\\\\n", escape(full_name)));
    if let Some(email) = email {
        out.push_str(&format!("\\texttt{{{}}}\n", escape(email)));
    }
    out.push_str("\\end{center}\n");
}

pub fn resume_source(doc: &ResumeDocument) -> String {
    let mut out = String::from(PREAMBLE);
    out.push_str("\\begin{document}\n");
    contact_header(&mut out, &doc.full_name, doc.email.as_deref());

    for section in &doc.sections {
        out.push_str(&format!("\\section*{{{}}}\n", escape(&section.heading)));
        for entry in &section.entries {
            out.push_str(&format!("\\textbf{{{}}}", escape(&entry.title)));
            if let Some(dates) = &entry.dates {
                out.push_str(&format!(" \\hfill {}", escape(dates)));
            }
            out.push_str("\\\\\n");
            if !entry.bullets.is_empty() {
                out.push_str("\\begin{itemize}\n");
                for bullet in &entry.bullets {
                    out.push_str(&format!("  \\item {}\n", escape(bullet)));
                }
                out.push_str("\\end{itemize}\n");
            }
        }
    }

    out.push_str("\\end{document}\n");
    out
}

pub fn cover_letter_source(doc: &CoverLetterDocument) -> String {
    let mut out = String::from(PREAMBLE);
    out.push_str("\\begin{document}\n");
    contact_header(&mut out, &doc.full_name, doc.email.as_deref());
    out.push_str("\\vspace{1em}\n");

    for paragraph in doc.body.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let lines: Vec<String> = paragraph.lines().map(escape).collect();
        out.push_str(&lines.join("\\\\\n"));
        out.push_str("\n\n");
    }

    out.push_str("\\end{document}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Entry, Section};

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape("R&D 100% $5 #1 a_b"), r"R\&D 100\% \$5 \#1 a\_b");
        assert_eq!(escape(r"C:\path{x}"), r"C:\textbackslash{}path\{x\}");
        assert_eq!(escape("~^"), r"\textasciitilde{}\textasciicircum{}");
    }

    #[test]
    fn test_resume_source_escapes_user_text() {
        let doc = ResumeDocument {
            full_name: "Jane O'Neil".to_string(),
            email: Some("jane_o@example.com".to_string()),
            sections: vec![Section {
                heading: "Experience".to_string(),
                entries: vec![Entry {
                    title: "Engineer, AT&T".to_string(),
                    dates: Some("2020 - 2023".to_string()),
                    bullets: vec!["Cut costs 30%".to_string()],
                }],
            }],
        };
        let source = resume_source(&doc);
        assert!(source.contains(r"\textbf{Engineer, AT\&T}"));
        assert!(source.contains(r"\item Cut costs 30\%"));
        assert!(source.contains(r"\texttt{jane\_o@example.com}"));
        assert!(source.trim_end().ends_with(r"\end{document}"));
    }

    #[test]
    fn test_cover_letter_paragraphs() {
        let doc = CoverLetterDocument {
            full_name: "Jane".to_string(),
            email: None,
            body: "Dear team,\n\nI build things.\n\nBest,\nJane".to_string(),
        };
        let source = cover_letter_source(&doc);
        assert!(source.contains("Dear team,\n\n"));
        assert!(source.contains("Best,\\\\\nJane"));
        assert!(!source.contains(r"\texttt"));
    }

    #[test]
    fn test_tail_keeps_the_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
    }

    #[test]
    fn test_engine_flags_follow_binary_name() {
        assert!(LatexRenderer::new("/usr/bin/pdflatex").is_pdflatex());
        assert!(!LatexRenderer::new("tectonic").is_pdflatex());
    }

    #[tokio::test]
    async fn test_missing_engine_is_reported() {
        let renderer = LatexRenderer::new("definitely-not-a-latex-engine-xyz");
        let err = renderer
            .render(&Document::CoverLetter(CoverLetterDocument {
                full_name: "Jane".to_string(),
                email: None,
                body: "Hi".to_string(),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::EngineUnavailable { .. }));
    }
}
