//! Fakes for the external collaborators, shared by unit and router tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use uuid::Uuid;

use crate::jd::{FetchError, JdFetcher};
use crate::llm_client::{Completion, LlmError};
use crate::models::resume::{BlockKind, NewResume, ResumeBlock};
use crate::notify::{ItemEvent, Notifier, NotifyError};
use crate::render::{Document, PdfRenderer, RenderError};
use crate::storage::{ObjectStorage, StorageError};
use crate::store::BatchStore;

// ── JD fetcher ──────────────────────────────────────────────────────────────

enum FetchMode {
    Failing,
    TimingOut,
    Html(String),
}

/// Records the (tokio) instant of every call so retry timing can be asserted.
pub struct StubFetcher {
    mode: FetchMode,
    calls: Mutex<Vec<Instant>>,
}

impl StubFetcher {
    fn with_mode(mode: FetchMode) -> Self {
        Self {
            mode,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::with_mode(FetchMode::Failing)
    }

    pub fn timing_out() -> Self {
        Self::with_mode(FetchMode::TimingOut)
    }

    pub fn html(body: &str) -> Self {
        Self::with_mode(FetchMode::Html(body.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JdFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(Instant::now());
        match &self.mode {
            FetchMode::Failing => Err(FetchError::Status(404)),
            FetchMode::TimingOut => Err(FetchError::Timeout(Duration::from_secs(10))),
            FetchMode::Html(body) => Ok(body.clone()),
        }
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

pub struct CannedLlm {
    response: String,
    calls: AtomicUsize,
}

impl CannedLlm {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Completion for CannedLlm {
    async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

#[derive(Default)]
pub struct FailingLlm {
    calls: AtomicUsize,
}

impl FailingLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Completion for FailingLlm {
    async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        })
    }
}

// ── Renderer ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StubRenderer {
    fail: bool,
    rendered: Mutex<Vec<&'static str>>,
}

impl StubRenderer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Document kinds rendered so far, in order.
    pub fn rendered(&self) -> Vec<&'static str> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfRenderer for StubRenderer {
    async fn render(&self, document: &Document) -> Result<Bytes, RenderError> {
        self.rendered.lock().unwrap().push(document.kind());
        if self.fail {
            return Err(RenderError::MissingOutput);
        }
        Ok(Bytes::from(format!("%PDF-1.4 {}", document.kind())))
    }
}

// ── Object storage ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, (Bytes, String)>>,
    fail_puts_ending_with: Mutex<Option<String>>,
    fail_deletes: bool,
}

impl MemoryStorage {
    /// Storage whose `put` fails for keys ending with `suffix`.
    pub fn failing_puts_ending_with(suffix: &str) -> Self {
        let storage = Self::default();
        *storage.fail_puts_ending_with.lock().unwrap() = Some(suffix.to_string());
        storage
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        let failing = self.fail_puts_ending_with.lock().unwrap().clone();
        if failing.is_some_and(|suffix| key.ends_with(&suffix)) {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "bucket unavailable".to_string(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn url(&self, key: &str) -> Result<String, StorageError> {
        Ok(format!("https://assets.test/{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_deletes {
            return Err(StorageError::Delete {
                key: key.to_string(),
                message: "access denied".to_string(),
            });
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

// ── Notifier ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ItemEvent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<ItemEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &ItemEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(NotifyError::Status {
                endpoint: "https://hooks.test/item".to_string(),
                status: 500,
            });
        }
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

pub fn sample_blocks() -> Vec<ResumeBlock> {
    vec![
        ResumeBlock {
            kind: BlockKind::Experience,
            title: "Backend Engineer, Acme".to_string(),
            start_date: Some("2021".to_string()),
            end_date: None,
            details: vec![
                "Built Python services on Kubernetes".to_string(),
                "Ran PostgreSQL migrations".to_string(),
            ],
        },
        ResumeBlock {
            kind: BlockKind::Education,
            title: "BSc Computer Science".to_string(),
            start_date: None,
            end_date: Some("2020".to_string()),
            details: vec![],
        },
    ]
}

/// Seeds a resume for `user_id` and returns its id.
pub async fn seed_resume(store: &Arc<dyn BatchStore>, user_id: Uuid) -> Uuid {
    let (resume, _) = store
        .create_resume(&NewResume {
            user_id,
            title: "Main".to_string(),
            full_name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            blocks: sample_blocks(),
        })
        .await
        .unwrap();
    resume.id
}
