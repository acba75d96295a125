//! Scripted engine doubles for session tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::orchestrator::InferenceSession;
use crate::error::EngineError;
use crate::llm::{InferenceEngine, ModelContext, Step};
use crate::questionnaire::{QuestionCatalog, ResponseModel};
use crate::store::{LibSqlStore, Store};

type Script = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Step, EngineError>>>>;

/// Engine whose steps are fed one by one through a channel.
///
/// A step blocks until the test sends it; a closed channel reads as `Done`.
pub(crate) struct ScriptedEngine {
    script: Script,
    pub fail_load: Arc<AtomicBool>,
    pub fail_init: Arc<AtomicBool>,
    pub loads: AtomicUsize,
    pub clears: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEngine {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<Step, EngineError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            script: Arc::new(tokio::sync::Mutex::new(rx)),
            fail_load: Arc::new(AtomicBool::new(false)),
            fail_init: Arc::new(AtomicBool::new(false)),
            loads: AtomicUsize::new(0),
            clears: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        });
        (engine, tx)
    }

    /// Every prompt submitted so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&self, artifact: &Path) -> Result<Box<dyn ModelContext>, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(EngineError::ArtifactMissing {
                path: artifact.to_path_buf(),
            });
        }
        Ok(Box::new(ScriptedContext {
            script: Arc::clone(&self.script),
            fail_init: Arc::clone(&self.fail_init),
            clears: Arc::clone(&self.clears),
            prompts: Arc::clone(&self.prompts),
        }))
    }
}

struct ScriptedContext {
    script: Script,
    fail_init: Arc<AtomicBool>,
    clears: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ModelContext for ScriptedContext {
    async fn completion_init(&mut self, prompt: &str) -> Result<(), EngineError> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(EngineError::Request {
                reason: "prompt refused".to_string(),
            });
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(())
    }

    async fn completion_step(&mut self) -> Result<Step, EngineError> {
        let mut script = self.script.lock().await;
        script.recv().await.unwrap_or(Ok(Step::Done))
    }

    async fn clear(&mut self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

const CATALOG: &str = r#"{"questions": [
    {"id": "focus", "text": "What do you want to focus on?", "options": [
        {"id": "health", "text": "Health"},
        {"id": "career", "text": "Career"}
    ]}
]}"#;

/// Response model over `store`, with nothing selected.
pub(crate) async fn responses_over(store: Arc<dyn Store>) -> Arc<ResponseModel> {
    let catalog = Arc::new(QuestionCatalog::from_json(CATALOG).unwrap());
    Arc::new(ResponseModel::load(store, catalog).await)
}

/// Response model over an in-memory store, with one answer selected.
pub(crate) async fn seeded_responses() -> Arc<ResponseModel> {
    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let responses = responses_over(store).await;
    responses.toggle("focus", "career").await;
    responses
}

/// Session over `engine` and `responses`.
pub(crate) fn session_over(
    engine: Arc<ScriptedEngine>,
    responses: Arc<ResponseModel>,
) -> Arc<InferenceSession> {
    Arc::new(InferenceSession::new(
        engine,
        PathBuf::from("model.gguf"),
        "You are a coach.",
        responses,
    ))
}

/// Session over `engine` with a seeded profile.
pub(crate) async fn session_with(engine: Arc<ScriptedEngine>) -> Arc<InferenceSession> {
    session_over(engine, seeded_responses().await)
}
