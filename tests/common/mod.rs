//! Shared fixtures for integration tests: a stub inference engine and a
//! fully wired set of services.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use life_coach::error::EngineError;
use life_coach::llm::{InferenceEngine, ModelContext, Step};
use life_coach::questionnaire::{QuestionCatalog, QuestionnaireFlow, ResponseModel};
use life_coach::session::{CoachChat, InferenceSession};
use life_coach::store::Store;

pub const QUESTIONS: &str = r#"{"questions": [
    {"id": "focus", "text": "Which areas matter most right now?", "options": [
        {"id": "health", "text": "Health and energy"},
        {"id": "career", "text": "Career growth"},
        {"id": "family", "text": "Family"}
    ]},
    {"id": "obstacle", "text": "What gets in your way?", "options": [
        {"id": "time", "text": "Not enough time"},
        {"id": "focus", "text": "Staying focused"}
    ]},
    {"id": "style", "text": "How should your coach talk to you?", "options": [
        {"id": "direct", "text": "Direct"},
        {"id": "gentle", "text": "Gentle"}
    ]}
]}"#;

pub fn catalog() -> Arc<QuestionCatalog> {
    Arc::new(QuestionCatalog::from_json(QUESTIONS).unwrap())
}

/// Engine that replies with fixed fragments. With a gate, each step waits
/// for one semaphore permit.
#[derive(Clone, Default)]
pub struct StubEngine {
    reply: Vec<String>,
    fail_load: bool,
    gate: Option<Arc<Semaphore>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubEngine {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            reply: fragments.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Default::default()
        }
    }

    pub fn gated(fragments: &[&str], gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::replying(fragments)
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    async fn load(&self, artifact: &Path) -> Result<Box<dyn ModelContext>, EngineError> {
        if self.fail_load {
            return Err(EngineError::ArtifactMissing {
                path: artifact.to_path_buf(),
            });
        }
        Ok(Box::new(StubContext {
            engine: self.clone(),
            pending: VecDeque::new(),
        }))
    }
}

struct StubContext {
    engine: StubEngine,
    pending: VecDeque<String>,
}

#[async_trait]
impl ModelContext for StubContext {
    async fn completion_init(&mut self, prompt: &str) -> Result<(), EngineError> {
        self.engine.prompts.lock().unwrap().push(prompt.to_string());
        self.pending = self.engine.reply.iter().cloned().collect();
        Ok(())
    }

    async fn completion_step(&mut self) -> Result<Step, EngineError> {
        if let Some(gate) = &self.engine.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        Ok(match self.pending.pop_front() {
            Some(fragment) => Step::Fragment(fragment),
            None => Step::Done,
        })
    }

    async fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Everything `main` wires together, minus the listener.
pub struct Services {
    pub store: Arc<dyn Store>,
    pub responses: Arc<ResponseModel>,
    pub flow: Arc<QuestionnaireFlow>,
    pub chat: Arc<CoachChat>,
}

pub async fn services(store: Arc<dyn Store>, engine: StubEngine) -> Services {
    let catalog = catalog();
    let responses = Arc::new(ResponseModel::load(Arc::clone(&store), Arc::clone(&catalog)).await);
    let flow = Arc::new(QuestionnaireFlow::new(
        catalog,
        Arc::clone(&responses),
        Arc::clone(&store),
    ));
    flow.enter().await;

    let session = Arc::new(InferenceSession::new(
        Arc::new(engine),
        PathBuf::from("assets/model.gguf"),
        "You are a life coach.",
        Arc::clone(&responses),
    ));
    let chat = Arc::new(CoachChat::new(session));

    Services {
        store,
        responses,
        flow,
        chat,
    }
}
