//! Inference engine capability.
//!
//! The engine is opaque: it loads a model artifact into a context, and the
//! context accepts one prompt at a time and yields text step by step.

use std::path::Path;

use async_trait::async_trait;

use crate::error::EngineError;

/// Result of one generation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Next piece of generated text.
    Fragment(String),
    /// The engine has nothing more to produce for this prompt.
    Done,
}

/// Loads model artifacts.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Load the artifact at `artifact` into a fresh model context.
    async fn load(&self, artifact: &Path) -> Result<Box<dyn ModelContext>, EngineError>;
}

/// A loaded model.
///
/// Not safe for concurrent prompts: callers must serialize
/// `completion_init` / `completion_step` / `clear`.
#[async_trait]
pub trait ModelContext: Send {
    /// Submit a prompt. Any previous completion is discarded.
    async fn completion_init(&mut self, prompt: &str) -> Result<(), EngineError>;

    /// Produce the next fragment. A started step always runs to completion.
    async fn completion_step(&mut self) -> Result<Step, EngineError>;

    /// Drop prompt/response state but keep the model loaded.
    async fn clear(&mut self);
}
