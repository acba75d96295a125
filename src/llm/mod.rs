//! Language model integration.
//!
//! - `engine`: the opaque init/step/clear capability the session drives
//! - `local_server`: llama.cpp server adapter
//! - `prompt`: prompt composition

pub mod engine;
pub mod local_server;
pub mod prompt;

pub use engine::{InferenceEngine, ModelContext, Step};
pub use local_server::LlamaServerEngine;
pub use prompt::compose;
