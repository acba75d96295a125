//! Coaching chat session: state machine, transcript, orchestrator and routes.

pub mod chat;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::CoachChat;
pub use orchestrator::{InferenceSession, StreamStep, Turn, spawn_generation};
pub use routes::{ChatRouteState, chat_routes};
pub use state::SessionState;
pub use transcript::{Transcript, TranscriptEvent};
