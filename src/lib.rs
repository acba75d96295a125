//! Life coach: resumable questionnaire plus a locally hosted coaching chat.

pub mod config;
pub mod error;
pub mod llm;
pub mod questionnaire;
pub mod server;
pub mod session;
pub mod store;
