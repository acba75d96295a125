//! CoachChat — the chat screen's view of the inference session.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::orchestrator::{InferenceSession, StreamStep, spawn_generation};
use super::state::SessionState;
use super::transcript::TranscriptEvent;
use crate::error::SessionError;

/// Chat operations exposed to the presentation layer.
pub struct CoachChat {
    session: Arc<InferenceSession>,
}

impl CoachChat {
    pub fn new(session: Arc<InferenceSession>) -> Self {
        Self { session }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn transcript_text(&self) -> String {
        self.session.transcript().text()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.session.transcript().subscribe()
    }

    /// Load the model. A load failure is shown in the transcript and returned.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        if let Err(e) = self.session.ensure_loaded().await {
            self.session.transcript().append(&format!("{e}\n"));
            return Err(e);
        }
        Ok(())
    }

    /// Echo the user's message and start generating a reply in the background.
    ///
    /// Blank input is ignored (`Ok(None)`).
    pub async fn send_user_message(
        &self,
        text: &str,
    ) -> Result<Option<JoinHandle<StreamStep>>, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring blank message");
            return Ok(None);
        }

        let state = self.session.state();
        if state.is_generating() {
            return Err(SessionError::Busy);
        }
        if state == SessionState::Unloaded {
            self.initialize().await?;
        }

        let turn = self.session.begin_turn(text).await?;
        self.session
            .transcript()
            .append_if_current(turn.epoch(), &format!("\n\n*{text}*\n\n"));
        info!(turn = %turn.id(), "User message sent");

        Ok(Some(spawn_generation(Arc::clone(&self.session), turn)))
    }

    /// Empty the conversation and reload the coach.
    pub async fn clear_transcript(&self) {
        self.session.reset(true).await;
        // A load failure is already in the transcript.
        let _ = self.initialize().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::llm::Step;
    use crate::session::testing::{ScriptedEngine, session_with};

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn load_error_is_shown_inline() {
        let (engine, _script) = ScriptedEngine::new();
        engine.fail_load.store(true, Ordering::SeqCst);
        let chat = CoachChat::new(session_with(engine).await);

        let err = chat.initialize().await.unwrap_err();
        assert!(matches!(err, SessionError::ModelLoad(_)));
        assert_eq!(
            chat.transcript_text(),
            "Error loading model: Model artifact not found at model.gguf\n"
        );
        assert_eq!(chat.state(), SessionState::Unloaded);
    }

    #[tokio::test]
    async fn message_is_echoed_then_answered() {
        let (engine, script) = ScriptedEngine::new();
        let chat = CoachChat::new(session_with(engine).await);

        let generation = chat.send_user_message("  Hi coach ").await.unwrap().unwrap();
        script.send(Ok(Step::Fragment("Hello".to_string()))).unwrap();
        script.send(Ok(Step::Done)).unwrap();

        let outcome = tokio::time::timeout(TEST_TIMEOUT, generation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, StreamStep::Finished);
        assert_eq!(chat.transcript_text(), "\n\n*Hi coach*\n\nHello\n");
        assert_eq!(chat.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let (engine, _script) = ScriptedEngine::new();
        let chat = CoachChat::new(session_with(Arc::clone(&engine)).await);

        assert!(chat.send_user_message("   ").await.unwrap().is_none());
        assert!(chat.transcript_text().is_empty());
        assert_eq!(engine.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_message_while_generating_is_rejected() {
        let (engine, _script) = ScriptedEngine::new();
        let chat = CoachChat::new(session_with(engine).await);

        let _generation = chat.send_user_message("first").await.unwrap();
        let before = chat.transcript_text();

        let err = chat.send_user_message("second").await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));
        assert_eq!(chat.transcript_text(), before);
    }

    #[tokio::test]
    async fn clear_transcript_reinitializes() {
        let (engine, script) = ScriptedEngine::new();
        let chat = CoachChat::new(session_with(Arc::clone(&engine)).await);

        let generation = chat.send_user_message("hello").await.unwrap().unwrap();
        script.send(Ok(Step::Done)).unwrap();
        tokio::time::timeout(TEST_TIMEOUT, generation)
            .await
            .unwrap()
            .unwrap();
        assert!(!chat.transcript_text().is_empty());

        chat.clear_transcript().await;
        assert!(chat.transcript_text().is_empty());
        assert_eq!(chat.state(), SessionState::Ready);
        assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
    }
}
