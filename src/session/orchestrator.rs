//! Inference session orchestrator.
//!
//! Owns the single model context and serializes prompt submission,
//! step-by-step generation and resets against it.
//!
//! Locking:
//! - `state` (sync) is the single-flight gate and is never held across an await.
//! - `context` (async) is held for the duration of one engine call.
//! - The transcript's reset epoch is the cancellation flag. Fragments are
//!   appended with `append_if_current`, so nothing from a cancelled turn
//!   lands after `reset` has bumped the epoch.
//!
//! Whenever `state` and the transcript lock are both taken, `state` comes first.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::SessionState;
use super::transcript::Transcript;
use crate::error::SessionError;
use crate::llm::{InferenceEngine, ModelContext, Step, compose};
use crate::questionnaire::ResponseModel;

/// Appended once the engine reports completion.
const TURN_SEPARATOR: &str = "\n";

/// Handle for one generation turn.
#[derive(Debug, Clone)]
pub struct Turn {
    id: Uuid,
    epoch: u64,
    started: bool,
}

impl Turn {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Transcript epoch the turn was started in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the prompt reached the engine.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

/// Outcome of one `stream_next` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStep {
    /// A fragment was appended to the transcript.
    Fragment(String),
    /// The engine finished; the session is `Ready` again.
    Finished,
    /// The engine failed mid-stream; output was truncated and the session is `Ready`.
    Faulted,
    /// A reset superseded this turn.
    Cancelled,
    /// The turn never started generating.
    Idle,
}

impl StreamStep {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fragment(_))
    }
}

/// The single inference session of the process.
pub struct InferenceSession {
    engine: Arc<dyn InferenceEngine>,
    model_path: PathBuf,
    instructions: String,
    responses: Arc<ResponseModel>,
    transcript: Arc<Transcript>,
    state: Mutex<SessionState>,
    context: tokio::sync::Mutex<Option<Box<dyn ModelContext>>>,
}

impl InferenceSession {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        model_path: PathBuf,
        instructions: impl Into<String>,
        responses: Arc<ResponseModel>,
    ) -> Self {
        Self {
            engine,
            model_path,
            instructions: instructions.into(),
            responses,
            transcript: Arc::new(Transcript::new()),
            state: Mutex::new(SessionState::Unloaded),
            context: tokio::sync::Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    pub fn transcript(&self) -> &Arc<Transcript> {
        &self.transcript
    }

    /// Load the model if no context exists. Failures are returned, never retried.
    pub async fn ensure_loaded(&self) -> Result<(), SessionError> {
        let mut context = self.context.lock().await;
        if context.is_none() {
            info!(
                engine = self.engine.name(),
                path = %self.model_path.display(),
                "Loading model"
            );
            let loaded = self.engine.load(&self.model_path).await.map_err(|e| {
                warn!(error = %e, "Model load failed");
                SessionError::ModelLoad(e)
            })?;
            *context = Some(loaded);
        }

        let mut state = self.lock_state();
        if *state == SessionState::Unloaded {
            *state = SessionState::Ready;
            info!("Session ready");
        }
        Ok(())
    }

    /// Claim the session and submit a prompt built from `text`.
    ///
    /// Rejects with `Busy` while another turn is generating. A prompt the
    /// engine refuses is logged and yields a turn that is already over.
    pub async fn begin_turn(&self, text: &str) -> Result<Turn, SessionError> {
        let epoch = {
            let mut state = self.lock_state();
            match *state {
                SessionState::Generating => return Err(SessionError::Busy),
                SessionState::Unloaded => {
                    return Err(SessionError::NotReady {
                        state: SessionState::Unloaded,
                    });
                }
                SessionState::Ready => {}
            }
            *state = SessionState::Generating;
            self.transcript.epoch()
        };

        let mut turn = Turn {
            id: Uuid::new_v4(),
            epoch,
            started: false,
        };

        let profile = self.responses.formatted_summary().await;
        let prompt = compose(&self.instructions, &profile, text);

        let mut context = self.context.lock().await;
        // Superseded while building the prompt: the context may already
        // belong to a newer turn.
        if self.transcript.epoch() != epoch {
            debug!(turn = %turn.id, "Turn superseded by reset before generation");
            return Ok(turn);
        }
        let Some(ctx) = context.as_mut() else {
            self.finish_turn(&turn, SessionState::Unloaded, "");
            return Ok(turn);
        };

        if let Err(e) = ctx.completion_init(&prompt).await {
            warn!(turn = %turn.id, error = %e, "Prompt submission failed");
            ctx.clear().await;
            self.finish_turn(&turn, SessionState::Ready, "");
            return Ok(turn);
        }

        turn.started = true;
        info!(turn = %turn.id, prompt_len = prompt.len(), "Turn started");
        Ok(turn)
    }

    /// Run one engine step for `turn` and append its fragment.
    pub async fn stream_next(&self, turn: &Turn) -> StreamStep {
        if !turn.started {
            return StreamStep::Idle;
        }

        let mut context = self.context.lock().await;
        if self.transcript.epoch() != turn.epoch {
            return StreamStep::Cancelled;
        }
        let Some(ctx) = context.as_mut() else {
            return StreamStep::Cancelled;
        };

        match ctx.completion_step().await {
            Ok(Step::Fragment(text)) => {
                if self.transcript.append_if_current(turn.epoch, &text) {
                    debug!(turn = %turn.id, len = text.len(), "Fragment");
                    StreamStep::Fragment(text)
                } else {
                    debug!(turn = %turn.id, "Dropping fragment from cancelled turn");
                    StreamStep::Cancelled
                }
            }
            Ok(Step::Done) => {
                ctx.clear().await;
                if self.finish_turn(turn, SessionState::Ready, TURN_SEPARATOR) {
                    info!(turn = %turn.id, "Turn finished");
                    StreamStep::Finished
                } else {
                    StreamStep::Cancelled
                }
            }
            Err(e) => {
                warn!(turn = %turn.id, error = %e, "Generation fault, truncating turn");
                ctx.clear().await;
                if self.finish_turn(turn, SessionState::Ready, TURN_SEPARATOR) {
                    StreamStep::Faulted
                } else {
                    StreamStep::Cancelled
                }
            }
        }
    }

    /// Interrupt any turn, clear the context and empty the transcript.
    ///
    /// Waits for an in-flight engine step to return before clearing. With
    /// `resume` the model stays loaded (`Ready`); without, it is dropped
    /// (`Unloaded`).
    pub async fn reset(&self, resume: bool) {
        let epoch = {
            let mut state = self.lock_state();
            let epoch = self.transcript.reset();
            *state = SessionState::Unloaded;
            epoch
        };

        let mut context = self.context.lock().await;
        if let Some(ctx) = context.as_mut() {
            ctx.clear().await;
        }
        if !resume {
            *context = None;
        }
        let loaded = context.is_some();

        let mut state = self.lock_state();
        if self.transcript.epoch() == epoch {
            *state = if loaded {
                SessionState::Ready
            } else {
                SessionState::Unloaded
            };
        }
        let now = *state;
        info!(resume, state = %now, "Session reset");
    }

    /// Leave `Generating` if `turn` is still current. The separator is
    /// appended under the same gate so it cannot trail a reset.
    fn finish_turn(&self, turn: &Turn, next: SessionState, separator: &str) -> bool {
        let mut state = self.lock_state();
        if !self.transcript.append_if_current(turn.epoch, separator) {
            return false;
        }
        if state.can_transition_to(next) {
            *state = next;
        }
        true
    }
}

/// Drive `turn` to completion on a background task.
pub fn spawn_generation(session: Arc<InferenceSession>, turn: Turn) -> JoinHandle<StreamStep> {
    tokio::spawn(async move {
        loop {
            let step = session.stream_next(&turn).await;
            if step.is_terminal() {
                debug!(turn = %turn.id(), outcome = ?step, "Generation task done");
                return step;
            }
        }
    })
}
