//! QuestionnaireFlow — coordinates the response model, the resumption
//! anchor and the in-memory question pointer.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use super::model::{QuestionCatalog, settings_keys};
use super::progress::{Position, parse_anchor, resume_position};
use super::responses::ResponseModel;
use crate::error::QuestionnaireError;
use crate::store::Store;

/// One option as the presentation layer renders it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OptionView {
    pub id: String,
    pub text: String,
    pub selected: bool,
    /// 1-based priority when selected.
    pub rank: Option<usize>,
}

/// The question currently on screen.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<OptionView>,
}

/// Everything the presentation layer needs to draw the questionnaire.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionnaireSnapshot {
    pub position: Position,
    /// 1-based number of the question on screen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_number: Option<usize>,
    pub question_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    pub can_advance: bool,
    pub can_retreat: bool,
    pub completed: bool,
}

/// Drives the questionnaire screen.
///
/// "Next" persists the resumption anchor; "Previous" only moves the
/// in-memory pointer.
pub struct QuestionnaireFlow {
    catalog: Arc<QuestionCatalog>,
    responses: Arc<ResponseModel>,
    store: Arc<dyn Store>,
    position: RwLock<Position>,
}

impl QuestionnaireFlow {
    pub fn new(
        catalog: Arc<QuestionCatalog>,
        responses: Arc<ResponseModel>,
        store: Arc<dyn Store>,
    ) -> Self {
        let position = if catalog.is_empty() {
            Position::NoQuestions
        } else {
            Position::Question(0)
        };
        Self {
            catalog,
            responses,
            store,
            position: RwLock::new(position),
        }
    }

    pub fn responses(&self) -> &Arc<ResponseModel> {
        &self.responses
    }

    /// Recompute the pointer from persisted state. Called on screen entry.
    pub async fn enter(&self) -> Position {
        let completed = self.responses.is_questionnaire_completed().await;
        let anchor = self.load_anchor().await;
        let answers = self.responses.snapshot().await;

        let position = resume_position(completed, anchor, self.catalog.len(), |index| {
            self.catalog
                .at(index)
                .is_some_and(|q| answers.is_answered(&q.id))
        });

        *self.position.write().await = position;
        info!(%position, anchor = ?anchor, completed, "Questionnaire resumed");
        position
    }

    pub async fn position(&self) -> Position {
        *self.position.read().await
    }

    pub async fn is_completed(&self) -> bool {
        self.position().await.is_complete()
    }

    /// "Next" is enabled only when the current question has a selection.
    pub async fn can_advance(&self) -> bool {
        match self.current_question_id().await {
            Some(question_id) => self.responses.is_answered(&question_id).await,
            None => false,
        }
    }

    /// Toggle an option of any catalog question.
    pub async fn toggle(
        &self,
        question_id: &str,
        option_id: &str,
    ) -> Result<Vec<String>, QuestionnaireError> {
        let question =
            self.catalog
                .get(question_id)
                .ok_or_else(|| QuestionnaireError::UnknownQuestion {
                    question_id: question_id.to_string(),
                })?;
        if question.option(option_id).is_none() {
            return Err(QuestionnaireError::UnknownOption {
                question_id: question_id.to_string(),
                option_id: option_id.to_string(),
            });
        }
        Ok(self.responses.toggle(question_id, option_id).await)
    }

    /// Persist the anchor and move to the next question (or completion).
    pub async fn advance(&self) -> Result<Position, QuestionnaireError> {
        let mut position = self.position.write().await;
        let index = position
            .question_index()
            .ok_or(QuestionnaireError::NotOnQuestion)?;
        let question = self
            .catalog
            .at(index)
            .ok_or(QuestionnaireError::NotOnQuestion)?;

        if !self.responses.is_answered(&question.id).await {
            return Err(QuestionnaireError::NotAnswered {
                question_id: question.id.clone(),
            });
        }

        if let Err(e) = self
            .store
            .set_setting(settings_keys::LAST_ANSWERED_INDEX, &index.to_string())
            .await
        {
            self.responses.record_storage_fault("set_setting", &e);
        }

        let next = position.advanced(self.catalog.len());
        if next.is_complete() {
            self.responses.set_questionnaire_completed(true).await;
            info!("Questionnaire completed");
        }
        *position = next;
        Ok(next)
    }

    /// Move back one question without touching persisted state.
    pub async fn retreat(&self) -> Position {
        let mut position = self.position.write().await;
        *position = position.retreated();
        *position
    }

    /// Discard every answer and start over at the first question.
    pub async fn reset_all(&self) -> Position {
        self.responses.clear().await;
        if let Err(e) = self
            .store
            .delete_setting(settings_keys::LAST_ANSWERED_INDEX)
            .await
        {
            self.responses.record_storage_fault("delete_setting", &e);
        }
        info!("Questionnaire reset");
        self.enter().await
    }

    /// Presentation-ready view of the current state.
    pub async fn snapshot(&self) -> QuestionnaireSnapshot {
        let position = self.position().await;
        let answers = self.responses.snapshot().await;

        let question = position
            .question_index()
            .and_then(|index| self.catalog.at(index))
            .map(|q| QuestionView {
                id: q.id.clone(),
                text: q.text.clone(),
                options: q
                    .options
                    .iter()
                    .map(|o| {
                        let rank = answers.priority_of(&q.id, &o.id);
                        OptionView {
                            id: o.id.clone(),
                            text: o.text.clone(),
                            selected: rank.is_some(),
                            rank,
                        }
                    })
                    .collect(),
            });

        let can_advance = question
            .as_ref()
            .is_some_and(|q| answers.is_answered(&q.id));

        QuestionnaireSnapshot {
            position,
            question_number: position.question_index().map(|i| i + 1),
            question_count: self.catalog.len(),
            question,
            can_advance,
            can_retreat: position.question_index().is_some_and(|i| i > 0),
            completed: position.is_complete(),
        }
    }

    async fn current_question_id(&self) -> Option<String> {
        let index = self.position().await.question_index()?;
        self.catalog.at(index).map(|q| q.id.clone())
    }

    async fn load_anchor(&self) -> Option<usize> {
        match self.store.get_setting(settings_keys::LAST_ANSWERED_INDEX).await {
            Ok(raw) => parse_anchor(raw.as_deref()),
            Err(e) => {
                self.responses.record_storage_fault("get_setting", &e);
                None
            }
        }
    }
}
