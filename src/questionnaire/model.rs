//! Questionnaire definition models.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Questionnaire bundled with the binary.
const BUNDLED_QUESTIONS: &str = include_str!("../../assets/questions.json");

/// One selectable answer to a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

/// A question and its ordered options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Look up an option by id.
    pub fn option(&self, option_id: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

#[derive(Deserialize)]
struct QuestionnaireFile {
    questions: Vec<Question>,
}

/// The immutable, canonically ordered question catalog.
///
/// Loaded once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    /// Build a catalog from questions in canonical order.
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Parse a `{"questions": [...]}` document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: QuestionnaireFile =
            serde_json::from_str(json).map_err(|e| ConfigError::Catalog(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        for question in &file.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(ConfigError::Catalog(format!(
                    "duplicate question id {:?}",
                    question.id
                )));
            }
            let mut option_ids = std::collections::HashSet::new();
            for option in &question.options {
                if !option_ids.insert(option.id.as_str()) {
                    return Err(ConfigError::Catalog(format!(
                        "duplicate option id {:?} in question {:?}",
                        option.id, question.id
                    )));
                }
            }
        }

        Ok(Self::new(file.questions))
    }

    /// Read and parse a questionnaire file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The questionnaire shipped with the application.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json(BUNDLED_QUESTIONS)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

/// Settings keys used for questionnaire persistence.
pub mod settings_keys {
    /// Highest question index the user advanced past (integer as string).
    pub const LAST_ANSWERED_INDEX: &str = "last_answered_question_index";
    /// `"true"` once the final question has been advanced past.
    pub const QUESTIONNAIRE_COMPLETED: &str = "questionnaire_completed";
}
