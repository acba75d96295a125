//! Questionnaire progress — where to resume and how the pointer moves.

use serde::{Deserialize, Serialize};

/// Where the user is in the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Position {
    /// Showing the question at this 0-based catalog index.
    Question(usize),
    /// Every question has been advanced past.
    Complete,
    /// The catalog has no questions.
    NoQuestions,
}

impl Position {
    pub fn question_index(&self) -> Option<usize> {
        match self {
            Self::Question(index) => Some(*index),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Pointer after pressing "Next" on an answered question.
    pub fn advanced(&self, question_count: usize) -> Position {
        match self {
            Self::Question(index) if index + 1 >= question_count => Self::Complete,
            Self::Question(index) => Self::Question(index + 1),
            other => *other,
        }
    }

    /// Pointer after pressing "Previous". Never leaves the first question.
    pub fn retreated(&self) -> Position {
        match self {
            Self::Question(index) if *index > 0 => Self::Question(index - 1),
            other => *other,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Question(index) => write!(f, "question {}", index + 1),
            Self::Complete => write!(f, "complete"),
            Self::NoQuestions => write!(f, "no_questions"),
        }
    }
}

/// Parse the stored resumption anchor. Anything but a non-negative integer
/// means nothing has been answered yet.
pub fn parse_anchor(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
}

/// Decide which question to show on entry.
///
/// `is_answered(i)` reports whether question `i` has a non-empty selection.
/// The response map is the source of truth: a stale anchor can only cause a
/// question to be shown again, never skip an unanswered gap.
pub fn resume_position(
    completed: bool,
    last_answered: Option<usize>,
    question_count: usize,
    is_answered: impl Fn(usize) -> bool,
) -> Position {
    if question_count == 0 {
        return Position::NoQuestions;
    }
    if completed {
        return Position::Complete;
    }

    let last_index = question_count - 1;
    let index = match last_answered {
        Some(last) => last.saturating_add(1).min(last_index),
        None => 0,
    };

    if index > 0 && !is_answered(index) && !is_answered(index - 1) {
        return Position::Question(index - 1);
    }
    Position::Question(index)
}
