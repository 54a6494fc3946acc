//! Notes and quiz customisation
//!
//! Clients send loosely-filled preference forms. `resolve()` turns them into
//! the concrete values rendered into prompts: `"other"` selects the free-text
//! `*_custom` field, and anything empty falls back to a default.

use crate::errors::{AppError, Result};
use crate::quiz::QuestionType;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Value that selects the matching `*_custom` text
pub const OTHER: &str = "other";

pub const DEFAULT_NUMBER_OF_QUESTIONS: u32 = 10;
pub const MAX_NUMBER_OF_QUESTIONS: u32 = 50;
pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NotesCustomisationRequest {
    #[validate(length(max = 200))]
    pub focus: Option<String>,
    #[validate(length(max = 200))]
    pub focus_custom: Option<String>,
    #[validate(length(max = 200))]
    pub tone: Option<String>,
    #[validate(length(max = 200))]
    pub tone_custom: Option<String>,
    #[validate(length(max = 200))]
    pub emphasis: Option<String>,
    #[validate(length(max = 200))]
    pub emphasis_custom: Option<String>,
    #[validate(length(max = 200))]
    pub length: Option<String>,
    #[validate(length(max = 200))]
    pub length_custom: Option<String>,
    #[validate(length(max = 200))]
    pub language: Option<String>,
}

/// Concrete notes preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesCustomisation {
    pub focus: String,
    pub tone: String,
    pub emphasis: String,
    pub length: String,
    pub language: String,
}

impl NotesCustomisationRequest {
    pub fn resolve(&self) -> NotesCustomisation {
        NotesCustomisation {
            focus: choose(&self.focus, &self.focus_custom, "General"),
            tone: choose(&self.tone, &self.tone_custom, "neutral"),
            emphasis: choose(&self.emphasis, &self.emphasis_custom, "balanced"),
            length: choose(&self.length, &self.length_custom, "standard"),
            language: or_default(&self.language, DEFAULT_LANGUAGE),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct QuizCustomisationRequest {
    #[validate(range(min = 1))]
    pub number_of_questions: Option<u32>,

    #[serde(default)]
    pub question_types: Vec<QuestionType>,

    #[validate(length(max = 50))]
    pub difficulty_level: Option<String>,

    #[serde(default)]
    pub include_explanations: bool,

    #[validate(length(max = 200))]
    pub emphasis: Option<String>,

    #[validate(length(max = 200))]
    pub emphasis_custom: Option<String>,

    #[validate(length(max = 200))]
    pub language: Option<String>,
}

/// Concrete quiz preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizCustomisation {
    pub number_of_questions: u32,
    /// Comma-separated list, as rendered into the prompt
    pub question_types: String,
    pub difficulty_level: String,
    /// `Yes` or `No`
    pub include_explanation: &'static str,
    pub emphasis: String,
    pub language: String,
}

impl QuizCustomisationRequest {
    pub fn resolve(&self) -> QuizCustomisation {
        self.resolve_with_limits(DEFAULT_NUMBER_OF_QUESTIONS, MAX_NUMBER_OF_QUESTIONS)
    }

    /// Reject a requested quiz size above `max_questions`
    pub fn check_limit(&self, max_questions: u32) -> Result<()> {
        match self.number_of_questions {
            Some(n) if n > max_questions => Err(AppError::Validation {
                message: format!("number_of_questions must be at most {}", max_questions),
                field: Some("number_of_questions".to_string()),
            }),
            _ => Ok(()),
        }
    }

    /// Resolve with the configured quiz size and limit
    pub fn resolve_with_limits(&self, default_questions: u32, max_questions: u32) -> QuizCustomisation {
        let types: &[QuestionType] = if self.question_types.is_empty() {
            &QuestionType::ALL
        } else {
            &self.question_types
        };

        QuizCustomisation {
            number_of_questions: self
                .number_of_questions
                .unwrap_or(default_questions)
                .clamp(1, max_questions.max(1)),
            question_types: types
                .iter()
                .map(QuestionType::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            difficulty_level: or_default(&self.difficulty_level, "mix"),
            include_explanation: if self.include_explanations { "Yes" } else { "No" },
            emphasis: choose(&self.emphasis, &self.emphasis_custom, "balanced"),
            language: or_default(&self.language, DEFAULT_LANGUAGE),
        }
    }
}

fn choose(choice: &Option<String>, custom: &Option<String>, default: &str) -> String {
    match choice.as_deref().map(str::trim) {
        Some(OTHER) => or_default(custom, default),
        _ => or_default(choice, default),
    }
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}
