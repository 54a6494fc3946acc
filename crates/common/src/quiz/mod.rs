//! Quiz domain types
//!
//! The model is asked for questions in a loose JSON schema. Each element is
//! classified into one of four shapes by inspecting its `answer` and
//! `choices`, and the same shapes are what clients send back when a
//! student answers.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Question types a quiz may be asked to contain
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    MultiSelect,
    TrueFalse,
    FillInTheBlank,
    ShortAnswer,
    LongAnswer,
}

impl QuestionType {
    pub const ALL: [QuestionType; 6] = [
        QuestionType::MultipleChoice,
        QuestionType::MultiSelect,
        QuestionType::TrueFalse,
        QuestionType::FillInTheBlank,
        QuestionType::ShortAnswer,
        QuestionType::LongAnswer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::MultiSelect => "multi_select",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillInTheBlank => "fill_in_the_blank",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::LongAnswer => "long_answer",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of a true/false question, serialised as `"True"` / `"False"`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrueFalse {
    True,
    False,
}

impl TrueFalse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrueFalse::True => "True",
            TrueFalse::False => "False",
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(TrueFalse::True),
            Value::Bool(false) => Some(TrueFalse::False),
            Value::String(s) if s == "True" => Some(TrueFalse::True),
            Value::String(s) if s == "False" => Some(TrueFalse::False),
            _ => None,
        }
    }
}

/// A classified quiz question
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum QuizQuestion {
    MultipleChoice {
        question: String,
        choices: Vec<String>,
        answer: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    MultiSelect {
        question: String,
        choices: Vec<String>,
        answer: Vec<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    TrueFalse {
        question: String,
        choices: Vec<String>,
        answer: TrueFalse,
        #[serde(skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    /// Fill-in-the-blank, short and long answers; graded by the model
    FreeResponse {
        question: String,
        answer: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
}

/// Why a question/answer record could not be classified
#[derive(Debug, Error, PartialEq)]
pub enum QuizFormatError {
    #[error("missing 'question_answer_list' key")]
    MissingQuestionList,

    #[error("'question_answer_list' must be a list")]
    QuestionListNotArray,

    #[error("question record must be a JSON object: {0}")]
    NotAnObject(String),

    #[error("missing 'question' or 'answer' key in: {0}")]
    MissingQuestionOrAnswer(String),

    #[error("invalid answer type for question with choices: {0}")]
    InvalidChoiceAnswer(String),

    #[error("invalid question and answer type for the question: {0}")]
    InvalidFreeResponse(String),

    #[error("choice index {index} is out of range for {choices} choices")]
    ChoiceOutOfRange { index: usize, choices: usize },
}

impl QuizQuestion {
    /// Classify one raw question record by the shape of its answer.
    pub fn classify(value: &Value) -> Result<Self, QuizFormatError> {
        let record = value
            .as_object()
            .ok_or_else(|| QuizFormatError::NotAnObject(value.to_string()))?;

        let (Some(question), Some(answer)) = (record.get("question"), record.get("answer")) else {
            return Err(QuizFormatError::MissingQuestionOrAnswer(value.to_string()));
        };

        let explanation = explanation_of(record);

        match record.get("choices") {
            Some(choices) => {
                let invalid = || QuizFormatError::InvalidChoiceAnswer(value.to_string());
                let question = question.as_str().ok_or_else(invalid)?.to_string();
                let choices = string_list(choices).ok_or_else(invalid)?;

                if let Some(items) = answer.as_array() {
                    let answer = items
                        .iter()
                        .map(|item| index_of(item).ok_or_else(invalid))
                        .collect::<Result<Vec<_>, _>>()?;
                    for index in &answer {
                        check_range(*index, choices.len())?;
                    }
                    Ok(QuizQuestion::MultiSelect { question, choices, answer, explanation })
                } else if let Some(index) = index_of(answer) {
                    check_range(index, choices.len())?;
                    Ok(QuizQuestion::MultipleChoice { question, choices, answer: index, explanation })
                } else if let Some(answer) = TrueFalse::from_value(answer) {
                    Ok(QuizQuestion::TrueFalse { question, choices, answer, explanation })
                } else if let (Some(answer), true) = (answer.as_str(), choices.is_empty()) {
                    Ok(QuizQuestion::FreeResponse {
                        question,
                        answer: answer.to_string(),
                        explanation,
                    })
                } else {
                    Err(invalid())
                }
            }
            None => {
                let allowed = ["question", "answer", "explanation"];
                let keys_allowed = record.keys().all(|k| allowed.contains(&k.as_str()));
                match (question.as_str(), answer.as_str(), keys_allowed) {
                    (Some(question), Some(answer), true) => Ok(QuizQuestion::FreeResponse {
                        question: question.to_string(),
                        answer: answer.to_string(),
                        explanation,
                    }),
                    _ => Err(QuizFormatError::InvalidFreeResponse(value.to_string())),
                }
            }
        }
    }

    pub fn question(&self) -> &str {
        match self {
            QuizQuestion::MultipleChoice { question, .. }
            | QuizQuestion::MultiSelect { question, .. }
            | QuizQuestion::TrueFalse { question, .. }
            | QuizQuestion::FreeResponse { question, .. } => question,
        }
    }

    pub fn choices(&self) -> Option<&[String]> {
        match self {
            QuizQuestion::MultipleChoice { choices, .. }
            | QuizQuestion::MultiSelect { choices, .. }
            | QuizQuestion::TrueFalse { choices, .. } => Some(choices),
            QuizQuestion::FreeResponse { .. } => None,
        }
    }

    pub fn explanation(&self) -> Option<&str> {
        match self {
            QuizQuestion::MultipleChoice { explanation, .. }
            | QuizQuestion::MultiSelect { explanation, .. }
            | QuizQuestion::TrueFalse { explanation, .. }
            | QuizQuestion::FreeResponse { explanation, .. } => explanation.as_deref(),
        }
    }

    /// Human-readable form of the expected answer, used in prompts
    pub fn answer_text(&self) -> String {
        match self {
            QuizQuestion::MultipleChoice { answer, .. } => answer.to_string(),
            QuizQuestion::MultiSelect { answer, .. } => format_indices(answer),
            QuizQuestion::TrueFalse { answer, .. } => answer.as_str().to_string(),
            QuizQuestion::FreeResponse { answer, .. } => answer.clone(),
        }
    }

    pub fn is_free_response(&self) -> bool {
        matches!(self, QuizQuestion::FreeResponse { .. })
    }

    /// Grade an answer to a choice-based question.
    ///
    /// Returns `None` for free-response questions, which need the model.
    /// An answer of the wrong shape is simply incorrect.
    pub fn check_choice_answer(&self, student_answer: &StudentAnswer) -> Option<bool> {
        let correct = match (self, student_answer) {
            (QuizQuestion::FreeResponse { .. }, _) => return None,
            (QuizQuestion::MultipleChoice { answer, .. }, StudentAnswer::Index(index)) => {
                answer == index
            }
            (QuizQuestion::TrueFalse { answer, .. }, StudentAnswer::Text(text)) => {
                text.trim().eq_ignore_ascii_case(answer.as_str())
            }
            (QuizQuestion::MultiSelect { answer, .. }, StudentAnswer::Indices(indices)) => {
                let expected: BTreeSet<_> = answer.iter().collect();
                let given: BTreeSet<_> = indices.iter().collect();
                expected == given
            }
            _ => false,
        };
        Some(correct)
    }
}

impl<'de> Deserialize<'de> for QuizQuestion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        QuizQuestion::classify(&value).map_err(de::Error::custom)
    }
}

/// Classify every element of a model response's `question_answer_list`.
///
/// One bad element fails the whole quiz.
pub fn parse_quiz(value: &Value) -> Result<Vec<QuizQuestion>, QuizFormatError> {
    let list = value
        .get("question_answer_list")
        .ok_or(QuizFormatError::MissingQuestionList)?
        .as_array()
        .ok_or(QuizFormatError::QuestionListNotArray)?;

    list.iter().map(QuizQuestion::classify).collect()
}

/// A student's answer: a choice index, a set of indices, or free text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StudentAnswer {
    Index(usize),
    Indices(Vec<usize>),
    Text(String),
}

impl fmt::Display for StudentAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudentAnswer::Index(index) => write!(f, "{}", index),
            StudentAnswer::Indices(indices) => f.write_str(&format_indices(indices)),
            StudentAnswer::Text(text) => f.write_str(text),
        }
    }
}

/// The model's verdict on a free-response answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Correctness {
    pub correctness: i32,
}

impl Correctness {
    pub fn from_bool(correct: bool) -> Self {
        Self {
            correctness: i32::from(correct),
        }
    }

    pub fn is_correct(&self) -> bool {
        self.correctness == 1
    }
}

/// The model's assessment of a student's recent answers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrengthWeakness {
    pub strength: String,
    pub weakness: String,
}

/// Percentage of correct answers, rounded half to even; 0 when nothing was answered
pub fn calculate_score(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let ratio = correct as f64 / total as f64;
    (ratio * 100.0).round_ties_even() as u32
}

fn explanation_of(record: &Map<String, Value>) -> Option<String> {
    record
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

// Booleans are not indices, even though some decoders treat them as integers.
fn index_of(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|n| usize::try_from(n).ok())
}

fn check_range(index: usize, choices: usize) -> Result<(), QuizFormatError> {
    if index < choices {
        Ok(())
    } else {
        Err(QuizFormatError::ChoiceOutOfRange { index, choices })
    }
}

fn format_indices(indices: &[usize]) -> String {
    let joined = indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", joined)
}
