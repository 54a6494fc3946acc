//! Study services behind the HTTP handlers

pub mod evaluation;
pub mod notes;
pub mod prompts;
pub mod query;
pub mod quiz;

pub use evaluation::{Assessment, EvaluationService};
pub use notes::NotesService;
pub use query::QueryService;
pub use quiz::QuizService;
