//! Prompt templates for the generative model

use studyowl_common::customisation::{NotesCustomisation, QuizCustomisation};
use studyowl_common::quiz::StrengthWeakness;
use studyowl_common::store::QuizItemRecord;
use std::fmt::Write;

/// Schema appended to every quiz prompt; the response is read by `parse_quiz`
pub const QUIZ_FORMATTER: &str = r#"Please return a JSON object with a question_answer_list built from this text, using the following schema:

{"question_answer_list": list[MultipleChoice | MultiSelect | TrueFalse | FillInTheBlank | ShortAnswer | LongAnswer]}

MultipleChoice = {"question": str, "choices": list[str], "answer": int, "explanation": str}
MultiSelect = {"question": str, "choices": list[str], "answer": list[int], "explanation": str}
TrueFalse = {"question": str, "choices": ["True", "False"], "answer": str, "explanation": str}
FillInTheBlank = {"question": str, "answer": str, "explanation": str}
ShortAnswer = {"question": str, "answer": str, "explanation": str}
LongAnswer = {"question": str, "answer": str, "explanation": str}

Answers to choice questions are zero-based indices into "choices".
All other fields are required.

Important: Only return a single piece of valid JSON text.

Here is the text:
"#;

const GRADING_PROMPT: &str = r#"You are a university professor specializing in exam grading.

Your task is to evaluate whether the student's answer is correct and sufficiently addresses the question. Please compare the student's answer with the correct answer based on the provided question.

Return the result in JSON format using the following schema:
{
    "correctness": int
}
Where:
- 1 indicates the student's answer is correct.
- 0 indicates the student's answer is incorrect.

You are provided with the following details:
"#;

const ASSESSMENT_PROMPT: &str = r#"You are a university professor who can assess a student's strength and weakness very well given their exam results.

Your task is to evaluate the student's performance and identify their strengths and weaknesses. Consider the exam results and any relevant details provided.

Address the student directly.

Return the result in JSON format using the following schema:
{
    "strength": str,
    "weakness": str
}

You are provided with the following details:
"#;

fn notes_preamble(content_label: &str, prefs: &NotesCustomisation) -> String {
    format!(
        "You are a skilled note-taker tasked with summarizing the content of a {content_label} file.\n\
         Please generate well-structured notes with headings and bullet points for easier readability based on the following preferences:\n\
         - Focus: {}\n\
         - Tone: {}\n\
         - Emphasis: {}\n\
         - Length: {}\n\
         - Language: {}\n",
        prefs.focus, prefs.tone, prefs.emphasis, prefs.length, prefs.language
    )
}

/// Instructions sent alongside an uploaded image or video
pub fn media_notes_prompt(content_label: &str, prefs: &NotesCustomisation) -> String {
    format!("{}\nMedia file content:", notes_preamble(content_label, prefs))
}

/// Instructions followed by text extracted from a document
pub fn document_notes_prompt(content_label: &str, prefs: &NotesCustomisation, text: &str) -> String {
    format!("{}\nExtracted text:\n{}", notes_preamble(content_label, prefs), text)
}

fn quiz_settings(prefs: &QuizCustomisation) -> String {
    format!(
        "The difficulty level of the questions should be: {}.\n\
         Include explanations for the answers: {}.\n\
         Emphasize: {}\n\
         Preferred language for the quiz: {}\n\n",
        prefs.difficulty_level, prefs.include_explanation, prefs.emphasis, prefs.language
    )
}

/// Quiz over the given notes
pub fn quiz_prompt(prefs: &QuizCustomisation, content: &str) -> String {
    format!(
        "Please generate {} quiz questions and answers based on the following text.\n\
         The question types should include: {}.\n\
         {}{}{}",
        prefs.number_of_questions,
        prefs.question_types,
        quiz_settings(prefs),
        QUIZ_FORMATTER,
        content
    )
}

/// Quiz over the given notes, steered towards the student's weaknesses
pub fn regenerate_quiz_prompt(prefs: &QuizCustomisation, content: &str, assessment: &StrengthWeakness) -> String {
    format!(
        "Please generate {} quiz questions and answers based on this text and the student's assessment.\n\
         The question types should include: {}. Choose the most appropriate questions based on the content and assessment of the student's strengths and weaknesses. You should focus more on the weakness.\n\
         {}{}{}\n\n\
         Student's Strengths:\n- {}\n\n\
         Student's Weaknesses:\n- {}\n",
        prefs.number_of_questions,
        prefs.question_types,
        quiz_settings(prefs),
        QUIZ_FORMATTER,
        content,
        assessment.strength,
        assessment.weakness
    )
}

/// Ask the model to grade a free-response answer
pub fn grading_prompt(question: &str, student_answer: &str, correct_answer: &str) -> String {
    format!(
        "{GRADING_PROMPT}\n\
         - **Question:** {question}\n\
         - **Student's Answer:** {student_answer}\n\
         - **Correct Answer:** {correct_answer}\n"
    )
}

/// Render answered quiz items the way the assessment prompt expects them
pub fn format_quiz_results(items: &[QuizItemRecord]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "Question: {}", item.question.question());
        if let Some(choices) = item.question.choices() {
            out.push_str("Choices:\n");
            for choice in choices {
                let _ = writeln!(out, "  - {}", choice);
            }
        }
        let _ = writeln!(out, "Answer: {}", item.question.answer_text());
        let student_answer = item
            .student_answer
            .as_ref()
            .map_or_else(|| "N/A".to_string(), ToString::to_string);
        let _ = writeln!(out, "Student's Answer: {}", student_answer);
        let verdict = if item.correctness == Some(1) { "Correct" } else { "Incorrect" };
        let _ = writeln!(out, "Correctness: {}", verdict);
        out.push_str(&"-".repeat(40));
        out.push('\n');
    }
    out
}

/// Ask the model for the student's strengths and weaknesses
pub fn assessment_prompt(items: &[QuizItemRecord]) -> String {
    format!("{}{}", ASSESSMENT_PROMPT, format_quiz_results(items))
}

/// Answer a question from retrieved note chunks
pub fn query_prompt(query: &str, relevant_text: &str) -> String {
    format!(
        "You are an expert assistant tasked with generating a comprehensive, well-structured and accurate answer to the user's query based on the provided text.\n\n\
         User's query:\n{query}\n\n\
         Relevant text:\n{relevant_text}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use studyowl_common::customisation::{NotesCustomisationRequest, QuizCustomisationRequest};
    use studyowl_common::quiz::{QuizQuestion, StudentAnswer};
    use uuid::Uuid;

    #[test]
    fn test_document_notes_prompt() {
        let prefs = NotesCustomisationRequest::default().resolve();
        let prompt = document_notes_prompt("PDF document", &prefs, "Cells divide.");

        assert!(prompt.starts_with("You are a skilled note-taker"));
        assert!(prompt.contains("summarizing the content of a PDF document file"));
        assert!(prompt.contains("- Tone: neutral\n"));
        assert!(prompt.ends_with("Extracted text:\nCells divide."));
    }

    #[test]
    fn test_quiz_prompt_asks_for_question_list() {
        let prefs = QuizCustomisationRequest {
            number_of_questions: Some(3),
            ..Default::default()
        }
        .resolve();
        let prompt = quiz_prompt(&prefs, "NOTES");

        assert!(prompt.starts_with("Please generate 3 quiz questions"));
        assert!(prompt.contains("Include explanations for the answers: No."));
        assert!(prompt.contains("question_answer_list"));
        assert!(prompt.ends_with("Here is the text:\nNOTES"));
    }

    #[test]
    fn test_regenerate_prompt_appends_assessment() {
        let prefs = QuizCustomisationRequest::default().resolve();
        let assessment = StrengthWeakness {
            strength: "Definitions".into(),
            weakness: "Dates".into(),
        };
        let prompt = regenerate_quiz_prompt(&prefs, "NOTES", &assessment);

        assert!(prompt.contains("You should focus more on the weakness."));
        assert!(prompt.contains("NOTES\n\nStudent's Strengths:\n- Definitions\n\nStudent's Weaknesses:\n- Dates\n"));
    }

    #[test]
    fn test_format_quiz_results() {
        let now = Utc::now();
        let item = QuizItemRecord {
            id: Uuid::new_v4(),
            user_id: "u".into(),
            question: QuizQuestion::MultiSelect {
                question: "Pick primes".into(),
                choices: vec!["2".into(), "4".into(), "5".into()],
                answer: vec![0, 2],
                explanation: None,
            },
            student_answer: Some(StudentAnswer::Indices(vec![0])),
            correctness: Some(0),
            created_at: now,
            updated_at: now,
        };

        let text = format_quiz_results(&[item]);
        assert_eq!(
            text,
            format!(
                "Question: Pick primes\nChoices:\n  - 2\n  - 4\n  - 5\nAnswer: [0, 2]\nStudent's Answer: [0]\nCorrectness: Incorrect\n{}\n",
                "-".repeat(40)
            )
        );
    }

    #[test]
    fn test_grading_prompt_mentions_schema() {
        let prompt = grading_prompt("Define osmosis", "water moves", "Diffusion of water");
        assert!(prompt.contains("\"correctness\": int"));
        assert!(prompt.contains("- **Student's Answer:** water moves\n"));
    }
}
