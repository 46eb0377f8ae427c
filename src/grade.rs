use serde::{Deserialize, Serialize};

use crate::assignment::{AnswerKey, OptionIndex};
use crate::infer::{DetectedAnswer, DetectedAnswerSet};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    /// One-based, as printed on the sheet.
    pub question_number: usize,
    pub correct_option: OptionIndex,
    pub student_option: Option<OptionIndex>,
    pub is_correct: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    /// Percentage in 0..=100.
    pub score: f32,
    pub correct_count: usize,
    pub total_questions: usize,
    pub details: Vec<QuestionResult>,
}

/// Scores a detected answer set against the answer key.
///
/// The answer key is authoritative for the question count, so a detection run
/// that came up short is graded against the full key and the missing tail
/// counts as unanswered. Detected answers beyond the key are ignored. Pure
/// function of its inputs.
pub fn grade(detected: &DetectedAnswerSet, key: &AnswerKey) -> GradingResult {
    let total_questions = key.len();
    let mut correct_count = 0;
    let mut details = Vec::with_capacity(total_questions);

    for (question, correct_option) in key.iter().enumerate() {
        let student_option = detected
            .get(question)
            .and_then(DetectedAnswer::option);
        let is_correct = student_option == Some(correct_option);
        if is_correct {
            correct_count += 1;
        }
        details.push(QuestionResult {
            question_number: question + 1,
            correct_option,
            student_option,
            is_correct,
        });
    }

    let score = if total_questions == 0 {
        0.0
    } else {
        correct_count as f32 / total_questions as f32 * 100.0
    };

    GradingResult {
        score,
        correct_count,
        total_questions,
        details,
    }
}
