// Quiz document model in its complete and partial forms.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One answer option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub correct: bool,
}

impl AnswerOption {
    pub fn new(text: impl Into<String>, correct: bool) -> Self {
        Self {
            text: text.into(),
            correct,
        }
    }
}

/// A fully-formed question. `text` travels on the wire as `"question"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    pub answers: Vec<AnswerOption>,
}

/// A complete quiz document, as accepted by strict validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Indices of questions that do not have exactly one correct answer.
    ///
    /// Well-formed quizzes return an empty list; this is not enforced structurally.
    pub fn questions_without_single_correct(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.answers.iter().filter(|a| a.correct).count() != 1)
            .map(|(i, _)| i)
            .collect()
    }

    /// Count the selections that picked a correct option.
    ///
    /// Fails with `IncompleteAnswers` unless every question has a selection;
    /// never scores a subset.
    pub fn score(&self, selections: &AnswerSelection) -> Result<ScoreResult, Error> {
        let missing = selections.missing(self.len());
        if !missing.is_empty() {
            return Err(Error::incomplete_answers(missing));
        }
        let correct_count = (0..self.len())
            .filter_map(|i| selections.get(i))
            .filter(|chosen| chosen.correct)
            .count();
        Ok(ScoreResult {
            correct_count,
            total_count: self.len(),
        })
    }
}

/// An answer as it may appear mid-stream: either field may not have arrived yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

/// A question as it may appear mid-stream.
///
/// `answers` is `None` until the answers array has been seen at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialQuestion {
    #[serde(rename = "question", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<PartialAnswer>>,
}

impl PartialQuestion {
    /// Answers received so far, empty if the array has not arrived.
    pub fn answers(&self) -> &[PartialAnswer] {
        self.answers.as_deref().unwrap_or_default()
    }
}

/// A best-effort, possibly incomplete quiz document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialQuiz {
    #[serde(default)]
    pub questions: Vec<PartialQuestion>,
}

impl PartialQuiz {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl From<Quiz> for PartialQuiz {
    fn from(quiz: Quiz) -> Self {
        Self {
            questions: quiz
                .questions
                .into_iter()
                .map(|q| PartialQuestion {
                    text: Some(q.text),
                    answers: Some(
                        q.answers
                            .into_iter()
                            .map(|a| PartialAnswer {
                                text: Some(a.text),
                                correct: Some(a.correct),
                            })
                            .collect(),
                    ),
                })
                .collect(),
        }
    }
}

/// The consumer's chosen option per question index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSelection {
    chosen: BTreeMap<usize, AnswerOption>,
}

impl AnswerSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the choice for a question.
    pub fn select(&mut self, question_index: usize, option: AnswerOption) {
        self.chosen.insert(question_index, option);
    }

    pub fn get(&self, question_index: usize) -> Option<&AnswerOption> {
        self.chosen.get(&question_index)
    }

    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    pub fn clear(&mut self) {
        self.chosen.clear();
    }

    /// Indices in `0..question_count` with no selection, ascending.
    pub fn missing(&self, question_count: usize) -> Vec<usize> {
        (0..question_count)
            .filter(|i| !self.chosen.contains_key(i))
            .collect()
    }
}

/// Outcome of scoring a fully answered quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub correct_count: usize,
    pub total_count: usize,
}

impl ScoreResult {
    /// Every question answered correctly.
    pub fn is_perfect(&self) -> bool {
        self.total_count > 0 && self.correct_count == self.total_count
    }
}

impl fmt::Display for ScoreResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "You got {} out of {} correct!",
            self.correct_count, self.total_count
        )
    }
}
