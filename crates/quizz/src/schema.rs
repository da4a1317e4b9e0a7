// schema.rs: the quiz document contract.
//
// Two tiers: a lenient per-field pass for mid-stream snapshots, and a strict
// whole-document pass for finalization.

use std::fmt;

use serde_json::{json, Map, Value};

use quizz_types::{
    AnswerOption, Error, PartialAnswer, PartialQuestion, PartialQuiz, Question, Quiz,
};

/// A snapshot field dropped by lenient validation because its value had the wrong type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// JSON path of the dropped field (e.g. `questions[1].answers[0].correct`).
    pub path: String,
    pub expected: &'static str,
    pub found: &'static str,
}

impl FieldIssue {
    /// The `MalformedSnapshotField` error describing this issue.
    pub fn to_error(&self) -> Error {
        Error::malformed_field(&self.path, self.expected, self.found)
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, found {}",
            self.path, self.expected, self.found
        )
    }
}

/// Output of lenient validation: every well-typed field, plus what was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialValidation {
    pub snapshot: PartialQuiz,
    pub issues: Vec<FieldIssue>,
}

/// Why a document is not a complete quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    MissingField(&'static str),
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    EmptyText,
    NoAnswers,
    NoQuestions,
    /// Rejected by the JSON Schema itself (e.g. an unexpected property).
    Schema(String),
}

/// One structural violation found by strict validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON path of the offending value; `$` is the document root.
    pub path: String,
    pub kind: ViolationKind,
}

impl Violation {
    fn new(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::MissingField(name) => {
                write!(f, "{}: missing field `{name}`", self.path)
            }
            ViolationKind::WrongType { expected, found } => {
                write!(f, "{}: expected {expected}, found {found}", self.path)
            }
            ViolationKind::EmptyText => write!(f, "{}: text is empty", self.path),
            ViolationKind::NoAnswers => write!(f, "{}: has no answers", self.path),
            ViolationKind::NoQuestions => write!(f, "{}: quiz has no questions", self.path),
            ViolationKind::Schema(detail) => write!(f, "{}: {detail}", self.path),
        }
    }
}

/// The quiz document shape: field names, types, cardinalities, nesting.
///
/// `describe()` doubles as the structured-output schema sent to the generator.
#[derive(Debug, Clone)]
pub struct QuizSchema {
    schema: Value,
}

impl Default for QuizSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSchema {
    pub fn new() -> Self {
        let answer = json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "The answer text"},
                "correct": {"type": "boolean", "description": "Whether the answer is correct"}
            },
            "required": ["text", "correct"],
            "additionalProperties": false
        });
        let question = json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "description": "The question text"},
                "answers": {"type": "array", "items": answer}
            },
            "required": ["question", "answers"],
            "additionalProperties": false
        });
        let schema = json!({
            "type": "object",
            "properties": {
                "questions": {"type": "array", "items": question}
            },
            "required": ["questions"],
            "additionalProperties": false
        });
        Self { schema }
    }

    /// The JSON Schema of a complete quiz.
    pub fn describe(&self) -> &Value {
        &self.schema
    }

    /// Keep every field whose type matches the contract; drop and report the rest.
    ///
    /// Never fails as a whole. A malformed question or answer entry is replaced
    /// by an empty placeholder so later entries keep their index.
    pub fn validate_partial(&self, value: &Value) -> PartialValidation {
        let mut issues = Vec::new();
        let mut snapshot = PartialQuiz::default();

        let Some(root) = value.as_object() else {
            issues.push(issue("$", "object", value));
            return PartialValidation { snapshot, issues };
        };

        match root.get("questions") {
            None => {}
            Some(Value::Array(items)) => {
                snapshot.questions = items
                    .iter()
                    .enumerate()
                    .map(|(qi, item)| lenient_question(qi, item, &mut issues))
                    .collect();
            }
            Some(other) => issues.push(issue("questions", "array", other)),
        }

        PartialValidation { snapshot, issues }
    }

    /// Check structural completeness: at least one question; every question has
    /// non-empty text and a non-empty answers array; every answer has string
    /// text and a boolean `correct`.
    ///
    /// Whether exactly one answer is correct is not checked here.
    pub fn validate_complete(&self, value: &Value) -> Result<Quiz, Vec<Violation>> {
        let mut violations = Vec::new();

        let Some(root) = value.as_object() else {
            return Err(vec![wrong_type("$", "object", value)]);
        };

        let questions = match root.get("questions") {
            None => {
                violations.push(Violation::new("$", ViolationKind::MissingField("questions")));
                Vec::new()
            }
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    violations.push(Violation::new("questions", ViolationKind::NoQuestions));
                }
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(qi, item)| strict_question(qi, item, &mut violations))
                    .collect()
            }
            Some(other) => {
                violations.push(wrong_type("questions", "array", other));
                Vec::new()
            }
        };

        if violations.is_empty() && !jsonschema::is_valid(&self.schema, value) {
            let detail = jsonschema::validate(&self.schema, value)
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown validation error".into());
            violations.push(Violation::new("$", ViolationKind::Schema(detail)));
        }

        if violations.is_empty() {
            Ok(Quiz { questions })
        } else {
            Err(violations)
        }
    }
}

fn lenient_question(qi: usize, item: &Value, issues: &mut Vec<FieldIssue>) -> PartialQuestion {
    let path = format!("questions[{qi}]");
    let Some(obj) = item.as_object() else {
        issues.push(issue(&path, "object", item));
        return PartialQuestion::default();
    };

    let text = lenient_string(obj, "question", &path, issues);
    let answers = match obj.get("answers") {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .enumerate()
                .map(|(ai, a)| lenient_answer(&format!("{path}.answers[{ai}]"), a, issues))
                .collect(),
        ),
        Some(other) => {
            issues.push(issue(&format!("{path}.answers"), "array", other));
            None
        }
    };

    PartialQuestion { text, answers }
}

fn lenient_answer(path: &str, item: &Value, issues: &mut Vec<FieldIssue>) -> PartialAnswer {
    let Some(obj) = item.as_object() else {
        issues.push(issue(path, "object", item));
        return PartialAnswer::default();
    };
    let text = lenient_string(obj, "text", path, issues);
    let correct = match obj.get("correct") {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            issues.push(issue(&format!("{path}.correct"), "boolean", other));
            None
        }
    };
    PartialAnswer { text, correct }
}

fn lenient_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    match obj.get(key) {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            issues.push(issue(&format!("{path}.{key}"), "string", other));
            None
        }
    }
}

fn strict_question(qi: usize, item: &Value, violations: &mut Vec<Violation>) -> Option<Question> {
    let path = format!("questions[{qi}]");
    let Some(obj) = item.as_object() else {
        violations.push(wrong_type(&path, "object", item));
        return None;
    };
    let before = violations.len();

    let text = match obj.get("question") {
        None => {
            violations.push(Violation::new(&path, ViolationKind::MissingField("question")));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            violations.push(Violation::new(format!("{path}.question"), ViolationKind::EmptyText));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(wrong_type(&format!("{path}.question"), "string", other));
            None
        }
    };

    let answers = match obj.get("answers") {
        None => {
            violations.push(Violation::new(&path, ViolationKind::MissingField("answers")));
            Vec::new()
        }
        Some(Value::Array(items)) if items.is_empty() => {
            violations.push(Violation::new(format!("{path}.answers"), ViolationKind::NoAnswers));
            Vec::new()
        }
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(ai, a)| strict_answer(&format!("{path}.answers[{ai}]"), a, violations))
            .collect(),
        Some(other) => {
            violations.push(wrong_type(&format!("{path}.answers"), "array", other));
            Vec::new()
        }
    };

    match text {
        Some(text) if violations.len() == before => Some(Question { text, answers }),
        _ => None,
    }
}

fn strict_answer(path: &str, item: &Value, violations: &mut Vec<Violation>) -> Option<AnswerOption> {
    let Some(obj) = item.as_object() else {
        violations.push(wrong_type(path, "object", item));
        return None;
    };

    let text = match obj.get("text") {
        None => {
            violations.push(Violation::new(path, ViolationKind::MissingField("text")));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(wrong_type(&format!("{path}.text"), "string", other));
            None
        }
    };
    let correct = match obj.get("correct") {
        None => {
            violations.push(Violation::new(path, ViolationKind::MissingField("correct")));
            None
        }
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            violations.push(wrong_type(&format!("{path}.correct"), "boolean", other));
            None
        }
    };

    Some(AnswerOption {
        text: text?,
        correct: correct?,
    })
}

fn issue(path: &str, expected: &'static str, found: &Value) -> FieldIssue {
    FieldIssue {
        path: path.to_string(),
        expected,
        found: type_name(found),
    }
}

fn wrong_type(path: &str, expected: &'static str, found: &Value) -> Violation {
    Violation::new(
        path,
        ViolationKind::WrongType {
            expected,
            found: type_name(found),
        },
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
