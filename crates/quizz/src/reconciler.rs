// reconciler.rs: folds snapshots into one quiz and drives scoring.
//
// The reconciler is the sole writer of the held document and the answer
// selections. Each `submit` starts a new cycle; the previous cycle's stream
// is dropped and can no longer reach the document.

use std::fmt;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use quizz_types::{
    AnswerOption, AnswerSelection, Error, ErrorKind, GenerationRequest, PartialQuiz, Quiz,
    QuizRules, ScoreResult,
};

use crate::generator::{Snapshot, SnapshotStream, StreamingGenerator};
use crate::merge::merge_snapshot;
use crate::schema::PartialValidation;

/// How far the current request has progressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Idle,
    Streaming,
    Ready,
    Failed,
}

impl Lifecycle {
    /// `Ready` and `Failed` end a cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// Why a cycle ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// `GenerationFailure` when the document was unusable, otherwise the kind
    /// of the capability error that ended the stream.
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl Diagnostic {
    fn from_error(error: &Error) -> Self {
        Self {
            kind: error.kind,
            message: error.message.clone(),
            retryable: error.retryable,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything a consumer needs to render the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizState {
    /// Incremented by every `submit`; `0` before the first.
    pub cycle: u64,
    pub lifecycle: Lifecycle,
    /// The merged document so far. Never loses content within a cycle.
    pub document: PartialQuiz,
    /// The validated quiz, set on `Ready`.
    pub quiz: Option<Quiz>,
    /// Set on `Failed`.
    pub diagnostic: Option<Diagnostic>,
}

/// Consumes snapshot streams and maintains the consumer-visible quiz state.
pub struct IncrementalReconciler {
    generator: StreamingGenerator,
    rules: QuizRules,
    state: QuizState,
    request: Option<GenerationRequest>,
    selections: AnswerSelection,
    active: Option<SnapshotStream>,
    publisher: watch::Sender<QuizState>,
}

impl fmt::Debug for IncrementalReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalReconciler")
            .field("generator", &self.generator)
            .field("rules", &self.rules)
            .field("state", &self.state)
            .field("selections", &self.selections)
            .field("active", &self.active.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

impl IncrementalReconciler {
    pub fn new(generator: StreamingGenerator) -> Self {
        let (publisher, _) = watch::channel(QuizState::default());
        Self {
            generator,
            rules: QuizRules::default(),
            state: QuizState::default(),
            request: None,
            selections: AnswerSelection::new(),
            active: None,
            publisher,
        }
    }

    /// Extra checks applied when a stream completes.
    pub fn with_rules(mut self, rules: QuizRules) -> Self {
        self.rules = rules;
        self
    }

    /// Start a new cycle for `request`.
    ///
    /// Drops any in-flight stream, clears the document and the answer
    /// selections, and publishes the empty `Streaming` state before any
    /// increment of the new stream is read.
    pub fn submit(&mut self, request: GenerationRequest) {
        if self.active.take().is_some() {
            tracing::info!(
                cycle = self.state.cycle,
                "abandoning in-flight generation"
            );
        }
        self.selections.clear();
        self.state = QuizState {
            cycle: self.state.cycle + 1,
            lifecycle: Lifecycle::Streaming,
            ..Default::default()
        };
        self.active = Some(self.generator.generate(&request));
        tracing::info!(
            cycle = self.state.cycle,
            tense = %request.tense(),
            question_count = request.question_count(),
            "submitted generation request"
        );
        self.request = Some(request);
        self.publish();
    }

    /// Process the next stream item and return the resulting lifecycle.
    ///
    /// Returns immediately outside `Streaming`. Cancel safe: if the returned
    /// future is dropped before completion no state has changed.
    pub async fn advance(&mut self) -> Lifecycle {
        let Some(stream) = self.active.as_mut() else {
            return self.state.lifecycle;
        };

        match stream.next().await {
            Some(Ok(snapshot)) => self.apply(snapshot),
            Some(Err(e)) => {
                self.active = None;
                tracing::warn!(cycle = self.state.cycle, error = %e, "generation stream failed");
                let failure = Error {
                    kind: e.kind,
                    retryable: e.retryable,
                    ..Error::generation_failure(e.message.clone())
                };
                self.fail(Diagnostic::from_error(&failure));
            }
            None => {
                self.active = None;
                self.finalize();
            }
        }
        self.state.lifecycle
    }

    /// Run the current cycle to completion.
    ///
    /// Returns immediately when no stream is active. A stream that never
    /// terminates keeps this pending.
    pub async fn drive(&mut self) -> Lifecycle {
        while self.active.is_some() {
            self.advance().await;
        }
        self.state.lifecycle
    }

    /// The latest published state.
    pub fn current_document_state(&self) -> &QuizState {
        &self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle
    }

    /// The request of the current cycle, if any.
    pub fn request(&self) -> Option<&GenerationRequest> {
        self.request.as_ref()
    }

    pub fn selections(&self) -> &AnswerSelection {
        &self.selections
    }

    /// Receive every published state. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<QuizState> {
        self.publisher.subscribe()
    }

    /// Record `option` as the answer to question `question_index`.
    ///
    /// `option` must be one of that question's answers. Selections can only be
    /// made while `Ready`; a later choice for the same question replaces the earlier.
    pub fn select_answer(&mut self, question_index: usize, option: AnswerOption) -> Result<(), Error> {
        let quiz = self.ready_quiz()?;
        let question = quiz.questions.get(question_index).ok_or_else(|| {
            Error::invalid_selection(format!(
                "question {question_index} does not exist (quiz has {} questions)",
                quiz.len()
            ))
        })?;
        if !question.answers.contains(&option) {
            return Err(Error::invalid_selection(format!(
                "\"{}\" is not an answer to question {question_index}",
                option.text
            )));
        }
        tracing::debug!(cycle = self.state.cycle, question_index, "answer selected");
        self.selections.select(question_index, option);
        Ok(())
    }

    /// Select the `answer_index`-th answer of question `question_index`.
    pub fn select_answer_at(&mut self, question_index: usize, answer_index: usize) -> Result<(), Error> {
        let quiz = self.ready_quiz()?;
        let option = quiz
            .questions
            .get(question_index)
            .and_then(|q| q.answers.get(answer_index))
            .cloned()
            .ok_or_else(|| {
                Error::invalid_selection(format!(
                    "no answer {answer_index} for question {question_index}"
                ))
            })?;
        self.select_answer(question_index, option)
    }

    /// Score the selections against the ready quiz.
    ///
    /// Fails with `IncompleteAnswers` naming every unanswered question; that
    /// failure leaves all state untouched.
    pub fn verify(&self) -> Result<ScoreResult, Error> {
        let score = self.ready_quiz()?.score(&self.selections)?;
        tracing::info!(
            cycle = self.state.cycle,
            correct = score.correct_count,
            total = score.total_count,
            "quiz verified"
        );
        Ok(score)
    }

    fn ready_quiz(&self) -> Result<&Quiz, Error> {
        match (&self.state.lifecycle, &self.state.quiz) {
            (Lifecycle::Ready, Some(quiz)) => Ok(quiz),
            (lifecycle, _) => Err(Error::not_ready(format!(
                "quiz is not ready (lifecycle: {lifecycle:?})"
            ))),
        }
    }

    fn apply(&mut self, snapshot: Snapshot) {
        let received = snapshot.raw_text.len();
        let PartialValidation { snapshot, issues } =
            self.generator.schema().validate_partial(&snapshot.value);
        for issue in &issues {
            tracing::warn!(
                cycle = self.state.cycle,
                path = %issue.path,
                expected = issue.expected,
                found = issue.found,
                "dropping malformed snapshot field"
            );
        }
        let changed = merge_snapshot(&mut self.state.document, snapshot);
        tracing::debug!(
            cycle = self.state.cycle,
            questions = self.state.document.len(),
            received,
            changed,
            "merged snapshot"
        );
        self.publish();
    }

    fn finalize(&mut self) {
        let value = match serde_json::to_value(&self.state.document) {
            Ok(v) => v,
            Err(e) => {
                self.fail(Diagnostic::from_error(&Error::generation_failure(format!(
                    "document could not be serialized: {e}"
                ))));
                return;
            }
        };

        let quiz = match self.generator.schema().validate_complete(&value) {
            Ok(quiz) => quiz,
            Err(violations) => {
                let reasons: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                self.fail(Diagnostic::from_error(&Error::generation_failure(
                    reasons.join("; "),
                )));
                return;
            }
        };

        if let Err(e) = self.check_rules(&quiz) {
            self.fail(Diagnostic::from_error(&e));
            return;
        }

        tracing::info!(
            cycle = self.state.cycle,
            questions = quiz.len(),
            "quiz ready"
        );
        self.state.lifecycle = Lifecycle::Ready;
        self.state.quiz = Some(quiz);
        self.publish();
    }

    fn check_rules(&self, quiz: &Quiz) -> Result<(), Error> {
        let off = quiz.questions_without_single_correct();
        if !off.is_empty() {
            if self.rules.require_single_correct {
                return Err(Error::generation_failure(format!(
                    "questions without exactly one correct answer: {off:?}"
                )));
            }
            tracing::warn!(
                cycle = self.state.cycle,
                questions = ?off,
                "questions without exactly one correct answer"
            );
        }

        if let Some(request) = &self.request {
            let requested = usize::from(request.question_count());
            if quiz.len() != requested {
                if self.rules.enforce_question_count {
                    return Err(Error::generation_failure(format!(
                        "requested {requested} questions, got {}",
                        quiz.len()
                    )));
                }
                tracing::warn!(
                    cycle = self.state.cycle,
                    requested,
                    received = quiz.len(),
                    "question count differs from request"
                );
            }
        }
        Ok(())
    }

    fn fail(&mut self, diagnostic: Diagnostic) {
        tracing::info!(
            cycle = self.state.cycle,
            kind = ?diagnostic.kind,
            diagnostic = %diagnostic,
            "generation failed"
        );
        self.state.lifecycle = Lifecycle::Failed;
        self.state.quiz = None;
        self.state.diagnostic = Some(diagnostic);
        self.publish();
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{chunk_text, sample_quiz_text, text_events, MockCapability};
    use quizz_types::Tense;

    fn reconciler_with(mock: MockCapability) -> (IncrementalReconciler, Arc<MockCapability>) {
        let mock = Arc::new(mock);
        let generator = StreamingGenerator::new(mock.clone());
        (IncrementalReconciler::new(generator), mock)
    }

    fn streamed(text: &str, size: usize) -> Vec<quizz_types::StreamEvent> {
        let chunks = chunk_text(text, size);
        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        text_events(&refs)
    }

    fn request(count: u8) -> GenerationRequest {
        GenerationRequest::new(Tense::PastSimple, count).unwrap()
    }

    #[tokio::test]
    async fn test_idle_before_submit() {
        let (mut reconciler, mock) = reconciler_with(MockCapability::new("mock"));
        assert_eq!(reconciler.lifecycle(), Lifecycle::Idle);
        assert!(!reconciler.lifecycle().is_terminal());
        assert_eq!(reconciler.drive().await, Lifecycle::Idle);
        assert_eq!(reconciler.advance().await, Lifecycle::Idle);
        assert_eq!(reconciler.current_document_state().cycle, 0);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_publishes_empty_streaming_state() {
        let (mut reconciler, mock) = reconciler_with(
            MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(2), 16)),
        );
        let rx = reconciler.subscribe();
        reconciler.submit(request(2));

        let state = rx.borrow().clone();
        assert_eq!(state.cycle, 1);
        assert_eq!(state.lifecycle, Lifecycle::Streaming);
        assert!(state.document.is_empty());
        // The generation starts on the first advance.
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_drive_reaches_ready() {
        let (mut reconciler, _) = reconciler_with(
            MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(3), 10)),
        );
        reconciler.submit(request(3));
        assert!(!reconciler.lifecycle().is_terminal());
        assert_eq!(reconciler.drive().await, Lifecycle::Ready);
        assert!(reconciler.lifecycle().is_terminal());

        let state = reconciler.current_document_state();
        assert_eq!(state.document.len(), 3);
        assert_eq!(state.quiz.as_ref().map(Quiz::len), Some(3));
        assert!(state.diagnostic.is_none());
    }

    #[tokio::test]
    async fn test_malformed_field_dropped_without_failing() {
        let text = r#"{"questions": [{"question": 7, "answers": [{"text": "went", "correct": true}]}]}"#;
        let (mut reconciler, _) = reconciler_with(
            MockCapability::new("mock").with_stream_events(text_events(&[text])),
        );
        reconciler.submit(request(1));
        assert_eq!(reconciler.advance().await, Lifecycle::Streaming);
        let doc = &reconciler.current_document_state().document;
        assert_eq!(doc.questions[0].text, None);
        assert_eq!(doc.questions[0].answers()[0].correct, Some(true));

        // The question text never arrived, so the document cannot complete.
        assert_eq!(reconciler.drive().await, Lifecycle::Failed);
        let diagnostic = reconciler.current_document_state().diagnostic.clone().unwrap();
        assert_eq!(diagnostic.kind, ErrorKind::GenerationFailure);
        assert!(diagnostic.message.contains("questions[0]: missing field `question`"));
    }

    #[tokio::test]
    async fn test_empty_stream_fails() {
        let (mut reconciler, _) =
            reconciler_with(MockCapability::new("mock").with_stream_events(text_events(&[])));
        reconciler.submit(request(1));
        assert_eq!(reconciler.drive().await, Lifecycle::Failed);
        let diagnostic = reconciler.current_document_state().diagnostic.clone().unwrap();
        assert!(diagnostic.message.contains("quiz has no questions"));
    }

    #[tokio::test]
    async fn test_capability_error_keeps_its_kind() {
        let (mut reconciler, _) = reconciler_with(
            MockCapability::new("mock")
                .with_stream_error(Error::from_http_status(401, "bad key".into(), "mock", None, None)),
        );
        reconciler.submit(request(1));
        assert_eq!(reconciler.drive().await, Lifecycle::Failed);
        let diagnostic = reconciler.current_document_state().diagnostic.clone().unwrap();
        assert_eq!(diagnostic.kind, ErrorKind::Authentication);
        assert!(!diagnostic.retryable);
        assert!(diagnostic.message.contains("bad key"));
    }

    #[tokio::test]
    async fn test_error_after_complete_document_still_fails() {
        let text = sample_quiz_text(1);
        let mut items: Vec<Result<quizz_types::StreamEvent, Error>> = text_events(&[text.as_str()])
            .into_iter()
            .take(3)
            .map(Ok)
            .collect();
        items.push(Err(Error::stream_interrupted("connection reset")));
        let (mut reconciler, _) =
            reconciler_with(MockCapability::new("mock").with_stream_items(items));
        reconciler.submit(request(1));

        assert_eq!(reconciler.drive().await, Lifecycle::Failed);
        let state = reconciler.current_document_state();
        assert!(state.quiz.is_none());
        assert_eq!(state.document.len(), 1);
        assert!(reconciler
            .generator
            .schema()
            .validate_complete(&serde_json::to_value(&state.document).unwrap())
            .is_ok());
        let diagnostic = state.diagnostic.as_ref().unwrap();
        assert_eq!(diagnostic.kind, ErrorKind::Stream);
        assert!(diagnostic.message.starts_with("No usable quiz was generated:"));
    }

    #[tokio::test]
    async fn test_single_correct_rule() {
        let text = r#"{"questions": [{"question": "Q", "answers": [{"text": "a", "correct": true}, {"text": "b", "correct": true}]}]}"#;

        let (mut lenient, _) = reconciler_with(
            MockCapability::new("mock").with_stream_events(text_events(&[text])),
        );
        lenient.submit(request(1));
        assert_eq!(lenient.drive().await, Lifecycle::Ready);

        let (strict, _) = reconciler_with(
            MockCapability::new("mock").with_stream_events(text_events(&[text])),
        );
        let mut strict = strict.with_rules(QuizRules::strict());
        strict.submit(request(1));
        assert_eq!(strict.drive().await, Lifecycle::Failed);
    }

    #[tokio::test]
    async fn test_question_count_rule() {
        let text = sample_quiz_text(2);
        let (reconciler, _) = reconciler_with(
            MockCapability::new("mock").with_stream_events(text_events(&[text.as_str()])),
        );
        let mut reconciler = reconciler.with_rules(QuizRules {
            enforce_question_count: true,
            ..Default::default()
        });
        reconciler.submit(request(3));
        assert_eq!(reconciler.drive().await, Lifecycle::Failed);
        let diagnostic = reconciler.current_document_state().diagnostic.clone().unwrap();
        assert_eq!(diagnostic.message, "No usable quiz was generated: requested 3 questions, got 2");
    }

    #[tokio::test]
    async fn test_selection_requires_ready_and_valid_option() {
        let (mut reconciler, _) = reconciler_with(
            MockCapability::new("mock").with_stream_events(text_events(&[sample_quiz_text(2).as_str()])),
        );
        let err = reconciler.select_answer_at(0, 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotReady);

        reconciler.submit(request(2));
        reconciler.drive().await;

        assert_eq!(
            reconciler.select_answer_at(5, 0).unwrap_err().kind,
            ErrorKind::InvalidSelection
        );
        assert_eq!(
            reconciler
                .select_answer(0, AnswerOption::new("not offered", true))
                .unwrap_err()
                .kind,
            ErrorKind::InvalidSelection
        );
        reconciler.select_answer_at(0, 1).unwrap();
        reconciler.select_answer_at(0, 0).unwrap();
        assert_eq!(reconciler.selections().len(), 1);
        assert!(reconciler.selections().get(0).unwrap().correct);
    }

    #[tokio::test]
    async fn test_verify_before_ready_is_not_ready() {
        let (reconciler, _) = reconciler_with(MockCapability::new("mock"));
        assert_eq!(reconciler.verify().unwrap_err().kind, ErrorKind::NotReady);
    }
}
