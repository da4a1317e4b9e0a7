// End-to-end request cycles through StreamingGenerator and IncrementalReconciler,
// driven by a scripted capability.

use std::sync::Arc;
use std::time::Duration;

use quizz::testing::{chunk_text, sample_quiz_text, text_events, MockCapability};
use quizz::{
    ErrorKind, GenerationRequest, IncrementalReconciler, Lifecycle, PartialQuiz, QuizRules,
    ScoreResult, StreamEvent, StreamingGenerator, Tense,
};

fn streamed(text: &str, size: usize) -> Vec<StreamEvent> {
    let chunks = chunk_text(text, size);
    let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
    text_events(&refs)
}

fn reconciler(mock: MockCapability) -> (IncrementalReconciler, Arc<MockCapability>) {
    let mock = Arc::new(mock);
    let reconciler = IncrementalReconciler::new(StreamingGenerator::new(mock.clone()));
    (reconciler, mock)
}

/// Every field visible in `earlier` is still visible, with the same or a longer value, in `later`.
fn assert_no_regression(earlier: &PartialQuiz, later: &PartialQuiz) {
    assert!(later.len() >= earlier.len(), "question count shrank");
    for (qi, (before, after)) in earlier.questions.iter().zip(&later.questions).enumerate() {
        if let Some(text) = &before.text {
            let now = after.text.as_deref().unwrap_or_default();
            assert!(now.starts_with(text.as_str()), "question {qi} text regressed");
        }
        if before.answers.is_some() {
            assert!(after.answers.is_some(), "question {qi} lost its answers");
        }
        assert!(after.answers().len() >= before.answers().len());
        for (ai, (a, b)) in before.answers().iter().zip(after.answers()).enumerate() {
            if let Some(text) = &a.text {
                let now = b.text.as_deref().unwrap_or_default();
                assert!(now.starts_with(text.as_str()), "answer {qi}.{ai} text regressed");
            }
            if a.correct.is_some() {
                assert_eq!(a.correct, b.correct, "answer {qi}.{ai} correctness changed");
            }
        }
    }
}

#[tokio::test]
async fn test_scenario_a_three_questions_reach_ready() {
    let text = sample_quiz_text(3);
    let (mut reconciler, mock) =
        reconciler(MockCapability::new("mock").with_stream_events(streamed(&text, 12)));

    let request = GenerationRequest::parse("past-simple", 3).unwrap();
    reconciler.submit(request);

    let mut published = Vec::new();
    while reconciler.advance().await == Lifecycle::Streaming {
        published.push(reconciler.current_document_state().document.clone());
    }

    assert_eq!(reconciler.lifecycle(), Lifecycle::Ready);
    assert!(published.len() >= 3, "expected several growing snapshots");
    assert_eq!(mock.call_count(), 1);

    let quiz = reconciler.current_document_state().quiz.clone().unwrap();
    assert_eq!(quiz.len(), 3);
    for question in &quiz.questions {
        assert!(question.answers.len() >= 2);
        assert_eq!(question.answers.iter().filter(|a| a.correct).count(), 1);
    }
    assert!(quiz.questions_without_single_correct().is_empty());
}

#[tokio::test]
async fn test_scenario_b_out_of_range_count_never_reaches_capability() {
    let (reconciler, mock) =
        reconciler(MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(1), 8)));

    let err = GenerationRequest::parse("past-simple", 15).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.field, Some("questionCount"));

    let err = GenerationRequest::parse("pluperfect", 3).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.field, Some("tense"));

    assert_eq!(reconciler.lifecycle(), Lifecycle::Idle);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_scenario_c_missing_answers_fails() {
    // One snapshot, then the stream completes; question 2 never got answers.
    let text = r#"{"questions": [{"question": "She ___ home.", "answers": [{"text": "went", "correct": true}, {"text": "go", "correct": false}]}, {"question": "They ___ late."}]}"#;
    let (mut reconciler, _) =
        reconciler(MockCapability::new("mock").with_stream_events(text_events(&[text])));

    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 2).unwrap());
    assert_eq!(reconciler.drive().await, Lifecycle::Failed);

    let state = reconciler.current_document_state();
    assert!(state.quiz.is_none());
    let diagnostic = state.diagnostic.clone().unwrap();
    assert_eq!(diagnostic.kind, ErrorKind::GenerationFailure);
    assert!(
        diagnostic.message.contains("questions[1]: missing field `answers`"),
        "got: {diagnostic}"
    );
    // The partial document stays visible for display.
    assert_eq!(state.document.len(), 2);
    assert_eq!(reconciler.verify().unwrap_err().kind, ErrorKind::NotReady);
}

#[tokio::test]
async fn test_scenario_d_verify_names_unanswered_question() {
    let (mut reconciler, _) = reconciler(
        MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(3), 40)),
    );
    reconciler.submit(GenerationRequest::new(Tense::PresentPerfect, 3).unwrap());
    assert_eq!(reconciler.drive().await, Lifecycle::Ready);

    reconciler.select_answer_at(0, 0).unwrap();
    reconciler.select_answer_at(1, 2).unwrap();

    let err = reconciler.verify().unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompleteAnswers);
    assert_eq!(err.missing, vec![2]);
    assert!(err.message.contains('2'));
    // Incomplete answers do not change the lifecycle.
    assert_eq!(reconciler.lifecycle(), Lifecycle::Ready);
}

#[tokio::test]
async fn test_scenario_e_all_correct() {
    let (mut reconciler, _) = reconciler(
        MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(2), 25)),
    );
    reconciler.submit(GenerationRequest::new(Tense::FutureSimple, 2).unwrap());
    reconciler.drive().await;

    // sample_quiz_text puts the correct answer for question i at i % 3.
    reconciler.select_answer_at(0, 0).unwrap();
    reconciler.select_answer_at(1, 1).unwrap();

    let score = reconciler.verify().unwrap();
    assert_eq!(
        score,
        ScoreResult {
            correct_count: 2,
            total_count: 2
        }
    );
    assert!(score.is_perfect());
    assert_eq!(score.to_string(), "You got 2 out of 2 correct!");
}

#[tokio::test]
async fn test_verify_is_idempotent() {
    let (mut reconciler, _) = reconciler(
        MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(3), 30)),
    );
    reconciler.submit(GenerationRequest::new(Tense::PastPerfect, 3).unwrap());
    reconciler.drive().await;
    reconciler.select_answer_at(0, 1).unwrap();
    reconciler.select_answer_at(1, 1).unwrap();
    reconciler.select_answer_at(2, 2).unwrap();

    let first = reconciler.verify().unwrap();
    let second = reconciler.verify().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.correct_count, 2);
    assert_eq!(first.total_count, 3);
}

#[tokio::test]
async fn test_completeness_gate_for_every_subset() {
    let (mut reconciler, _) = reconciler(
        MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(3), 50)),
    );
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 3).unwrap());
    reconciler.drive().await;

    assert_eq!(reconciler.verify().unwrap_err().missing, vec![0, 1, 2]);
    for q in 0..3 {
        let err = reconciler.verify().unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteAnswers);
        assert_eq!(err.missing, (q..3).collect::<Vec<_>>());
        reconciler.select_answer_at(q, 0).unwrap();
    }
    assert!(reconciler.verify().is_ok());
}

#[tokio::test]
async fn test_published_documents_are_monotonic_and_order_stable() {
    let text = sample_quiz_text(4);
    for size in [1, 3, 7, 19] {
        let (mut reconciler, _) =
            reconciler(MockCapability::new("mock").with_stream_events(streamed(&text, size)));
        reconciler.submit(GenerationRequest::new(Tense::PastSimple, 4).unwrap());

        let mut history: Vec<PartialQuiz> = Vec::new();
        loop {
            let lifecycle = reconciler.advance().await;
            history.push(reconciler.current_document_state().document.clone());
            if lifecycle != Lifecycle::Streaming {
                break;
            }
        }
        assert_eq!(reconciler.lifecycle(), Lifecycle::Ready, "chunk size {size}");

        for pair in history.windows(2) {
            assert_no_regression(&pair[0], &pair[1]);
        }

        // A question's text, once it appears at index i, is a prefix of the final text at i.
        let final_doc = history.last().unwrap();
        for doc in &history {
            for (i, q) in doc.questions.iter().enumerate() {
                if let Some(text) = &q.text {
                    let final_text = final_doc.questions[i].text.as_deref().unwrap();
                    assert!(final_text.starts_with(text.as_str()));
                }
            }
        }
    }
}

#[tokio::test]
async fn test_subscriber_sees_every_cycle_state() {
    let (mut reconciler, _) = reconciler(
        MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(1), 20)),
    );
    let mut rx = reconciler.subscribe();
    assert_eq!(rx.borrow_and_update().lifecycle, Lifecycle::Idle);

    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 1).unwrap());
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().lifecycle, Lifecycle::Streaming);

    reconciler.drive().await;
    let state = rx.borrow_and_update().clone();
    assert_eq!(state.lifecycle, Lifecycle::Ready);
    assert_eq!(state.cycle, 1);
    assert_eq!(state, *reconciler.current_document_state());
}

#[tokio::test]
async fn test_resubmission_resets_document_and_selections() {
    let (mut reconciler, _) = reconciler(
        MockCapability::new("mock")
            .with_stream_events(streamed(&sample_quiz_text(2), 10))
            .with_stream_events(streamed(&sample_quiz_text(3), 60))
            .with_stream_error(quizz::Error::timeout("slow upstream"))
            .with_stream_events(streamed(&sample_quiz_text(1), 10)),
    );

    // From Ready
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 2).unwrap());
    reconciler.drive().await;
    reconciler.select_answer_at(0, 0).unwrap();
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 3).unwrap());
    let state = reconciler.current_document_state();
    assert_eq!(state.lifecycle, Lifecycle::Streaming);
    assert!(state.document.is_empty());
    assert!(state.quiz.is_none());
    assert!(reconciler.selections().is_empty());

    // From Streaming
    reconciler.advance().await;
    assert!(!reconciler.current_document_state().document.is_empty());
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 3).unwrap());
    assert!(reconciler.current_document_state().document.is_empty());

    // From Failed
    assert_eq!(reconciler.drive().await, Lifecycle::Failed);
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 1).unwrap());
    let state = reconciler.current_document_state();
    assert!(state.document.is_empty());
    assert!(state.diagnostic.is_none());
    assert_eq!(state.cycle, 4);
    assert_eq!(reconciler.drive().await, Lifecycle::Ready);
}

#[tokio::test]
async fn test_abandoned_stream_never_reaches_new_document() {
    let first = r#"{"questions": [{"question": "OLD question", "answers": [{"text": "old", "correct": true}]}]}"#;
    let second = r#"{"questions": [{"question": "New", "answers": [{"text": "new", "correct": true}]}]}"#;
    let (mut reconciler, mock) = reconciler(
        MockCapability::new("mock")
            .with_stream_events(streamed(first, 5))
            .with_stream_events(streamed(second, 5)),
    );

    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 1).unwrap());
    reconciler.advance().await;
    reconciler.advance().await;
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 1).unwrap());
    assert_eq!(reconciler.drive().await, Lifecycle::Ready);

    let quiz = reconciler.current_document_state().quiz.clone().unwrap();
    assert_eq!(quiz.questions[0].text, "New");
    assert_eq!(quiz.questions[0].answers[0].text, "new");
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_advance_is_cancel_safe() {
    let (mut reconciler, _) = reconciler(
        MockCapability::new("mock")
            .with_stream_events(streamed(&sample_quiz_text(1), 30))
            .with_stream_delay(Duration::from_secs(10)),
    );
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 1).unwrap());

    let timed_out = tokio::time::timeout(Duration::from_secs(1), reconciler.advance()).await;
    assert!(timed_out.is_err());
    let state = reconciler.current_document_state();
    assert_eq!(state.lifecycle, Lifecycle::Streaming);
    assert!(state.document.is_empty());

    assert_eq!(reconciler.drive().await, Lifecycle::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_silent_stream_stays_streaming() {
    let (mut reconciler, _) = reconciler(
        MockCapability::new("mock")
            .with_stream_events(streamed(&sample_quiz_text(1), 30))
            .with_stream_delay(Duration::from_secs(3600)),
    );
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 1).unwrap());
    let result = tokio::time::timeout(Duration::from_secs(60), reconciler.drive()).await;
    assert!(result.is_err());
    assert_eq!(reconciler.lifecycle(), Lifecycle::Streaming);
}

#[tokio::test]
async fn test_network_failure_mid_stream_fails_cycle() {
    let mut items: Vec<Result<StreamEvent, quizz::Error>> = text_events(&[
        r#"{"questions": [{"question": "Q1", "answers": [{"text": "a", "#,
    ])
    .into_iter()
    .take(3)
    .map(Ok)
    .collect();
    items.push(Err(quizz::Error::stream_interrupted("connection reset")));

    let (mut reconciler, _) =
        reconciler(MockCapability::new("mock").with_stream_items(items));
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 1).unwrap());
    assert_eq!(reconciler.drive().await, Lifecycle::Failed);

    let state = reconciler.current_document_state();
    let diagnostic = state.diagnostic.clone().unwrap();
    assert_eq!(diagnostic.kind, ErrorKind::Stream);
    assert!(diagnostic.retryable);
    assert!(diagnostic.message.contains("connection reset"));
    assert_eq!(state.document.questions[0].text.as_deref(), Some("Q1"));
}

#[tokio::test]
async fn test_strict_rules_reject_wrong_question_count() {
    let (reconciler, _) = reconciler(
        MockCapability::new("mock").with_stream_events(streamed(&sample_quiz_text(2), 30)),
    );
    let mut reconciler = reconciler.with_rules(QuizRules::strict());
    reconciler.submit(GenerationRequest::new(Tense::PastSimple, 5).unwrap());
    assert_eq!(reconciler.drive().await, Lifecycle::Failed);
}
