// merge.rs: monotonic fold of validated snapshots into the held document.

use quizz_types::{PartialAnswer, PartialQuestion, PartialQuiz};

/// Merge `incoming` into `held` without regressing anything `held` already shows.
///
/// - Questions and answers are matched by index. Entries only `held` has are kept;
///   entries only `incoming` has are appended.
/// - A text field is replaced only by a value at least as long as the one held.
/// - A `correct` flag absent from `incoming` keeps its held value.
///
/// Returns `true` if `held` changed.
pub fn merge_snapshot(held: &mut PartialQuiz, incoming: PartialQuiz) -> bool {
    let mut changed = false;
    for (i, question) in incoming.questions.into_iter().enumerate() {
        match held.questions.get_mut(i) {
            Some(existing) => changed |= merge_question(existing, question),
            None => {
                held.questions.push(question);
                changed = true;
            }
        }
    }
    changed
}

fn merge_question(held: &mut PartialQuestion, incoming: PartialQuestion) -> bool {
    let mut changed = merge_text(&mut held.text, incoming.text);
    let Some(answers) = incoming.answers else {
        return changed;
    };
    match held.answers.as_mut() {
        None => {
            held.answers = Some(answers);
            changed = true;
        }
        Some(existing) => {
            for (i, answer) in answers.into_iter().enumerate() {
                match existing.get_mut(i) {
                    Some(slot) => changed |= merge_answer(slot, answer),
                    None => {
                        existing.push(answer);
                        changed = true;
                    }
                }
            }
        }
    }
    changed
}

fn merge_answer(held: &mut PartialAnswer, incoming: PartialAnswer) -> bool {
    let mut changed = merge_text(&mut held.text, incoming.text);
    if let Some(correct) = incoming.correct {
        changed |= held.correct != Some(correct);
        held.correct = Some(correct);
    }
    changed
}

fn merge_text(held: &mut Option<String>, incoming: Option<String>) -> bool {
    let Some(incoming) = incoming else {
        return false;
    };
    match held {
        Some(existing) if existing.len() > incoming.len() || *existing == incoming => false,
        _ => {
            *held = Some(incoming);
            true
        }
    }
}
