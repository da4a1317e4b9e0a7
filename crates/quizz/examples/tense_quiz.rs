/// Interactive tense quiz in the terminal.
///
/// Streams a quiz for the given tense, printing each question as soon as the
/// partial document names it, then asks for an answer per question and
/// prints the score.
///
/// Run: cargo run --example tense_quiz -- past-simple 5
/// Requires: OPENAI_API_KEY in env. Set RUST_LOG=quizz=debug to watch snapshots.
use std::io::{BufRead, Write};
use std::sync::Arc;

use quizz::{GenerationRequest, IncrementalReconciler, Lifecycle, Settings, StreamingGenerator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizz=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let tense = args.next().unwrap_or_else(|| "present-simple".to_string());
    let count: i64 = args.next().map(|c| c.parse()).transpose()?.unwrap_or(3);
    let request = GenerationRequest::parse(&tense, count)?;

    let settings = Settings::from_env()?;
    let generator = StreamingGenerator::new(Arc::new(settings.capability()?));
    let mut reconciler = IncrementalReconciler::new(generator);

    println!("{}\n", request.instruction());
    reconciler.submit(request);

    // Print a question once its text stops growing, i.e. when a later one starts.
    let mut printed = 0;
    let lifecycle = loop {
        let lifecycle = reconciler.advance().await;
        let questions = &reconciler.current_document_state().document.questions;
        let settled = if lifecycle.is_terminal() {
            questions.len()
        } else {
            questions.len().saturating_sub(1)
        };
        for (i, q) in questions.iter().enumerate().take(settled).skip(printed) {
            println!("{}. {}", i + 1, q.text.as_deref().unwrap_or("..."));
        }
        printed = printed.max(settled);
        if lifecycle.is_terminal() {
            break lifecycle;
        }
    };

    if lifecycle == Lifecycle::Failed {
        if let Some(diagnostic) = &reconciler.current_document_state().diagnostic {
            eprintln!("\n{diagnostic}");
        }
        return Ok(());
    }

    let quiz = match &reconciler.current_document_state().quiz {
        Some(quiz) => quiz.clone(),
        None => return Ok(()),
    };

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    for (q, question) in quiz.questions.iter().enumerate() {
        println!("\n{}. {}", q + 1, question.text);
        for (a, answer) in question.answers.iter().enumerate() {
            println!("   {}) {}", a + 1, answer.text);
        }
        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next().transpose()? else {
                return Ok(());
            };
            let picked = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1));
            match picked.map(|a| reconciler.select_answer_at(q, a)) {
                Some(Ok(())) => break,
                Some(Err(e)) => println!("{}", e.message),
                None => println!("enter a number between 1 and {}", question.answers.len()),
            }
        }
    }

    let score = reconciler.verify()?;
    println!("\n{score}");
    Ok(())
}
