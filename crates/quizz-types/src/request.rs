// Generation request contract: validated at the boundary before any generation call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Smallest number of questions a request may ask for.
pub const MIN_QUESTION_COUNT: u8 = 1;
/// Largest number of questions a request may ask for.
pub const MAX_QUESTION_COUNT: u8 = 10;

/// System prompt sent alongside every instruction.
pub const SYSTEM_PROMPT: &str = "You generate quiz questions to practice english tenses";

/// The 16 English tenses a quiz can practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tense {
    PresentSimple,
    PresentContinuous,
    PresentPerfect,
    PresentPerfectContinuous,
    PastSimple,
    PastContinuous,
    PastPerfect,
    PastPerfectContinuous,
    FutureSimple,
    FutureContinuous,
    FuturePerfect,
    FuturePerfectContinuous,
    ConditionalSimple,
    ConditionalContinuous,
    ConditionalPerfect,
    ConditionalPerfectContinuous,
}

impl Tense {
    /// Every tense, in the order a picker should list them.
    pub const ALL: [Tense; 16] = [
        Tense::PresentSimple,
        Tense::PresentContinuous,
        Tense::PresentPerfect,
        Tense::PresentPerfectContinuous,
        Tense::PastSimple,
        Tense::PastContinuous,
        Tense::PastPerfect,
        Tense::PastPerfectContinuous,
        Tense::FutureSimple,
        Tense::FutureContinuous,
        Tense::FuturePerfect,
        Tense::FuturePerfectContinuous,
        Tense::ConditionalSimple,
        Tense::ConditionalContinuous,
        Tense::ConditionalPerfect,
        Tense::ConditionalPerfectContinuous,
    ];

    /// The kebab-case identifier (e.g. `"past-simple"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PresentSimple => "present-simple",
            Self::PresentContinuous => "present-continuous",
            Self::PresentPerfect => "present-perfect",
            Self::PresentPerfectContinuous => "present-perfect-continuous",
            Self::PastSimple => "past-simple",
            Self::PastContinuous => "past-continuous",
            Self::PastPerfect => "past-perfect",
            Self::PastPerfectContinuous => "past-perfect-continuous",
            Self::FutureSimple => "future-simple",
            Self::FutureContinuous => "future-continuous",
            Self::FuturePerfect => "future-perfect",
            Self::FuturePerfectContinuous => "future-perfect-continuous",
            Self::ConditionalSimple => "conditional-simple",
            Self::ConditionalContinuous => "conditional-continuous",
            Self::ConditionalPerfect => "conditional-perfect",
            Self::ConditionalPerfectContinuous => "conditional-perfect-continuous",
        }
    }

    /// Human-readable label (e.g. `"Past Simple"`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::PresentSimple => "Present Simple",
            Self::PresentContinuous => "Present Continuous",
            Self::PresentPerfect => "Present Perfect",
            Self::PresentPerfectContinuous => "Present Perfect Continuous",
            Self::PastSimple => "Past Simple",
            Self::PastContinuous => "Past Continuous",
            Self::PastPerfect => "Past Perfect",
            Self::PastPerfectContinuous => "Past Perfect Continuous",
            Self::FutureSimple => "Future Simple",
            Self::FutureContinuous => "Future Continuous",
            Self::FuturePerfect => "Future Perfect",
            Self::FuturePerfectContinuous => "Future Perfect Continuous",
            Self::ConditionalSimple => "Conditional Simple",
            Self::ConditionalContinuous => "Conditional Continuous",
            Self::ConditionalPerfect => "Conditional Perfect",
            Self::ConditionalPerfectContinuous => "Conditional Perfect Continuous",
        }
    }
}

impl fmt::Display for Tense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tense {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tense::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_request("tense", format!("unrecognized tense '{s}'")))
    }
}

/// A validated request for a quiz. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGenerationRequest", rename_all = "camelCase")]
pub struct GenerationRequest {
    tense: Tense,
    question_count: u8,
}

/// Unvalidated wire form, as submitted by a consumer.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGenerationRequest {
    tense: String,
    question_count: i64,
}

impl TryFrom<RawGenerationRequest> for GenerationRequest {
    type Error = Error;

    fn try_from(raw: RawGenerationRequest) -> Result<Self, Self::Error> {
        GenerationRequest::parse(&raw.tense, raw.question_count)
    }
}

impl GenerationRequest {
    /// Build a request, rejecting a count outside
    /// [`MIN_QUESTION_COUNT`]..=[`MAX_QUESTION_COUNT`].
    pub fn new(tense: Tense, question_count: u8) -> Result<Self, Error> {
        Self::parse(tense.as_str(), i64::from(question_count))
    }

    /// Build a request from untyped consumer input.
    pub fn parse(tense: &str, question_count: i64) -> Result<Self, Error> {
        let tense = tense.parse::<Tense>()?;
        let min = i64::from(MIN_QUESTION_COUNT);
        let max = i64::from(MAX_QUESTION_COUNT);
        if !(min..=max).contains(&question_count) {
            return Err(Error::invalid_request(
                "questionCount",
                format!("must be between {min} and {max}, got {question_count}"),
            ));
        }
        Ok(Self {
            tense,
            question_count: question_count as u8,
        })
    }

    pub fn tense(&self) -> Tense {
        self.tense
    }

    pub fn question_count(&self) -> u8 {
        self.question_count
    }

    /// The instruction text handed to the generator.
    pub fn instruction(&self) -> String {
        format!(
            "Generate {} questions about {} tense",
            self.question_count, self.tense
        )
    }
}

/// What a generation capability receives: prompts plus the target shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPrompt {
    pub system: String,
    pub instruction: String,
    /// JSON Schema of the document to produce.
    pub schema: serde_json::Value,
    /// Model override; `None` uses the capability's configured default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerationPrompt {
    pub fn new(instruction: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            instruction: instruction.into(),
            schema,
            model: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
