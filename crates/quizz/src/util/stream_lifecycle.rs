// stream_lifecycle.rs: event ordering checks for a generation stream.
//
// A capability that emits events out of order is logged, never rejected.

use quizz_types::StreamEventType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Pending,
    Open,
    InText,
    Finished,
}

/// Follows one generation stream and warns when its events are out of order.
///
/// A well-behaved capability emits `StreamStart`, then one text block
/// (`TextStart`, any number of `TextDelta`, `TextEnd`), then `Finish`.
#[derive(Debug, Default)]
pub struct StreamLifecycle {
    phase: Phase,
    deltas: usize,
}

impl StreamLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event_type: &StreamEventType) {
        use StreamEventType as E;

        if self.phase == Phase::Finished && !matches!(event_type, E::Unknown(_)) {
            tracing::warn!(event = ?event_type, "generation event after finish");
        }

        self.phase = match (event_type, self.phase) {
            (E::StreamStart, Phase::Pending) => Phase::Open,
            (E::StreamStart, phase) => {
                tracing::warn!("repeated stream start");
                phase
            }
            (E::TextStart, Phase::InText) => {
                tracing::warn!("text block opened twice");
                Phase::InText
            }
            (E::TextStart, phase) => {
                if phase == Phase::Pending {
                    tracing::warn!("text block opened before stream start");
                }
                Phase::InText
            }
            (E::TextDelta, phase) => {
                self.deltas += 1;
                if phase != Phase::InText {
                    tracing::warn!("text delta outside a text block");
                }
                phase
            }
            (E::TextEnd, Phase::InText) => Phase::Open,
            (E::TextEnd, phase) => {
                tracing::warn!("text block closed without being opened");
                phase
            }
            (E::Finish, phase) => {
                if phase == Phase::Pending {
                    tracing::warn!("finish before stream start");
                }
                Phase::Finished
            }
            (E::Error | E::Unknown(_), phase) => phase,
        };
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Number of text deltas seen so far.
    pub fn delta_count(&self) -> usize {
        self.deltas
    }
}
