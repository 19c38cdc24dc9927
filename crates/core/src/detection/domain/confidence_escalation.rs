use crate::shared::constants::{DEFAULT_CONFIDENCE, ESCALATION_LADDER, MAX_ESCALATION_ATTEMPTS};

/// Where a detect cycle is on the escalation ladder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceState {
    pub current: f64,
    pub attempt: u32,
}

impl Default for ConfidenceState {
    fn default() -> Self {
        Self {
            current: DEFAULT_CONFIDENCE,
            attempt: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Escalation {
    pub state: ConfidenceState,
    /// Accept the latest result; no further attempts.
    pub done: bool,
}

/// Decides the next confidence to retry with after a detection attempt.
///
/// The ladder tries lower thresholds first (0.3, 0.2, 0.1) to recover faces an
/// over-strict threshold missed, then tries one high value (0.7). After the
/// fifth attempt the last result is accepted even if it is empty.
pub fn next(state: ConfidenceState, face_count_found: usize) -> Escalation {
    if face_count_found > 0 || state.attempt >= MAX_ESCALATION_ATTEMPTS {
        return Escalation { state, done: true };
    }

    let attempt = state.attempt + 1;
    if attempt >= MAX_ESCALATION_ATTEMPTS {
        return Escalation {
            state: ConfidenceState {
                current: state.current,
                attempt,
            },
            done: true,
        };
    }

    Escalation {
        state: ConfidenceState {
            current: ESCALATION_LADDER[attempt as usize],
            attempt,
        },
        done: false,
    }
}
