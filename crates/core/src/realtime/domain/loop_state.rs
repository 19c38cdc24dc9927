use std::fmt;

/// What the active loop is doing between render ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivePhase {
    /// No detection request outstanding.
    Idle,
    /// One detection request in flight.
    Detecting,
}

/// Lifecycle of a realtime detection session.
///
/// `Idle -> Starting -> Active -> Stopping -> Idle`; a failed start goes
/// straight back to `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Starting,
    Active(ActivePhase),
    Stopping,
}

impl LoopState {
    pub fn is_active(&self) -> bool {
        matches!(self, LoopState::Active(_))
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => write!(f, "idle"),
            LoopState::Starting => write!(f, "starting"),
            LoopState::Active(ActivePhase::Idle) => write!(f, "active"),
            LoopState::Active(ActivePhase::Detecting) => write!(f, "detecting"),
            LoopState::Stopping => write!(f, "stopping"),
        }
    }
}
