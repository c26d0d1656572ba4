use serde_repr::{Deserialize_repr, Serialize_repr};

/// Lifecycle of a single conversion request. Forward only; `Failed` is
/// reachable from every non-terminal state and nothing leaves a terminal one.
#[derive(Debug, Serialize_repr, Deserialize_repr, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConversionState {
    Received = 0,
    Validated = 1,
    Converted = 2,
    Available = 3,
    Failed = 4,
}

impl ConversionState {
    pub fn next(&self) -> Option<ConversionState> {
        match self {
            ConversionState::Received => Some(ConversionState::Validated),
            ConversionState::Validated => Some(ConversionState::Converted),
            ConversionState::Converted => Some(ConversionState::Available),
            ConversionState::Available | ConversionState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }

    pub fn can_transition_to(&self, next: ConversionState) -> bool {
        match next {
            ConversionState::Failed => !self.is_terminal(),
            next => self.next() == Some(next),
        }
    }
}
