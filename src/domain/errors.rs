// Domain-level errors raised by session collaborators.

use std::fmt;

/// Capture device or keypoint provider could not be made ready at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    Capture(String),
    Provider(String),
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::Capture(reason) => write!(f, "capture unavailable: {reason}"),
            AcquisitionError::Provider(reason) => {
                write!(f, "keypoint provider unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for AcquisitionError {}

/// A single inference call failed; the frame is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError(pub String);

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inference failed: {}", self.0)
    }
}

impl std::error::Error for ProviderError {}
