use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::{AcquisitionError, ProviderError};
use crate::domain::skeleton::Keypoint;

/// One captured video frame. Only the dimensions matter to the counting pipeline.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Keypoints for one detected person.
pub type Detection = Vec<Keypoint>;

// Port for the camera (or any frame producer) a session reads from.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn FrameSource>, AcquisitionError>;
}

// An acquired capture stream. `release` stops the underlying tracks and is idempotent;
// after it, `next_frame` yields `None`.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn next_frame(&self) -> Option<Frame>;
    fn release(&self);
}

// Port for the pose model. Implementations may be long-lived and shared across sessions.
#[async_trait]
pub trait KeypointProvider: Send + Sync {
    /// Lazily initializes the model; repeated calls are cheap.
    async fn warm_up(&self) -> Result<(), AcquisitionError>;
    /// Returns zero or more detected persons for the frame.
    async fn estimate(&self, frame: &Frame) -> Result<Vec<Detection>, ProviderError>;
}
