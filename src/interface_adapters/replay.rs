// Recorded-keypoint collaborators: replay a JSON-lines capture as frames plus detections.
//
// One frame per line:
// {"width":640,"height":480,"persons":[[{"name":"nose","x":320,"y":90,"score":0.9}, ...]]}

use crate::domain::{
    AcquisitionError, CaptureSource, Detection, Frame, FrameSource, KeypointProvider,
    ProviderError,
};

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordedFrame {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub persons: Vec<Detection>,
}

#[derive(Debug)]
pub enum ReplayError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Line {
        line: usize,
        source: serde_json::Error,
    },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ReplayError::Line { line, source } => {
                write!(f, "invalid recorded frame on line {line}: {source}")
            }
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReplayError::Io { source, .. } => Some(source),
            ReplayError::Line { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplayRecording {
    frames: Vec<RecordedFrame>,
}

impl ReplayRecording {
    pub fn parse(text: &str) -> Result<Self, ReplayError> {
        let mut frames = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let frame = serde_json::from_str(line).map_err(|source| ReplayError::Line {
                line: number + 1,
                source,
            })?;
            frames.push(frame);
        }
        Ok(Self { frames })
    }

    pub async fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ReplayError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let recording = Self::parse(&text)?;
        debug!(path = %path.display(), frames = recording.len(), "keypoint recording loaded");
        Ok(recording)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: u64) -> Option<&RecordedFrame> {
        usize::try_from(index).ok().and_then(|i| self.frames.get(i))
    }
}

/// Plays a recording back as a paced frame stream.
pub struct ReplayCapture {
    path: PathBuf,
    frame_interval: Duration,
}

impl ReplayCapture {
    pub fn new(path: impl Into<PathBuf>, frame_interval: Duration) -> Self {
        Self {
            path: path.into(),
            frame_interval,
        }
    }
}

#[async_trait]
impl CaptureSource for ReplayCapture {
    async fn acquire(&self) -> Result<Arc<dyn FrameSource>, AcquisitionError> {
        let recording = ReplayRecording::load(&self.path)
            .await
            .map_err(|e| AcquisitionError::Capture(e.to_string()))?;
        info!(path = %self.path.display(), frames = recording.len(), "replay capture acquired");

        let mut pacing = interval(self.frame_interval.max(Duration::from_millis(1)));
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Arc::new(ReplayFrames {
            recording,
            next_index: AtomicU64::new(0),
            released: AtomicBool::new(false),
            pacing: Mutex::new(pacing),
        }))
    }
}

struct ReplayFrames {
    recording: ReplayRecording,
    next_index: AtomicU64,
    released: AtomicBool,
    pacing: Mutex<Interval>,
}

#[async_trait]
impl FrameSource for ReplayFrames {
    async fn next_frame(&self) -> Option<Frame> {
        if self.released.load(Ordering::SeqCst) {
            return None;
        }
        self.pacing.lock().await.tick().await;
        if self.released.load(Ordering::SeqCst) {
            return None;
        }

        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        let recorded = self.recording.frame(index)?;
        Some(Frame {
            index,
            width: recorded.width,
            height: recorded.height,
            pixels: Vec::new(),
        })
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!("replay capture released");
        }
    }
}

/// Serves the detections stored in a recording, keyed by frame index.
///
/// The file is loaded once on first warm-up and shared by every session using this provider.
pub struct ReplayKeypoints {
    path: PathBuf,
    recording: OnceCell<ReplayRecording>,
}

impl ReplayKeypoints {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recording: OnceCell::new(),
        }
    }
}

#[async_trait]
impl KeypointProvider for ReplayKeypoints {
    async fn warm_up(&self) -> Result<(), AcquisitionError> {
        self.recording
            .get_or_try_init(|| ReplayRecording::load(&self.path))
            .await
            .map_err(|e| AcquisitionError::Provider(e.to_string()))?;
        Ok(())
    }

    async fn estimate(&self, frame: &Frame) -> Result<Vec<Detection>, ProviderError> {
        let recording = self
            .recording
            .get()
            .ok_or_else(|| ProviderError("keypoint recording not loaded".to_string()))?;
        recording
            .frame(frame.index)
            .map(|recorded| recorded.persons.clone())
            .ok_or_else(|| ProviderError(format!("no recorded keypoints for frame {}", frame.index)))
    }
}
