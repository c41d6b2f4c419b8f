// Room session lifecycle and the per-frame counting loop.

use crate::domain::{
    AcquisitionError, BoundingBoxInfo, CaptureSource, Frame, FrameSource, Keypoint,
    KeypointProvider, LeaderboardEntry, RepCounterState, Skeleton, find_position,
};
use crate::interface_adapters::endpoint::{
    normalize_participant_name, normalize_room_id, room_endpoint,
};
use crate::interface_adapters::sync_client::{SyncClient, SyncSettings};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// Configuration applied to every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Base URL of the room service (`http(s)://` or `ws(s)://`).
    pub room_service_url: String,
    /// Widen the body box to the wrists when both are visible.
    pub include_hands_in_bbox: bool,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Closed,
}

#[derive(Debug)]
pub enum SessionError {
    /// Room id is empty after trimming.
    InvalidRoom,
    /// `start` was called on a session that already left `Idle`.
    AlreadyStarted,
    Acquisition(AcquisitionError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidRoom => write!(f, "room id must not be empty"),
            SessionError::AlreadyStarted => write!(f, "session already started"),
            SessionError::Acquisition(e) => write!(f, "session start failed: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Acquisition(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AcquisitionError> for SessionError {
    fn from(e: AcquisitionError) -> Self {
        SessionError::Acquisition(e)
    }
}

/// Latest per-frame output, for rendering collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub counter: RepCounterState,
    /// `false` when the provider found nobody in the frame.
    pub person_detected: bool,
    pub bbox_info: Option<BoundingBoxInfo>,
    pub neck: Option<[i32; 2]>,
}

/// One participant's counting session in one room.
///
/// A session runs once: after `stop` it is `Closed` and a new session is needed.
pub struct RoomSession {
    settings: SessionSettings,
    capture: Arc<dyn CaptureSource>,
    provider: Arc<dyn KeypointProvider>,
    state: SessionState,
    room_id: Option<String>,
    participant_name: Option<String>,
    room_linked: bool,
    cancel: CancellationToken,
    frames: Option<Arc<dyn FrameSource>>,
    leaderboard_tx: watch::Sender<Vec<LeaderboardEntry>>,
    report_tx: watch::Sender<Option<FrameReport>>,
    finished_tx: watch::Sender<bool>,
    frame_loop: Option<JoinHandle<RepCounterState>>,
}

impl RoomSession {
    pub fn new(
        settings: SessionSettings,
        capture: Arc<dyn CaptureSource>,
        provider: Arc<dyn KeypointProvider>,
    ) -> Self {
        Self {
            settings,
            capture,
            provider,
            state: SessionState::Idle,
            room_id: None,
            participant_name: None,
            room_linked: false,
            cancel: CancellationToken::new(),
            frames: None,
            leaderboard_tx: watch::Sender::new(Vec::new()),
            report_tx: watch::Sender::new(None),
            finished_tx: watch::Sender::new(false),
            frame_loop: None,
        }
    }

    /// Acquires the capture and provider, opens the room link and starts counting.
    ///
    /// Acquisition failures leave the session `Idle`. A room that cannot be reached is logged
    /// and the session counts offline.
    pub async fn start(&mut self, room_id: &str, participant_name: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }

        let room_id = normalize_room_id(room_id);
        if room_id.is_empty() {
            return Err(SessionError::InvalidRoom);
        }
        let participant_name = normalize_participant_name(participant_name);

        let frames = self.capture.acquire().await?;
        if let Err(e) = self.provider.warm_up().await {
            frames.release();
            return Err(e.into());
        }

        self.state = SessionState::Connecting;
        info!(room_id = %room_id, participant = %participant_name, "joining room");

        let sync = match room_endpoint(&self.settings.room_service_url, &room_id, &participant_name)
        {
            Ok(endpoint) => match SyncClient::connect(
                &endpoint,
                self.leaderboard_tx.clone(),
                self.settings.sync,
                self.cancel.child_token(),
            )
            .await
            {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(room_id = %room_id, error = %e, "room unreachable; counting offline");
                    None
                }
            },
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "room endpoint invalid; counting offline");
                None
            }
        };
        self.room_linked = sync.is_some();

        let frame_loop = FrameLoop {
            frames: frames.clone(),
            provider: self.provider.clone(),
            sync,
            cancel: self.cancel.clone(),
            report_tx: self.report_tx.clone(),
            finished_tx: self.finished_tx.clone(),
            include_hands_in_bbox: self.settings.include_hands_in_bbox,
        };
        self.frame_loop = Some(tokio::spawn(frame_loop.run()));
        self.frames = Some(frames);
        self.room_id = Some(room_id);
        self.participant_name = Some(participant_name);
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Stops counting, closes the room link and releases the capture. Idempotent.
    ///
    /// An inference call already in flight is not interrupted; its result is discarded.
    pub fn stop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.cancel.cancel();
        if let Some(frames) = self.frames.take() {
            frames.release();
        }
        self.state = SessionState::Closed;
        info!(room_id = self.room_id.as_deref().unwrap_or_default(), "session stopped");
    }

    /// Waits for the frame loop to wind down after `stop`, returning the final counter.
    pub async fn closed(&mut self) -> Option<RepCounterState> {
        let handle = self.frame_loop.take()?;
        match handle.await {
            Ok(counter) => Some(counter),
            Err(e) => {
                warn!(error = %e, "frame loop task failed");
                None
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn participant_name(&self) -> Option<&str> {
        self.participant_name.as_deref()
    }

    /// Whether the room connection was established at start.
    pub fn room_linked(&self) -> bool {
        self.room_linked
    }

    pub fn leaderboard(&self) -> watch::Receiver<Vec<LeaderboardEntry>> {
        self.leaderboard_tx.subscribe()
    }

    pub fn reports(&self) -> watch::Receiver<Option<FrameReport>> {
        self.report_tx.subscribe()
    }

    /// Resolves once the capture source has run out of frames.
    pub async fn capture_finished(&self) {
        let mut rx = self.finished_tx.subscribe();
        let _ = rx.wait_for(|finished| *finished).await;
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.stop();
    }
}

struct FrameLoop {
    frames: Arc<dyn FrameSource>,
    provider: Arc<dyn KeypointProvider>,
    sync: Option<SyncClient>,
    cancel: CancellationToken,
    report_tx: watch::Sender<Option<FrameReport>>,
    finished_tx: watch::Sender<bool>,
    include_hands_in_bbox: bool,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

impl FrameLoop {
    async fn run(mut self) -> RepCounterState {
        let mut counter = RepCounterState::default();
        let mut last_provider_log = Instant::now() - LOG_THROTTLE;

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                frame = self.frames.next_frame() => frame,
            };
            let Some(frame) = next else {
                info!(count = counter.count, "capture finished");
                self.finished_tx.send_replace(true);
                // Keep the room link up until the session is stopped.
                self.cancel.cancelled().await;
                break;
            };

            let detections = match self.provider.estimate(&frame).await {
                Ok(detections) => detections,
                Err(e) => {
                    if should_log(&mut last_provider_log) {
                        warn!(frame = frame.index, error = %e, "inference failed; skipping frame");
                    }
                    continue;
                }
            };
            if self.cancel.is_cancelled() {
                debug!(frame = frame.index, "discarding inference result after stop");
                break;
            }

            counter = self.apply(&frame, detections.first().map(Vec::as_slice), counter);

            if let Some(sync) = self.sync.as_mut() {
                if sync.publish_count(counter.count) {
                    debug!(count = counter.count, "rep count published");
                }
            }
        }

        if let Some(sync) = self.sync.take() {
            sync.close().await;
        }
        counter
    }

    fn apply(
        &self,
        frame: &Frame,
        person: Option<&[Keypoint]>,
        counter: RepCounterState,
    ) -> RepCounterState {
        let Some(keypoints) = person else {
            self.report_tx.send_replace(Some(FrameReport {
                frame_index: frame.index,
                counter,
                person_detected: false,
                bbox_info: None,
                neck: None,
            }));
            return counter;
        };

        let skeleton = Skeleton::from_keypoints(keypoints, frame.width, frame.height);
        let geometry = find_position(
            &skeleton,
            frame.width,
            frame.height,
            self.include_hands_in_bbox,
        );
        let next = counter.observe(&geometry.lm_list);
        if next.count > counter.count {
            info!(count = next.count, "rep counted");
        }

        self.report_tx.send_replace(Some(FrameReport {
            frame_index: frame.index,
            counter: next,
            person_detected: true,
            bbox_info: geometry.bbox_info,
            neck: geometry.neck,
        }));
        next
    }
}

