// Shared fixtures for integration tests: an in-process room service and scripted collaborators.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use rep_room::SessionSettings;
use rep_room::domain::{
    AcquisitionError, CaptureSource, Detection, Frame, FrameSource, Keypoint, KeypointProvider,
    ProviderError,
};
use rep_room::interface_adapters::SyncSettings;
use serde::Deserialize;
use tokio::sync::{Notify, broadcast, mpsc};

// Everything the fake room observed, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Connected { room: String, name: Option<String> },
    Text(String),
    Closed,
}

#[derive(Debug, Clone)]
enum RoomCommand {
    Text(String),
    Disconnect,
}

#[derive(Clone)]
struct RoomState {
    events: Arc<Mutex<Vec<RoomEvent>>>,
    push_tx: broadcast::Sender<RoomCommand>,
}

#[derive(Debug, Deserialize)]
struct NameQuery {
    name: Option<String>,
}

pub struct FakeRoom {
    pub base_url: String,
    state: RoomState,
}

impl FakeRoom {
    // Serve the room on an ephemeral port inside the calling test's runtime.
    pub async fn start() -> Self {
        let state = RoomState {
            events: Arc::new(Mutex::new(Vec::new())),
            push_tx: broadcast::channel(16).0,
        };
        let app = Router::new()
            .route("/ws/{room}", get(ws_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral test port");
        let addr = listener.local_addr().expect("get local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake room failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn events(&self) -> Vec<RoomEvent> {
        self.state.events.lock().expect("events mutex poisoned").clone()
    }

    pub fn texts(&self) -> Vec<serde_json::Value> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RoomEvent::Text(text) => serde_json::from_str(&text).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<u64> {
        self.texts()
            .iter()
            .filter(|msg| msg["type"] == "update")
            .filter_map(|msg| msg["count"].as_u64())
            .collect()
    }

    pub fn pings(&self) -> usize {
        self.texts().iter().filter(|msg| msg["type"] == "ping").count()
    }

    // Broadcast a raw text frame to every connected client.
    pub fn push(&self, text: &str) {
        let _ = self.state.push_tx.send(RoomCommand::Text(text.to_string()));
    }

    // Send a close frame to every connected client and drop the sockets.
    pub fn disconnect_all(&self) {
        let _ = self.state.push_tx.send(RoomCommand::Disconnect);
    }

    pub fn connections(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, RoomEvent::Connected { .. }))
            .count()
    }

    pub async fn wait_for(&self, what: &str, check: impl Fn(&FakeRoom) -> bool) {
        wait_until(what, || check(self)).await;
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    Query(query): Query<NameQuery>,
    State(state): State<RoomState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, room, query.name, state))
}

async fn handle_socket(mut socket: WebSocket, room: String, name: Option<String>, state: RoomState) {
    // Subscribe before announcing the connection so no push is missed.
    let mut push_rx = state.push_tx.subscribe();
    record(&state, RoomEvent::Connected { room, name });

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => record(&state, RoomEvent::Text(text.as_str().to_string())),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            pushed = push_rx.recv() => match pushed {
                Ok(RoomCommand::Text(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(RoomCommand::Disconnect) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    record(&state, RoomEvent::Closed);
}

fn record(state: &RoomState, event: RoomEvent) {
    state.events.lock().expect("events mutex poisoned").push(event);
}

// Poll a condition for up to five seconds.
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn settings(room_service_url: &str) -> SessionSettings {
    SessionSettings {
        room_service_url: room_service_url.to_string(),
        include_hands_in_bbox: false,
        sync: SyncSettings {
            ping_interval: Duration::from_secs(60),
            resend_interval: Duration::from_secs(2),
            outbound_capacity: 64,
        },
    }
}

fn pose(shoulder: f64, elbow: f64, hip: f64, knee: f64) -> Detection {
    vec![
        Keypoint::new("right_shoulder", 280.0, shoulder, 0.9),
        Keypoint::new("left_shoulder", 360.0, shoulder, 0.9),
        Keypoint::new("right_elbow", 260.0, elbow, 0.9),
        Keypoint::new("left_elbow", 380.0, elbow, 0.9),
        Keypoint::new("right_hip", 300.0, hip, 0.9),
        Keypoint::new("left_hip", 340.0, hip, 0.9),
        Keypoint::new("right_knee", 300.0, knee, 0.9),
        Keypoint::new("left_knee", 340.0, knee, 0.9),
    ]
}

// Body extended: shoulders and hips sit lower in the image than elbows and knees.
pub fn up_pose() -> Detection {
    pose(300.0, 200.0, 250.0, 100.0)
}

pub fn down_pose() -> Detection {
    pose(100.0, 200.0, 250.0, 300.0)
}

fn frame(index: u64) -> Frame {
    Frame {
        index,
        width: 640,
        height: 480,
        pixels: Vec::new(),
    }
}

pub struct ScriptedFrames {
    queue: Mutex<VecDeque<Frame>>,
    release_calls: AtomicUsize,
}

#[async_trait]
impl FrameSource for ScriptedFrames {
    async fn next_frame(&self) -> Option<Frame> {
        if self.release_calls.load(Ordering::SeqCst) > 0 {
            return None;
        }
        self.queue.lock().expect("frames mutex poisoned").pop_front()
    }

    fn release(&self) {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
    }
}

// Capture fake handing out a fixed number of blank frames.
#[derive(Clone)]
pub struct ScriptedCapture {
    frames: Arc<ScriptedFrames>,
    acquire_calls: Arc<AtomicUsize>,
}

impl ScriptedCapture {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: Arc::new(ScriptedFrames {
                queue: Mutex::new((0..frame_count as u64).map(frame).collect()),
                release_calls: AtomicUsize::new(0),
            }),
            acquire_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.frames.release_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureSource for ScriptedCapture {
    async fn acquire(&self) -> Result<Arc<dyn FrameSource>, AcquisitionError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.frames.clone())
    }
}

pub struct PacedFrames {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
}

#[async_trait]
impl FrameSource for PacedFrames {
    async fn next_frame(&self) -> Option<Frame> {
        self.rx.lock().await.recv().await
    }

    fn release(&self) {}
}

// Capture fake whose frames are fed one by one by the test.
pub struct PacedCapture {
    tx: mpsc::UnboundedSender<Frame>,
    frames: Arc<PacedFrames>,
    next_index: AtomicU64,
}

impl PacedCapture {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            frames: Arc::new(PacedFrames {
                rx: tokio::sync::Mutex::new(rx),
            }),
            next_index: AtomicU64::new(0),
        }
    }

    pub fn feed(&self) {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        self.tx.send(frame(index)).expect("frame receiver alive");
    }
}

#[async_trait]
impl CaptureSource for PacedCapture {
    async fn acquire(&self) -> Result<Arc<dyn FrameSource>, AcquisitionError> {
        Ok(self.frames.clone())
    }
}

pub struct FailingCapture;

#[async_trait]
impl CaptureSource for FailingCapture {
    async fn acquire(&self) -> Result<Arc<dyn FrameSource>, AcquisitionError> {
        Err(AcquisitionError::Capture("camera permission denied".to_string()))
    }
}

// Returns the pose scripted for each frame index; an empty pose means nobody in view.
pub struct ScriptedProvider {
    poses: Vec<Detection>,
}

impl ScriptedProvider {
    pub fn new(poses: Vec<Detection>) -> Self {
        Self { poses }
    }
}

#[async_trait]
impl KeypointProvider for ScriptedProvider {
    async fn warm_up(&self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    async fn estimate(&self, frame: &Frame) -> Result<Vec<Detection>, ProviderError> {
        match self.poses.get(frame.index as usize) {
            Some(pose) if !pose.is_empty() => Ok(vec![pose.clone()]),
            _ => Ok(Vec::new()),
        }
    }
}

pub struct FailingProvider;

#[async_trait]
impl KeypointProvider for FailingProvider {
    async fn warm_up(&self) -> Result<(), AcquisitionError> {
        Err(AcquisitionError::Provider("model failed to load".to_string()))
    }

    async fn estimate(&self, _frame: &Frame) -> Result<Vec<Detection>, ProviderError> {
        Err(ProviderError("not loaded".to_string()))
    }
}

// Holds every inference call until the test opens the gate.
#[derive(Clone)]
pub struct GatedProvider {
    pose: Detection,
    called: Arc<Notify>,
    gate: Arc<Notify>,
}

impl GatedProvider {
    pub fn new(pose: Detection) -> Self {
        Self {
            pose,
            called: Arc::new(Notify::new()),
            gate: Arc::new(Notify::new()),
        }
    }

    pub async fn wait_until_called(&self) {
        self.called.notified().await;
    }

    pub fn open(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl KeypointProvider for GatedProvider {
    async fn warm_up(&self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    async fn estimate(&self, _frame: &Frame) -> Result<Vec<Detection>, ProviderError> {
        self.called.notify_one();
        self.gate.notified().await;
        Ok(vec![self.pose.clone()])
    }
}
