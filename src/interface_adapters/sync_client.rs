// WebSocket room link: cadence-gated count publisher plus inbound leaderboard consumer.

use crate::domain::{CadenceGate, LeaderboardEntry};
use crate::interface_adapters::protocol::{ClientMessage, parse_server_message};

use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

type RoomSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const LOG_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum TransportError {
    Endpoint(url::ParseError),
    UnsupportedScheme(String),
    Connect(tungstenite::Error),
    Socket(tungstenite::Error),
    Serialization(serde_json::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Endpoint(e) => write!(f, "invalid room endpoint: {e}"),
            TransportError::UnsupportedScheme(scheme) => {
                write!(f, "unsupported room endpoint scheme: {scheme}")
            }
            TransportError::Connect(e) => write!(f, "room connection failed: {e}"),
            TransportError::Socket(e) => write!(f, "room socket error: {e}"),
            TransportError::Serialization(e) => write!(f, "failed to encode room message: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub ping_interval: Duration,
    pub resend_interval: Duration,
    pub outbound_capacity: usize,
}

enum LoopControl {
    Continue,
    Disconnect,
}

#[derive(Debug, Default)]
struct ConnStats {
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
}

/// Handle owned by the frame loop. Publishing never blocks; the socket lives in its own task.
pub struct SyncClient {
    outbound_tx: mpsc::Sender<ClientMessage>,
    gate: CadenceGate,
    last_full_log: Instant,
    task: JoinHandle<()>,
}

impl SyncClient {
    /// Opens the room connection and spawns its task. The task exits when `shutdown` fires,
    /// when the room closes the socket, or on a socket error.
    pub async fn connect(
        endpoint: &Url,
        leaderboard_tx: watch::Sender<Vec<LeaderboardEntry>>,
        settings: SyncSettings,
        shutdown: CancellationToken,
    ) -> Result<Self, TransportError> {
        let (socket, _response) = connect_async(endpoint.as_str())
            .await
            .map_err(TransportError::Connect)?;

        let (outbound_tx, outbound_rx) = mpsc::channel(settings.outbound_capacity.max(1));
        let span = info_span!(
            "room",
            host = endpoint.host_str().unwrap_or_default(),
            path = endpoint.path()
        );
        let task = tokio::spawn(
            run_connection(socket, outbound_rx, leaderboard_tx, settings, shutdown).instrument(span),
        );

        Ok(Self {
            outbound_tx,
            gate: CadenceGate::new(settings.resend_interval),
            last_full_log: Instant::now() - LOG_THROTTLE,
            task,
        })
    }

    /// Publishes the count if the cadence gate allows it. Returns whether it was queued.
    pub fn publish_count(&mut self, count: u32) -> bool {
        self.publish_count_at(count, Instant::now())
    }

    pub fn publish_count_at(&mut self, count: u32, now: Instant) -> bool {
        let now = now.into_std();
        if !self.gate.should_send(count, now) {
            return false;
        }

        match self.outbound_tx.try_send(ClientMessage::Update { count }) {
            Ok(()) => {
                self.gate.record(count, now);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                if should_log(&mut self.last_full_log) {
                    warn!(count, "room outbound channel full; dropping update");
                }
                false
            }
            // Connection task is gone; counting carries on offline.
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.outbound_tx.is_closed()
    }

    /// Stops publishing, lets already-queued updates flush and waits for the link to close.
    pub async fn close(self) {
        let SyncClient {
            outbound_tx, task, ..
        } = self;
        drop(outbound_tx);
        if let Err(e) = task.await {
            warn!(error = %e, "room connection task failed");
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn send_message(
    socket: &mut RoomSocket,
    msg: &ClientMessage,
    stats: &mut ConnStats,
) -> Result<(), TransportError> {
    let txt = serde_json::to_string(msg).map_err(TransportError::Serialization)?;
    let bytes = txt.len() as u64;
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(TransportError::Socket)?;
    stats.msgs_out += 1;
    stats.bytes_out += bytes;
    Ok(())
}

async fn run_connection(
    mut socket: RoomSocket,
    mut outbound_rx: mpsc::Receiver<ClientMessage>,
    leaderboard_tx: watch::Sender<Vec<LeaderboardEntry>>,
    settings: SyncSettings,
    shutdown: CancellationToken,
) {
    info!("room connected");

    let mut stats = ConnStats::default();
    let mut ping = interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut close_gracefully = true;

    loop {
        let control = tokio::select! {
            _ = shutdown.cancelled() => {
                // Flush what the frame loop already queued so the room sees the final count.
                while let Ok(msg) = outbound_rx.try_recv() {
                    if let Err(e) = send_message(&mut socket, &msg, &mut stats).await {
                        warn!(error = %e, "failed to flush room update on shutdown");
                        break;
                    }
                }
                LoopControl::Disconnect
            }

            outbound = outbound_rx.recv() => match outbound {
                Some(msg) => match send_message(&mut socket, &msg, &mut stats).await {
                    Ok(()) => LoopControl::Continue,
                    Err(e) => {
                        warn!(error = %e, "room send failed; link closed");
                        close_gracefully = false;
                        LoopControl::Disconnect
                    }
                },
                // Publisher dropped.
                None => LoopControl::Disconnect,
            },

            _ = ping.tick() => match send_message(&mut socket, &ClientMessage::Ping, &mut stats).await {
                Ok(()) => LoopControl::Continue,
                Err(e) => {
                    warn!(error = %e, "room ping failed; link closed");
                    close_gracefully = false;
                    LoopControl::Disconnect
                }
            },

            incoming = socket.next() => {
                let control = handle_incoming(incoming, &leaderboard_tx, &mut stats);
                if matches!(control, LoopControl::Disconnect) {
                    close_gracefully = false;
                }
                control
            }
        };

        if let LoopControl::Disconnect = control {
            break;
        }
    }

    if close_gracefully {
        if let Err(e) = socket.close(None).await {
            debug!(error = %e, "room socket close error");
        }
    }

    debug!(
        msgs_in = stats.msgs_in,
        msgs_out = stats.msgs_out,
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        invalid_json = stats.invalid_json,
        "room connection stats"
    );
    info!("room disconnected");
}

fn handle_incoming(
    incoming: Option<Result<Message, tungstenite::Error>>,
    leaderboard_tx: &watch::Sender<Vec<LeaderboardEntry>>,
    stats: &mut ConnStats,
) -> LoopControl {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            stats.msgs_in += 1;
            stats.bytes_in += text.len() as u64;

            match parse_server_message(text.as_str()) {
                Ok(msg) => {
                    if let Some(roster) = msg.into_roster() {
                        debug!(players = roster.len(), "leaderboard replaced");
                        leaderboard_tx.send_replace(roster);
                    }
                }
                Err(e) => {
                    stats.invalid_json += 1;
                    warn!(error = %e, "dropping malformed room message");
                }
            }
            LoopControl::Continue
        }
        Some(Ok(Message::Binary(bytes))) => {
            stats.msgs_in += 1;
            stats.bytes_in += bytes.len() as u64;
            debug!(bytes = bytes.len(), "ignoring binary room message");
            LoopControl::Continue
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => LoopControl::Continue,
        Some(Ok(Message::Close(frame))) => {
            info!(?frame, "room closed the connection");
            LoopControl::Disconnect
        }
        Some(Err(e)) => {
            warn!(error = %TransportError::Socket(e), "room link dropped");
            LoopControl::Disconnect
        }
        None => {
            warn!("room stream ended");
            LoopControl::Disconnect
        }
    }
}
