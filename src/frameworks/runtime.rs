// Process bootstrap for the rep counting client.

use crate::domain::{CaptureSource, KeypointProvider, LeaderboardEntry, standings};
use crate::frameworks::config;
use crate::interface_adapters::{ReplayCapture, ReplayKeypoints, SyncSettings};
use crate::use_cases::{RoomSession, SessionError, SessionSettings};

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Room and participant a run joins.
#[derive(Debug, Clone)]
pub struct RunTarget {
    pub room_id: String,
    pub participant_name: String,
}

pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn session_settings() -> SessionSettings {
    SessionSettings {
        room_service_url: config::room_service_url(),
        include_hands_in_bbox: config::bbox_include_hands(),
        sync: SyncSettings {
            ping_interval: config::PING_INTERVAL,
            resend_interval: config::RESEND_INTERVAL,
            outbound_capacity: config::OUTBOUND_CHANNEL_CAPACITY,
        },
    }
}

// Logs the standings every time the room publishes a new leaderboard.
async fn log_standings(mut leaderboard_rx: watch::Receiver<Vec<LeaderboardEntry>>) {
    while leaderboard_rx.changed().await.is_ok() {
        let rows = standings(&leaderboard_rx.borrow_and_update(), config::LEADERBOARD_ROWS);
        info!(players = rows.len(), "leaderboard updated");
        for row in rows {
            info!("{row}");
        }
    }
}

/// Runs one session until Ctrl-C or until the capture runs out of frames.
pub async fn run(
    settings: SessionSettings,
    target: RunTarget,
    capture: Arc<dyn CaptureSource>,
    provider: Arc<dyn KeypointProvider>,
) -> Result<(), SessionError> {
    let mut session = RoomSession::new(settings, capture, provider);
    session
        .start(&target.room_id, &target.participant_name)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to start session"))?;

    let standings_task = tokio::spawn(log_standings(session.leaderboard()));

    tokio::select! {
        _ = session.capture_finished() => info!("replay finished"),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("interrupted"),
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
        },
    }

    session.stop();
    let final_count = session.closed().await.map(|counter| counter.count);
    standings_task.abort();
    info!(
        room_id = session.room_id().unwrap_or_default(),
        count = final_count.unwrap_or_default(),
        "session closed"
    );
    Ok(())
}

pub async fn run_with_config() -> Result<(), SessionError> {
    init_runtime();

    let replay_path = config::keypoint_replay_path();
    let capture = Arc::new(ReplayCapture::new(
        replay_path.clone(),
        config::replay_frame_interval(),
    ));
    let provider = Arc::new(ReplayKeypoints::new(replay_path));
    let target = RunTarget {
        room_id: config::room_id(),
        participant_name: config::participant_name(),
    };
    tracing::debug!(
        room_service_url = %config::room_service_url(),
        room_id = %target.room_id,
        "client configured"
    );

    run(session_settings(), target, capture, provider).await
}
