use std::{env, path::PathBuf, time::Duration};

// Runtime constants and environment-backed settings for the client.

pub fn room_service_url() -> String {
    env::var("ROOM_SERVICE_URL").unwrap_or_else(|_| "ws://127.0.0.1:8000".to_string())
}

pub fn room_id() -> String {
    env::var("ROOM_ID").unwrap_or_else(|_| "LOBBY".to_string())
}

pub fn participant_name() -> String {
    env::var("PARTICIPANT_NAME").unwrap_or_else(|_| "Player".to_string())
}

pub fn keypoint_replay_path() -> PathBuf {
    env::var("KEYPOINT_REPLAY_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("keypoints.jsonl"))
}

pub fn replay_frame_interval() -> Duration {
    let millis = env::var("REPLAY_FRAME_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(33);
    Duration::from_millis(millis)
}

pub fn bbox_include_hands() -> bool {
    env::var("BBOX_INCLUDE_HANDS")
        .ok()
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub const PING_INTERVAL: Duration = Duration::from_secs(10);
// Unchanged counts are re-sent at most this often.
pub const RESEND_INTERVAL: Duration = Duration::from_secs(2);
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;
// Rows shown in the standings log.
pub const LEADERBOARD_ROWS: usize = 10;
