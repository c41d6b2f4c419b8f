pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use frameworks::runtime::{RunTarget, run, run_with_config};
pub use use_cases::{FrameReport, RoomSession, SessionError, SessionSettings, SessionState};
