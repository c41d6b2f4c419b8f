// Use cases layer: the room session workflow.

pub mod session;

pub use session::{FrameReport, RoomSession, SessionError, SessionSettings, SessionState};
