// Interface adapters: room wire protocol, WebSocket link and replay collaborators.

pub mod endpoint;
pub mod protocol;
pub mod replay;
pub mod sync_client;

pub use endpoint::room_endpoint;
pub use protocol::{ClientMessage, MessageFormatError, ServerMessage, parse_server_message};
pub use replay::{ReplayCapture, ReplayKeypoints, ReplayRecording};
pub use sync_client::{SyncClient, SyncSettings, TransportError};
