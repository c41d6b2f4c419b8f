// Domain layer: skeleton model, pose geometry and counting rules.

pub mod cadence;
pub mod errors;
pub mod geometry;
pub mod leaderboard;
pub mod ports;
pub mod rep_counter;
pub mod skeleton;

pub use cadence::CadenceGate;
pub use errors::{AcquisitionError, ProviderError};
pub use geometry::{BoundingBoxInfo, LandmarkList, PixelLandmark, PoseGeometry, find_position};
pub use leaderboard::{LeaderboardEntry, standings};
pub use ports::{CaptureSource, Detection, Frame, FrameSource, KeypointProvider};
pub use rep_counter::{Position, RepCounterState};
pub use skeleton::{Keypoint, Landmark, LandmarkIndex, Skeleton, Slot};
