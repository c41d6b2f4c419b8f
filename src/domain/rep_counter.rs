// Two-state motion classifier that counts Up -> Down repetitions.

use super::geometry::PixelLandmark;
use super::skeleton::LandmarkIndex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Position {
    #[default]
    Unknown,
    Up,
    Down,
}

/// Counter state for one session. `count` never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepCounterState {
    pub position: Position,
    pub count: u32,
}

// Missing landmarks sit infinitely far down the image. A missing point is never "higher or
// level" with anything, including another missing point.
fn y(lm_list: &[Option<PixelLandmark>], index: LandmarkIndex) -> Option<i32> {
    lm_list.get(index.slot()).copied().flatten().map(|p| p.y)
}

fn below(a: Option<i32>, b: Option<i32>) -> bool {
    match (a, b) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(a), Some(b)) => a > b,
    }
}

fn level_or_above(a: Option<i32>, b: Option<i32>) -> bool {
    match (a, b) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(a), Some(b)) => a <= b,
    }
}

fn is_up(lm: &[Option<PixelLandmark>]) -> bool {
    use LandmarkIndex::*;
    below(y(lm, RightShoulder), y(lm, RightElbow))
        && below(y(lm, LeftShoulder), y(lm, LeftElbow))
        && below(y(lm, RightShoulder), y(lm, RightKnee))
        && below(y(lm, RightHip), y(lm, RightKnee))
        && below(y(lm, LeftHip), y(lm, LeftKnee))
}

fn is_down(lm: &[Option<PixelLandmark>]) -> bool {
    use LandmarkIndex::*;
    level_or_above(y(lm, RightShoulder), y(lm, RightElbow))
        && level_or_above(y(lm, LeftShoulder), y(lm, LeftElbow))
        && level_or_above(y(lm, LeftShoulder), y(lm, LeftKnee))
        && level_or_above(y(lm, RightHip), y(lm, RightKnee))
        && level_or_above(y(lm, LeftHip), y(lm, LeftKnee))
}

impl RepCounterState {
    /// Applies one frame of landmarks and returns the next state.
    pub fn observe(self, lm_list: &[Option<PixelLandmark>]) -> Self {
        let mut next = self;
        if lm_list.is_empty() {
            return next;
        }

        if is_up(lm_list) {
            next.position = Position::Up;
        }
        if next.position == Position::Up && is_down(lm_list) {
            next.position = Position::Down;
            next.count += 1;
        }
        next
    }
}
