// Pixel-space pose geometry: landmark list, torso bounding box and neck point.

use super::skeleton::{LandmarkIndex, Skeleton, Slot};
use serde::{Deserialize, Serialize};

/// Half-width used when the shoulders are not both visible.
pub const DEFAULT_HALF_WIDTH: i32 = 20;

/// Pixel coordinates are clamped to +/- this bound so box sums never leave `i32`.
pub const PIXEL_LIMIT: i32 = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelLandmark {
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Index-aligned pixel landmarks; absent slots stay `None`.
pub type LandmarkList = Vec<Option<PixelLandmark>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBoxInfo {
    /// `[x, y, width, height]`
    pub bbox: [i32; 4],
    pub center: [i32; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoseGeometry {
    pub lm_list: LandmarkList,
    pub bbox_info: Option<BoundingBoxInfo>,
    pub neck: Option<[i32; 2]>,
}

// Half-up rounding, so negative depths land where a browser canvas would put them.
fn round_px(value: f64) -> i32 {
    let rounded = (value + 0.5).floor();
    if rounded.is_nan() {
        return 0;
    }
    rounded.clamp(f64::from(-PIXEL_LIMIT), f64::from(PIXEL_LIMIT)) as i32
}

/// Derives pixel landmarks, the body bounding box and the neck point for one frame.
pub fn find_position(
    skeleton: &Skeleton,
    frame_width: u32,
    frame_height: u32,
    include_hands_in_bbox: bool,
) -> PoseGeometry {
    let width = f64::from(frame_width);
    let height = f64::from(frame_height);

    let lm_list: LandmarkList = skeleton
        .slots()
        .iter()
        .enumerate()
        .map(|(index, slot)| match slot {
            Slot::Present(lm) => Some(PixelLandmark {
                index,
                x: round_px(lm.x * width),
                y: round_px(lm.y * height),
                z: round_px(lm.z * width),
            }),
            Slot::Absent => None,
        })
        .collect();

    let at = |index: LandmarkIndex| lm_list[index.slot()];

    let shoulders = at(LandmarkIndex::RightShoulder).zip(at(LandmarkIndex::LeftShoulder));
    let wrists = at(LandmarkIndex::RightWrist).zip(at(LandmarkIndex::LeftWrist));
    let hips = at(LandmarkIndex::LeftHip).zip(at(LandmarkIndex::RightHip));

    let ad = shoulders.map_or(DEFAULT_HALF_WIDTH, |(right, left)| {
        (right.x - left.x).abs() >> 1
    });

    let x_range = match (include_hands_in_bbox, wrists, shoulders, hips) {
        (true, Some((right, left)), _, _) => Some((right.x - ad, left.x + ad)),
        (_, _, Some((right, left)), _) => Some((right.x - ad, left.x + ad)),
        (_, _, _, Some((left, right))) => {
            Some((left.x.min(right.x) - ad, left.x.max(right.x) + ad))
        }
        _ => None,
    };

    let lower = [
        LandmarkIndex::LeftHeel,
        LandmarkIndex::LeftAnkle,
        LandmarkIndex::RightAnkle,
        LandmarkIndex::LeftKnee,
        LandmarkIndex::RightKnee,
        LandmarkIndex::LeftHip,
        LandmarkIndex::RightHip,
    ];
    let upper = [
        LandmarkIndex::LeftEye,
        LandmarkIndex::Nose,
        LandmarkIndex::LeftShoulder,
        LandmarkIndex::RightShoulder,
    ];

    let y2 = lower
        .iter()
        .filter_map(|&i| at(i).map(|p| p.y))
        .max()
        .unwrap_or(i32::try_from(frame_height).map_or(PIXEL_LIMIT, |h| h.min(PIXEL_LIMIT)) - 1)
        + ad;
    let y1 = upper
        .iter()
        .filter_map(|&i| at(i).map(|p| p.y))
        .min()
        .unwrap_or(0)
        - ad;

    let bbox_info = x_range.map(|(x1, x2)| {
        let (w, h) = (x2 - x1, y2 - y1);
        BoundingBoxInfo {
            bbox: [x1, y1, w, h],
            // Arithmetic shift floors, matching the box math for swapped sides.
            center: [x1 + (w >> 1), y1 + (h >> 1)],
        }
    });

    let neck = shoulders.map(|(right, left)| {
        [
            round_px(f64::from(right.x + left.x) / 2.0),
            round_px(f64::from(right.y + left.y) / 2.0),
        ]
    });

    PoseGeometry {
        lm_list,
        bbox_info,
        neck,
    }
}
