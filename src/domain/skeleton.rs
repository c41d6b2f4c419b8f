// Canonical 33-slot skeleton and the normalizer that builds it from raw provider keypoints.

use serde::{Deserialize, Serialize};

/// Keypoints below this confidence are dropped during normalization.
pub const MIN_CONFIDENCE: f64 = 0.3;

/// Canonical landmark positions used by the skeleton.
///
/// Slots 5..=10, 17..=22 and 30..=32 are reserved and never filled by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;

    /// Maps a provider keypoint name to its canonical slot.
    ///
    /// The heel has no provider name; it is only ever filled by the ankle fallback.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nose" => Some(Self::Nose),
            "left_eye" => Some(Self::LeftEye),
            "right_eye" => Some(Self::RightEye),
            "left_ear" => Some(Self::LeftEar),
            "right_ear" => Some(Self::RightEar),
            "left_shoulder" => Some(Self::LeftShoulder),
            "right_shoulder" => Some(Self::RightShoulder),
            "left_elbow" => Some(Self::LeftElbow),
            "right_elbow" => Some(Self::RightElbow),
            "left_wrist" => Some(Self::LeftWrist),
            "right_wrist" => Some(Self::RightWrist),
            "left_hip" => Some(Self::LeftHip),
            "right_hip" => Some(Self::RightHip),
            "left_knee" => Some(Self::LeftKnee),
            "right_knee" => Some(Self::RightKnee),
            "left_ankle" => Some(Self::LeftAnkle),
            "right_ankle" => Some(Self::RightAnkle),
            _ => None,
        }
    }

    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Raw keypoint as produced by the pose provider, in frame pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: String,
    pub x: f64,
    pub y: f64,
    // MoveNet-style providers report this as `score`.
    #[serde(alias = "score")]
    pub confidence: f64,
    // Depth in pixels, when the provider has one.
    #[serde(default)]
    pub z: Option<f64>,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f64, y: f64, confidence: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            confidence,
            z: None,
        }
    }
}

/// Landmark position normalized to the frame (0.0..=1.0 on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Slot {
    Present(Landmark),
    #[default]
    Absent,
}

impl Slot {
    pub fn landmark(&self) -> Option<&Landmark> {
        match self {
            Slot::Present(lm) => Some(lm),
            Slot::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Slot::Present(_))
    }
}

/// Fixed-length skeleton; absence is always an explicit `Slot::Absent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Slot>", try_from = "Vec<Slot>")]
pub struct Skeleton {
    slots: [Slot; LandmarkIndex::COUNT],
}

impl Default for Skeleton {
    fn default() -> Self {
        Self {
            slots: [Slot::Absent; LandmarkIndex::COUNT],
        }
    }
}

impl From<Skeleton> for Vec<Slot> {
    fn from(skeleton: Skeleton) -> Self {
        skeleton.slots.to_vec()
    }
}

impl TryFrom<Vec<Slot>> for Skeleton {
    type Error = String;

    fn try_from(slots: Vec<Slot>) -> Result<Self, Self::Error> {
        let len = slots.len();
        let slots = slots
            .try_into()
            .map_err(|_| format!("skeleton needs {} slots, got {len}", LandmarkIndex::COUNT))?;
        Ok(Self { slots })
    }
}

impl Skeleton {
    /// Builds a skeleton from one detected person's keypoints.
    ///
    /// A zero-sized frame cannot be normalized and yields an all-absent skeleton.
    pub fn from_keypoints(keypoints: &[Keypoint], frame_width: u32, frame_height: u32) -> Self {
        let mut skeleton = Skeleton::default();
        if frame_width == 0 || frame_height == 0 {
            return skeleton;
        }

        let width = f64::from(frame_width);
        let height = f64::from(frame_height);
        for kp in keypoints {
            if kp.confidence.is_nan() || kp.confidence < MIN_CONFIDENCE {
                continue;
            }
            if !kp.x.is_finite() || !kp.y.is_finite() {
                continue;
            }
            let Some(index) = LandmarkIndex::from_name(&kp.name) else {
                continue;
            };
            skeleton.slots[index.slot()] = Slot::Present(Landmark {
                x: kp.x / width,
                y: kp.y / height,
                z: kp.z.filter(|z| z.is_finite()).map_or(0.0, |z| z / width),
            });
        }

        // Downstream geometry wants a foot estimate even without a heel keypoint.
        let heel = LandmarkIndex::LeftHeel.slot();
        let ankle = LandmarkIndex::LeftAnkle.slot();
        if !skeleton.slots[heel].is_present() && skeleton.slots[ankle].is_present() {
            skeleton.slots[heel] = skeleton.slots[ankle];
        }

        skeleton
    }

    pub fn slots(&self) -> &[Slot; LandmarkIndex::COUNT] {
        &self.slots
    }

    pub fn get(&self, index: LandmarkIndex) -> &Slot {
        &self.slots[index.slot()]
    }

    pub fn set(&mut self, index: LandmarkIndex, slot: Slot) {
        self.slots[index.slot()] = slot;
    }

    pub fn present_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_present()).count()
    }
}
