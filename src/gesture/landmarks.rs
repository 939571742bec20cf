//! Hand landmark layout.
//!
//! Landmarks follow the 21-point hand model convention: the wrist at index 0,
//! then four consecutive points per finger ending at the fingertip.

use nalgebra::Point3;

/// One tracked point on a hand, in frame pixel space.
pub type Landmark = Point3<f32>;

pub const LANDMARK_COUNT: usize = 21;
pub const WRIST: usize = 0;

pub const THUMB_CMC: usize = 1;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// Thumb to pinky, the order used by gesture signatures.
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Index of the first landmark of this finger's run.
    pub fn base(self) -> usize {
        match self {
            Finger::Thumb => THUMB_CMC,
            Finger::Index => INDEX_MCP,
            Finger::Middle => MIDDLE_MCP,
            Finger::Ring => RING_MCP,
            Finger::Pinky => PINKY_MCP,
        }
    }

    pub fn tip(self) -> usize {
        match self {
            Finger::Thumb => THUMB_TIP,
            Finger::Index => INDEX_TIP,
            Finger::Middle => MIDDLE_TIP,
            Finger::Ring => RING_TIP,
            Finger::Pinky => PINKY_TIP,
        }
    }

    /// The four landmark indices of this finger, base first.
    pub fn joints(self) -> [usize; 4] {
        let base = self.base();
        [base, base + 1, base + 2, base + 3]
    }
}

/// The full 21-point landmark set of one detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandPose {
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl HandPose {
    pub fn new(landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        HandPose { landmarks }
    }

    /// Builds a pose from `x, y, z` triplets. Returns `None` unless exactly 63 values are given.
    pub fn from_flat(values: &[f32]) -> Option<Self> {
        if values.len() != LANDMARK_COUNT * 3 {
            return None;
        }
        let mut landmarks = [Landmark::origin(); LANDMARK_COUNT];
        for (landmark, xyz) in landmarks.iter_mut().zip(values.chunks_exact(3)) {
            *landmark = Landmark::new(xyz[0], xyz[1], xyz[2]);
        }
        Some(HandPose { landmarks })
    }

    pub fn landmark(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }

    pub fn wrist(&self) -> &Landmark {
        &self.landmarks[WRIST]
    }

    /// Scales x and y by the given factors, leaving depth untouched.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        let mut landmarks = self.landmarks;
        for landmark in landmarks.iter_mut() {
            landmark.x *= sx;
            landmark.y *= sy;
        }
        HandPose { landmarks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finger_runs_cover_all_points_after_wrist() {
        let mut seen: Vec<usize> = Finger::ALL.iter().flat_map(|f| f.joints()).collect();
        seen.sort();
        assert_eq!(seen, (1..LANDMARK_COUNT).collect::<Vec<_>>());
        for finger in Finger::ALL {
            assert_eq!(finger.joints()[3], finger.tip());
        }
    }

    #[test]
    fn test_from_flat() {
        let values: Vec<f32> = (0..63).map(|v| v as f32).collect();
        let pose = HandPose::from_flat(&values).unwrap();
        assert_eq!(*pose.landmark(THUMB_TIP), Landmark::new(12.0, 13.0, 14.0));
        assert_eq!(*pose.landmark(PINKY_TIP), Landmark::new(60.0, 61.0, 62.0));

        assert!(HandPose::from_flat(&values[..60]).is_none());
    }

    #[test]
    fn test_scaled_keeps_depth() {
        let values: Vec<f32> = vec![1.0; 63];
        let pose = HandPose::from_flat(&values).unwrap().scaled(2.0, 3.0);
        assert_eq!(*pose.wrist(), Landmark::new(2.0, 3.0, 1.0));
    }
}
