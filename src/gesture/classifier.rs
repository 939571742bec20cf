//! Finger geometry to sign label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gesture::catalog::SignCatalog;
use crate::gesture::landmarks::{Finger, HandPose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerPosition {
    Up,
    Closed,
}

impl FingerPosition {
    /// Image y grows downwards, so a raised tip has the smaller y.
    pub fn of(hand: &HandPose, finger: Finger) -> Self {
        if hand.landmark(finger.tip()).y < hand.landmark(finger.base()).y {
            FingerPosition::Up
        } else {
            FingerPosition::Closed
        }
    }
}

/// Per-finger positions, thumb to pinky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GestureSignature([FingerPosition; 5]);

impl GestureSignature {
    pub const fn new(
        thumb: FingerPosition,
        index: FingerPosition,
        middle: FingerPosition,
        ring: FingerPosition,
        pinky: FingerPosition,
    ) -> Self {
        GestureSignature([thumb, index, middle, ring, pinky])
    }

    pub fn from_hand(hand: &HandPose) -> Self {
        GestureSignature(Finger::ALL.map(|finger| FingerPosition::of(hand, finger)))
    }

    pub fn position(&self, finger: Finger) -> FingerPosition {
        self.0[finger as usize]
    }
}

impl fmt::Display for GestureSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for position in self.0 {
            let c = match position {
                FingerPosition::Up => 'U',
                FingerPosition::Closed => 'C',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Outcome of classifying one hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classification {
    Sign(String),
    Unknown,
}

impl Classification {
    pub fn label(&self) -> Option<&str> {
        match self {
            Classification::Sign(label) => Some(label),
            Classification::Unknown => None,
        }
    }
}

/// classify maps one hand to the label of the first catalog entry with the same signature.
///
/// # Arguments
/// * `hand` - landmarks of the hand to classify
/// * `catalog` - ordered sign catalog
///
/// # Returns
/// * `Classification`
pub fn classify(hand: &HandPose, catalog: &SignCatalog) -> Classification {
    let signature = GestureSignature::from_hand(hand);
    match catalog.lookup(&signature) {
        Some(label) => Classification::Sign(label.to_string()),
        None => Classification::Unknown,
    }
}
