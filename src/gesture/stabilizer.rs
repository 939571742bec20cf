//! Two-frame confirmation of raw classifications.

use crate::gesture::classifier::Classification;

/// Edge-triggered debounce: a sign is emitted once, on the second consecutive
/// identical classification, and not again until the classification changes
/// or the state is reset.
#[derive(Debug, Clone, Default)]
pub struct Stabilizer {
    last_raw: Option<Classification>,
    confirmed: bool,
}

impl Stabilizer {
    pub fn new() -> Self {
        Stabilizer::default()
    }

    /// Feeds one classification and returns the label to emit, if any.
    pub fn observe(&mut self, raw: Classification) -> Option<String> {
        if self.last_raw.as_ref() != Some(&raw) {
            self.last_raw = Some(raw);
            self.confirmed = false;
            return None;
        }
        if self.confirmed {
            return None;
        }
        self.confirmed = true;
        match raw {
            Classification::Sign(label) => Some(label),
            Classification::Unknown => None,
        }
    }

    pub fn reset(&mut self) {
        self.last_raw = None;
        self.confirmed = false;
    }

    /// The label currently held as confirmed, if any.
    pub fn confirmed(&self) -> Option<&str> {
        if !self.confirmed {
            return None;
        }
        self.last_raw.as_ref().and_then(Classification::label)
    }
}
