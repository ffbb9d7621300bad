// Retraction tracking
//
// After most gestures the hand swings back to rest, and the model vocabulary
// has a dedicated "<gesture>R" class for that return motion. A retraction
// never moves the vehicle; the tracker only tells whether it released the
// gesture that preceded it.

/// Suffix marking a retraction label
pub const RETRACTION_SUFFIX: char = 'R';

/// Base gesture of a retraction label, e.g. `wp_next` for `wp_nextR`
pub fn retraction_base(label: &str) -> Option<&str> {
    label
        .strip_suffix(RETRACTION_SUFFIX)
        .filter(|base| !base.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetractionOutcome {
    /// Not a retraction
    Gesture,
    /// Retraction of the previous validated gesture
    Paired { gesture: String },
    /// Retraction with no matching predecessor
    Unpaired,
}

impl RetractionOutcome {
    pub fn is_retraction(&self) -> bool {
        !matches!(self, RetractionOutcome::Gesture)
    }
}

/// Remembers the last validated gesture awaiting its release
#[derive(Debug, Clone, Default)]
pub struct RetractionTracker {
    pending: Option<String>,
}

impl RetractionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Classify a validated label and update the pending gesture
    pub fn observe(&mut self, label: &str) -> RetractionOutcome {
        match retraction_base(label) {
            Some(base) if self.pending.as_deref() == Some(base) => {
                self.pending = None;
                RetractionOutcome::Paired {
                    gesture: base.to_string(),
                }
            }
            Some(_) => RetractionOutcome::Unpaired,
            None => {
                self.pending = Some(label.to_string());
                RetractionOutcome::Gesture
            }
        }
    }
}
