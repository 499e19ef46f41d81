//! Edge detection on boolean signals.
//!
//! A transition is only seen by comparing against a latched previous
//! sample; where that sample is taken (per call, or once per cycle) is
//! up to the owner.

use serde::{Deserialize, Serialize};

/// Transition direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// FALSE → TRUE.
    Rising,
    /// TRUE → FALSE.
    Falling,
}

impl Edge {
    /// True when going from `previous` to `current` is a transition in this direction.
    ///
    /// ```
    /// use ladder_stdlib::Edge;
    ///
    /// assert!(Edge::Rising.detect(false, true));
    /// assert!(!Edge::Rising.detect(true, true));
    /// assert!(Edge::Falling.detect(true, false));
    /// ```
    #[must_use]
    pub fn detect(self, previous: bool, current: bool) -> bool {
        match self {
            Self::Rising => current && !previous,
            Self::Falling => !current && previous,
        }
    }
}

/// One boolean input with its previous-call shadow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLatch {
    current: bool,
    previous: bool,
}

impl InputLatch {
    /// Latch a new sample, shifting the old one into the shadow.
    pub fn sample(&mut self, value: bool) {
        self.previous = self.current;
        self.current = value;
    }

    /// Latest sample.
    #[must_use]
    pub fn current(&self) -> bool {
        self.current
    }

    /// Sample before the latest.
    #[must_use]
    pub fn previous(&self) -> bool {
        self.previous
    }

    /// True if the last sample completed a rising edge.
    #[must_use]
    pub fn rising(&self) -> bool {
        Edge::Rising.detect(self.previous, self.current)
    }

    /// True if the last sample completed a falling edge.
    #[must_use]
    pub fn falling(&self) -> bool {
        Edge::Falling.detect(self.previous, self.current)
    }

    /// Forget both samples.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
