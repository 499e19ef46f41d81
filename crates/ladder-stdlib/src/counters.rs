//! Up/down counter block.
//!
//! The counter counts rising edges on its CountUp and CountDown inputs
//! inside `0..=COUNTER_MAX`, wrapping around at both ends. Reset and
//! Preset are level inputs; Reset wins over Preset, which wins over
//! counting.
//!
//! ```text
//!          +-----------+
//!  Reset --| R       E |-- Empty (wrapped below zero this call)
//! Preset --| P       D |-- Done  (value == preset)
//!     Up --| U       F |-- Full  (wrapped above max this call)
//!   Down --| D         |
//!          +-----------+
//! ```

use crate::triggers::InputLatch;
use serde::{Deserialize, Serialize};

/// Largest counter value; one more count wraps to 0.
pub const COUNTER_MAX: i32 = 9999;

/// Input levels of one counter call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterInputs {
    /// Force the value to 0.
    pub reset: bool,
    /// Force the value to the preset.
    pub preset: bool,
    /// Count up on rising edge.
    pub count_up: bool,
    /// Count down on rising edge.
    pub count_down: bool,
}

/// Outputs of one counter call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterOutputs {
    /// Underflow happened on this call.
    pub empty: bool,
    /// Value equals preset.
    pub done: bool,
    /// Overflow happened on this call.
    pub full: bool,
    /// Current value.
    pub value: i32,
}

/// Counter function block.
///
/// # Example
///
/// ```
/// use ladder_stdlib::counters::{Counter, CounterInputs, COUNTER_MAX};
///
/// let mut counter = Counter::new(3);
/// let up = CounterInputs { count_up: true, ..Default::default() };
/// let idle = CounterInputs::default();
///
/// counter.call(up);
/// counter.call(idle);
/// counter.call(up);
/// counter.call(idle);
/// let out = counter.call(up);
/// assert_eq!(out.value, 3);
/// assert!(out.done);
///
/// // Counting down from zero wraps to the maximum
/// let mut counter = Counter::new(0);
/// let out = counter.call(CounterInputs { count_down: true, ..Default::default() });
/// assert_eq!(out.value, COUNTER_MAX);
/// assert!(out.empty);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    preset: i32,
    value: i32,
    /// Value before the last call.
    value_prev: i32,
    reset_in: InputLatch,
    preset_in: InputLatch,
    up_in: InputLatch,
    down_in: InputLatch,
    #[serde(skip)]
    outputs: CounterOutputs,
}

impl Counter {
    /// Create a counter at zero with the given preset.
    #[must_use]
    pub fn new(preset: i32) -> Self {
        Self {
            preset: preset.clamp(0, COUNTER_MAX),
            ..Self::default()
        }
    }

    /// Execute one evaluation with the given input levels.
    pub fn call(&mut self, inputs: CounterInputs) -> CounterOutputs {
        self.reset_in.sample(inputs.reset);
        self.preset_in.sample(inputs.preset);
        self.up_in.sample(inputs.count_up);
        self.down_in.sample(inputs.count_down);

        self.value_prev = self.value;
        let forced = inputs.reset || inputs.preset;

        if inputs.reset {
            self.value = 0;
        } else if inputs.preset {
            self.value = self.preset;
        } else {
            if self.up_in.rising() {
                self.value = if self.value >= COUNTER_MAX { 0 } else { self.value + 1 };
            }
            if self.down_in.rising() {
                self.value = if self.value <= 0 { COUNTER_MAX } else { self.value - 1 };
            }
        }

        self.outputs = CounterOutputs {
            empty: !forced && self.value_prev == 0 && self.value == COUNTER_MAX,
            done: self.value == self.preset,
            full: !forced && self.value_prev == COUNTER_MAX && self.value == 0,
            value: self.value,
        };
        self.outputs
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Value before the last call.
    #[must_use]
    pub fn value_prev(&self) -> i32 {
        self.value_prev
    }

    /// Configured preset.
    #[must_use]
    pub fn preset(&self) -> i32 {
        self.preset
    }

    /// Change the preset (clamped to the counting range).
    pub fn set_preset(&mut self, preset: i32) {
        self.preset = preset.clamp(0, COUNTER_MAX);
    }

    /// Outputs of the last call.
    #[must_use]
    pub fn outputs(&self) -> CounterOutputs {
        self.outputs
    }

    /// Force the current value, keeping the input latches.
    pub fn set_value(&mut self, value: i32) {
        self.value = value.clamp(0, COUNTER_MAX);
    }

    /// Clear runtime state, keeping the preset.
    pub fn reset(&mut self) {
        *self = Self::new(self.preset);
    }
}
