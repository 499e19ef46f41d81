//! Multi-mode timer block.
//!
//! The timer counts whole base units. Scan periods rarely line up with
//! the base, so the time below one unit is carried over in a sub-base
//! accumulator instead of being dropped.
//!
//! Time is fed separately from the logic: [`Timer::advance`] is called once
//! per cycle with the elapsed time before the rungs run, then
//! [`Timer::call`] evaluates the mode with the input seen by the rung.
//!
//! ```text
//! On-delay   IN  ___/‾‾‾‾‾‾‾‾‾‾\____      Off-delay  IN  ___/‾‾‾\__________
//!            Q   ______/‾‾‾‾‾‾‾\____                 Q   ___/‾‾‾‾‾‾‾‾‾\____
//!                   |PT|                                       |PT |
//!
//! Pulse      IN  ___/‾\___/‾‾‾‾‾‾‾‾‾
//!            Q   ___/‾‾‾‾‾\_________      (non-retriggerable)
//!                   | PT |
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timer behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Output rises once the input has been held for the preset.
    #[default]
    OnDelay,
    /// Output follows the input up, then stays up for the preset after it drops.
    OffDelay,
    /// Fixed-length pulse on a rising edge.
    Pulse,
}

/// Unit in which preset and value are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// 1 ms.
    Millis,
    /// 100 ms.
    HundredMillis,
    /// 1 s.
    #[default]
    Seconds,
    /// 1 min.
    Minutes,
}

impl TimeBase {
    /// Length of one unit.
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::Millis => Duration::from_millis(1),
            Self::HundredMillis => Duration::from_millis(100),
            Self::Seconds => Duration::from_secs(1),
            Self::Minutes => Duration::from_secs(60),
        }
    }

    fn nanos(self) -> u64 {
        // At most 60e9, fits comfortably.
        u64::try_from(self.duration().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Outputs of one timer call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerOutputs {
    /// Timer output (Q).
    pub done: bool,
    /// Time is being accumulated.
    pub running: bool,
    /// Elapsed base units.
    pub value: i32,
}

/// Timer function block.
///
/// # Example
///
/// ```
/// use ladder_stdlib::timers::{TimeBase, Timer, TimerMode};
/// use std::time::Duration;
///
/// let mut timer = Timer::new(2, TimeBase::Seconds, TimerMode::OnDelay);
/// assert!(!timer.call(true).done);
///
/// // 1.5 s then 0.5 s: the half second is not lost between calls
/// timer.advance(Duration::from_millis(1500));
/// assert_eq!(timer.call(true).value, 1);
/// timer.advance(Duration::from_millis(500));
/// assert!(timer.call(true).done);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    preset: i32,
    base: TimeBase,
    mode: TimerMode,
    value: i32,
    input: bool,
    input_prev: bool,
    started: bool,
    output: bool,
    /// Nanoseconds accumulated below one base unit.
    sub_base_ns: u64,
}

impl Timer {
    /// Create an idle timer.
    #[must_use]
    pub fn new(preset: i32, base: TimeBase, mode: TimerMode) -> Self {
        Self {
            preset: preset.max(0),
            base,
            mode,
            ..Self::default()
        }
    }

    /// Accumulate elapsed time while counting.
    pub fn advance(&mut self, elapsed: Duration) {
        if !self.started {
            return;
        }
        let elapsed_ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let base_ns = self.base.nanos();
        let total = self.sub_base_ns.saturating_add(elapsed_ns);
        let units = i32::try_from(total / base_ns).unwrap_or(i32::MAX);
        self.sub_base_ns = total % base_ns;
        if self.value < self.preset {
            self.value = self.value.saturating_add(units).min(self.preset);
        }
    }

    /// Evaluate the timer against the input level seen this cycle.
    pub fn call(&mut self, input: bool) -> TimerOutputs {
        self.input = input;
        match self.mode {
            TimerMode::OnDelay => self.on_delay(),
            TimerMode::OffDelay => self.off_delay(),
            TimerMode::Pulse => self.pulse(),
        }
        self.input_prev = input;
        self.outputs()
    }

    fn on_delay(&mut self) {
        if self.input {
            if !self.started && !self.output {
                self.start();
            }
            if self.started && self.value >= self.preset {
                self.started = false;
                self.output = true;
            }
        } else {
            self.started = false;
            self.output = false;
            self.value = 0;
            self.sub_base_ns = 0;
        }
    }

    fn off_delay(&mut self) {
        if self.input {
            self.started = false;
            self.output = true;
            self.value = 0;
            self.sub_base_ns = 0;
        } else if self.input_prev && self.output {
            self.start();
        }
        if self.started && self.value >= self.preset {
            self.started = false;
            self.output = false;
        }
    }

    fn pulse(&mut self) {
        if !self.started && self.input && !self.input_prev {
            self.start();
            self.output = true;
        }
        if self.started && self.value >= self.preset {
            self.started = false;
            self.output = false;
            self.value = 0;
            self.sub_base_ns = 0;
        }
    }

    fn start(&mut self) {
        self.started = true;
        self.value = 0;
        self.sub_base_ns = 0;
    }

    /// Outputs as of the last call.
    #[must_use]
    pub fn outputs(&self) -> TimerOutputs {
        TimerOutputs {
            done: self.output,
            running: self.started,
            value: self.value,
        }
    }

    /// Preset in base units.
    #[must_use]
    pub fn preset(&self) -> i32 {
        self.preset
    }

    /// Base unit.
    #[must_use]
    pub fn base(&self) -> TimeBase {
        self.base
    }

    /// Mode.
    #[must_use]
    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    /// Elapsed base units.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Time carried below one base unit.
    #[must_use]
    pub fn sub_base(&self) -> Duration {
        Duration::from_nanos(self.sub_base_ns)
    }

    /// Reconfigure preset, base and mode, clearing runtime state.
    pub fn configure(&mut self, preset: i32, base: TimeBase, mode: TimerMode) {
        *self = Self::new(preset, base, mode);
    }

    /// Change only the preset, keeping the runtime state.
    pub fn set_preset(&mut self, preset: i32) {
        self.preset = preset.max(0);
    }

    /// Clear runtime state, keeping the configuration.
    pub fn reset(&mut self) {
        *self = Self::new(self.preset, self.base, self.mode);
    }
}
