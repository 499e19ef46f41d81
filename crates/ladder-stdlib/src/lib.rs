//! Function blocks driven by ladder rungs.
//!
//! - **Triggers** ([`triggers`]): edge detection shared by edge contacts and counters
//! - **Counters** ([`counters`]): up/down counter with preset, wrap-around and Done/Empty/Full
//! - **Timers** ([`timers`]): multi-mode timer (on-delay, off-delay, pulse) counting in base units
//!
//! # Example
//!
//! ```
//! use ladder_stdlib::counters::{Counter, CounterInputs};
//! use ladder_stdlib::timers::{TimeBase, Timer, TimerMode};
//! use std::time::Duration;
//!
//! let mut counter = Counter::new(2);
//! let out = counter.call(CounterInputs { count_up: true, ..Default::default() });
//! assert_eq!(out.value, 1);
//!
//! let mut timer = Timer::new(1, TimeBase::HundredMillis, TimerMode::OnDelay);
//! timer.call(true);
//! timer.advance(Duration::from_millis(100));
//! assert!(timer.call(true).done);
//! ```

pub mod counters;
pub mod timers;
pub mod triggers;

pub use counters::{Counter, CounterInputs, CounterOutputs, COUNTER_MAX};
pub use timers::{TimeBase, Timer, TimerMode, TimerOutputs};
pub use triggers::{Edge, InputLatch};
