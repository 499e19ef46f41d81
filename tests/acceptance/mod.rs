//! Acceptance scenarios, one module per engine concern.

mod common;
mod blocks_test;
mod persistence_test;
mod power_flow_test;
mod scan_loop_test;
mod scheduling_test;
