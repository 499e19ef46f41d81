#![doc = "Common types shared across the ladder engine workspace."]

pub mod config;
pub mod error;
pub mod metrics;
pub mod state;
pub mod vars;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use state::*;
pub use vars::*;
