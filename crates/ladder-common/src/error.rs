use thiserror::Error;

/// Errors surfaced synchronously to whoever configures or edits the engine.
///
/// Scan-time faults are not represented here: the runtime records those as
/// fault events and keeps scanning.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LadderError {
    /// Generic configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An index into one of the fixed-capacity tables is out of range.
    #[error("{what} index {index} out of range (capacity {capacity})")]
    OutOfRange {
        /// Table being addressed ("rung", "section", "counter", ...).
        what: &'static str,
        /// Requested index.
        index: usize,
        /// Table capacity.
        capacity: usize,
    },

    /// Every slot of a function-block table is owned by a live element.
    #[error("no free {0} slot")]
    NoFreeSlot(&'static str),

    /// An element cannot be placed at the requested cell.
    #[error("invalid placement at ({x}, {y}): {reason}")]
    Placement {
        /// Column of the requested cell.
        x: usize,
        /// Row of the requested cell.
        y: usize,
        /// Why the placement was rejected.
        reason: String,
    },

    /// Compare/Operate expression failed to parse or validate.
    #[error("expression error: {0}")]
    Expression(String),

    /// Textual variable address could not be parsed.
    #[error("invalid variable address: {0}")]
    InvalidAddress(String),

    /// A persisted project references tables inconsistently.
    #[error("invalid project: {0}")]
    Project(String),

    /// A scan was requested while the engine is not running.
    #[error("engine not running (state {0})")]
    NotRunning(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Convenience type alias for engine configuration and editing operations.
pub type LadderResult<T> = Result<T, LadderError>;
