use crate::PathState;

/// Errors raised by controller operations.
///
/// Search outcomes are never errors; they are reported through [`crate::PathStatus`]
/// values and lifecycle callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("cannot start a path computation while {state:?}")]
    Busy { state: PathState },
    #[error("path controller has been destroyed")]
    Destroyed,
}
