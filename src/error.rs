use thiserror::Error;

// Unified error type for minim

#[derive(Error, Debug)]
pub enum MinimError {
    #[error("size mismatch for {what}: expected {expected}, got {got}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("degree of freedom {index} out of range [0, {ndof})")]
    IndexOutOfRange { index: usize, ndof: usize },
    #[error("{0} function not defined for this potential")]
    NotDefined(&'static str),
    #[error("index {0} is neither owned nor held as halo on this rank")]
    NotLocal(usize),
    #[error("unknown element type {0}")]
    UnknownElementType(usize),
    #[error("element of type {kind} expects {expected} degrees of freedom, got {got}")]
    ElementShape {
        kind: usize,
        expected: usize,
        got: usize,
    },
    #[error("invalid rank selection: {0}")]
    InvalidRanks(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0} other rank(s) failed during a collective operation")]
    PeerFailed(usize),
    #[error("transport initialisation failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, MinimError>;
