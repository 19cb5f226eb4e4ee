use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Faults that can surface from the decoding core.
///
/// Malformed device input is never an error: it decodes to zero records.
/// Only collaborator failures (reply channel I/O) and programming mistakes
/// in grammar construction are reported through this type.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid grammar: {0}")]
    Grammar(#[from] regex::Error),
}
