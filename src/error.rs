use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building images, assembling source,
/// or poking at machine state.
///
/// All of these are reported before any state is touched: a failed call
/// leaves the machine or image exactly as it was.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is not a byte value (expected 0..=255)")]
    OutOfRange(i64),
    #[error("opcode {0} is not a documented instruction")]
    UnmappedOpcode(u8),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("container decoded to {decoded} program bytes, expected 256")]
    MalformedImage { decoded: usize },
    #[error("expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnknownMnemonic,
    ValueOutOfRange,
    /// More tokens than memory cells.
    ProgramTooLong,
}

/// Assembly failure, carrying the token that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: `{token}`", describe(.reason))]
pub struct ParseError {
    pub reason: ParseErrorKind,
    pub token: String,
}

impl ParseError {
    pub fn new(reason: ParseErrorKind, token: &str) -> Self {
        Self {
            reason,
            token: token.to_string(),
        }
    }
}

fn describe(kind: &ParseErrorKind) -> &'static str {
    match kind {
        ParseErrorKind::UnknownMnemonic => "unknown mnemonic",
        ParseErrorKind::ValueOutOfRange => "expected a byte value in 0..=255",
        ParseErrorKind::ProgramTooLong => "program does not fit in 256 bytes",
    }
}
