use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse PDF: {0}")]
    Decode(String),

    #[error("Failed to render page: {0}")]
    Render(String),

    #[error("Failed to copy page: {0}")]
    Transcribe(String),

    #[error("Failed to write PDF: {0}")]
    Encode(String),

    #[error("Threshold {0} is outside the supported range 10-100")]
    InvalidThreshold(u32),

    #[error("Invalid pixel buffer: {0}")]
    InvalidBuffer(String),
}

/// Error category carried by report diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    Decode,
    Render,
    Transcribe,
    Encode,
    InvalidInput,
}

impl SplitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SplitError::Io(_) => ErrorKind::Io,
            SplitError::Decode(_) => ErrorKind::Decode,
            SplitError::Render(_) => ErrorKind::Render,
            SplitError::Transcribe(_) => ErrorKind::Transcribe,
            SplitError::Encode(_) => ErrorKind::Encode,
            SplitError::InvalidThreshold(_) | SplitError::InvalidBuffer(_) => {
                ErrorKind::InvalidInput
            }
        }
    }
}
