use std::fmt;

use thiserror::Error;

use crate::format::Format;

pub type Result<T, E = ResultsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("the results are being written by another process")]
    DataLocked,
    #[error("the results are not valid: {0}")]
    DataInvalid(String),
    #[error("the stream {path} cannot be opened: {reason}")]
    StreamAccessFailure { path: String, reason: String },
    #[error("the stream cannot be written: {0}")]
    StreamWritingFailure(String),
    #[error("the file {path} cannot be replaced: {reason}")]
    FileAccessFailure { path: String, reason: String },
    #[error("the format is not supported: {0}")]
    FormatUnsupported(String),
    #[error("parsing error: {0}")]
    ParsingError(String),
    #[error("the operation has been aborted")]
    Aborted,
    #[error("invalid threaded access")]
    Busy,
    #[error("the background worker panicked")]
    WorkerPanicked,
    #[error("the background worker cannot be started: {0}")]
    WorkerUnavailable(String),
}

impl ResultsError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::DataInvalid(reason.into())
    }

    pub fn parsing(reason: impl Into<String>) -> Self {
        Self::ParsingError(reason.into())
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::FormatUnsupported(reason.into())
    }

    pub fn writing(error: impl fmt::Display) -> Self {
        Self::StreamWritingFailure(error.to_string())
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<serde_json::Error> for ResultsError {
    fn from(value: serde_json::Error) -> Self {
        if value.is_io() {
            return Self::StreamWritingFailure(value.to_string());
        }
        Self::ParsingError(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Import,
    Export,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Import => f.write_str("import"),
            Self::Export => f.write_str("export"),
        }
    }
}

/// A failed import or export, worded for the person who asked for it.
#[derive(Debug, Error)]
pub struct TrackFailure {
    pub operation: Operation,
    pub track: String,
    pub format: Option<Format>,
    #[source]
    pub error: ResultsError,
}

impl TrackFailure {
    pub fn new(
        operation: Operation,
        track: impl Into<String>,
        format: Option<Format>,
        error: ResultsError,
    ) -> Self {
        Self {
            operation,
            track: track.into(),
            format,
            error,
        }
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.error.is_aborted()
    }
}

impl fmt::Display for TrackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The {} of the track {}", self.operation, self.track)?;
        if let Some(format) = self.format {
            write!(f, " as {format}")?;
        }
        if self.error.is_aborted() {
            f.write_str(" has been aborted.")
        } else {
            write!(f, " failed because {}.", self.error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_follows_template() {
        let failure = TrackFailure::new(
            Operation::Export,
            "Chords",
            Some(Format::Cue),
            ResultsError::unsupported("columns cannot be written as CUE"),
        );
        assert_eq!(
            failure.to_string(),
            "The export of the track Chords as CUE failed because the format is not supported: columns cannot be written as CUE."
        );
    }

    #[test]
    fn aborted_message_has_no_reason() {
        let failure =
            TrackFailure::new(Operation::Import, "Beats", Some(Format::Json), ResultsError::Aborted);
        assert!(failure.is_aborted());
        assert_eq!(
            failure.to_string(),
            "The import of the track Beats as JSON has been aborted."
        );
    }
}
