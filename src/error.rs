//! Error types for the session engine.
//!
//! Errors are split in two layers: [`EngineError`] for failures at the
//! engine boundary (transport, decoding, queue shutdown) and
//! [`ProcessorError`] for failures inside a line processor. Processor
//! errors never escape the dispatch loop; they are converted into
//! `Event::EngineError` and processing continues with the next line.

use thiserror::Error;

/// Convenience type alias for Results using [`EngineError`].
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Severity of a processor failure.
///
/// `Fatal` means the processor aborted the current line because continuing
/// risked corrupting session state. `Warning` means processing continued
/// with a best-effort default. `Desync` is a self-healed protocol
/// disagreement, surfaced only at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// State-corruption risk; the processor aborted this line.
    Fatal,
    /// Recoverable oddity; processing continued.
    Warning,
    /// Self-healing desync; observable via debug logging only.
    Desync,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Warning => write!(f, "warning"),
            Self::Desync => write!(f, "desync"),
        }
    }
}

/// Top-level engine errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// I/O error on the underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Line exceeded the maximum allowed length.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Actual line length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// The output queue was already shut down.
    #[error("output queue closed")]
    QueueClosed,

    /// An ignore-list pattern failed to compile.
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidIgnorePattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compile error.
        #[source]
        source: regex::Error,
    },

    /// Unknown character encoding label given to the decoder.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
}

/// Errors raised by line processors.
///
/// Carries the severity used for error-event reporting; the raw line is
/// attached at the dispatch boundary where it is known.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ProcessorError {
    /// A required parameter was missing from the line.
    #[error("missing parameter {index} for {command}")]
    MissingParameter {
        /// The command being processed.
        command: String,
        /// Index of the missing parameter.
        index: usize,
    },

    /// A mode change letter required a parameter that was not present.
    #[error("mode '{mode}' on {target} requires a parameter")]
    MissingModeParameter {
        /// The mode letter.
        mode: char,
        /// The mode target (channel or nick).
        target: String,
    },

    /// The welcome numeric would overwrite a live identity slot.
    #[error("nickname slot {nickname:?} already occupied during welcome")]
    IdentitySlotOccupied {
        /// The contested nickname.
        nickname: String,
    },

    /// A nick change collided with an existing, different client.
    #[error("nick change to {nickname:?} collides with a known client")]
    NickCollision {
        /// The contested nickname.
        nickname: String,
    },

    /// The session believes it is on a channel it has no membership for.
    #[error("self-join for {channel} but no recorded membership")]
    MembershipDesync {
        /// The channel in question.
        channel: String,
    },

    /// Generic processor failure with a severity and message.
    #[error("{message}")]
    Other {
        /// Reported severity.
        severity: Severity,
        /// Human-readable description.
        message: String,
    },
}

impl ProcessorError {
    /// Severity classification used when converting to an error event.
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingParameter { .. } | Self::MissingModeParameter { .. } => Severity::Fatal,
            Self::IdentitySlotOccupied { .. } | Self::NickCollision { .. } => Severity::Fatal,
            Self::MembershipDesync { .. } => Severity::Fatal,
            Self::Other { severity, .. } => *severity,
        }
    }

    /// Shorthand for a warning-level failure.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Other {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    /// Shorthand for a fatal failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Other {
            severity: Severity::Fatal,
            message: message.into(),
        }
    }
}
