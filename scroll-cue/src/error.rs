use std::fmt;
use std::ops::Range;

/// All errors produced while loading or validating a story.
///
/// Runtime misses (a selector that matches nothing, a rejected `play()`)
/// are never errors; they are logged and the affected piece goes inert.
#[derive(Debug)]
pub struct CueError {
    pub kind: ErrorKind,
    pub span: Option<Range<usize>>,
    pub source_text: Option<String>,
}

#[derive(Debug)]
pub enum ErrorKind {
    /// Selector lexer hit a character it does not understand.
    UnrecognizedToken(String),
    /// Selector tokens were valid but arranged wrongly.
    InvalidSelector {
        selector: String,
        reason: String,
    },
    /// Scroll threshold was negative, NaN or infinite.
    InvalidThreshold {
        selector: String,
        value: f64,
    },
    /// Visibility fraction for an observer outside `0.0..=1.0`.
    InvalidFraction {
        name: String,
        value: f64,
    },
    /// Two entries share a name that must be unique.
    Duplicate {
        what: &'static str,
        name: String,
    },
    /// Story JSON failed to deserialize.
    Story(String),
    /// Story file could not be read.
    Io {
        path: String,
        message: String,
    },
    /// General message.
    Message(String),
}

impl fmt::Display for CueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::UnrecognizedToken(tok) => {
                write!(f, "unrecognized selector token: {tok}")
            }
            ErrorKind::InvalidSelector { selector, reason } => {
                write!(f, "invalid selector '{selector}': {reason}")
            }
            ErrorKind::InvalidThreshold { selector, value } => {
                write!(
                    f,
                    "scroll threshold for '{selector}' must be finite and non-negative, got {value}"
                )
            }
            ErrorKind::InvalidFraction { name, value } => {
                write!(f, "visibility fraction for '{name}' must be within 0..=1, got {value}")
            }
            ErrorKind::Duplicate { what, name } => {
                write!(f, "duplicate {what}: {name}")
            }
            ErrorKind::Story(msg) => write!(f, "malformed story: {msg}"),
            ErrorKind::Io { path, message } => {
                write!(f, "cannot read '{path}': {message}")
            }
            ErrorKind::Message(msg) => write!(f, "{msg}"),
        }?;

        if let Some(span) = &self.span {
            write!(f, " (at byte {}..{})", span.start, span.end)?;
        }

        Ok(())
    }
}

impl std::error::Error for CueError {}

pub type Result<T> = std::result::Result<T, CueError>;

/// Shorthand constructors.
impl CueError {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            span: None,
            source_text: None,
        }
    }

    pub fn invalid_selector(selector: &str, reason: &str, span: Option<Range<usize>>) -> Self {
        Self {
            kind: ErrorKind::InvalidSelector {
                selector: selector.to_string(),
                reason: reason.to_string(),
            },
            span,
            source_text: Some(selector.to_string()),
        }
    }

    pub fn invalid_threshold(selector: &str, value: f64) -> Self {
        Self::new(ErrorKind::InvalidThreshold {
            selector: selector.to_string(),
            value,
        })
    }

    pub fn invalid_fraction(name: &str, value: f64) -> Self {
        Self::new(ErrorKind::InvalidFraction {
            name: name.to_string(),
            value,
        })
    }

    pub fn duplicate(what: &'static str, name: &str) -> Self {
        Self::new(ErrorKind::Duplicate {
            what,
            name: name.to_string(),
        })
    }

    pub fn story(err: &serde_json::Error) -> Self {
        Self::new(ErrorKind::Story(err.to_string()))
    }

    pub fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::new(ErrorKind::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }

    /// General validation error with a message.
    pub fn message(msg: &str) -> Self {
        Self::new(ErrorKind::Message(msg.to_string()))
    }
}
