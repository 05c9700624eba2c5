//! Error types for the logging system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// No encoder name given to the registry
    #[error("no encoder name specified")]
    NoEncoderName,

    /// Encoder name not found in the registry
    #[error("no encoder registered for name '{0}'")]
    UnknownEncoder(String),

    /// Encoder name already taken in the registry
    #[error("encoder already registered for name '{0}'")]
    EncoderExists(String),

    /// Logger id already registered without force-replace
    #[error("logger already registered for id '{0}'")]
    ExistedLogger(String),

    /// Logger registered with an empty id
    #[error("empty logger id")]
    EmptyLoggerId,

    /// Queue full with buffer details
    #[error("log queue full: {current}/{max} messages buffered")]
    QueueFull { current: usize, max: usize },

    /// Writer already stopped
    #[error("writer stopped")]
    LoggerStopped,

    /// Syslog queue overflow, the record went through the synchronous path
    #[error("syslog writer is busy now, please commit slowly")]
    LoggerBusyNow,

    /// Local fallback cache is at 90% of its quota
    #[error("syslog: cache buffer reached near full")]
    CacheNearFull,

    /// Local fallback cache is over quota
    #[error("syslog: cache buffer reached full")]
    CacheFull,

    /// Syslog priority outside the severity range
    #[error("syslog: invalid priority")]
    InvalidPriority,

    /// Syslog writers only speak TCP
    #[error("syslog only supports tcp")]
    UnsupportedNetwork,

    /// Invalid configuration with details
    #[error("invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Writer error (generic)
    #[error("writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a queue full error with buffer details
    pub fn queue_full(current: usize, max: usize) -> Self {
        LoggerError::QueueFull { current, max }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}

/// Fold a list of errors into one, preserving every message.
///
/// Returns `None` when the list holds no errors, the error itself when it
/// holds exactly one.
pub fn aggregate(errs: Vec<LoggerError>) -> Option<LoggerError> {
    match errs.len() {
        0 => None,
        1 => errs.into_iter().next(),
        _ => {
            let joined = errs
                .iter()
                .enumerate()
                .map(|(i, e)| format!("{}: {}", i, e))
                .collect::<Vec<_>>()
                .join("; ");
            Some(LoggerError::Other(joined))
        }
    }
}
