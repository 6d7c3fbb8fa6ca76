//! Error handling for plotdata-rs
//!
//! The data pipeline itself never fails: malformed paths, missing fields and
//! unknown topics all degrade to "no data". Errors only surface at the edges,
//! when loading configuration or reading recordings from disk.

use thiserror::Error;

/// Main error type for plotdata-rs operations
#[derive(Error, Debug)]
pub enum PlotDataError {
    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// A message path that could not be parsed where one was required
    #[error("Invalid message path '{path}': {message}")]
    Path { path: String, message: String },

    /// Malformed line in a JSON-lines recording
    #[error("Recording error at line {line}: {message}")]
    Recording { line: usize, message: String },

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PlotDataError>,
    },
}

impl PlotDataError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PlotDataError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for PlotDataError {
    fn from(err: serde_json::Error) -> Self {
        PlotDataError::Serialization(err.to_string())
    }
}

/// Result type alias for plotdata-rs operations
pub type Result<T> = std::result::Result<T, PlotDataError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
