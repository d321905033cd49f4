use std::fmt;

/// Pipeline-specific error types.
///
/// Business-rule failures (missing data, excluded statuses, failed
/// quality checks, invalid templates) are represented as data in the
/// stage results, never as errors. This type exists only for caller
/// precondition violations, which are rejected immediately and loudly.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Malformed scoring configuration (negative weight, inverted
    /// thresholds, zero max-distance).
    InvalidConfig(String),
    /// A required numeric input was non-finite or otherwise unusable.
    InvalidInput(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<PipelineError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for PipelineError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            PipelineError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            PipelineError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `PipelineError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, PipelineError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| PipelineError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::InvalidConfig("weights sum to zero".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Invalid configuration"));
        assert!(display.contains("weights sum to zero"));
    }

    #[test]
    fn test_context_chain() {
        let err: Result<(), PipelineError> =
            Err(PipelineError::InvalidInput("NaN price".to_string()));
        let wrapped = err.context("scoring comp batch");
        let display = format!("{}", wrapped.unwrap_err());
        assert!(display.contains("scoring comp batch"));
        assert!(display.contains("NaN price"));
    }
}
