//! Error types for bs
//!
//! Every failure that leaves a command is funneled into [`AppError`]. It
//! carries the user facing message, an optional cause chain, suggested
//! remedies and the exit code the process should terminate with.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

use serde::Serialize;
use thiserror::Error;

/// Boxed error used as the cause of an [`AppError`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Main error type for bs operations
#[derive(Error, Debug)]
#[error("{message}")]
pub struct AppError {
    message: String,

    #[source]
    cause: Option<BoxError>,

    suggestions: Vec<String>,

    exit_code: Option<i32>,

    trace: Box<Backtrace>,
}

/// Machine readable form of an [`AppError`] and its cause chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorJson {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorJson>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl AppError {
    /// Create an error with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            suggestions: Vec::new(),
            exit_code: None,
            trace: Box::new(Backtrace::capture()),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// The code the process should exit with for this error
    ///
    /// Defaults to 1. Codes that can't be represented as a failing process
    /// status (0, negative, or above 255) also map to 1.
    pub fn process_exit_code(&self) -> u8 {
        self.exit_code
            .and_then(|code| u8::try_from(code).ok())
            .filter(|code| *code != 0)
            .unwrap_or(1)
    }

    /// Wrap `cause` under a new message
    ///
    /// If `cause` is already an [`AppError`], the new error keeps its cause
    /// chain, exit code and suggestions (with `suggestions` appended), and
    /// only the message is replaced. Any other error becomes the cause of a
    /// fresh [`AppError`].
    pub fn extend<E, I, S>(message: impl Into<String>, cause: E, suggestions: I) -> Self
    where
        E: Into<anyhow::Error>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let message = message.into();
        let extended = match Into::<anyhow::Error>::into(cause).downcast::<AppError>() {
            Ok(app) => Self {
                message,
                ..app
            },
            Err(raw) => Self::new(message).with_cause(raw),
        };

        extended.with_suggestions(suggestions)
    }

    /// Normalize any error into an [`AppError`]
    ///
    /// Domain errors pass through untouched, unless context was attached on
    /// top of them, in which case the outermost context becomes the message.
    pub fn extend_if_needed(error: anyhow::Error) -> Self {
        let top = error.to_string();

        match error.downcast::<AppError>() {
            Ok(app) if app.message == top => app,
            Ok(app) => Self {
                message: top,
                ..app
            },
            Err(raw) => Self::new(top).with_cause(raw),
        }
    }

    /// Serialize the error and its full cause chain
    pub fn to_json(&self) -> ErrorJson {
        ErrorJson {
            message: self.message.clone(),
            suggestions: (!self.suggestions.is_empty()).then(|| self.suggestions.clone()),
            cause: self
                .cause
                .as_deref()
                .map(|cause| Box::new(source_to_json(cause))),
            exit_code: self.exit_code,
        }
    }

    /// Render the error for a human
    ///
    /// Without `show_stack` this is the message followed by one suggestion
    /// per line. With it, the whole `Caused by:` chain is printed, plus the
    /// backtrace when one was captured (`RUST_BACKTRACE=1`).
    pub fn to_display_string(&self, show_stack: bool) -> String {
        let mut lines = vec![self.message.clone()];

        if show_stack {
            let mut source = self.source();
            while let Some(cause) = source {
                lines.push(format!("Caused by: {}", cause));
                source = cause.source();
            }

            if self.trace.status() == BacktraceStatus::Captured {
                lines.push(self.trace.to_string().trim_end().to_string());
            }
        }

        lines.extend(self.suggestions.iter().cloned());
        lines.join("\n")
    }
}

#[cfg(test)]
impl AppError {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// The exit code explicitly attached to this error, if any
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

fn source_to_json(error: &(dyn StdError + 'static)) -> ErrorJson {
    if let Some(app) = error.downcast_ref::<AppError>() {
        return app.to_json();
    }

    ErrorJson {
        message: error.to_string(),
        suggestions: None,
        cause: error.source().map(|source| Box::new(source_to_json(source))),
        exit_code: None,
    }
}

/// Result type alias for bs operations
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn io_error(message: &str) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, message.to_string())
    }

    #[test]
    fn test_error_display() {
        let err = AppError::new("Missing required package: eslint");
        assert_eq!(err.to_string(), "Missing required package: eslint");
        assert_eq!(err.to_display_string(false), "Missing required package: eslint");

        let err = err.with_suggestion("Run `pnpm add eslint` to install the package");
        assert_eq!(
            err.to_display_string(false),
            "Missing required package: eslint\nRun `pnpm add eslint` to install the package"
        );
    }

    #[test]
    fn test_exit_code_defaults() {
        assert_eq!(AppError::new("boom").exit_code(), None);
        assert_eq!(AppError::new("boom").process_exit_code(), 1);
        assert_eq!(AppError::new("boom").with_exit_code(3).process_exit_code(), 3);
        assert_eq!(AppError::new("boom").with_exit_code(0).process_exit_code(), 1);
        assert_eq!(AppError::new("boom").with_exit_code(-9).process_exit_code(), 1);
        assert_eq!(AppError::new("boom").with_exit_code(300).process_exit_code(), 1);
    }

    #[test]
    fn test_extend_raw_error() {
        let err = AppError::extend("Failed to read config", io_error("permission denied"), ["Check permissions"]);

        assert_eq!(err.message(), "Failed to read config");
        assert_eq!(err.suggestions(), ["Check permissions"]);
        assert_eq!(err.exit_code(), None);
        assert_eq!(err.source().unwrap().to_string(), "permission denied");
    }

    #[test]
    fn test_extend_preserves_metadata() {
        let inner = AppError::extend("first", io_error("disk full"), ["free some space"]).with_exit_code(4);
        let outer = AppError::extend("second", inner, Vec::<String>::new());

        assert_eq!(outer.message(), "second");
        assert_eq!(outer.suggestions(), ["free some space"]);
        assert_eq!(outer.exit_code(), Some(4));
        assert_eq!(outer.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn test_extend_appends_suggestions() {
        let inner = AppError::new("first").with_suggestion("one");
        let outer = AppError::extend("second", inner, ["two"]);

        assert_eq!(outer.suggestions(), ["one", "two"]);
    }

    #[test]
    fn test_extend_if_needed() {
        let app = AppError::new("already domain").with_exit_code(7);
        let err = AppError::extend_if_needed(app.into());
        assert_eq!(err.message(), "already domain");
        assert_eq!(err.exit_code(), Some(7));

        let err = AppError::extend_if_needed(anyhow::anyhow!("disk full"));
        assert_eq!(err.message(), "disk full");
        assert!(err.source().is_some());

        let contextual: anyhow::Result<()> = Err(AppError::new("inner").with_exit_code(5).into());
        let err = AppError::extend_if_needed(contextual.context("outer").unwrap_err());
        assert_eq!(err.message(), "outer");
        assert_eq!(err.exit_code(), Some(5));
    }

    #[test]
    fn test_to_json_chain() {
        let inner = AppError::new("pnpm failed").with_exit_code(2);
        let outer = AppError::new("Build failed")
            .with_cause(inner)
            .with_suggestion("Run `pnpm install`");

        let json = outer.to_json();
        assert_eq!(json.message, "Build failed");
        assert_eq!(json.suggestions, Some(vec!["Run `pnpm install`".to_string()]));
        assert_eq!(json.exit_code, None);

        let cause = json.cause.unwrap();
        assert_eq!(cause.message, "pnpm failed");
        assert_eq!(cause.exit_code, Some(2));
        assert!(cause.cause.is_none());
    }

    #[test]
    fn test_to_json_serialization() {
        let err = AppError::extend("Failed to load config", io_error("no access"), Vec::<String>::new()).with_exit_code(1);
        let value = serde_json::to_value(err.to_json()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "message": "Failed to load config",
                "cause": { "message": "no access" },
                "exitCode": 1
            })
        );
    }

    #[test]
    fn test_display_with_stack() {
        let err = AppError::extend("Failed to load config", io_error("no access"), ["Fix it"]);
        let display = err.to_display_string(true);

        assert!(display.starts_with("Failed to load config"));
        assert!(display.contains("Caused by: no access"));
        assert!(display.ends_with("Fix it"));
    }

    #[test]
    fn test_result_type() {
        fn operation_that_fails() -> Result<i32> {
            Err(AppError::new("missing"))
        }

        assert!(operation_that_fails().is_err());
    }
}
