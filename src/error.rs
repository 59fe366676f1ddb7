use thiserror::Error;

/// Structured error context for configuration and runtime errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "concurrency", "PACED_WORK_MS")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "stream_driver")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for paced processing and spaced dispatch.
///
/// User-supplied failures (from a work function, a work unit or a dispatched
/// operation) are carried unchanged as [`anyhow::Error`]; use
/// [`Error::work_error`] to get them back and `downcast_ref` to the concrete type.
#[derive(Debug, Error)]
pub enum Error {
    /// The work function returned an error while expanding an item.
    #[error("Work function failed while expanding an item: {source}")]
    Expansion { source: anyhow::Error },

    /// A launched work unit resolved to an error.
    #[error("Work unit {index} of chunk failed: {source}")]
    Unit { index: usize, source: anyhow::Error },

    /// The processor was used without a work function.
    #[error("Required work function")]
    MissingWorkFunction,

    /// An operation handed to the spaced dispatcher failed.
    #[error("Dispatched operation {index} failed: {source}")]
    Dispatch { index: usize, source: anyhow::Error },

    /// The processor already finished or failed and cannot be reused.
    #[error("Processor is {state} and accepts no more input")]
    Terminated { state: &'static str },

    /// The downstream consumer went away.
    #[error("Output receiver closed")]
    OutputClosed,

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The user's original error, for failures raised by user code.
    pub fn work_error(&self) -> Option<&anyhow::Error> {
        match self {
            Error::Expansion { source }
            | Error::Unit { source, .. }
            | Error::Dispatch { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Convenience for `work_error().and_then(|e| e.downcast_ref::<E>())`.
    pub fn downcast_work_error<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.work_error().and_then(|e| e.downcast_ref::<E>())
    }
}
