//! Error types for template rendering.
//!
//! Every failure in the render pipeline ends up as a [`RenderError`]. Lookup
//! failures from a [`TemplateSource`](crate::TemplateSource) and failures from the
//! [`TemplateEngine`](crate::TemplateEngine) share this one channel, and both are
//! passed through unchanged: the `Display` of a [`RenderError::Lookup`] is the
//! `Display` of the source error, and likewise for [`RenderError::Engine`].

use std::io;

/// Error returned by a template source when a name cannot be resolved.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No template exists under the requested name.
    #[error("template not found: {0}")]
    NotFound(String),

    /// The source failed to read the template.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other source-specific failure.
    #[error("{0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SourceError {
    /// Create a not-found error for `name`.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Wrap an arbitrary error raised by a source implementation.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }
}

/// Error raised by a template engine while compiling, registering or executing.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Template syntax error or compilation failure.
    #[error("template error: {0}")]
    Syntax(String),

    /// Template not registered and not resolvable through the request hook.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Runtime failure while executing a registered template.
    #[error("execution error: {0}")]
    Execution(String),

    /// The request hook failed to fetch a nested template.
    #[error("failed to load template {name}: {source}")]
    Lookup {
        name: String,
        #[source]
        source: SourceError,
    },

    /// Other operational error.
    #[error("{0}")]
    Other(String),
}

impl From<minijinja::Error> for EngineError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        // minijinja's Display omits chained sources.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        match err.kind() {
            ErrorKind::TemplateNotFound => EngineError::TemplateNotFound(message),
            ErrorKind::SyntaxError | ErrorKind::BadEscape => EngineError::Syntax(message),
            ErrorKind::UndefinedError
            | ErrorKind::UnknownTest
            | ErrorKind::UnknownFunction
            | ErrorKind::UnknownFilter
            | ErrorKind::UnknownMethod
            | ErrorKind::BadSerialization
            | ErrorKind::InvalidOperation => EngineError::Execution(message),
            _ => EngineError::Other(message),
        }
    }
}

/// Error type for the render pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The template source could not resolve the template.
    #[error(transparent)]
    Lookup(#[from] SourceError),

    /// The engine failed to compile, register or execute the template.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Render parameters could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RenderError {
    /// Returns `true` if the error came from the template source.
    pub fn is_lookup(&self) -> bool {
        matches!(self, RenderError::Lookup(_))
    }
}
