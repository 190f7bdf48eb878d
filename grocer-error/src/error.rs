//! The error type shared by every grocer crate

use std::fmt;
use std::io;
use std::path::Path;

use crate::{ErrorKind, ErrorStatus};

/// A failure with enough attached detail to act on it and to find its cause.
///
/// `operation` names where it happened; when an outer layer sets its own
/// operation the inner one is kept in `context` under `"called"`.
///
/// ```rust
/// use grocer_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::RateLimited, "429 from provider")
///     .with_operation("agent::execute")
///     .with_context("task", "estimate_expiration");
///
/// assert_eq!(err.status(), ErrorStatus::Temporary);
/// assert_eq!(err.context_value("task"), Some("estimate_expiration"));
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = match kind.is_retryable() {
            true => ErrorStatus::Temporary,
            false => ErrorStatus::Permanent,
        };
        Self {
            kind,
            message: message.into(),
            status,
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// First value recorded under `key`
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(v.as_str()))
    }

    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    /// Never retry this one, whatever its kind suggests
    pub fn permanent(mut self) -> Self {
        self.status = ErrorStatus::Permanent;
        self
    }

    /// Retries ran out; see [`ErrorStatus::persist`]
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying error. Only one source may be attached.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }
}

// Constructors for the kinds raised across the workspace
impl Error {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// `env_var` is the variable that should have held the key
    pub fn missing_credential(env_var: impl Into<String>) -> Self {
        let env_var = env_var.into();
        Self::new(
            ErrorKind::MissingCredential,
            format!("environment variable '{}' is not set", env_var),
        )
        .with_context("env_var", env_var)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// A filesystem failure on `path`, with the path in both message and context
    pub fn io_at(path: &Path, err: io::Error) -> Self {
        let shown = path.display().to_string();
        Self::new(ErrorKind::from_io(err.kind()), format!("{}: {}", shown, err))
            .with_context("path", shown)
            .set_source(err)
    }

    pub fn network_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkFailed, message)
    }

    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InferenceFailed, message)
    }

    pub fn tool_failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::ToolFailed, reason).with_context("tool", tool)
    }

    pub fn iteration_limit(role: impl Into<String>, max: usize) -> Self {
        let role = role.into();
        Self::new(
            ErrorKind::IterationLimit,
            format!("agent '{}' gave no final answer within {} iterations", role, max),
        )
        .with_context("agent", role)
        .with_context("max_iterations", max.to_string())
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }

    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationFailed, message)
    }
}

/// One line: `Kind (status) at op, context { k: v } => message`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect();
            write!(f, ", context {{ {} }}", pairs.join(", "))?;
        }
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;
        if !self.message.is_empty() {
            writeln!(f, "\n    Message: {}", self.message)?;
        }
        if !self.context.is_empty() {
            writeln!(f, "\n    Context:")?;
            for (key, value) in &self.context {
                writeln!(f, "        {}: {}", key, value)?;
            }
        }
        if let Some(source) = &self.source {
            writeln!(f, "\n    Source: {:?}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(ErrorKind::from_io(err.kind()), err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}
