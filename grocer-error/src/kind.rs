//! What went wrong

use std::fmt;
use std::io;

/// The category of a failure. Callers branch on this, never on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Catch-all for failures nobody anticipated
    Unexpected,
    /// `grocer.toml` or a derived setting is unusable
    ConfigInvalid,
    /// An API key env var is unset or blank
    MissingCredential,
    InvalidArgument,

    FileNotFound,
    PermissionDenied,
    IoFailed,
    /// HTTP transport failure talking to a model or a website
    NetworkFailed,

    /// The model call failed or produced nothing usable
    InferenceFailed,
    RateLimited,
    /// The provider refused the API key
    AuthenticationFailed,
    /// The provider answered with a 5xx
    ProviderUnavailable,

    /// A search tool could not produce a result
    ToolFailed,
    /// An agent kept calling tools past its turn budget
    IterationLimit,

    /// A model answer did not match the task's JSON shape
    ParseFailed,
    SerializationFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            Unexpected => "Unexpected",
            ConfigInvalid => "ConfigInvalid",
            MissingCredential => "MissingCredential",
            InvalidArgument => "InvalidArgument",
            FileNotFound => "FileNotFound",
            PermissionDenied => "PermissionDenied",
            IoFailed => "IoFailed",
            NetworkFailed => "NetworkFailed",
            InferenceFailed => "InferenceFailed",
            RateLimited => "RateLimited",
            AuthenticationFailed => "AuthenticationFailed",
            ProviderUnavailable => "ProviderUnavailable",
            ToolFailed => "ToolFailed",
            IterationLimit => "IterationLimit",
            ParseFailed => "ParseFailed",
            SerializationFailed => "SerializationFailed",
        }
    }

    /// Kinds that start out temporary when an [`Error`](crate::Error) is built
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::ProviderUnavailable
        )
    }

    /// Map a filesystem failure onto our kinds
    pub fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
