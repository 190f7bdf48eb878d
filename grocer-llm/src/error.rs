//! Provider error conversion
//!
//! Re-exports grocer-error and maps `ProviderError` onto it so callers see
//! one error type with a retry status.

pub use grocer_error::{Error, ErrorKind, ErrorStatus, Result};

use crate::provider::ProviderError;

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        let error = match &err {
            ProviderError::Network(_) => Error::new(ErrorKind::NetworkFailed, message),
            ProviderError::Api { status, .. } if *status >= 500 => {
                Error::new(ErrorKind::ProviderUnavailable, message)
                    .with_context("http_status", status.to_string())
            }
            ProviderError::Api { status, .. } => {
                Error::new(ErrorKind::InferenceFailed, message)
                    .with_context("http_status", status.to_string())
                    .permanent()
            }
            ProviderError::Parse(_) => Error::new(ErrorKind::ParseFailed, message),
            ProviderError::RateLimited { retry_after } => {
                let error = Error::new(ErrorKind::RateLimited, message);
                match retry_after {
                    Some(secs) => error.with_context("retry_after", secs.to_string()),
                    None => error,
                }
            }
            ProviderError::ModelNotFound(model) => {
                Error::new(ErrorKind::ConfigInvalid, message).with_context("model", model.clone())
            }
            ProviderError::AuthenticationFailed => {
                Error::new(ErrorKind::AuthenticationFailed, message)
            }
            ProviderError::Other(_) => Error::new(ErrorKind::InferenceFailed, message).permanent(),
        };
        error.with_operation("provider")
    }
}
