//! # grocer-error
//!
//! Unified error handling for the grocer workspace.
//!
//! Every crate returns [`Result<T>`]. An [`Error`] carries:
//!
//! - an [`ErrorKind`] callers match on
//! - an [`ErrorStatus`] the retry loop reads
//! - the operation plus key/value context for the log line
//! - the wrapped source error, when there is one
//!
//! ```rust
//! use grocer_error::{Error, ErrorKind};
//!
//! fn check(answer: &str) -> grocer_error::Result<()> {
//!     if !answer.trim_start().starts_with('{') {
//!         return Err(Error::parse_failed("model answer is not a JSON object")
//!             .with_operation("schema::parse_answer")
//!             .with_context("task", "read_receipt"));
//!     }
//!     Ok(())
//! }
//!
//! assert_eq!(check("sure!").unwrap_err().kind(), ErrorKind::ParseFailed);
//! ```
//!
//! External errors go in through `set_source`, not blanket `From` impls;
//! outer layers add context instead of re-wrapping.

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using grocer Error
pub type Result<T> = std::result::Result<T, Error>;
