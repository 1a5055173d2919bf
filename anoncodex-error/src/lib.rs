//! Shared error type for the anoncodex crates.
//!
//! An [`Error`] pairs an [`ErrorKind`] (provider failures such as
//! `RateLimited`, action failures such as `Denied`) with an [`ErrorStatus`]
//! that tells the caller whether another attempt can help. Foreign errors go
//! in through `set_source`; callers further up only add operations and
//! key/value context.
//!
//! ```rust
//! use anoncodex_error::{Error, ErrorKind};
//!
//! fn call_upstream() -> anoncodex_error::Result<String> {
//!     Err(Error::new(ErrorKind::RateLimited, "429 from upstream")
//!         .with_operation("openai::chat")
//!         .with_context("model", "gpt-4o"))
//! }
//!
//! assert!(call_upstream().unwrap_err().is_retryable());
//! ```
//!
//! The model gateway maps every provider failure onto the five provider
//! kinds before it returns, so agent code never sees HTTP details.

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

pub type Result<T> = std::result::Result<T, Error>;
