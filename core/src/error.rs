//! Error types for servient operations.
//!
//! This module defines all error types that can occur when working with Things,
//! codecs and protocol bindings. The [`Result`] type alias provides a convenient
//! shorthand for operations that may fail.
//!
//! # Error Categories
//!
//! | Category | Variants | Meaning |
//! |----------|----------|---------|
//! | Capability | `NotImplemented`, `NoBinding` | Binding/configuration mismatch, not a bug |
//! | Transport | `Transport`, `Timeout` | Connection failure vs. bounded ask expiry |
//! | Conversion | `Codec`, `InvalidHref` | Payload or address could not be converted |
//! | Lifecycle | `ResourceLifecycle`, `AlreadyExposed` | Shared resource or exposure bookkeeping |
//! | Lookup | `NotFound`, `HandlerMissing` | Unknown thing/interaction/route or no handler |
//!
//! `Timeout` is deliberately distinct from `Transport`: an ask that expires its
//! bound is not a connection failure and callers may treat it differently.

use thiserror::Error;

/// Result type for servient operations.
///
/// Provides a convenient shorthand for `Result<T, ServientError>`.
pub type Result<T> = std::result::Result<T, ServientError>;

/// Errors that can occur when exposing, consuming or reaching Things.
///
/// Each variant represents a different failure mode. Use pattern matching to
/// handle specific errors appropriately.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServientError {
    /// The binding does not support the requested capability.
    ///
    /// Raised by the default methods of the protocol capability contract.
    /// This is a configuration/capability mismatch, not a bug.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Underlying connection or I/O failure in a binding.
    #[error("transport error: {0}")]
    Transport(String),

    /// Encoding or decoding a payload failed.
    ///
    /// Always surfaced synchronously to the caller of the conversion.
    #[error("codec error: {0}")]
    Codec(String),

    /// An ask-pattern request or barrier wait exceeded its bound.
    #[error("operation timed out")]
    Timeout,

    /// A refcounted supplier or cleanup failed.
    ///
    /// The resource slot is left cleared; a later retain starts from scratch.
    #[error("resource lifecycle error: {0}")]
    ResourceLifecycle(String),

    /// Unknown thing, interaction or network address.
    #[error("not found: {0}")]
    NotFound(String),

    /// None of a Thing's advertised Forms matches an instantiated binding.
    #[error("no binding matches any form of {0}")]
    NoBinding(String),

    /// An action was invoked with no handler installed.
    #[error("no handler installed for {0}")]
    HandlerMissing(String),

    /// A Thing with the same id is already exposed.
    #[error("thing already exposed: {0}")]
    AlreadyExposed(String),

    /// A Form href could not be parsed or resolved.
    #[error("invalid href: {0}")]
    InvalidHref(String),
}

impl From<serde_json::Error> for ServientError {
    fn from(err: serde_json::Error) -> Self {
        ServientError::Codec(err.to_string())
    }
}

impl From<url::ParseError> for ServientError {
    fn from(err: url::ParseError) -> Self {
        ServientError::InvalidHref(err.to_string())
    }
}

impl ServientError {
    /// Shorthand for the capability-contract default failure.
    #[inline]
    pub fn not_implemented(capability: &str) -> Self {
        ServientError::NotImplemented(capability.to_string())
    }

    /// Check whether this error is the bounded-ask expiry.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ServientError::Timeout)
    }

    /// Check whether this error means "the binding cannot do that".
    ///
    /// Covers both an unimplemented capability and the absence of any
    /// compatible binding for a Form.
    #[inline]
    #[must_use]
    pub fn is_capability_mismatch(&self) -> bool {
        matches!(
            self,
            ServientError::NotImplemented(_) | ServientError::NoBinding(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_timeout() {
        assert!(ServientError::Timeout.is_timeout());
        assert!(!ServientError::Transport("reset".into()).is_timeout());
    }

    #[test]
    fn test_not_implemented_is_capability_mismatch() {
        assert!(ServientError::not_implemented("observe").is_capability_mismatch());
        assert!(ServientError::NoBinding("urn:dev:lamp".into()).is_capability_mismatch());
        assert!(!ServientError::Timeout.is_capability_mismatch());
    }

    #[test]
    fn test_error_display() {
        let err = ServientError::not_implemented("discover");
        assert!(err.to_string().contains("discover"));
    }

    #[test]
    fn test_json_error_maps_to_codec() {
        let err: ServientError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ServientError::Codec(_)));
    }

    #[test]
    fn test_url_error_maps_to_invalid_href() {
        let err: ServientError = url::Url::parse("::nope").unwrap_err().into();
        assert!(matches!(err, ServientError::InvalidHref(_)));
    }
}
