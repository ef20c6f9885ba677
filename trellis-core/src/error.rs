//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Failures are
//! never retried and never partially recovered: the first failing node aborts
//! the whole resolve, encode or decode call.

use thiserror::Error;

/// Boxed error raised by a target callable.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed node construction or a target that cannot be resolved.
    #[error("config error: {0}")]
    Config(String),

    /// Resolution revisited a node that is already on the resolution path.
    #[error("cycle detected while resolving: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// Resolution went deeper than the configured bound.
    #[error("maximum resolution depth {limit} exceeded")]
    DepthExceeded { limit: usize },

    /// A target name in decoded data does not name anything known.
    #[error("cannot resolve target \"{name}\"")]
    Reference { name: String },

    /// A value has no representation in the persisted format.
    #[error("cannot serialize value: {0}")]
    Serialization(String),

    /// Persisted data does not have the expected shape.
    #[error("invalid config data: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("messagepack encode error: {0}")]
    MessagePackEncode(#[from] rmp_serde::encode::Error),

    #[error("messagepack decode error: {0}")]
    MessagePackDecode(#[from] rmp_serde::decode::Error),

    /// Error raised by a target callable, passed through untouched.
    #[error("{0}")]
    Target(BoxError),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }

    pub(crate) fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization(message.into())
    }

    /// Convert an error returned by a target back into an engine error.
    ///
    /// Engine errors that travelled through a target (for example a cycle
    /// found by [`Scope::resolve`](crate::graph::Scope::resolve)) come back
    /// as themselves; anything else becomes [`Error::Target`].
    pub(crate) fn from_target(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(engine) => *engine,
            Err(other) => Error::Target(other),
        }
    }

    /// Borrow the target's own error, if this is one.
    pub fn target_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Target(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn engine_errors_survive_a_trip_through_a_target() {
        let boxed: BoxError = Box::new(Error::DepthExceeded { limit: 3 });
        assert!(matches!(
            Error::from_target(boxed),
            Error::DepthExceeded { limit: 3 }
        ));
    }

    #[test]
    fn foreign_errors_are_passed_through() {
        let err = Error::from_target(Box::new(Boom));
        assert_eq!(err.to_string(), "boom");
        assert!(err.target_error().unwrap().downcast_ref::<Boom>().is_some());
    }

    #[test]
    fn cycle_message_lists_path() {
        let err = Error::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cycle detected while resolving: a -> b -> a");
    }
}
