//! Callable Targets
//!
//! A [`Callable`] wraps a Rust closure so it can be the target of a node.
//! Callables receive their resolved arguments as [`Args`] and a [`Scope`]
//! through which they may resolve manual nodes they were handed.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::resolver::Scope;
use crate::error::{BoxError, Error, Result};
use crate::value::{Map, Value};

/// What a target returns: a value, or its own error.
pub type CallResult = std::result::Result<Value, BoxError>;

type Func = dyn Fn(&mut Scope<'_>, Args) -> CallResult + Send + Sync;

/// A reference to an invocable target.
#[derive(Clone)]
pub struct Callable {
    name: Option<Arc<str>>,
    func: Arc<Func>,
}

impl Callable {
    /// A named callable that only needs its arguments.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Args) -> CallResult + Send + Sync + 'static,
    {
        Self::with_scope(name, move |_, args| func(args))
    }

    /// A named callable that also receives the resolution scope.
    pub fn with_scope<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Scope<'_>, Args) -> CallResult + Send + Sync + 'static,
    {
        let name: String = name.into();
        Self {
            name: Some(Arc::from(name)),
            func: Arc::new(func),
        }
    }

    /// A callable with no qualified name. Nodes targeting it resolve fine
    /// but cannot be encoded.
    pub fn anonymous<F>(func: F) -> Self
    where
        F: Fn(Args) -> CallResult + Send + Sync + 'static,
    {
        Self {
            name: None,
            func: Arc::new(move |_: &mut Scope<'_>, args: Args| func(args)),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The same callable under another qualified name.
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: Some(Arc::from(name)),
            func: Arc::clone(&self.func),
        }
    }

    pub(crate) fn call(&self, scope: &mut Scope<'_>, args: Args) -> Result<Value> {
        (self.func)(scope, args).map_err(Error::from_target)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Argument lookup failures reported by the typed accessors on [`Args`].
#[derive(Error, Debug, PartialEq)]
pub enum ArgumentError {
    #[error("missing argument \"{name}\" (position {index})")]
    Missing { index: usize, name: String },

    #[error("argument \"{name}\" expected {expected}, got {actual}")]
    WrongType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Resolved arguments handed to a target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: Map,
}

impl Args {
    pub fn new(positional: Vec<Value>, named: Map) -> Self {
        Self { positional, named }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named(&self) -> &Map {
        &self.named
    }

    pub fn into_parts(self) -> (Vec<Value>, Map) {
        (self.positional, self.named)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Combine call-time arguments with stored ones.
    ///
    /// Extra positional arguments go first; extra named arguments replace
    /// stored ones with the same name.
    pub fn merge(self, overrides: Args) -> Args {
        let mut positional = overrides.positional;
        positional.extend(self.positional);
        let mut named = self.named;
        named.extend(overrides.named);
        Args { positional, named }
    }

    /// Look a parameter up by name, falling back to its position.
    pub fn param(&self, index: usize, name: &str) -> Option<&Value> {
        self.named.get(name).or_else(|| self.positional.get(index))
    }

    /// Like [`param`](Self::param), but missing parameters are an error.
    pub fn require(&self, index: usize, name: &str) -> std::result::Result<&Value, ArgumentError> {
        self.param(index, name).ok_or_else(|| ArgumentError::Missing {
            index,
            name: name.to_string(),
        })
    }

    pub fn i64(&self, index: usize, name: &str) -> std::result::Result<i64, ArgumentError> {
        let value = self.require(index, name)?;
        value.as_i64().ok_or_else(|| wrong_type(name, "int", value))
    }

    pub fn f64(&self, index: usize, name: &str) -> std::result::Result<f64, ArgumentError> {
        let value = self.require(index, name)?;
        value.as_f64().ok_or_else(|| wrong_type(name, "number", value))
    }

    pub fn str(&self, index: usize, name: &str) -> std::result::Result<&str, ArgumentError> {
        let value = self.require(index, name)?;
        value.as_str().ok_or_else(|| wrong_type(name, "str", value))
    }

    pub fn bool(&self, index: usize, name: &str) -> std::result::Result<bool, ArgumentError> {
        let value = self.require(index, name)?;
        value.as_bool().ok_or_else(|| wrong_type(name, "bool", value))
    }
}

fn wrong_type(name: &str, expected: &'static str, actual: &Value) -> ArgumentError {
    ArgumentError::WrongType {
        name: name.to_string(),
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(pairs: &[(&str, Value)]) -> Map {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn param_prefers_name_over_position() {
        let args = Args::new(
            vec![Value::Int(1), Value::Int(2)],
            named(&[("b", Value::Int(20))]),
        );
        assert_eq!(args.i64(0, "a"), Ok(1));
        assert_eq!(args.i64(1, "b"), Ok(20));
        assert_eq!(
            args.i64(2, "c"),
            Err(ArgumentError::Missing {
                index: 2,
                name: "c".into()
            })
        );
    }

    #[test]
    fn typed_accessors_report_mismatch() {
        let args = Args::new(vec![Value::from("ten")], Map::new());
        assert_eq!(
            args.f64(0, "a"),
            Err(ArgumentError::WrongType {
                name: "a".into(),
                expected: "number",
                actual: "str"
            })
        );
        assert_eq!(args.str(0, "a"), Ok("ten"));
    }

    #[test]
    fn merge_prepends_positional_and_overrides_named() {
        let stored = Args::new(
            vec![Value::Int(2)],
            named(&[("a", Value::Int(1)), ("b", Value::Int(2))]),
        );
        let extra = Args::new(vec![Value::Int(1)], named(&[("b", Value::Int(9))]));
        let merged = stored.merge(extra);

        assert_eq!(merged.positional(), &[Value::Int(1), Value::Int(2)]);
        assert_eq!(merged.named().get("a"), Some(&Value::Int(1)));
        assert_eq!(merged.named().get("b"), Some(&Value::Int(9)));
    }

    #[test]
    fn anonymous_callable_has_no_name() {
        let callable = Callable::anonymous(|_| Ok(Value::Null));
        assert!(callable.name().is_none());
        assert_eq!(Callable::new("math.add", |_| Ok(Value::Null)).name(), Some("math.add"));
    }
}
