//! Target Registry
//!
//! Maps qualified names to live targets. A registry is populated by the
//! embedding application before configurations are decoded or resolved, and
//! is passed explicitly to the [`Codec`](crate::codec::Codec) and the
//! [`Resolver`](super::Resolver); there is no process-wide lookup table.

use std::sync::Arc;

use indexmap::IndexMap;

use super::callable::{Args, CallResult, Callable};
use super::node::{is_qualified_name, Node};
use crate::error::{Error, Result};

/// What a qualified name can stand for.
#[derive(Clone, Debug)]
pub enum Entry {
    /// A callable target.
    Callable(Callable),

    /// A stored configuration, invoked by resolving it.
    Node(Arc<Node>),
}

/// Strategy for turning a qualified name into a live target.
pub trait NameResolver {
    fn lookup(&self, name: &str) -> Option<Entry>;
}

impl<F> NameResolver for F
where
    F: Fn(&str) -> Option<Entry>,
{
    fn lookup(&self, name: &str) -> Option<Entry> {
        self(name)
    }
}

/// Name-to-target table.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: IndexMap<String, Entry>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> Result<()>
    where
        F: Fn(Args) -> CallResult + Send + Sync + 'static,
    {
        self.register_callable(Callable::new(name, func))
    }

    /// Register a callable under its own name.
    pub fn register_callable(&mut self, callable: Callable) -> Result<()> {
        let name = callable
            .name()
            .ok_or_else(|| Error::config("cannot register an anonymous callable"))?
            .to_string();
        self.insert(name, Entry::Callable(callable))
    }

    /// Register a configuration node under `name`.
    ///
    /// Targets naming it resolve the node, with their own arguments applied
    /// as call-time overrides.
    pub fn register_node(&mut self, name: impl Into<String>, node: impl Into<Arc<Node>>) -> Result<()> {
        self.insert(name.into(), Entry::Node(node.into()))
    }

    fn insert(&mut self, name: String, entry: Entry) -> Result<()> {
        if !is_qualified_name(&name) {
            return Err(Error::config(format!("\"{name}\" is not a valid target name")));
        }
        if self.entries.contains_key(&name) {
            return Err(Error::config(format!("\"{name}\" is already registered")));
        }

        tracing::debug!(target_name = %name, "target registered");
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NameResolver for Registry {
    fn lookup(&self, name: &str) -> Option<Entry> {
        self.get(name).cloned()
    }
}
