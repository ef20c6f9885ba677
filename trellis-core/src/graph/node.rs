//! Graph Nodes
//!
//! A [`Node`] describes one deferred call: which target to invoke and with
//! which arguments. Nodes are immutable once built; resolution reads them and
//! produces new values without touching the description.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::callable::Callable;
use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// Key holding the target's qualified name in the persisted form.
pub const TARGET_KEY: &str = "obj";

/// Key holding the invocation flag in the persisted form.
pub const INVOCATION_KEY: &str = "self_build";

/// Key holding the positional arguments in the persisted form.
pub const ARGS_KEY: &str = "__args__";

/// Keys that can never be used as named arguments.
pub const RESERVED_KEYS: [&str; 3] = [TARGET_KEY, INVOCATION_KEY, ARGS_KEY];

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// When a node is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Invocation {
    /// Stays a deferred description when passed as an argument. Only an
    /// explicit resolve invokes it.
    #[default]
    Manual,

    /// Invoked automatically wherever it appears as an argument.
    Auto,
}

impl Invocation {
    pub fn is_auto(self) -> bool {
        self == Invocation::Auto
    }
}

impl From<bool> for Invocation {
    fn from(auto: bool) -> Self {
        if auto {
            Invocation::Auto
        } else {
            Invocation::Manual
        }
    }
}

/// What a node calls.
#[derive(Clone, Debug)]
pub enum Target {
    /// A live callable, optionally carrying its qualified name.
    Callable(Callable),

    /// A qualified name looked up in the resolver's registry when the node
    /// is resolved.
    Name(String),

    /// A name bound to a registered configuration node. Invoking the alias
    /// resolves that node with the referring node's arguments as overrides.
    Alias { name: String, node: Arc<Node> },
}

impl Target {
    /// The qualified name, if the target has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Target::Callable(callable) => callable.name(),
            Target::Name(name) => Some(name),
            Target::Alias { name, .. } => Some(name),
        }
    }

    /// Name used in logs and error messages.
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("<anonymous>")
    }
}

impl From<Callable> for Target {
    fn from(callable: Callable) -> Self {
        Target::Callable(callable)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Name(name)
    }
}

/// Check that `name` is a dotted path of identifiers such as `nn.Linear`.
pub fn is_qualified_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// A deferred call: a target plus the arguments to invoke it with.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    target: Target,
    args: Vec<Value>,
    kwargs: Map,
    invocation: Invocation,
}

impl Node {
    /// Build a node, validating the target and argument names.
    pub fn new(
        target: impl Into<Target>,
        args: Vec<Value>,
        kwargs: Map,
        invocation: Invocation,
    ) -> Result<Self> {
        let target = target.into();
        match &target {
            Target::Name(name) | Target::Alias { name, .. } if !is_qualified_name(name) => {
                return Err(Error::config(format!(
                    "\"{name}\" is not a valid target name"
                )));
            }
            Target::Callable(callable) => {
                if let Some(name) = callable.name() {
                    if !is_qualified_name(name) {
                        return Err(Error::config(format!(
                            "callable name \"{name}\" is not a valid target name"
                        )));
                    }
                }
            }
            _ => {}
        }

        if let Some(key) = kwargs.keys().find(|key| RESERVED_KEYS.contains(&key.as_str())) {
            return Err(Error::config(format!(
                "\"{key}\" is reserved and cannot be used as a named argument"
            )));
        }

        Ok(Self {
            id: NodeId::new(),
            target,
            args,
            kwargs,
            invocation,
        })
    }

    /// Start a node that is only invoked when resolved explicitly.
    pub fn manual(target: impl Into<Target>) -> NodeBuilder {
        NodeBuilder::new(target.into(), Invocation::Manual)
    }

    /// Start a node that is invoked wherever it appears as an argument.
    pub fn auto(target: impl Into<Target>) -> NodeBuilder {
        NodeBuilder::new(target.into(), Invocation::Auto)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Map {
        &self.kwargs
    }

    pub fn invocation(&self) -> Invocation {
        self.invocation
    }

    pub fn is_auto(&self) -> bool {
        self.invocation.is_auto()
    }
}

/// Accumulates arguments for a [`Node`].
#[derive(Debug)]
pub struct NodeBuilder {
    target: Target,
    args: Vec<Value>,
    kwargs: Map,
    invocation: Invocation,
    duplicate: Option<String>,
}

impl NodeBuilder {
    fn new(target: Target, invocation: Invocation) -> Self {
        Self {
            target,
            args: Vec::new(),
            kwargs: Map::new(),
            invocation,
            duplicate: None,
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append several positional arguments.
    pub fn args<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Add a named argument. Names must be unique.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if self.kwargs.contains_key(&name) && self.duplicate.is_none() {
            self.duplicate = Some(name.clone());
        }
        self.kwargs.insert(name, value.into());
        self
    }

    /// Override the variant's default invocation.
    pub fn invocation(mut self, invocation: Invocation) -> Self {
        self.invocation = invocation;
        self
    }

    pub fn build(self) -> Result<Node> {
        if let Some(name) = self.duplicate {
            return Err(Error::config(format!(
                "named argument \"{name}\" given more than once"
            )));
        }
        Node::new(self.target, self.args, self.kwargs, self.invocation)
    }

    /// Build and wrap in an [`Arc`] for embedding in other nodes.
    pub fn shared(self) -> Result<Arc<Node>> {
        self.build().map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn variants_set_default_invocation() {
        let manual = Node::manual("math.add").build().unwrap();
        let auto = Node::auto("math.add").build().unwrap();
        assert_eq!(manual.invocation(), Invocation::Manual);
        assert!(auto.is_auto());

        let forced = Node::auto("math.add")
            .invocation(Invocation::Manual)
            .build()
            .unwrap();
        assert!(!forced.is_auto());
    }

    #[test]
    fn builder_keeps_argument_order() {
        let node = Node::auto("nn.Sequential")
            .arg(1)
            .args(vec![2, 3])
            .kwarg("b", "x")
            .kwarg("a", true)
            .build()
            .unwrap();

        assert_eq!(node.args(), &[Value::Int(1), Value::Int(2), Value::Int(3)]);
        let keys: Vec<_> = node.kwargs().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn reserved_keys_are_rejected() {
        for key in RESERVED_KEYS {
            let err = Node::auto("math.add").kwarg(key, 1).build().unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{key}");
        }
    }

    #[test]
    fn invalid_target_names_are_rejected() {
        for name in ["", "math.", ".add", "1abc", "a-b", "a..b"] {
            assert!(
                matches!(Node::auto(name).build(), Err(Error::Config(_))),
                "{name:?}"
            );
        }
        assert!(Node::auto("torch.nn._Linear2").build().is_ok());
    }

    #[test]
    fn duplicate_named_argument_is_rejected() {
        let err = Node::auto("math.add")
            .kwarg("a", 1)
            .kwarg("a", 2)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
