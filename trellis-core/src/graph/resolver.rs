//! Node Resolution
//!
//! The resolver turns a node graph into a value. It walks the graph
//! depth-first and post-order: every argument is resolved before the node's
//! own target is invoked.
//!
//! # Algorithm
//!
//! 1. Resolve positional arguments in order, then named arguments.
//!    - An auto node is invoked and replaced by its result.
//!    - A manual node is passed through as the node itself.
//!    - Lists and maps are rebuilt with their elements resolved.
//!    - Every other literal is passed unchanged.
//! 2. Apply call-time overrides.
//! 3. Invoke the target. A name target is looked up in the registry; if it
//!    names a stored configuration node, that node is resolved with the
//!    arguments from step 2 as its overrides.
//!
//! Nothing is cached. A node that appears at several positions is invoked
//! once per position.
//!
//! The chain of nodes currently being invoked is kept on a path. Meeting a
//! node that is already on the path is a cycle; a path longer than
//! [`ResolverConfig::max_depth`] aborts with
//! [`Error::DepthExceeded`].

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::callable::Args;
use super::node::{Node, NodeId, Target};
use super::registry::{Entry, NameResolver};
use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// Default bound on nested node invocations.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Resolver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Deepest allowed chain of nested node invocations.
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Resolves node graphs to values.
///
/// A resolver without a registry can only resolve graphs whose targets are
/// live callables or aliases.
#[derive(Clone, Copy, Default)]
pub struct Resolver<'r> {
    registry: Option<&'r dyn NameResolver>,
    config: ResolverConfig,
}

impl<'r> Resolver<'r> {
    /// Create a resolver with no registry and default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver that looks name targets up in `registry`.
    pub fn with_registry(registry: &'r dyn NameResolver) -> Self {
        Self {
            registry: Some(registry),
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `node` to a value.
    ///
    /// The root is always invoked, whatever its own invocation flag says.
    pub fn resolve(&self, node: &Node) -> Result<Value> {
        self.resolve_with(node, Args::default())
    }

    /// Resolve `node`, invoking its target with extra call-time arguments.
    pub fn resolve_with(&self, node: &Node, overrides: Args) -> Result<Value> {
        tracing::debug!(
            node = %node.id(),
            target_name = node.target().display_name(),
            "resolving node graph"
        );

        let mut scope = Scope {
            resolver: self,
            path: SmallVec::new(),
        };
        let result = scope.invoke(node, overrides);

        tracing::debug!(node = %node.id(), ok = result.is_ok(), "node graph resolved");
        result
    }
}

struct Frame {
    id: NodeId,
    label: String,
}

/// The state of one resolve call.
///
/// Targets receive the scope of the call that invoked them, so resolving a
/// manual node from inside a target continues the same path: cycles and the
/// depth bound are still enforced.
pub struct Scope<'a> {
    resolver: &'a Resolver<'a>,
    path: SmallVec<[Frame; 16]>,
}

impl Scope<'_> {
    /// Explicitly resolve `node`, whether it is manual or auto.
    pub fn resolve(&mut self, node: &Node) -> Result<Value> {
        self.invoke(node, Args::default())
    }

    /// Explicitly resolve `node` with extra call-time arguments.
    pub fn resolve_with(&mut self, node: &Node, overrides: Args) -> Result<Value> {
        self.invoke(node, overrides)
    }

    /// Number of nodes currently being invoked.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    fn invoke(&mut self, node: &Node, overrides: Args) -> Result<Value> {
        self.enter(node)?;
        let result = self.invoke_entered(node, overrides);
        self.path.pop();
        result
    }

    fn enter(&mut self, node: &Node) -> Result<()> {
        let label = node.target().display_name().to_string();

        if let Some(start) = self.path.iter().position(|frame| frame.id == node.id()) {
            let mut path: Vec<String> = self.path[start..]
                .iter()
                .map(|frame| frame.label.clone())
                .collect();
            path.push(label);
            tracing::warn!(node = %node.id(), cycle = %path.join(" -> "), "cycle in node graph");
            return Err(Error::Cycle { path });
        }

        let limit = self.resolver.config.max_depth;
        if self.path.len() >= limit {
            tracing::warn!(node = %node.id(), limit, "resolution depth exceeded");
            return Err(Error::DepthExceeded { limit });
        }

        self.path.push(Frame {
            id: node.id(),
            label,
        });
        Ok(())
    }

    fn invoke_entered(&mut self, node: &Node, overrides: Args) -> Result<Value> {
        let positional = node
            .args()
            .iter()
            .map(|value| self.resolve_value(value))
            .collect::<Result<Vec<_>>>()?;

        let mut named = Map::with_capacity(node.kwargs().len());
        for (name, value) in node.kwargs() {
            named.insert(name.clone(), self.resolve_value(value)?);
        }

        let args = Args::new(positional, named).merge(overrides);

        tracing::trace!(
            node = %node.id(),
            target_name = node.target().display_name(),
            depth = self.path.len(),
            "invoking target"
        );

        match node.target() {
            Target::Callable(callable) => callable.call(self, args),
            Target::Alias { node: aliased, .. } => self.invoke(aliased, args),
            Target::Name(name) => match self.lookup(name)? {
                Entry::Callable(callable) => callable.call(self, args),
                Entry::Node(aliased) => self.invoke(&aliased, args),
            },
        }
    }

    fn lookup(&self, name: &str) -> Result<Entry> {
        self.resolver
            .registry
            .and_then(|registry| registry.lookup(name))
            .ok_or_else(|| Error::config(format!("unresolved target \"{name}\"")))
    }

    fn resolve_value(&mut self, value: &Value) -> Result<Value> {
        match value {
            Value::Node(node) if node.is_auto() => self.invoke(node, Args::default()),
            Value::List(items) => items
                .iter()
                .map(|item| self.resolve_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Value::Map(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key.clone(), self.resolve_value(item)?);
                }
                Ok(Value::Map(resolved))
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::graph::{Callable, Invocation, Registry};

    fn add() -> Callable {
        Callable::new("math.add", |args| {
            Ok(Value::Int(args.i64(0, "a")? + args.i64(1, "b")?))
        })
    }

    fn echo() -> Callable {
        Callable::new("test.echo", |args| {
            Ok(args.param(0, "value").cloned().unwrap_or_default())
        })
    }

    #[test]
    fn resolves_arguments_before_target() {
        let inner = Node::auto(add()).kwarg("a", 1).kwarg("b", 2).build().unwrap();
        let outer = Node::auto(add()).kwarg("a", 10).kwarg("b", inner).build().unwrap();

        assert_eq!(Resolver::new().resolve(&outer).unwrap(), Value::Int(13));
    }

    #[test]
    fn manual_argument_is_passed_unresolved() {
        let inner = Node::manual(add()).kwarg("a", 1).kwarg("b", 2).shared().unwrap();
        let outer = Node::auto(echo()).kwarg("value", inner.clone()).build().unwrap();

        let value = Resolver::new().resolve(&outer).unwrap();
        assert_eq!(value.as_node().map(|n| n.id()), Some(inner.id()));
    }

    #[test]
    fn manual_root_is_still_invoked() {
        let node = Node::manual(add()).arg(2).arg(3).build().unwrap();
        assert_eq!(Resolver::new().resolve(&node).unwrap(), Value::Int(5));
    }

    #[test]
    fn nodes_inside_lists_and_maps_are_resolved() {
        let one = Node::auto(add()).arg(0).arg(1).shared().unwrap();
        let mut map = Map::new();
        map.insert("x".into(), Value::Node(one.clone()));
        let node = Node::auto(echo())
            .kwarg("value", vec![Value::Node(one), Value::Map(map), Value::Int(7)])
            .build()
            .unwrap();

        let mut expected = Map::new();
        expected.insert("x".into(), Value::Int(1));
        assert_eq!(
            Resolver::new().resolve(&node).unwrap(),
            Value::List(vec![Value::Int(1), Value::Map(expected), Value::Int(7)])
        );
    }

    #[test]
    fn shared_node_is_invoked_at_every_position() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let count = Callable::new("test.count", move |_| {
            Ok(Value::Int(counter.fetch_add(1, Ordering::SeqCst) as i64))
        });

        let shared = Node::auto(count).shared().unwrap();
        let node = Node::auto(add())
            .arg(shared.clone())
            .arg(shared)
            .build()
            .unwrap();

        assert_eq!(Resolver::new().resolve(&node).unwrap(), Value::Int(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn overrides_replace_named_arguments() {
        let node = Node::manual(add()).kwarg("a", 1).kwarg("b", 2).build().unwrap();
        let mut named = Map::new();
        named.insert("b".into(), Value::Int(40));

        let value = Resolver::new()
            .resolve_with(&node, Args::new(Vec::new(), named))
            .unwrap();
        assert_eq!(value, Value::Int(41));
    }

    #[test]
    fn name_targets_use_the_registry() {
        let mut registry = Registry::new();
        registry.register_callable(add()).unwrap();
        let node = Node::auto("math.add").arg(4).arg(5).build().unwrap();

        assert_eq!(
            Resolver::with_registry(&registry).resolve(&node).unwrap(),
            Value::Int(9)
        );
        assert!(matches!(Resolver::new().resolve(&node), Err(Error::Config(_))));
    }

    #[test]
    fn registered_nodes_receive_caller_arguments_as_overrides() {
        let mut registry = Registry::new();
        registry.register_callable(add()).unwrap();
        registry
            .register_node("presets.plus_one", Node::manual("math.add").kwarg("b", 1).build().unwrap())
            .unwrap();

        let node = Node::auto("presets.plus_one").kwarg("a", 41).build().unwrap();
        assert_eq!(
            Resolver::with_registry(&registry).resolve(&node).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn cycle_through_registered_names_is_detected() {
        let mut registry = Registry::new();
        registry
            .register_node("cfg.a", Node::auto("cfg.b").build().unwrap())
            .unwrap();
        registry
            .register_node("cfg.b", Node::auto("cfg.a").build().unwrap())
            .unwrap();

        let root = Node::auto("cfg.a").build().unwrap();
        let err = Resolver::with_registry(&registry).resolve(&root).unwrap_err();
        match err {
            Error::Cycle { path } => assert_eq!(path, vec!["cfg.b", "cfg.a", "cfg.b"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn cycle_through_explicit_resolution_is_detected() {
        let mut registry = Registry::new();
        registry
            .register_callable(Callable::with_scope("test.force", |scope, args| {
                let node = args.require(0, "node")?.as_node().cloned();
                match node {
                    Some(node) => Ok(scope.resolve(&node)?),
                    None => Ok(Value::Null),
                }
            }))
            .unwrap();
        registry
            .register_node(
                "cfg.loop",
                Node::manual("test.force")
                    .arg(Node::manual("cfg.loop").build().unwrap())
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let root = Node::manual("cfg.loop").build().unwrap();
        let err = Resolver::with_registry(&registry).resolve(&root).unwrap_err();
        assert!(matches!(err, Error::Cycle { .. }), "{err:?}");
    }

    #[test]
    fn depth_bound_is_enforced() {
        let mut node = Node::auto(echo()).arg(0).build().unwrap();
        for _ in 0..10 {
            node = Node::auto(echo()).arg(node).build().unwrap();
        }

        let shallow = Resolver::new().with_config(ResolverConfig { max_depth: 5 });
        assert!(matches!(
            shallow.resolve(&node),
            Err(Error::DepthExceeded { limit: 5 })
        ));
        assert_eq!(Resolver::new().resolve(&node).unwrap(), Value::Int(0));
    }

    #[test]
    fn target_errors_pass_through() {
        let node = Node::auto(add()).kwarg("a", "x").kwarg("b", 1).build().unwrap();
        let err = Resolver::new().resolve(&node).unwrap_err();
        assert!(err
            .target_error()
            .and_then(|e| e.downcast_ref::<crate::graph::ArgumentError>())
            .is_some());
    }

    #[test]
    fn invocation_override_changes_argument_handling() {
        let inner = Node::auto(add())
            .invocation(Invocation::Manual)
            .arg(1)
            .arg(1)
            .build()
            .unwrap();
        let outer = Node::auto(echo()).arg(inner).build().unwrap();
        assert!(Resolver::new().resolve(&outer).unwrap().as_node().is_some());
    }
}
