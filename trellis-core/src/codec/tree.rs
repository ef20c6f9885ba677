//! Tree Encoding
//!
//! Converts node graphs to and from the portable data tree. A node becomes a
//! mapping with these keys:
//!
//! - `obj`: qualified name of the target (required)
//! - `self_build`: `true` for auto nodes, `false` for manual ones (optional
//!   on decode; absent means [`CodecConfig::default_invocation`])
//! - `__args__`: positional arguments (optional, omitted when empty)
//! - every other key: a named argument
//!
//! # Embedded nodes
//!
//! While decoding, a nested mapping is an embedded node exactly when it has
//! an `obj` key; any other mapping is a plain map literal. A map literal
//! that itself contains an `obj` key cannot be told apart from a node, so
//! encoding one fails with [`Error::Serialization`] instead of producing a
//! tree that would decode differently. For the same reason every target name
//! written out must be known to the codec's [`NameResolver`].
//!
//! Integers outside the `i64` range are rejected on decode rather than
//! rounded to floats.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::{Error, Result};
use crate::graph::{
    Entry, Invocation, NameResolver, Node, Target, ARGS_KEY, INVOCATION_KEY, TARGET_KEY,
};
use crate::value::{Map, Value};

/// The portable data tree.
pub type Tree = serde_json::Value;

type TreeMap = serde_json::Map<String, Tree>;

/// Codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Invocation of decoded nodes that carry no `self_build` key.
    pub default_invocation: Invocation,

    /// Indent JSON output.
    pub pretty: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            default_invocation: Invocation::Manual,
            pretty: true,
        }
    }
}

/// Encodes node graphs to trees and decodes them back, resolving target
/// names through a [`NameResolver`].
#[derive(Clone, Copy)]
pub struct Codec<'r> {
    names: &'r dyn NameResolver,
    config: CodecConfig,
}

impl<'r> Codec<'r> {
    pub fn new(names: &'r dyn NameResolver) -> Self {
        Self {
            names,
            config: CodecConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode a node graph into a tree.
    pub fn encode(&self, node: &Node) -> Result<Tree> {
        tracing::debug!(node = %node.id(), "encoding node graph");
        self.encode_node(node).map(Tree::Object)
    }

    /// Decode a tree into a node graph.
    pub fn decode(&self, tree: &Tree) -> Result<Node> {
        tracing::debug!("decoding node graph");
        match tree {
            Tree::Object(map) => self.decode_node(map),
            other => Err(Error::format(format!(
                "expected a mapping at the root, found {}",
                tree_kind(other)
            ))),
        }
    }

    fn encode_node(&self, node: &Node) -> Result<TreeMap> {
        let name = node.target().name().ok_or_else(|| {
            Error::serialization(format!("node {} targets an anonymous callable", node.id()))
        })?;
        if self.names.lookup(name).is_none() {
            return Err(Error::serialization(format!(
                "target \"{name}\" is not a registered name"
            )));
        }

        let mut map = TreeMap::new();
        map.insert(TARGET_KEY.to_string(), Tree::String(name.to_string()));
        map.insert(INVOCATION_KEY.to_string(), Tree::Bool(node.is_auto()));

        if !node.args().is_empty() {
            let args = node
                .args()
                .iter()
                .map(|value| self.encode_value(value))
                .collect::<Result<Vec<_>>>()?;
            map.insert(ARGS_KEY.to_string(), Tree::Array(args));
        }

        for (key, value) in node.kwargs() {
            map.insert(key.clone(), self.encode_value(value)?);
        }
        Ok(map)
    }

    fn encode_value(&self, value: &Value) -> Result<Tree> {
        Ok(match value {
            Value::Null => Tree::Null,
            Value::Bool(b) => Tree::Bool(*b),
            Value::Int(i) => Tree::Number(Number::from(*i)),
            Value::Float(x) => Tree::Number(Number::from_f64(*x).ok_or_else(|| {
                Error::serialization(format!("non-finite float {x}"))
            })?),
            Value::Str(s) => Tree::String(s.clone()),
            Value::List(items) => Tree::Array(
                items
                    .iter()
                    .map(|item| self.encode_value(item))
                    .collect::<Result<_>>()?,
            ),
            Value::Map(map) => {
                if map.contains_key(TARGET_KEY) {
                    return Err(Error::serialization(format!(
                        "map literal with an \"{TARGET_KEY}\" key would decode as a node"
                    )));
                }
                let mut encoded = TreeMap::new();
                for (key, item) in map {
                    encoded.insert(key.clone(), self.encode_value(item)?);
                }
                Tree::Object(encoded)
            }
            Value::Node(node) => Tree::Object(self.encode_node(node)?),
            Value::Opaque(opaque) => {
                return Err(Error::serialization(format!(
                    "live {} object has no qualified name",
                    opaque.type_name()
                )))
            }
        })
    }

    fn decode_node(&self, map: &TreeMap) -> Result<Node> {
        let name = match map.get(TARGET_KEY) {
            Some(Tree::String(name)) => name,
            Some(other) => {
                return Err(Error::format(format!(
                    "\"{TARGET_KEY}\" must be a string, found {}",
                    tree_kind(other)
                )))
            }
            None => return Err(Error::format(format!("missing \"{TARGET_KEY}\" key"))),
        };

        let target = match self.names.lookup(name) {
            Some(Entry::Callable(callable)) => Target::Callable(callable.renamed(name)),
            Some(Entry::Node(node)) => Target::Alias {
                name: name.clone(),
                node,
            },
            None => {
                tracing::debug!(target_name = %name, "unknown target name");
                return Err(Error::Reference { name: name.clone() });
            }
        };

        let invocation = match map.get(INVOCATION_KEY) {
            Some(Tree::Bool(auto)) => Invocation::from(*auto),
            Some(other) => {
                return Err(Error::format(format!(
                    "\"{INVOCATION_KEY}\" must be a boolean, found {}",
                    tree_kind(other)
                )))
            }
            None => self.config.default_invocation,
        };

        let args = match map.get(ARGS_KEY) {
            Some(Tree::Array(items)) => items
                .iter()
                .map(|item| self.decode_value(item))
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(Error::format(format!(
                    "\"{ARGS_KEY}\" must be a list, found {}",
                    tree_kind(other)
                )))
            }
            None => Vec::new(),
        };

        let mut kwargs = Map::new();
        for (key, value) in map {
            if key == TARGET_KEY || key == INVOCATION_KEY || key == ARGS_KEY {
                continue;
            }
            kwargs.insert(key.clone(), self.decode_value(value)?);
        }

        Node::new(target, args, kwargs, invocation)
    }

    fn decode_value(&self, tree: &Tree) -> Result<Value> {
        Ok(match tree {
            Tree::Null => Value::Null,
            Tree::Bool(b) => Value::Bool(*b),
            Tree::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None if n.is_u64() => {
                    return Err(Error::format(format!("integer {n} is out of range")))
                }
                None => Value::Float(n.as_f64().ok_or_else(|| {
                    Error::format(format!("number {n} is out of range"))
                })?),
            },
            Tree::String(s) => Value::Str(s.clone()),
            Tree::Array(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.decode_value(item))
                    .collect::<Result<_>>()?,
            ),
            Tree::Object(map) if map.contains_key(TARGET_KEY) => {
                Value::Node(Arc::new(self.decode_node(map)?))
            }
            Tree::Object(map) => {
                let mut decoded = Map::with_capacity(map.len());
                for (key, value) in map {
                    decoded.insert(key.clone(), self.decode_value(value)?);
                }
                Value::Map(decoded)
            }
        })
    }
}

fn tree_kind(tree: &Tree) -> &'static str {
    match tree {
        Tree::Null => "null",
        Tree::Bool(_) => "boolean",
        Tree::Number(_) => "number",
        Tree::String(_) => "string",
        Tree::Array(_) => "list",
        Tree::Object(_) => "mapping",
    }
}
