//! Deferred-Call Graph
//!
//! This module implements the node graph: descriptions of calls that have
//! not happened yet, and the resolver that carries them out.
//!
//! # Overview
//!
//! A node names a target and the arguments to call it with. Any argument may
//! itself be a node, so a configuration forms a tree (or, with shared
//! sub-nodes, a DAG):
//!
//! - `add(a=10, b=subtract(a=10, b=multiply(a=4, b=2)))`
//!
//! Resolving the root resolves the arguments bottom-up and then invokes
//! each target, yielding `12`.
//!
//! # Invocation
//!
//! Every node is either [`Invocation::Auto`] or [`Invocation::Manual`]. An
//! auto node in argument position is invoked and replaced by its result. A
//! manual node in argument position is handed to the consuming target as
//! the node itself, which may resolve it later through its [`Scope`].
//!
//! # Names
//!
//! Targets are either live [`Callable`]s or qualified names looked up in a
//! [`Registry`]. Registries are explicit values; nothing is looked up in
//! global state.

mod callable;
mod flatten;
mod node;
mod registry;
mod resolver;

pub use callable::{ArgumentError, Args, CallResult, Callable};
pub use flatten::Parameters;
pub use node::{
    is_qualified_name, Invocation, Node, NodeBuilder, NodeId, Target, ARGS_KEY, INVOCATION_KEY,
    RESERVED_KEYS, TARGET_KEY,
};
pub use registry::{Entry, NameResolver, Registry};
pub use resolver::{Resolver, ResolverConfig, Scope, DEFAULT_MAX_DEPTH};
