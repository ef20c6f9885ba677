//! Trellis Core
//!
//! This crate lets a configuration be written down as data: a tree of
//! deferred calls, each naming a target and the arguments to call it with.
//! It implements:
//!
//! - Deferred-call nodes with manual or automatic invocation
//! - Depth-first resolution of node graphs, with cycle and depth checks
//! - Encoding to and decoding from a portable, name-addressed data tree
//! - JSON and MessagePack files holding one tree each
//!
//! With the `python` feature the crate also builds the `_core` Python
//! extension module, so Python callables can be configured the same way.
//!
//! # Architecture
//!
//! - `graph`: nodes, callables, the name registry and the resolver
//! - `codec`: tree encoding, decoding and file import/export
//! - `value`: argument and result values
//! - `error`: the crate's error type
//!
//! # Example
//!
//! ```rust
//! use trellis_core::graph::{Node, Registry, Resolver};
//! use trellis_core::value::Value;
//!
//! let mut registry = Registry::new();
//! registry.register("math.add", |args| Ok(Value::Int(args.i64(0, "a")? + args.i64(1, "b")?)))?;
//! registry.register("math.multiply", |args| Ok(Value::Int(args.i64(0, "a")? * args.i64(1, "b")?)))?;
//!
//! // add(a=10, b=multiply(a=4, b=2))
//! let config = Node::auto("math.add")
//!     .kwarg("a", 10)
//!     .kwarg("b", Node::auto("math.multiply").kwarg("a", 4).kwarg("b", 2).build()?)
//!     .build()?;
//!
//! let value = Resolver::with_registry(&registry).resolve(&config)?;
//! assert_eq!(value, Value::Int(18));
//! # Ok::<(), trellis_core::Error>(())
//! ```

pub mod codec;
pub mod error;
pub mod graph;
pub mod value;

#[cfg(feature = "python")]
mod python;

pub use error::{Error, Result};
