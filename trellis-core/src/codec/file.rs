//! File Import and Export
//!
//! One file holds one whole tree: the root node and everything reachable
//! from it. The on-disk format follows the file extension.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use super::tree::{Codec, Tree};
use crate::error::{Error, Result};
use crate::graph::Node;

/// Byte-level format of a stored tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON text, `.json`.
    Json,
    /// MessagePack, `.msgpack` or `.mpk`.
    MessagePack,
}

impl Format {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("msgpack") | Some("mpk") => Ok(Format::MessagePack),
            _ => Err(Error::format(format!(
                "invalid path {}, expected a .json, .msgpack or .mpk file",
                path.display()
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::MessagePack => write!(f, "msgpack"),
        }
    }
}

impl Codec<'_> {
    /// Encode a node graph to bytes in `format`.
    pub fn to_bytes(&self, node: &Node, format: Format) -> Result<Vec<u8>> {
        let tree = self.encode(node)?;
        match format {
            Format::Json if self.config().pretty => {
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
                tree.serialize(&mut serializer)?;
                Ok(buf)
            }
            Format::Json => Ok(serde_json::to_vec(&tree)?),
            Format::MessagePack => Ok(rmp_serde::to_vec(&tree)?),
        }
    }

    /// Decode a node graph from bytes in `format`.
    pub fn from_bytes(&self, bytes: &[u8], format: Format) -> Result<Node> {
        let tree: Tree = match format {
            Format::Json => serde_json::from_slice(bytes)?,
            Format::MessagePack => rmp_serde::from_slice(bytes)?,
        };
        self.decode(&tree)
    }

    /// Encode a node graph to a JSON string.
    pub fn to_json(&self, node: &Node) -> Result<String> {
        let bytes = self.to_bytes(node, Format::Json)?;
        String::from_utf8(bytes).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Decode a node graph from JSON text.
    pub fn from_json(&self, json: &str) -> Result<Node> {
        self.from_bytes(json.as_bytes(), Format::Json)
    }

    /// Write a node graph to `path`, replacing any existing file.
    pub fn save(&self, node: &Node, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let bytes = self.to_bytes(node, format)?;
        std::fs::write(path, bytes)?;

        tracing::info!(path = %path.display(), %format, "config saved");
        Ok(())
    }

    /// Read a node graph from `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Node> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let bytes = std::fs::read(path)?;
        let node = self.from_bytes(&bytes, format)?;

        tracing::info!(path = %path.display(), %format, "config loaded");
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Registry;
    use crate::value::Value;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register("math.mul", |args| Ok(Value::Float(args.f64(0, "a")? * args.f64(1, "b")?)))
            .unwrap();
        registry
    }

    fn sample() -> Node {
        Node::auto("math.mul")
            .kwarg("a", 1.5)
            .kwarg("b", Node::auto("math.mul").kwarg("a", 2).kwarg("b", 2).build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/b.json")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("b.mpk")).unwrap(), Format::MessagePack);
        assert!(matches!(Format::from_path(Path::new("b.yaml")), Err(Error::Format(_))));
        assert!(matches!(Format::from_path(Path::new("json")), Err(Error::Format(_))));
    }

    #[test]
    fn pretty_json_uses_four_space_indent() {
        let registry = registry();
        let json = Codec::new(&registry).to_json(&sample()).unwrap();
        assert!(json.starts_with("{\n    \"obj\": \"math.mul\""), "{json}");
    }

    #[test]
    fn messagepack_bytes_decode_to_equivalent_graph() {
        let registry = registry();
        let codec = Codec::new(&registry);
        let bytes = codec.to_bytes(&sample(), Format::MessagePack).unwrap();
        let node = codec.from_bytes(&bytes, Format::MessagePack).unwrap();

        assert_eq!(codec.encode(&node).unwrap(), codec.encode(&sample()).unwrap());
    }

    #[test]
    fn invalid_json_text_is_reported() {
        let registry = registry();
        assert!(matches!(
            Codec::new(&registry).from_json("{\"obj\": "),
            Err(Error::Json(_))
        ));
    }
}
