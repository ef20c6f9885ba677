//! Parameter Flattening
//!
//! Renders a node graph as a flat, ordered `key -> argument` listing, the
//! way hyperparameters are usually reported. Nested nodes are expanded in
//! place with their argument name as a key prefix, so
//! `add(a=10, b=subtract(a=15))` flattens to `obj`, `a`, `b_obj`, `b_a`.

use std::fmt;

use indexmap::IndexMap;

use super::node::{Node, TARGET_KEY};
use crate::value::Value;

const COLUMN_WIDTH: usize = 18;

/// Flattened view of a node graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: IndexMap<String, String>,
}

impl Parameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn collect(&mut self, node: &Node, prefix: Option<&str>) {
        let key = |name: &str| match prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.to_string(),
        };

        self.entries.insert(
            key(TARGET_KEY),
            node.target().display_name().to_string(),
        );

        // Positional arguments are keyed by index.
        for (index, value) in node.args().iter().enumerate() {
            self.collect_value(&key(&index.to_string()), value);
        }
        for (name, value) in node.kwargs() {
            self.collect_value(&key(name), value);
        }
    }

    fn collect_value(&mut self, key: &str, value: &Value) {
        match value {
            Value::Node(node) => self.collect(node, Some(key)),
            other => {
                self.entries.insert(key.to_string(), other.to_string());
            }
        }
    }
}

impl Node {
    /// Flatten this node graph into a parameter listing.
    pub fn flatten(&self) -> Parameters {
        let mut parameters = Parameters::default();
        parameters.collect(self, None);
        parameters
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:^w$}|{:^w$}", "key", "argument", w = COLUMN_WIDTH)?;
        writeln!(f, "{}", "-".repeat(2 * COLUMN_WIDTH + 1))?;
        for (key, value) in &self.entries {
            writeln!(f, "{key:^w$}|{value:^w$}", w = COLUMN_WIDTH)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_nodes_are_prefixed() {
        let inner = Node::auto("math.multiply").kwarg("a", 2).kwarg("b", 3).build().unwrap();
        let node = Node::auto("math.add")
            .kwarg("a", 10)
            .kwarg("b", inner)
            .build()
            .unwrap();

        let params = node.flatten();
        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["obj", "a", "b_obj", "b_a", "b_b"]);
        assert_eq!(params.get("b_obj"), Some("math.multiply"));
        assert_eq!(params.get("b_b"), Some("3"));
    }

    #[test]
    fn positional_arguments_use_their_index() {
        let node = Node::auto("nn.Sequential")
            .arg(Node::auto("nn.ReLU").build().unwrap())
            .arg("tail")
            .build()
            .unwrap();

        let params = node.flatten();
        assert_eq!(params.get("0_obj"), Some("nn.ReLU"));
        assert_eq!(params.get("1"), Some("tail"));
    }

    #[test]
    fn table_layout() {
        let node = Node::auto("math.add").kwarg("a", 1).build().unwrap();
        let table = node.flatten().to_string();
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], format!("{:^18}|{:^18}", "key", "argument"));
        assert_eq!(lines[1], "-".repeat(37));
        assert_eq!(lines[3], format!("{:^18}|{:^18}", "a", "1"));
    }
}
