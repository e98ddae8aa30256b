use std::sync::RwLock;

use indexmap::IndexMap;
use serde_json::Value;

use crate::{Error, Result};

/// A namespace tree. Branches map names to children in insertion order;
/// leaves hold a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Value),
    Branch(IndexMap<String, Node>),
}

/// Returned by `Node::insert` when the path would turn a leaf into a
/// namespace or replace a namespace with a leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    pub path: String,
}

impl Default for Node {
    fn default() -> Self {
        Node::Branch(IndexMap::new())
    }
}

impl Node {
    /// Objects become branches, everything else becomes a leaf
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Node::Branch(
                map.into_iter()
                    .map(|(k, v)| (k, Node::from_value(v)))
                    .collect(),
            ),
            other => Node::Leaf(other),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Node::Leaf(value) => value.clone(),
            Node::Branch(children) => Value::Object(
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Branch(children) if children.is_empty())
    }

    pub fn get(&self, path: &[&str]) -> Option<&Node> {
        let mut node = self;
        for segment in path {
            match node {
                Node::Branch(children) => node = children.get(*segment)?,
                Node::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    /// Insert `value` as a leaf at `path`, creating intermediate branches.
    /// Overwriting an existing leaf is allowed; changing the shape of the tree is not.
    pub fn insert(&mut self, path: &[&str], value: Value) -> std::result::Result<(), PathConflict> {
        let conflict = || PathConflict {
            path: path.join("."),
        };
        let Some((last, parents)) = path.split_last() else {
            return Err(conflict());
        };
        let mut node = self;
        for segment in parents {
            let Node::Branch(children) = node else {
                return Err(conflict());
            };
            node = children
                .entry(segment.to_string())
                .or_insert_with(Node::default);
        }
        let Node::Branch(children) = node else {
            return Err(conflict());
        };
        if let Some(Node::Branch(_)) = children.get(*last) {
            return Err(conflict());
        }
        children.insert(last.to_string(), Node::Leaf(value));
        Ok(())
    }

    /// Deep merge `other` into `self`; on collisions `other` wins unless both sides are branches
    pub fn merge(&mut self, other: Node) {
        match (self, other) {
            (Node::Branch(ours), Node::Branch(theirs)) => {
                for (key, theirs) in theirs {
                    match ours.get_mut(&key) {
                        Some(existing) => existing.merge(theirs),
                        None => {
                            ours.insert(key, theirs);
                        }
                    }
                }
            }
            (ours, theirs) => *ours = theirs,
        }
    }

    /// Text substituted into expressions: strings verbatim, everything else as JSON
    pub fn stringify(&self) -> String {
        match self {
            Node::Leaf(Value::String(s)) => s.clone(),
            Node::Leaf(value) => value.to_string(),
            branch => branch.to_value().to_string(),
        }
    }
}

/// Variable namespaces of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Namespace {
    Validation,
    Definitions,
    Outputs,
}

/// Holds the `Validation`, `Definitions` and `Outputs` namespaces.
///
/// Writes take the namespace's lock so targets running in parallel cannot
/// corrupt the tree; two targets writing the same name is last-write-wins.
#[derive(Debug, Default)]
pub struct VariableStore {
    validation: RwLock<Node>,
    definitions: RwLock<Node>,
    outputs: RwLock<Node>,
}

impl VariableStore {
    fn namespace(&self, ns: Namespace) -> &RwLock<Node> {
        match ns {
            Namespace::Validation => &self.validation,
            Namespace::Definitions => &self.definitions,
            Namespace::Outputs => &self.outputs,
        }
    }

    /// Stringified value at `path`, or `None` when any segment is missing
    pub fn lookup(&self, ns: Namespace, path: &[&str]) -> Option<String> {
        let tree = self.namespace(ns).read().unwrap();
        tree.get(path).map(Node::stringify)
    }

    pub fn snapshot(&self, ns: Namespace) -> Value {
        self.namespace(ns).read().unwrap().to_value()
    }

    pub fn load_definitions(&self, definitions: Value) {
        self.definitions
            .write()
            .unwrap()
            .merge(Node::from_value(definitions));
    }

    /// Record an output. It is always visible to later steps through
    /// `Validation`; `publish` also adds it to the run's `Outputs`.
    pub fn set_output(&self, name: &str, value: Value, publish: bool) -> Result<()> {
        let path = name.split('.').collect::<Vec<_>>();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(Error::InvalidOutputName(name.to_string()).into());
        }
        self.validation
            .write()
            .unwrap()
            .insert(&path, value.clone())
            .map_err(|c| Error::InvalidOutputName(c.path))?;
        if publish {
            self.outputs
                .write()
                .unwrap()
                .insert(&path, value)
                .map_err(|c| Error::InvalidOutputName(c.path))?;
        }
        Ok(())
    }
}
