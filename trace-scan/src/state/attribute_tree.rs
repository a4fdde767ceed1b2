//! Attribute tree
//!
//! Maps hierarchical attribute paths ("CPUs/0") to dense integer quarks.
//! Quarks are assigned in creation order and never reused.

use crate::types::Quark;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttributeNode {
    name: String,
    parent: Option<Quark>,
}

/// Tree of named attributes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeTree {
    nodes: Vec<AttributeNode>,
    /// (parent, name) -> quark; rebuilt from `nodes` after loading
    #[serde(skip)]
    index: HashMap<(Option<Quark>, String), Quark>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up an existing attribute
    pub fn quark(&self, path: &[String]) -> Option<Quark> {
        if path.is_empty() {
            return None;
        }
        let mut parent = None;
        for segment in path {
            let quark = *self.index.get(&(parent, segment.clone()))?;
            parent = Some(quark);
        }
        parent
    }

    /// Look up an attribute, creating it and any missing ancestors
    ///
    /// Returns the quark of the leaf together with the quarks that were
    /// newly created, in creation order.
    pub fn quark_and_add(&mut self, path: &[String]) -> (Option<Quark>, Vec<Quark>) {
        let mut created = Vec::new();
        let mut parent = None;
        for segment in path {
            let key = (parent, segment.clone());
            let quark = match self.index.get(&key) {
                Some(quark) => *quark,
                None => {
                    let quark = self.nodes.len();
                    self.nodes.push(AttributeNode {
                        name: segment.clone(),
                        parent,
                    });
                    self.index.insert(key, quark);
                    created.push(quark);
                    quark
                }
            };
            parent = Some(quark);
        }
        (parent, created)
    }

    /// Full slash-separated path of a quark
    pub fn full_path(&self, quark: Quark) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(quark);
        while let Some(q) = current {
            let node = self.nodes.get(q)?;
            segments.push(node.name.as_str());
            current = node.parent;
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    /// Rebuild the lookup index after deserialization
    pub(crate) fn rebuild_index(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(quark, node)| ((node.parent, node.name.clone()), quark))
            .collect();
    }
}
