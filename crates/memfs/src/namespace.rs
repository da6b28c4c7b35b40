// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::node::{Node, NodeId};
use crate::path::{self, ROOT};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./namespace_test.rs"]
mod namespace_test;

/// The table of all filesystem objects.
///
/// Nodes live in an arena keyed by their stable id, and a separate
/// ordered index maps each current path to its node. Renaming only
/// rewrites index entries, nodes never move. The namespace itself is
/// not synchronized, callers hold the filesystem's namespace lock for
/// every call.
#[derive(Debug)]
pub struct Namespace {
    nodes: HashMap<NodeId, Node>,
    paths: BTreeMap<String, NodeId>,
    next_index: NodeId,
}

impl Namespace {
    /// Create a namespace holding only the given root directory
    pub fn new(mut root: Node) -> Self {
        root.path = ROOT.to_string();
        let mut namespace = Self {
            nodes: HashMap::new(),
            paths: BTreeMap::new(),
            // index numbers start at 1 so that zero is never a valid node
            next_index: 1,
        };
        namespace.insert(root);
        namespace
    }

    /// The number of stored objects, including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false, the root directory cannot be removed
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if an object is stored at exactly this path
    pub fn exists(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// The id of the object at this path, if any
    pub fn id_of(&self, path: &str) -> Option<NodeId> {
        self.paths.get(path).copied()
    }

    /// The node with this id, if it is still stored
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Mutable access to the node with this id, if it is still stored
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Resolve the object stored at `path`.
    ///
    /// A missing object is reported as [`Error::NotFound`] only when
    /// all of its parents exist, otherwise the parent chain determines
    /// the error as in [`Namespace::parent_dir`].
    pub fn get(&self, path: &str) -> Result<NodeId> {
        if let Some(id) = self.id_of(path) {
            return Ok(id);
        }
        self.parent_dir(path)?;
        Err(Error::NotFound(path.to_string()))
    }

    /// Resolve the directory that would contain `path`.
    ///
    /// Fails with [`Error::PathNotFound`] when any intermediate directory
    /// is missing, and [`Error::NotADirectory`] when one is a file.
    pub fn parent_dir(&self, path: &str) -> Result<NodeId> {
        let Some(parent) = path::parent(path) else {
            return Err(Error::InvalidParameter(
                "the root directory has no parent".into(),
            ));
        };
        let mut found = None;
        for step in path::intermediates(path) {
            let Some(id) = self.id_of(step) else {
                return Err(Error::PathNotFound(path.to_string()));
            };
            if !self.nodes.get(&id).is_some_and(Node::is_dir) {
                return Err(Error::NotADirectory(path.to_string()));
            }
            found = Some(id);
        }
        match found {
            Some(id) => Ok(id),
            None => self
                .id_of(parent)
                .ok_or_else(|| Error::InternalError("root directory is missing".into())),
        }
    }

    /// Store a node at its path, assigning its index number.
    ///
    /// Any object already stored at that path is replaced and dropped.
    pub fn insert(&mut self, mut node: Node) -> NodeId {
        let id = self.next_index;
        self.next_index += 1;
        node.index_number = id;
        if let Some(previous) = self.paths.insert(node.path.clone(), id) {
            self.nodes.remove(&previous);
        }
        self.nodes.insert(id, node);
        id
    }

    /// Remove and return the object stored at `path`.
    ///
    /// Descendants are not touched, callers must check emptiness first.
    pub fn remove(&mut self, path: &str) -> Option<Node> {
        if path == ROOT {
            return None;
        }
        let id = self.paths.remove(path)?;
        self.nodes.remove(&id)
    }

    /// True if any object is stored strictly below `path`
    pub fn has_descendants(&self, path: &str) -> bool {
        self.descendants(path).next().is_some()
    }

    /// The ids of all objects directly inside the directory at `path`
    pub fn children(&self, path: &str) -> Vec<NodeId> {
        let prefix_len = path::descendant_prefix(path).len();
        self.descendants(path)
            .filter(|(p, _)| !p[prefix_len..].contains('/'))
            .map(|(_, id)| id)
            .collect()
    }

    /// Move the object at `old` and everything below it to `new`.
    ///
    /// The caller has already validated the destination. The whole
    /// subtree is re-keyed in one step, no lookup can observe it
    /// partially moved while the namespace lock is held.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let Some(id) = self.paths.remove(old) else {
            return Err(Error::NotFound(old.to_string()));
        };
        let mut moved = vec![(id, new.to_string())];
        let descendants: Vec<_> = self
            .descendants(old)
            .map(|(p, id)| (p.to_string(), id))
            .collect();
        for (path, id) in descendants {
            self.paths.remove(&path);
            moved.push((id, path::reparent(&path, old, new)));
        }
        for (id, path) in moved {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.path = path.clone();
            }
            self.paths.insert(path, id);
        }
        Ok(())
    }

    fn descendants<'a>(&'a self, path: &str) -> impl Iterator<Item = (&'a str, NodeId)> + 'a {
        let prefix = path::descendant_prefix(path);
        let start = Bound::Excluded(prefix.clone());
        self.paths
            .range((start, Bound::Unbounded))
            .take_while(move |(p, _)| p.starts_with(&prefix))
            .map(|(p, id)| (p.as_str(), *id))
    }
}
