//! Stable identities for document nodes.
//!
//! Model nodes are immutable `Rc`s that get replaced on every edit, so the
//! registry hands out opaque [`Key`]s and keeps them attached to "the same"
//! node across edits through the [`KeyMigration`] apply hook. A render pass
//! records parent/index back-links and surface element bindings, which is
//! enough to rebuild a path from a node or a surface element alone.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::error::EngineError;
use crate::model::{ApplyHook, Editor, Node, NodeRef, Operation, Path, path};
use crate::surface::SurfaceId;

/// Opaque, process-unique node identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Key(u64);

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct Entry {
    node: Weak<Node>,
    parent: Option<(Key, usize)>,
    element: Option<SurfaceId>,
}

/// Arena of keyed entries with explicit unmount
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Option<Entry>>,
    by_node: HashMap<*const Node, Key>,
    by_element: HashMap<SurfaceId, Key>,
    root: Option<Key>,
}

pub type SharedRegistry = Rc<RefCell<Registry>>;

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Rc::new(RefCell::new(Self::new()))
    }

    fn entry(&self, key: Key) -> Option<&Entry> {
        self.entries.get(key.0 as usize).and_then(Option::as_ref)
    }

    fn entry_mut(&mut self, key: Key) -> Option<&mut Entry> {
        self.entries.get_mut(key.0 as usize).and_then(Option::as_mut)
    }

    /// The key of `node`, allocating one on first lookup
    pub fn key_of(&mut self, node: &NodeRef) -> Key {
        if let Some(key) = self.find_key(node) {
            return key;
        }
        let key = Key(self.entries.len() as u64);
        self.entries.push(Some(Entry {
            node: Rc::downgrade(node),
            parent: None,
            element: None,
        }));
        self.by_node.insert(Rc::as_ptr(node), key);
        key
    }

    /// The key of `node` if it already has one
    pub fn find_key(&self, node: &NodeRef) -> Option<Key> {
        let key = *self.by_node.get(&Rc::as_ptr(node))?;
        let entry = self.entry(key)?;
        entry
            .node
            .upgrade()
            .is_some_and(|live| Rc::ptr_eq(&live, node))
            .then_some(key)
    }

    pub fn node_of(&self, key: Key) -> Option<NodeRef> {
        self.entry(key)?.node.upgrade()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> Option<Key> {
        self.root
    }

    pub fn set_root(&mut self, key: Key) {
        if let Some(entry) = self.entry_mut(key) {
            entry.parent = None;
        }
        self.root = Some(key);
    }

    /// Record that `child` sits at `index` under `parent`, replacing any
    /// stale link from an earlier render
    pub fn record_child(&mut self, parent: Key, index: usize, child: Key) {
        if let Some(entry) = self.entry_mut(child) {
            entry.parent = Some((parent, index));
        }
    }

    /// Rebuild the path of `key` from its back-links.
    ///
    /// Fails when a link is missing or no longer agrees with the parent's
    /// current children.
    pub fn path_of(&self, key: Key) -> Result<Path, EngineError> {
        let mut reversed = Vec::new();
        let mut current = key;
        let fail = |reversed: &Path| EngineError::PathResolution {
            key,
            partial: reversed.iter().rev().copied().collect(),
        };

        for _ in 0..=self.entries.len() {
            if Some(current) == self.root {
                reversed.reverse();
                return Ok(reversed);
            }
            let entry = self.entry(current).ok_or_else(|| fail(&reversed))?;
            let (parent, index) = entry.parent.ok_or_else(|| fail(&reversed))?;
            let child = entry.node.upgrade().ok_or_else(|| fail(&reversed))?;
            let consistent = self
                .node_of(parent)
                .and_then(|parent| parent.children().get(index).cloned())
                .is_some_and(|at_index| Rc::ptr_eq(&at_index, &child));
            if !consistent {
                return Err(fail(&reversed));
            }
            reversed.push(index);
            current = parent;
        }
        Err(fail(&reversed))
    }

    /// Path of `node`, allocating its key if needed
    pub fn node_path(&mut self, node: &NodeRef) -> Result<Path, EngineError> {
        let key = self.key_of(node);
        self.path_of(key)
    }

    pub fn bind_element(&mut self, key: Key, element: SurfaceId) {
        if let Some(entry) = self.entry_mut(key) {
            if let Some(previous) = entry.element.replace(element) {
                self.by_element.remove(&previous);
            }
            self.by_element.insert(element, key);
        }
    }

    pub fn unbind_element(&mut self, key: Key) {
        if let Some(element) = self.entry_mut(key).and_then(|entry| entry.element.take()) {
            self.by_element.remove(&element);
        }
    }

    /// Forget every element binding ahead of a full render pass
    pub fn unbind_all(&mut self) {
        for entry in self.entries.iter_mut().flatten() {
            entry.element = None;
        }
        self.by_element.clear();
    }

    pub fn element_of(&self, key: Key) -> Result<SurfaceId, EngineError> {
        self.entry(key)
            .and_then(|entry| entry.element)
            .ok_or(EngineError::ElementNotMounted(key))
    }

    pub fn key_for_element(&self, element: SurfaceId) -> Option<Key> {
        self.by_element.get(&element).copied()
    }

    pub fn node_for_element(&self, element: SurfaceId) -> Option<NodeRef> {
        self.node_of(self.key_for_element(element)?)
    }

    /// Move `key` onto `node`, the node that replaced the one it denoted
    pub fn assign(&mut self, key: Key, node: &NodeRef) {
        let ptr = Rc::as_ptr(node);
        let Some(entry) = self.entries.get_mut(key.0 as usize).and_then(Option::as_mut) else {
            return;
        };
        let previous = entry.node.as_ptr();
        entry.node = Rc::downgrade(node);
        if self.by_node.get(&previous) == Some(&key) {
            self.by_node.remove(&previous);
        }
        self.by_node.insert(ptr, key);
    }

    /// Drop entries the last render pass did not bind, plus any whose node
    /// is gone
    pub fn release_unmounted(&mut self) {
        let root = self.root;
        let mut released = 0;
        for (index, slot) in self.entries.iter_mut().enumerate() {
            let Some(entry) = slot else {
                continue;
            };
            let key = Key(index as u64);
            let alive = entry.node.strong_count() > 0;
            if alive && (entry.element.is_some() || Some(key) == root) {
                continue;
            }
            let ptr = entry.node.as_ptr();
            if self.by_node.get(&ptr) == Some(&key) {
                self.by_node.remove(&ptr);
            }
            if let Some(element) = entry.element {
                self.by_element.remove(&element);
            }
            *slot = None;
            released += 1;
        }
        if released > 0 {
            log::trace!("released {released} unmounted keys");
        }
    }
}

/// Apply hook that keeps keys attached to the nodes they denote.
///
/// Before an operation it snapshots the keys along the path the operation
/// rewrites; afterwards it hands each key to the node now at that path.
pub struct KeyMigration {
    registry: SharedRegistry,
    pending: Vec<(Path, Key)>,
}

impl KeyMigration {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            pending: Vec::new(),
        }
    }

    /// The deepest path whose nodes survive `op` under a new allocation
    fn rewritten_path(op: &Operation) -> Option<Path> {
        match op {
            Operation::InsertText { path, .. }
            | Operation::RemoveText { path, .. }
            | Operation::SetNode { path, .. }
            | Operation::SplitNode { path, .. } => Some(path.clone()),
            Operation::InsertNode { path, .. } | Operation::RemoveNode { path, .. } => {
                Some(path::parent(path))
            }
            Operation::MergeNode { path, .. } => {
                Some(path::previous(path).unwrap_or_else(|| path::parent(path)))
            }
            Operation::SetSelection { .. } => None,
        }
    }
}

impl ApplyHook for KeyMigration {
    fn before_apply(&mut self, editor: &Editor, op: &Operation) {
        let Some(path) = Self::rewritten_path(op) else {
            return;
        };
        let mut registry = self.registry.borrow_mut();
        self.pending = editor
            .levels(&path)
            .into_iter()
            .map(|(path, node)| (path, registry.key_of(&node)))
            .collect();
    }

    fn after_apply(&mut self, editor: &Editor, _op: &Operation) {
        if self.pending.is_empty() {
            return;
        }
        let mut registry = self.registry.borrow_mut();
        for (path, key) in self.pending.drain(..) {
            if let Some(node) = editor.node(&path) {
                registry.assign(key, node);
            }
        }
    }
}
