// ── Config tree ──
//
// The internal representation shared by both ingress walkers, the
// marshallers and the diff engine. A block owns its children; the device
// path of a node is threaded through recursion as a `TreePath` instead of
// being stored, so the tree has no parent links.

pub mod diff;
pub mod egress;
pub mod ingress;

use std::fmt;

use indexmap::IndexMap;

use crate::schema::{BlockSchema, ScalarKind, Schema};

pub use diff::{TreeDiff, diff};
pub use egress::{to_declared, to_log_json, to_wire};
pub use ingress::{from_declared, from_device};

/// Device-wire spelling of a schema key.
pub fn hyphenate(key: &str) -> String {
    key.replace('_', "-")
}

// ── TypedValue ──────────────────────────────────────────────────────

/// One stored value: its kind and its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValue {
    kind: ScalarKind,
    raw: String,
}

impl TypedValue {
    pub fn new(kind: ScalarKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Same kind and same value under that kind.
    pub fn matches(&self, other: &Self) -> bool {
        self.kind == other.kind && self.kind.same_value(&self.raw, &other.raw)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ── BlockKind ───────────────────────────────────────────────────────

/// Declared kind of a block, carried over from its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Resource root; its key is the full device path.
    Root,
    Scalar(ScalarKind),
    List(ScalarKind),
    Block,
}

impl BlockKind {
    pub fn of(schema: &Schema) -> Self {
        match schema {
            Schema::Scalar(kind) => Self::Scalar(*kind),
            Schema::List(kind) => Self::List(*kind),
            Schema::Block(_) => Self::Block,
        }
    }
}

// ── Block ───────────────────────────────────────────────────────────

/// A named node of the config tree.
///
/// Scalars carry exactly one value, leaf lists carry N, blocks carry
/// children. Child keys are unique; iteration follows insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    key: String,
    kind: BlockKind,
    values: Vec<TypedValue>,
    children: IndexMap<String, Block>,
}

impl Block {
    pub fn new(key: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            key: key.into(),
            kind,
            values: Vec::new(),
            children: IndexMap::new(),
        }
    }

    /// Root block keyed by a full device path.
    pub fn root(path: impl Into<String>) -> Self {
        Self::new(path, BlockKind::Root)
    }

    /// Scalar block holding one value.
    pub fn scalar(key: impl Into<String>, kind: ScalarKind, raw: impl Into<String>) -> Self {
        let mut block = Self::new(key, BlockKind::Scalar(kind));
        block.push_value(TypedValue::new(kind, raw));
        block
    }

    /// Leaf-list block holding `items` in order.
    pub fn list<I, S>(key: impl Into<String>, kind: ScalarKind, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut block = Self::new(key, BlockKind::List(kind));
        for item in items {
            block.push_value(TypedValue::new(kind, item));
        }
        block
    }

    /// Empty copy of this block: same key and kind, no content.
    pub fn shell(&self) -> Self {
        Self::new(self.key.clone(), self.kind)
    }

    /// Local key as written in the schema (`shared_network_name`).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key as the device spells it. Root keys are device paths already.
    pub fn wire_key(&self) -> String {
        match self.kind {
            BlockKind::Root => self.key.clone(),
            _ => hyphenate(&self.key),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }

    pub fn push_value(&mut self, value: TypedValue) {
        self.values.push(value);
    }

    pub fn children(&self) -> impl Iterator<Item = &Block> {
        self.children.values()
    }

    pub fn child(&self, key: &str) -> Option<&Block> {
        self.children.get(key)
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut Block> {
        self.children.get_mut(key)
    }

    /// Attach `child`, replacing any existing child with the same key.
    pub fn attach(&mut self, child: Block) -> &mut Block {
        let (index, _) = self.children.insert_full(child.key.clone(), child);
        &mut self.children[index]
    }

    /// Builder-style [`attach`](Self::attach).
    pub fn with_child(mut self, child: Block) -> Self {
        self.attach(child);
        self
    }

    pub fn remove_child(&mut self, key: &str) -> Option<Block> {
        self.children.shift_remove(key)
    }

    /// Keep only children whose key satisfies `keep`; returns how many were dropped.
    pub fn retain_children(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.children.len();
        self.children.retain(|key, _| keep(key));
        before - self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// No values and no children.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty()
    }
}

/// Drop top-level children whose key the schema does not declare.
///
/// Used for device-wide singletons: the device subtree at their path holds
/// siblings owned by other resources.
pub fn prune_unknown(root: &mut Block, schema: &BlockSchema) -> usize {
    root.retain_children(|key| schema.contains(key))
}

// ── TreePath ────────────────────────────────────────────────────────

/// Device path of the node being visited, for diagnostics.
#[derive(Debug, Clone, Default)]
pub(crate) struct TreePath(Vec<String>);

impl TreePath {
    pub(crate) fn root(path: &str) -> Self {
        Self(vec![path.to_owned()])
    }

    pub(crate) fn push(&mut self, key: &str) {
        self.0.push(hyphenate(key));
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn wire_keys_are_hyphenated_except_root() {
        let root = Block::root("service dhcp-server shared-network-name LAN_1");
        assert_eq!(root.wire_key(), "service dhcp-server shared-network-name LAN_1");
        let child = Block::new("shared_network_name", BlockKind::Block);
        assert_eq!(child.wire_key(), "shared-network-name");
    }

    #[test]
    fn attach_replaces_same_key() {
        let mut root = Block::root("x");
        root.attach(Block::scalar("a", ScalarKind::String, "1"));
        root.attach(Block::scalar("a", ScalarKind::String, "2"));
        assert_eq!(root.children().count(), 1);
        assert_eq!(root.child("a").unwrap().values()[0].raw(), "2");
    }

    #[test]
    fn equality_ignores_child_order() {
        let a = Block::root("x")
            .with_child(Block::scalar("a", ScalarKind::String, "1"))
            .with_child(Block::scalar("b", ScalarKind::String, "2"));
        let b = Block::root("x")
            .with_child(Block::scalar("b", ScalarKind::String, "2"))
            .with_child(Block::scalar("a", ScalarKind::String, "1"));
        assert_eq!(a, b);
    }

    #[test]
    fn prune_drops_undeclared_children() {
        let schema = BlockSchema::new().field("hostfile_update", Field::bool());
        let mut root = Block::root("service dhcp-server")
            .with_child(Block::scalar("hostfile_update", ScalarKind::Bool, "true"))
            .with_child(Block::new("shared_network_name", BlockKind::Block));
        assert_eq!(prune_unknown(&mut root, &schema), 1);
        assert!(root.child("shared_network_name").is_none());
    }

    #[test]
    fn tree_path_renders_wire_form() {
        let mut path = TreePath::root("service dhcp-server");
        path.push("shared_network_name");
        path.push("LAN");
        assert_eq!(path.to_string(), "service dhcp-server shared-network-name LAN");
        path.pop();
        assert_eq!(path.to_string(), "service dhcp-server shared-network-name");
    }
}
