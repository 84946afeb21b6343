//! Arena storage for tree nodes.
//!
//! Nodes are addressed by [`NodeId`] into a `Vec` owned by the tree. A node
//! is never physically removed; structural deletion flips `alive` off and
//! drops the subtree's entries from its parent's child list. Identifiers are
//! therefore stable for the lifetime of the tree, which is what keeps
//! subscriptions valid across reconciliation.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::schema::{CanonicalSchema, SchemaType};
use crate::tree::validate::ValidationErrorEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Structural role of a node.
///
/// `Scalar` covers string/number/boolean/null schemas and any fragment
/// marked `terminal: true`; such nodes keep their subtree as one opaque
/// value and never have children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
    Scalar,
}

impl NodeKind {
    pub(crate) fn of(schema: &CanonicalSchema) -> Self {
        if schema.terminal {
            return NodeKind::Scalar;
        }
        match schema.ty {
            SchemaType::Object => NodeKind::Object,
            SchemaType::Array => NodeKind::Array,
            _ => NodeKind::Scalar,
        }
    }
}

/// One slot in a branch node's ordered child list.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub key: String,
    pub node: NodeId,
}

pub(crate) struct NodeData {
    pub parent: Option<NodeId>,
    /// Data path. Empty at the root, `/a/0/b` below.
    pub path: String,
    /// Schema location, `#`-prefixed. Encodes the active variant branch for
    /// variant-exclusive children (`#/.../oneOf/1/properties/x`).
    pub schema_path: String,
    pub schema: Rc<CanonicalSchema>,
    pub kind: NodeKind,
    /// `None` is the unset state: the location exists in the schema but the
    /// document defines no value there. Branch nodes cache their
    /// materialized value here.
    pub value: Option<Value>,
    /// `None` for scalar nodes, `Some` (possibly empty) for branches.
    pub children: Option<Vec<ChildEntry>>,
    /// Index into `schema.variants`, object nodes only.
    pub selected_variant: Option<usize>,
    /// Values held for properties with no live child: dematerialized
    /// variant branches and unknown keys from assigned values. Feeds the
    /// enhanced value and is restored on variant re-selection.
    pub shadow: Map<String, Value>,
    pub errors: Vec<ValidationErrorEntry>,
    /// Whether a value was ever explicitly assigned here. Unassigned branch
    /// nodes with no defined children materialize as unset.
    pub assigned: bool,
    pub dirty: bool,
    pub touched: bool,
    /// Nodes with validation switched off keep an empty error list; the
    /// root's global list is unaffected.
    pub validation_enabled: bool,
    pub visible: bool,
    pub active: bool,
    pub alive: bool,
}

impl NodeData {
    pub(crate) fn new(
        parent: Option<NodeId>,
        path: String,
        schema_path: String,
        schema: Rc<CanonicalSchema>,
    ) -> Self {
        let kind = NodeKind::of(&schema);
        NodeData {
            parent,
            path,
            schema_path,
            schema,
            kind,
            value: None,
            children: match kind {
                NodeKind::Scalar => None,
                _ => Some(Vec::new()),
            },
            selected_variant: None,
            shadow: Map::new(),
            errors: Vec::new(),
            assigned: false,
            dirty: false,
            touched: false,
            validation_enabled: true,
            visible: true,
            active: true,
            alive: true,
        }
    }

    pub(crate) fn child_by_key(&self, key: &str) -> Option<NodeId> {
        self.children
            .as_ref()?
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.node)
    }

    pub(crate) fn child_at(&self, index: usize) -> Option<NodeId> {
        self.children.as_ref()?.get(index).map(|entry| entry.node)
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.as_ref().map(Vec::len).unwrap_or(0)
    }
}
