//! The live form tree.
//!
//! [`FormTree`] owns the node arena, the schema resolver, the watcher list
//! for computed directives, and the listener registries. Mutations perform
//! their structural work synchronously (value update, child reconciliation,
//! computed re-evaluation, variant re-selection) so reads like [`FormTree::find`]
//! are coherent immediately; validation and listener notification are
//! deferred until [`FormTree::settle`] drains the batch.

mod build;
mod computed;
mod mutate;
mod settle;
pub mod validate;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::Value;

use schema_form_expression::Expr;

use crate::error::SchemaError;
use crate::events::{ChangeListener, NodeListener, PendingEvent};
use crate::node::{ChildEntry, NodeData, NodeId, NodeKind};
use crate::schema::{SchemaResolver, SchemaType};

use computed::Watcher;
use validate::{default_validator_factory, ValidateFn, ValidationErrorEntry, ValidatorFactory};

/// When the injected validator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Never.
    None,
    /// After every settled mutation batch.
    OnChange,
    /// Only on an explicit [`FormTree::validate`] call.
    OnRequest,
}

/// Construction parameters for [`FormTree::new`].
pub struct FormOptions {
    pub json_schema: Value,
    pub default_value: Option<Value>,
    pub validation_mode: ValidationMode,
    /// Compiles the root schema into a validate function. When absent and
    /// validation is enabled, the bundled `jsonschema`-backed factory is
    /// used.
    pub validator_factory: Option<ValidatorFactory>,
    /// Whole-document listener registered at construction; equivalent to
    /// calling [`FormTree::on_change`] on the new tree.
    pub on_change: Option<ChangeListener>,
}

impl FormOptions {
    pub fn new(json_schema: Value) -> Self {
        FormOptions {
            json_schema,
            default_value: None,
            validation_mode: ValidationMode::OnChange,
            validator_factory: None,
            on_change: None,
        }
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn validator_factory(mut self, factory: ValidatorFactory) -> Self {
        self.validator_factory = Some(factory);
        self
    }

    pub fn on_change(mut self, listener: ChangeListener) -> Self {
        self.on_change = Some(listener);
        self
    }
}

pub struct FormTree {
    pub(crate) resolver: SchemaResolver,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) root: NodeId,
    pub(crate) validation_mode: ValidationMode,
    pub(crate) validator: Option<ValidateFn>,
    pub(crate) global_errors: Vec<ValidationErrorEntry>,
    /// Parsed directive expressions, keyed by source. `None` records a
    /// parse failure so a malformed directive is not re-parsed per change.
    pub(crate) expr_cache: RefCell<HashMap<String, Option<Rc<Expr>>>>,
    pub(crate) watchers: Vec<Watcher>,
    pub(crate) listeners: HashMap<NodeId, BTreeMap<u64, NodeListener>>,
    pub(crate) change_listeners: BTreeMap<u64, ChangeListener>,
    pub(crate) next_token: u64,
    pub(crate) pending: BTreeMap<NodeId, PendingEvent>,
}

impl FormTree {
    pub fn new(options: FormOptions) -> Result<Self, SchemaError> {
        let resolver = SchemaResolver::new(options.json_schema);
        let validator = match options.validation_mode {
            ValidationMode::None => None,
            _ => {
                let root_schema = resolver.raw_root().clone();
                Some(match options.validator_factory {
                    Some(factory) => factory(&root_schema)?,
                    None => default_validator_factory(&root_schema)?,
                })
            }
        };
        let mut tree = FormTree {
            resolver,
            nodes: Vec::new(),
            root: NodeId(0),
            validation_mode: options.validation_mode,
            validator,
            global_errors: Vec::new(),
            expr_cache: RefCell::new(HashMap::new()),
            watchers: Vec::new(),
            listeners: HashMap::new(),
            change_listeners: BTreeMap::new(),
            next_token: 1,
            pending: BTreeMap::new(),
        };
        let root_schema = tree.resolver.resolve_root()?;
        let root = tree.build_node(
            None,
            String::new(),
            "#".to_string(),
            root_schema,
            options.default_value,
            &mut Vec::new(),
        )?;
        tree.root = root;
        tree.initialize();
        if let Some(listener) = options.on_change {
            tree.on_change(listener);
        }
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The materialized value of the whole tree. `None` when nothing is
    /// defined anywhere.
    pub fn value(&self) -> Option<&Value> {
        self.nodes[self.root.index()].value.as_ref()
    }

    pub fn node_value(&self, id: NodeId) -> Option<&Value> {
        let node = self.node(id)?;
        node.value.as_ref()
    }

    pub fn path(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.path.as_str())
    }

    pub fn schema_path(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.schema_path.as_str())
    }

    pub fn node_type(&self, id: NodeId) -> Option<SchemaType> {
        self.node(id).map(|n| n.schema.ty)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn nullable(&self, id: NodeId) -> Option<bool> {
        self.node(id).map(|n| n.schema.nullable)
    }

    /// Ordered child list; empty for scalar and terminal nodes.
    pub fn children(&self, id: NodeId) -> &[ChildEntry] {
        self.node(id)
            .and_then(|n| n.children.as_deref())
            .unwrap_or(&[])
    }

    pub fn errors(&self, id: NodeId) -> &[ValidationErrorEntry] {
        self.node(id).map(|n| n.errors.as_slice()).unwrap_or(&[])
    }

    /// The full unfiltered list from the last validation run. Root scoped.
    pub fn global_errors(&self) -> &[ValidationErrorEntry] {
        &self.global_errors
    }

    pub fn dirty(&self, id: NodeId) -> Option<bool> {
        self.node(id).map(|n| n.dirty)
    }

    pub fn touched(&self, id: NodeId) -> Option<bool> {
        self.node(id).map(|n| n.touched)
    }

    pub fn validation_enabled(&self, id: NodeId) -> Option<bool> {
        self.node(id).map(|n| n.validation_enabled)
    }

    /// Switches error routing for one node. Disabling clears its current
    /// findings; the root's global list keeps reporting them.
    pub fn set_validation_enabled(&mut self, id: NodeId, enabled: bool) {
        if self.node(id).is_none() || self.nodes[id.index()].validation_enabled == enabled {
            return;
        }
        self.nodes[id.index()].validation_enabled = enabled;
        if !enabled && !self.nodes[id.index()].errors.is_empty() {
            self.nodes[id.index()].errors.clear();
            self.queue_event(id, crate::events::NodeEventFlags::UPDATE_ERROR);
        }
    }

    pub fn visible(&self, id: NodeId) -> Option<bool> {
        self.node(id).map(|n| n.visible)
    }

    pub fn active(&self, id: NodeId) -> Option<bool> {
        self.node(id).map(|n| n.active)
    }

    /// Index of the selected `oneOf`/`anyOf` entry, object nodes only.
    pub fn selected_variant(&self, id: NodeId) -> Option<usize> {
        self.node(id)?.selected_variant
    }

    /// Looks a node up by absolute pointer path. A leading `#` is accepted
    /// and ignored. Nodes in dematerialized variant branches do not resolve.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let path = schema_form_json_pointer::strip_fragment(path);
        self.find_absolute(path)
    }

    /// Looks a node up relative to `from`: `./x`, `../y`, `/absolute`, or a
    /// bare key.
    pub fn find_from(&self, from: NodeId, reference: &str) -> Option<NodeId> {
        let base = &self.node(from)?.path;
        let absolute = schema_form_json_pointer::join(base, reference).ok()?;
        self.find_absolute(&absolute)
    }

    /// Subscribes to settled per-node events. Returns an unsubscribe token.
    pub fn subscribe(&mut self, id: NodeId, listener: NodeListener) -> u64 {
        let token = self.next_token;
        self.next_token = self.next_token.saturating_add(1);
        self.listeners.entry(id).or_default().insert(token, listener);
        token
    }

    pub fn unsubscribe(&mut self, id: NodeId, token: u64) -> bool {
        self.listeners
            .get_mut(&id)
            .map(|map| map.remove(&token).is_some())
            .unwrap_or(false)
    }

    /// Registers a whole-document listener, fired once per settled batch
    /// with the materialized root value.
    pub fn on_change(&mut self, listener: ChangeListener) -> u64 {
        let token = self.next_token;
        self.next_token = self.next_token.saturating_add(1);
        self.change_listeners.insert(token, listener);
        token
    }

    pub fn off_change(&mut self, token: u64) -> bool {
        self.change_listeners.remove(&token).is_some()
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&NodeData> {
        let node = self.nodes.get(id.index())?;
        node.alive.then_some(node)
    }

    pub(crate) fn find_absolute(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root;
        for segment in schema_form_json_pointer::split_segments(path) {
            let node = self.node(current)?;
            current = match node.kind {
                NodeKind::Object => node.child_by_key(&segment)?,
                NodeKind::Array => {
                    if !schema_form_json_pointer::is_valid_index(&segment) {
                        return None;
                    }
                    node.child_at(segment.parse::<usize>().ok()?)?
                }
                NodeKind::Scalar => return None,
            };
        }
        self.node(current).map(|_| current)
    }
}
