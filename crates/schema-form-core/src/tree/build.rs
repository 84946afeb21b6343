//! Node construction.
//!
//! The factory walks the schema root-down, resolving each child fragment
//! lazily and choosing a strategy per node: scalar and terminal nodes store
//! the subtree as one opaque value, object branches instantiate a child per
//! declared property, array branches fill up to `minItems` with defaults or
//! the type's empty value. Recursive `$ref` children with no value are not
//! materialized; they appear once a value is assigned at their location.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::events::NodeEventFlags;
use crate::node::{ChildEntry, NodeData, NodeId, NodeKind};
use crate::schema::{CanonicalSchema, SchemaType};

use super::FormTree;

/// Backstop on `$ref` nesting during a single build traversal.
const MAX_REF_DEPTH: usize = 64;

impl FormTree {
    pub(crate) fn build_node(
        &mut self,
        parent: Option<NodeId>,
        path: String,
        schema_path: String,
        schema: Rc<CanonicalSchema>,
        value: Option<Value>,
        ref_stack: &mut Vec<String>,
    ) -> Result<NodeId, SchemaError> {
        let mut value = value.or_else(|| schema.default.clone());
        if matches!(value, Some(Value::Null)) && !schema.nullable && schema.ty != SchemaType::Null {
            value = schema.empty_value();
        }

        let id = NodeId(self.nodes.len() as u32);
        let mut data = NodeData::new(parent, path, schema_path, Rc::clone(&schema));
        data.assigned = value.is_some();
        self.nodes.push(data);

        let guarded = schema.ref_key.clone();
        if let Some(key) = guarded.clone() {
            ref_stack.push(key);
        }
        let built = self.build_children(id, &schema, value, ref_stack);
        if guarded.is_some() {
            ref_stack.pop();
        }
        built?;

        self.register_watchers(id);
        self.queue_event(id, NodeEventFlags::INITIALIZED);
        Ok(id)
    }

    fn build_children(
        &mut self,
        id: NodeId,
        schema: &CanonicalSchema,
        value: Option<Value>,
        ref_stack: &mut Vec<String>,
    ) -> Result<(), SchemaError> {
        match self.nodes[id.index()].kind {
            NodeKind::Scalar => {
                self.nodes[id.index()].value = value;
            }
            NodeKind::Object => {
                let mut map = match value {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                let schema_path = self.nodes[id.index()].schema_path.clone();
                for (key, fragment) in schema.properties.clone() {
                    let child_value = map.remove(&key);
                    let child_schema_path = format!("{schema_path}/properties/{key}");
                    self.build_child(id, key, &fragment, child_schema_path, child_value, ref_stack)?;
                }
                // Keys with no declared property wait in the shadow store.
                self.nodes[id.index()].shadow = map;
                self.recompute_branch_value(id);
            }
            NodeKind::Array => {
                let items = match value {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                let provided = items.len();
                let fill_cap = if schema.items_false {
                    Some(schema.prefix_items.len())
                } else {
                    schema.max_items
                };
                let mut fill_target = schema.min_items;
                if let Some(cap) = fill_cap {
                    fill_target = fill_target.min(cap);
                }
                let target = provided.max(fill_target);
                for index in 0..target {
                    let item_value = items.get(index).cloned();
                    self.build_array_item(id, index, item_value, index >= provided, ref_stack)?;
                }
                self.recompute_branch_value(id);
            }
        }
        Ok(())
    }

    /// Builds one object property child. Returns `None` without building
    /// when the child's schema recurses into a `$ref` already on the stack
    /// and there is no value to bound the recursion.
    pub(crate) fn build_child(
        &mut self,
        parent: NodeId,
        key: String,
        fragment: &Value,
        schema_path: String,
        value: Option<Value>,
        ref_stack: &mut Vec<String>,
    ) -> Result<Option<NodeId>, SchemaError> {
        let resolved = self
            .resolver
            .resolve_for_value(fragment, value.as_ref(), &schema_path)?;
        if value.is_none() && resolved.default.is_none() {
            if let Some(ref_key) = &resolved.ref_key {
                if ref_stack.contains(ref_key) || ref_stack.len() >= MAX_REF_DEPTH {
                    return Ok(None);
                }
            }
        }
        let path =
            schema_form_json_pointer::append_segment(&self.nodes[parent.index()].path, &key);
        let child = self.build_node(Some(parent), path, schema_path, resolved, value, ref_stack)?;
        if let Some(children) = self.nodes[parent.index()].children.as_mut() {
            children.push(ChildEntry { key, node: child });
        }
        Ok(Some(child))
    }

    /// Builds one array element. `fill` marks proactive `minItems` slots,
    /// which take the schema default or the type's empty value.
    pub(crate) fn build_array_item(
        &mut self,
        parent: NodeId,
        index: usize,
        value: Option<Value>,
        fill: bool,
        ref_stack: &mut Vec<String>,
    ) -> Result<NodeId, SchemaError> {
        let schema = Rc::clone(&self.nodes[parent.index()].schema);
        let schema_path = self.item_schema_path(parent, index);
        // Positions past the tuple rule only exist through authoritative
        // assignment; they get a fragment inferred from the value.
        let fragment = schema
            .item_fragment(index)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let resolved = self
            .resolver
            .resolve_for_value(&fragment, value.as_ref(), &schema_path)?;
        let value = if fill && value.is_none() {
            resolved.default.clone().or_else(|| resolved.empty_value())
        } else {
            value
        };
        let path =
            schema_form_json_pointer::append_index(&self.nodes[parent.index()].path, index);
        let child =
            self.build_node(Some(parent), path, schema_path, resolved, value, ref_stack)?;
        if let Some(children) = self.nodes[parent.index()].children.as_mut() {
            children.push(ChildEntry {
                key: index.to_string(),
                node: child,
            });
        }
        Ok(child)
    }

    pub(crate) fn item_schema_path(&self, parent: NodeId, index: usize) -> String {
        let base = &self.nodes[parent.index()].schema_path;
        let schema = &self.nodes[parent.index()].schema;
        if index < schema.prefix_items.len() {
            format!("{base}/prefixItems/{index}")
        } else {
            format!("{base}/items")
        }
    }

    /// Recomputes a branch node's cached value from its children. Does not
    /// queue events; mutation paths snapshot before calling.
    pub(crate) fn recompute_branch_value(&mut self, id: NodeId) {
        let value = self.compute_branch_value(id);
        self.nodes[id.index()].value = value;
    }

    /// An object materializes the properties its children define; an array
    /// materializes every element, unset ones as `null`. A branch nothing
    /// was ever assigned to and with no defined children stays unset.
    pub(crate) fn compute_branch_value(&self, id: NodeId) -> Option<Value> {
        let node = &self.nodes[id.index()];
        match node.kind {
            NodeKind::Scalar => node.value.clone(),
            NodeKind::Object => {
                let mut map = Map::new();
                if let Some(children) = &node.children {
                    for entry in children {
                        if let Some(value) = &self.nodes[entry.node.index()].value {
                            map.insert(entry.key.clone(), value.clone());
                        }
                    }
                }
                if node.assigned || !map.is_empty() {
                    Some(Value::Object(map))
                } else {
                    None
                }
            }
            NodeKind::Array => {
                let children = node.children.as_deref().unwrap_or(&[]);
                if node.assigned || !children.is_empty() {
                    let items = children
                        .iter()
                        .map(|entry| {
                            self.nodes[entry.node.index()]
                                .value
                                .clone()
                                .unwrap_or(Value::Null)
                        })
                        .collect();
                    Some(Value::Array(items))
                } else {
                    None
                }
            }
        }
    }

    /// Recomputes ancestor values after a subtree changed, queueing value
    /// events where they actually differ.
    pub(crate) fn propagate_upward(&mut self, id: NodeId) {
        let mut current = self.nodes[id.index()].parent;
        while let Some(pid) = current {
            let recomputed = self.compute_branch_value(pid);
            if recomputed != self.nodes[pid.index()].value {
                self.queue_event(pid, NodeEventFlags::UPDATE_VALUE);
                self.nodes[pid.index()].value = recomputed;
            }
            current = self.nodes[pid.index()].parent;
        }
    }

    /// One-time pass after the initial build: evaluates every directive and
    /// variant selection against the built values, optionally validates,
    /// then discards the event backlog (nothing can be subscribed yet).
    pub(crate) fn initialize(&mut self) {
        self.run_watchers(vec![String::new()]);
        if self.validation_mode == super::ValidationMode::OnChange {
            if let Ok(entries) = self.run_validator() {
                self.distribute_errors(&entries);
            }
        }
        self.pending.clear();
    }
}
