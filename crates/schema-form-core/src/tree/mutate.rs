//! Mutation entry points.
//!
//! Assignment is authoritative: `set_value` replaces the subtree's value
//! wholesale, reusing existing child nodes for keys and indices that
//! survive so subscriptions and dirty/touched state carry over, and it
//! bypasses the `maxItems`/fixed-tuple structural cap. `push`, `remove`,
//! `update` and `clear` are advisory structural operations: they respect
//! the caps and report rejection by returning `None`.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::events::NodeEventFlags;
use crate::node::{NodeId, NodeKind};
use crate::schema::SchemaType;

use super::FormTree;

impl FormTree {
    /// Assigns a value at a node. `null` on a non-nullable node normalizes
    /// to the type's empty value; numbers have none and become unset.
    pub fn set_value(&mut self, id: NodeId, value: Value) {
        if self.node(id).is_none() {
            return;
        }
        let changed = self.set_node_value(id, Some(value));
        self.propagate_upward(id);
        self.finish_mutation(changed);
    }

    /// Removes the value at a node, leaving the location unset.
    pub fn unset_value(&mut self, id: NodeId) {
        if self.node(id).is_none() {
            return;
        }
        let changed = self.set_node_value(id, None);
        self.propagate_upward(id);
        self.finish_mutation(changed);
    }

    /// Appends an element to an array node, typed per the tuple rule for
    /// the new index. Returns `None` when the fixed tuple is exhausted or
    /// `maxItems` is reached.
    pub fn push(&mut self, id: NodeId, value: Option<Value>) -> Option<NodeId> {
        let node = self.node(id)?;
        if node.kind != NodeKind::Array {
            return None;
        }
        let schema = Rc::clone(&node.schema);
        let index = node.child_count();
        if !schema.allows_growth_at(index) {
            return None;
        }
        // Queue after the element builds; a failed build must leave no
        // pending event. The parent's value is still unwritten here, so the
        // snapshot stays pre-batch.
        let child = self
            .build_array_item(id, index, value, true, &mut Vec::new())
            .ok()?;
        self.queue_event(id, NodeEventFlags::UPDATE_VALUE | NodeEventFlags::UPDATE_CHILDREN);
        self.nodes[id.index()].assigned = true;
        self.nodes[id.index()].dirty = true;
        self.nodes[id.index()].touched = true;
        self.recompute_branch_value(id);
        self.propagate_upward(id);
        let path = self.nodes[id.index()].path.clone();
        self.finish_mutation(vec![path]);
        Some(child)
    }

    /// Removes the element at `index`; later elements shift down. Returns
    /// `None` when the index is out of range, leaving the array unchanged.
    pub fn remove(&mut self, id: NodeId, index: usize) -> Option<()> {
        let node = self.node(id)?;
        if node.kind != NodeKind::Array || index >= node.child_count() {
            return None;
        }
        let mut items = self.array_items(id);
        items.remove(index);
        let changed = self.set_node_value(id, Some(Value::Array(items)));
        self.propagate_upward(id);
        self.finish_mutation(changed);
        Some(())
    }

    /// Replaces the element at `index`. Returns the element's node, or
    /// `None` when the index is out of range (array left unchanged).
    pub fn update(&mut self, id: NodeId, index: usize, value: Value) -> Option<NodeId> {
        let node = self.node(id)?;
        if node.kind != NodeKind::Array {
            return None;
        }
        let child = node.child_at(index)?;
        let changed = self.set_node_value(child, Some(value));
        self.propagate_upward(child);
        self.finish_mutation(changed);
        Some(child)
    }

    /// Empties an array node, then refills proactive `minItems` slots the
    /// way the initial build does.
    pub fn clear(&mut self, id: NodeId) -> Option<()> {
        let node = self.node(id)?;
        if node.kind != NodeKind::Array {
            return None;
        }
        let min_items = node.schema.min_items;
        let changed = self.set_node_value(id, Some(Value::Array(Vec::new())));
        self.propagate_upward(id);
        self.finish_mutation(changed);
        while self.node(id).map(|n| n.child_count()).unwrap_or(0) < min_items {
            if self.push(id, None).is_none() {
                break;
            }
        }
        Some(())
    }

    /// Synchronous portion of an assignment. Returns the data paths whose
    /// values changed, for watcher dispatch.
    pub(crate) fn set_node_value(&mut self, id: NodeId, value: Option<Value>) -> Vec<String> {
        if self.node(id).is_none() {
            return Vec::new();
        }
        let schema = Rc::clone(&self.nodes[id.index()].schema);
        let mut value = value;
        if matches!(value, Some(Value::Null)) && !schema.nullable && schema.ty != SchemaType::Null {
            value = schema.empty_value();
        }
        match self.nodes[id.index()].kind {
            NodeKind::Scalar => {
                if self.nodes[id.index()].value == value {
                    return Vec::new();
                }
                self.queue_event(id, NodeEventFlags::UPDATE_VALUE);
                self.nodes[id.index()].assigned = value.is_some();
                self.nodes[id.index()].value = value;
                self.nodes[id.index()].dirty = true;
                self.nodes[id.index()].touched = true;
                vec![self.nodes[id.index()].path.clone()]
            }
            NodeKind::Object => self.assign_object(id, value),
            NodeKind::Array => self.assign_array(id, value),
        }
    }

    fn assign_object(&mut self, id: NodeId, value: Option<Value>) -> Vec<String> {
        self.queue_event(id, NodeEventFlags::UPDATE_VALUE);
        self.nodes[id.index()].dirty = true;
        self.nodes[id.index()].touched = true;

        let Some(value) = value else {
            // Unset: children become unset too, stashed values are gone.
            self.nodes[id.index()].assigned = false;
            self.nodes[id.index()].shadow.clear();
            let children: Vec<NodeId> = self
                .children(id)
                .iter()
                .map(|entry| entry.node)
                .collect();
            for child in children {
                self.set_node_value(child, None);
            }
            self.recompute_branch_value(id);
            return vec![self.nodes[id.index()].path.clone()];
        };

        // Anything but an object normalizes to the empty object.
        let mut map = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.nodes[id.index()].assigned = true;

        let children: Vec<(String, NodeId)> = self
            .children(id)
            .iter()
            .map(|entry| (entry.key.clone(), entry.node))
            .collect();
        for (key, child) in children {
            let child_value = map.remove(&key);
            self.set_node_value(child, child_value);
        }

        // Declared properties with no live child (recursion guard skipped
        // them at build) materialize now that a value exists.
        let schema = Rc::clone(&self.nodes[id.index()].schema);
        let schema_path = self.nodes[id.index()].schema_path.clone();
        for (key, fragment) in &schema.properties {
            if self.nodes[id.index()].child_by_key(key).is_some() {
                continue;
            }
            let Some(child_value) = map.remove(key) else {
                continue;
            };
            let child_schema_path = format!("{schema_path}/properties/{key}");
            if self
                .build_child(
                    id,
                    key.clone(),
                    fragment,
                    child_schema_path,
                    Some(child_value),
                    &mut Vec::new(),
                )
                .is_ok()
            {
                self.queue_event(id, NodeEventFlags::UPDATE_CHILDREN);
            }
        }

        // Remaining keys belong to unselected variants or are unknown.
        self.nodes[id.index()].shadow = map;
        self.recompute_branch_value(id);
        vec![self.nodes[id.index()].path.clone()]
    }

    fn assign_array(&mut self, id: NodeId, value: Option<Value>) -> Vec<String> {
        self.queue_event(id, NodeEventFlags::UPDATE_VALUE);
        self.nodes[id.index()].dirty = true;
        self.nodes[id.index()].touched = true;

        let Some(value) = value else {
            self.nodes[id.index()].assigned = false;
            self.truncate_array(id, 0);
            self.recompute_branch_value(id);
            return vec![self.nodes[id.index()].path.clone()];
        };

        // Anything but an array normalizes to the empty array.
        let items = match value {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        self.nodes[id.index()].assigned = true;

        let existing = self.nodes[id.index()].child_count();
        let common = existing.min(items.len());
        for (index, item) in items.iter().take(common).enumerate() {
            if let Some(child) = self.nodes[id.index()].child_at(index) {
                self.set_node_value(child, Some(item.clone()));
            }
        }
        if items.len() > existing {
            // Growth through assignment bypasses maxItems and the fixed
            // tuple cap.
            self.queue_event(id, NodeEventFlags::UPDATE_CHILDREN);
            for (index, item) in items.iter().enumerate().skip(existing) {
                let _ = self.build_array_item(id, index, Some(item.clone()), false, &mut Vec::new());
            }
        } else if items.len() < existing {
            self.queue_event(id, NodeEventFlags::UPDATE_CHILDREN);
            self.truncate_array(id, items.len());
        }
        self.recompute_branch_value(id);
        vec![self.nodes[id.index()].path.clone()]
    }

    fn truncate_array(&mut self, id: NodeId, len: usize) {
        let doomed: Vec<NodeId> = self
            .children(id)
            .iter()
            .skip(len)
            .map(|entry| entry.node)
            .collect();
        if let Some(children) = self.nodes[id.index()].children.as_mut() {
            children.truncate(len);
        }
        for child in doomed {
            self.kill_subtree(child);
        }
    }

    /// Current materialized elements of an array node.
    fn array_items(&self, id: NodeId) -> Vec<Value> {
        self.children(id)
            .iter()
            .map(|entry| {
                self.nodes[entry.node.index()]
                    .value
                    .clone()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }

    /// Drops one child by key and retires its subtree.
    pub(crate) fn remove_child_entry(&mut self, id: NodeId, key: &str) {
        let Some(children) = self.nodes[id.index()].children.as_mut() else {
            return;
        };
        let Some(position) = children.iter().position(|entry| entry.key == key) else {
            return;
        };
        let child = children.remove(position).node;
        self.kill_subtree(child);
    }

    /// Marks a subtree dead, dropping its watchers and listeners. Slots are
    /// never reused, so identifiers held by callers stay unambiguous.
    pub(crate) fn kill_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.nodes[current.index()].alive = false;
            self.listeners.remove(&current);
            self.pending.remove(&current);
            if let Some(children) = self.nodes[current.index()].children.take() {
                stack.extend(children.into_iter().map(|entry| entry.node));
            }
        }
        let nodes = &self.nodes;
        self.watchers
            .retain(|watcher| nodes[watcher.node.index()].alive);
    }

    /// Watcher dispatch shared by all mutation entry points. Settling is
    /// the caller's explicit drain.
    pub(crate) fn finish_mutation(&mut self, changed: Vec<String>) {
        if changed.is_empty() {
            return;
        }
        self.run_watchers(changed);
    }
}
