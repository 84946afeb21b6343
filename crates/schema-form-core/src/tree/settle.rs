//! Batch settlement.
//!
//! Mutations accumulate per-node flags; `settle` is the explicit drain that
//! runs background validation, delivers one merged event per node, and
//! fires the whole-document listeners once.

use serde_json::Value;

use crate::events::{NodeEvent, NodeEventFlags, PendingEvent};
use crate::node::NodeId;

use super::{FormTree, ValidationMode};

impl FormTree {
    /// Settles the current batch. A validator failure during background
    /// validation is swallowed; use [`FormTree::validate`] to observe it.
    pub fn settle(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        if self.validation_mode == ValidationMode::OnChange {
            if let Ok(entries) = self.run_validator() {
                self.distribute_errors(&entries);
            }
        }
        self.deliver_pending();
    }

    /// Records flags for a node, snapshotting the pre-batch value the first
    /// time a value flag arrives. Callers queue before writing the value.
    pub(crate) fn queue_event(&mut self, id: NodeId, flags: NodeEventFlags) {
        let needs_snapshot = flags.contains(NodeEventFlags::UPDATE_VALUE)
            && self
                .pending
                .get(&id)
                .map_or(true, |pending| pending.previous.is_none());
        let snapshot = needs_snapshot.then(|| self.nodes[id.index()].value.clone());
        let entry = self.pending.entry(id).or_insert_with(PendingEvent::new);
        if let Some(previous) = snapshot {
            entry.previous = Some(previous);
        }
        entry.flags |= flags;
    }

    /// Delivers pending events in node order, one merged event per node,
    /// then notifies the document listeners.
    pub(crate) fn deliver_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return;
        }
        for (id, batch) in pending {
            if !self.nodes[id.index()].alive {
                continue;
            }
            let event = NodeEvent {
                node: id,
                path: self.nodes[id.index()].path.clone(),
                flags: batch.flags,
                previous: if batch.flags.contains(NodeEventFlags::UPDATE_VALUE) {
                    batch.previous.flatten()
                } else {
                    None
                },
                current: self.nodes[id.index()].value.clone(),
            };
            if let Some(listeners) = self.listeners.get_mut(&id) {
                for listener in listeners.values_mut() {
                    listener(&event);
                }
            }
        }
        let doc = self.nodes[self.root.index()]
            .value
            .clone()
            .unwrap_or(Value::Null);
        for listener in self.change_listeners.values_mut() {
            listener(&doc);
        }
    }
}
