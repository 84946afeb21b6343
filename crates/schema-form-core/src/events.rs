//! Per-node event flags and listener plumbing.
//!
//! Every mutation records flags against the touched nodes; `settle` merges
//! them with bitwise OR and delivers one event per node per batch. The
//! `previous` snapshot is captured when the first value flag of a batch is
//! recorded, so a listener sees the value from before the whole batch.

use bitflags::bitflags;
use serde_json::Value;

use crate::node::NodeId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeEventFlags: u32 {
        /// The node's value changed.
        const UPDATE_VALUE = 1;
        /// The node's child list changed shape.
        const UPDATE_CHILDREN = 1 << 1;
        /// State the renderer mirrors (dirty/touched/errors context) should
        /// be re-read.
        const REQUEST_REFRESH = 1 << 2;
        /// A computed directive re-evaluated.
        const UPDATE_COMPUTED_PROPERTIES = 1 << 3;
        /// The node became active.
        const ACTIVATED = 1 << 4;
        /// The node's error list changed.
        const UPDATE_ERROR = 1 << 5;
        /// First event after the node was created.
        const INITIALIZED = 1 << 6;
    }
}

/// The merged event a listener receives, once per node per settled batch.
#[derive(Debug, Clone)]
pub struct NodeEvent {
    pub node: NodeId,
    pub path: String,
    pub flags: NodeEventFlags,
    /// Value before the batch; `Some` only when `UPDATE_VALUE` is set.
    pub previous: Option<Value>,
    pub current: Option<Value>,
}

/// Boxed per-node listener.
pub type NodeListener = Box<dyn FnMut(&NodeEvent)>;
/// Boxed whole-document listener.
pub type ChangeListener = Box<dyn FnMut(&Value)>;

/// Accumulated flags for one node awaiting delivery.
pub(crate) struct PendingEvent {
    pub flags: NodeEventFlags,
    /// Snapshot from the first `UPDATE_VALUE` of the batch. Outer `None`
    /// until a value flag arrives.
    pub previous: Option<Option<Value>>,
}

impl PendingEvent {
    pub(crate) fn new() -> Self {
        PendingEvent {
            flags: NodeEventFlags::empty(),
            previous: None,
        }
    }
}
