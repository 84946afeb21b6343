//! Computed directives and variant selection.
//!
//! Every `visible`/`active`/`watch` directive and every variant
//! discriminator registers a watcher with a pre-resolved absolute
//! dependency set. A mutation feeds its changed paths through
//! [`FormTree::run_watchers`]; watchers whose dependencies overlap re-run
//! within the same batch, to a bounded fixpoint (variant switches change
//! values, which can wake further watchers).
//!
//! Directives evaluate against the enhanced value: live node values first,
//! then the shadow store holding dematerialized variant branches.

use std::rc::Rc;

use serde_json::Value;

use schema_form_expression::{evaluate_truthy, Expr, PathRef, PathScope};

use crate::events::NodeEventFlags;
use crate::node::{NodeId, NodeKind};

use super::FormTree;

/// Re-evaluation rounds per batch. Directive chains longer than this are
/// cyclic and stop making progress anyway.
const MAX_ROUNDS: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatcherKind {
    Visible,
    Active,
    Watch,
    Variant,
}

pub(crate) struct Watcher {
    pub node: NodeId,
    pub kind: WatcherKind,
    pub expr: Option<Rc<Expr>>,
    /// Absolute data paths this watcher depends on.
    pub deps: Vec<String>,
}

/// [`PathScope`] over the live tree, resolving through the enhanced value.
struct TreeScope<'a> {
    tree: &'a FormTree,
    base: &'a str,
}

impl PathScope for TreeScope<'_> {
    fn resolve(&self, path: &PathRef) -> Option<Value> {
        let absolute = path.resolve(self.base).ok()?;
        self.tree.enhanced_lookup(&absolute)
    }
}

impl FormTree {
    pub(crate) fn register_watchers(&mut self, id: NodeId) {
        let schema = Rc::clone(&self.nodes[id.index()].schema);
        let base = self.nodes[id.index()].path.clone();

        if let Some(source) = &schema.computed.visible {
            let expr = self.cached_expr(source);
            let deps = self.expr_deps(expr.as_deref(), &base);
            // A constant or malformed expression never re-fires; its value
            // is whatever this first evaluation yields.
            let initial = self.eval_directive(expr.as_deref(), id);
            self.nodes[id.index()].visible = initial;
            self.watchers.push(Watcher {
                node: id,
                kind: WatcherKind::Visible,
                expr,
                deps,
            });
        }
        if let Some(source) = &schema.computed.active {
            let expr = self.cached_expr(source);
            let deps = self.expr_deps(expr.as_deref(), &base);
            let initial = self.eval_directive(expr.as_deref(), id);
            self.nodes[id.index()].active = initial;
            self.watchers.push(Watcher {
                node: id,
                kind: WatcherKind::Active,
                expr,
                deps,
            });
        }
        if !schema.computed.watch.is_empty() {
            let deps: Vec<String> = schema
                .computed
                .watch
                .iter()
                .filter_map(|entry| schema_form_json_pointer::join(&base, entry).ok())
                .collect();
            if !deps.is_empty() {
                self.watchers.push(Watcher {
                    node: id,
                    kind: WatcherKind::Watch,
                    expr: None,
                    deps,
                });
            }
        }
        if !schema.variants.is_empty() {
            let mut deps: Vec<String> = Vec::new();
            for variant in &schema.variants {
                match &variant.discriminator {
                    crate::schema::Discriminator::Const { key, .. }
                    | crate::schema::Discriminator::Enum { key, .. } => {
                        deps.push(schema_form_json_pointer::append_segment(&base, key));
                    }
                    crate::schema::Discriminator::Expr { source } => {
                        let expr = self.cached_expr(source);
                        deps.extend(self.expr_deps(expr.as_deref(), &base));
                    }
                    crate::schema::Discriminator::None => {}
                }
            }
            deps.sort();
            deps.dedup();
            self.watchers.push(Watcher {
                node: id,
                kind: WatcherKind::Variant,
                expr: None,
                deps,
            });
        }
    }

    /// Runs every watcher whose dependencies overlap a changed path, then
    /// repeats with the paths the run itself changed, up to a fixed number
    /// of rounds.
    pub(crate) fn run_watchers(&mut self, changed: Vec<String>) {
        let mut queue = changed;
        for _ in 0..MAX_ROUNDS {
            if queue.is_empty() {
                break;
            }
            let changed = std::mem::take(&mut queue);
            let matched: Vec<(NodeId, WatcherKind, Option<Rc<Expr>>)> = self
                .watchers
                .iter()
                .filter(|w| self.nodes[w.node.index()].alive)
                .filter(|w| {
                    w.deps.iter().any(|dep| {
                        changed
                            .iter()
                            .any(|path| schema_form_json_pointer::overlaps(path, dep))
                    })
                })
                .map(|w| (w.node, w.kind, w.expr.clone()))
                .collect();
            for (node, kind, expr) in matched {
                if !self.nodes[node.index()].alive {
                    continue;
                }
                match kind {
                    WatcherKind::Visible => {
                        let visible = self.eval_directive(expr.as_deref(), node);
                        if visible != self.nodes[node.index()].visible {
                            self.nodes[node.index()].visible = visible;
                            self.queue_event(node, NodeEventFlags::UPDATE_COMPUTED_PROPERTIES);
                        }
                    }
                    WatcherKind::Active => {
                        let active = self.eval_directive(expr.as_deref(), node);
                        if active != self.nodes[node.index()].active {
                            self.nodes[node.index()].active = active;
                            let mut flags = NodeEventFlags::UPDATE_COMPUTED_PROPERTIES;
                            if active {
                                flags |= NodeEventFlags::ACTIVATED;
                            }
                            self.queue_event(node, flags);
                        }
                    }
                    WatcherKind::Watch => {
                        self.queue_event(node, NodeEventFlags::REQUEST_REFRESH);
                    }
                    WatcherKind::Variant => {
                        queue.extend(self.reselect_variant(node));
                    }
                }
            }
        }
    }

    /// Parses a directive source through the per-tree cache. A failed parse
    /// is cached too, as `None`.
    pub(crate) fn cached_expr(&self, source: &str) -> Option<Rc<Expr>> {
        if let Some(hit) = self.expr_cache.borrow().get(source) {
            return hit.clone();
        }
        let parsed = schema_form_expression::parse(source).ok().map(Rc::new);
        self.expr_cache
            .borrow_mut()
            .insert(source.to_string(), parsed.clone());
        parsed
    }

    fn expr_deps(&self, expr: Option<&Expr>, base: &str) -> Vec<String> {
        let Some(expr) = expr else {
            return Vec::new();
        };
        expr.dependencies()
            .iter()
            .filter_map(|path| path.resolve(base).ok())
            .collect()
    }

    /// A malformed directive degrades to its inactive default.
    fn eval_directive(&self, expr: Option<&Expr>, node: NodeId) -> bool {
        let Some(expr) = expr else {
            return false;
        };
        let base = &self.nodes[node.index()].path;
        evaluate_truthy(expr, &TreeScope { tree: self, base })
    }

    fn eval_condition(&self, source: &str, base: &str) -> bool {
        let Some(expr) = self.cached_expr(source) else {
            return false;
        };
        evaluate_truthy(&expr, &TreeScope { tree: self, base })
    }

    /// Resolves an absolute data path through live nodes, falling back to
    /// shadow values where a property has no materialized child, and into
    /// opaque terminal values.
    pub(crate) fn enhanced_lookup(&self, path: &str) -> Option<Value> {
        let segments = schema_form_json_pointer::split_segments(path);
        let mut current = self.root;
        let mut index = 0;
        while index < segments.len() {
            let node = self.node(current)?;
            let segment = &segments[index];
            match node.kind {
                NodeKind::Object => {
                    if let Some(child) = node.child_by_key(segment) {
                        current = child;
                        index += 1;
                    } else if let Some(value) = node.shadow.get(segment) {
                        return descend(value, &segments[index + 1..]);
                    } else {
                        return None;
                    }
                }
                NodeKind::Array => {
                    if !schema_form_json_pointer::is_valid_index(segment) {
                        return None;
                    }
                    current = node.child_at(segment.parse::<usize>().ok()?)?;
                    index += 1;
                }
                NodeKind::Scalar => {
                    return descend(node.value.as_ref()?, &segments[index..]);
                }
            }
        }
        self.node(current)?.value.clone()
    }

    /// A property read over the enhanced value of one object node.
    fn enhanced_property(&self, id: NodeId, key: &str) -> Option<Value> {
        let node = self.node(id)?;
        if let Some(child) = node.child_by_key(key) {
            return self.node(child)?.value.clone();
        }
        node.shadow.get(key).cloned()
    }

    /// Re-evaluates variant selection for an object node. First declared
    /// variant whose discriminator matches wins; no match exposes no
    /// exclusive children. Returns the data paths whose values changed.
    pub(crate) fn reselect_variant(&mut self, id: NodeId) -> Vec<String> {
        let schema = Rc::clone(&self.nodes[id.index()].schema);
        if schema.variants.is_empty() || !self.nodes[id.index()].alive {
            return Vec::new();
        }
        let base_path = self.nodes[id.index()].path.clone();
        let selection = {
            let this: &FormTree = self;
            schema
                .variants
                .iter()
                .position(|variant| {
                    variant.matches(
                        &|key| this.enhanced_property(id, key),
                        &|source| this.eval_condition(source, &base_path),
                    )
                })
        };
        if selection == self.nodes[id.index()].selected_variant {
            return Vec::new();
        }

        let base_keys: Vec<&str> = schema.properties.iter().map(|(k, _)| k.as_str()).collect();
        let mut changed = Vec::new();

        // Dematerialize the outgoing variant's exclusive children, stashing
        // their values for a later return to this variant.
        if let Some(old) = self.nodes[id.index()].selected_variant {
            for (key, _) in schema.variants[old].properties.clone() {
                if base_keys.contains(&key.as_str()) {
                    continue;
                }
                if let Some(child) = self.nodes[id.index()].child_by_key(&key) {
                    if let Some(value) = self.nodes[child.index()].value.clone() {
                        self.nodes[id.index()].shadow.insert(key.clone(), value);
                    }
                    self.remove_child_entry(id, &key);
                    changed.push(schema_form_json_pointer::append_segment(&base_path, &key));
                }
            }
        }

        self.nodes[id.index()].selected_variant = selection;

        if let Some(new) = selection {
            let keyword = match schema.variant_keyword {
                Some(keyword) => keyword,
                None => return changed,
            };
            let parent_schema_path = self.nodes[id.index()].schema_path.clone();
            for (key, fragment) in schema.variants[new].properties.clone() {
                if base_keys.contains(&key.as_str()) {
                    continue;
                }
                let value = self.nodes[id.index()].shadow.remove(&key);
                let schema_path = format!(
                    "{parent_schema_path}/{}/{new}/properties/{key}",
                    keyword.as_str()
                );
                // A fragment that fails to resolve at runtime degrades to
                // an absent child rather than failing the mutation.
                if let Ok(Some(_)) =
                    self.build_child(id, key.clone(), &fragment, schema_path, value, &mut Vec::new())
                {
                    changed.push(schema_form_json_pointer::append_segment(&base_path, &key));
                }
            }
        }

        self.queue_event(
            id,
            NodeEventFlags::UPDATE_CHILDREN | NodeEventFlags::UPDATE_COMPUTED_PROPERTIES,
        );
        let before = self.nodes[id.index()].value.clone();
        let recomputed = self.compute_branch_value(id);
        if recomputed != before {
            self.queue_event(id, NodeEventFlags::UPDATE_VALUE);
            self.nodes[id.index()].value = recomputed;
        }
        self.propagate_upward(id);
        changed
    }
}

/// Descends raw JSON by the remaining segments.
fn descend(value: &Value, segments: &[String]) -> Option<Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                if !schema_form_json_pointer::is_valid_index(segment) {
                    return None;
                }
                items.get(segment.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current.clone())
}
