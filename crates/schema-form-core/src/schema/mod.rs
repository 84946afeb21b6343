//! Canonical schema fragments.
//!
//! A [`CanonicalSchema`] is a normalized view of one raw JSON Schema
//! fragment: `$ref` chased, `allOf` folded in, the variant list derived from
//! `oneOf`/`anyOf`, tuple rules checked, and the computed directives pulled
//! out of both the `computed` object and the `&`-prefixed alias keys.
//!
//! Normalization is shallow on purpose: child fragments (`properties`,
//! `items`, variant entries) stay raw and are resolved lazily per traversal
//! by the [`resolver::SchemaResolver`], which is what keeps self-referential
//! schemas finite.

pub mod resolver;
pub mod variants;

use serde_json::{json, Value};

pub use resolver::SchemaResolver;
pub use variants::{Discriminator, VariantDescriptor, VariantKeyword};

/// The JSON type a fragment describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl SchemaType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "object" => SchemaType::Object,
            "array" => SchemaType::Array,
            "string" => SchemaType::String,
            "number" => SchemaType::Number,
            "integer" => SchemaType::Integer,
            "boolean" => SchemaType::Boolean,
            "null" => SchemaType::Null,
            _ => return None,
        })
    }

    /// Infers a type from a concrete value.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => SchemaType::Object,
            Value::Array(_) => SchemaType::Array,
            Value::String(_) => SchemaType::String,
            Value::Number(_) => SchemaType::Number,
            Value::Bool(_) => SchemaType::Boolean,
            Value::Null => SchemaType::Null,
        }
    }
}

/// Computed directives attached to a fragment.
///
/// Each directive is an expression source string; parsing is deferred to the
/// tree (which owns the parse cache) so that a malformed directive degrades
/// at the node, not at schema resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedDirectives {
    pub visible: Option<String>,
    pub active: Option<String>,
    pub condition: Option<String>,
    pub watch: Vec<String>,
}

impl ComputedDirectives {
    /// Reads directives from a fragment. The `computed` object form and the
    /// `&`-prefixed aliases are equivalent; the alias wins when both are
    /// present.
    pub fn from_fragment(fragment: &Value) -> Self {
        let mut out = ComputedDirectives::default();
        if let Some(computed) = fragment.get("computed") {
            out.visible = string_at(computed, "visible");
            out.active = string_at(computed, "active");
            out.condition = string_at(computed, "if");
            out.watch = watch_list(computed.get("watch"));
        }
        if let Some(v) = string_at(fragment, "&visible") {
            out.visible = Some(v);
        }
        if let Some(v) = string_at(fragment, "&active") {
            out.active = Some(v);
        }
        if let Some(v) = string_at(fragment, "&if") {
            out.condition = Some(v);
        }
        let alias_watch = watch_list(fragment.get("&watch"));
        if !alias_watch.is_empty() {
            out.watch = alias_watch;
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_none()
            && self.active.is_none()
            && self.condition.is_none()
            && self.watch.is_empty()
    }
}

fn string_at(fragment: &Value, key: &str) -> Option<String> {
    fragment.get(key).and_then(Value::as_str).map(str::to_string)
}

fn watch_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// A normalized schema fragment.
#[derive(Debug, Clone)]
pub struct CanonicalSchema {
    pub ty: SchemaType,
    pub nullable: bool,
    /// Terminal nodes keep their subtree as one opaque value.
    pub terminal: bool,
    /// The merged raw fragment (after `$ref` and `allOf` folding).
    pub raw: Value,
    /// Canonical `$ref` pointer this fragment was reached through, if any.
    /// Used to bound recursive materialization.
    pub ref_key: Option<String>,
    /// Declared properties in source order, raw child fragments.
    pub properties: Vec<(String, Value)>,
    pub required: Vec<String>,
    pub default: Option<Value>,
    pub computed: ComputedDirectives,
    pub variant_keyword: Option<VariantKeyword>,
    pub variants: Vec<VariantDescriptor>,
    /// Raw `items` fragment; `None` when absent or `items:false`.
    pub items: Option<Value>,
    /// `items: false` — growth past `prefixItems` is structurally rejected.
    pub items_false: bool,
    pub prefix_items: Vec<Value>,
    pub min_items: usize,
    pub max_items: Option<usize>,
}

impl CanonicalSchema {
    /// The raw fragment governing array index `index`, per the tuple rule:
    /// `prefixItems[index]` when in range, otherwise `items`.
    pub fn item_fragment(&self, index: usize) -> Option<&Value> {
        if index < self.prefix_items.len() {
            self.prefix_items.get(index)
        } else {
            self.items.as_ref()
        }
    }

    /// Whether an append at `index` is structurally allowed for `push`.
    /// Whole-value assignment deliberately bypasses this.
    pub fn allows_growth_at(&self, index: usize) -> bool {
        if let Some(max) = self.max_items {
            if index >= max {
                return false;
            }
        }
        index < self.prefix_items.len() || self.items.is_some()
    }

    /// The empty value a non-nullable node normalizes `null` to.
    ///
    /// Numbers have no JSON empty value; they normalize to the unset state
    /// (`None`).
    pub fn empty_value(&self) -> Option<Value> {
        match self.ty {
            SchemaType::Object => Some(json!({})),
            SchemaType::Array => Some(json!([])),
            SchemaType::String => Some(json!("")),
            SchemaType::Boolean => Some(json!(false)),
            SchemaType::Null => Some(Value::Null),
            SchemaType::Number | SchemaType::Integer => None,
        }
    }
}
