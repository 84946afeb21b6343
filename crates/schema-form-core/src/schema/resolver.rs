//! Lazy `$ref` resolution and `allOf` folding.
//!
//! The resolver owns the raw root schema document and normalizes fragments
//! on demand. Fragments reached through a `$ref` are cached under their
//! canonical pointer, scoped to this resolver (one per tree), so recursive
//! schemas cost one resolution per distinct pointer rather than expanding.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::error::SchemaError;

use super::{
    CanonicalSchema, ComputedDirectives, SchemaType, VariantDescriptor, VariantKeyword,
};

/// Longest `$ref` chain (ref pointing at another ref) tolerated before the
/// chain is declared cyclic.
const REF_CHAIN_LIMIT: usize = 32;

pub struct SchemaResolver {
    root: Value,
    cache: RefCell<HashMap<String, Rc<CanonicalSchema>>>,
}

impl SchemaResolver {
    pub fn new(root: Value) -> Self {
        SchemaResolver {
            root,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The untouched root schema document (what the validator compiles).
    pub fn raw_root(&self) -> &Value {
        &self.root
    }

    pub fn resolve_root(&self) -> Result<Rc<CanonicalSchema>, SchemaError> {
        let root = self.root.clone();
        self.resolve(&root, "#")
    }

    /// Normalizes one fragment: chases `$ref`, folds `allOf`, derives
    /// variants, checks tuple rules.
    pub fn resolve(&self, fragment: &Value, at: &str) -> Result<Rc<CanonicalSchema>, SchemaError> {
        let (map, ref_key, pure) = self.deref(fragment, at)?;
        // Sibling-overlaid resolutions are fragment-specific and bypass the
        // pointer cache.
        if pure {
            if let Some(key) = &ref_key {
                if let Some(hit) = self.cache.borrow().get(key) {
                    return Ok(Rc::clone(hit));
                }
            }
        }
        let map = self.fold_all_of(map, at)?;
        let canonical = Rc::new(self.canonicalize(map, ref_key.clone(), at)?);
        if pure {
            if let Some(key) = ref_key {
                self.cache.borrow_mut().insert(key, Rc::clone(&canonical));
            }
        }
        Ok(canonical)
    }

    /// Like [`Self::resolve`], but falls back to the shape of `value` when the
    /// fragment carries no resolvable type (permissive `items: true` spots,
    /// bulk-assigned tuple tails), and supplies a permissive items rule for
    /// array fragments that declare none. Authored schemas resolved directly
    /// keep both conditions fatal; this path exists for value-driven
    /// materialization, where dropping the element would lose data.
    pub fn resolve_for_value(
        &self,
        fragment: &Value,
        value: Option<&Value>,
        at: &str,
    ) -> Result<Rc<CanonicalSchema>, SchemaError> {
        match self.resolve(fragment, at) {
            Err(SchemaError::MissingItems { .. }) => {
                let mut synthesized = fragment
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                synthesized.insert("items".into(), Value::Object(Map::new()));
                self.resolve(&Value::Object(synthesized), at)
            }
            Err(SchemaError::MissingType { .. }) => {
                let inferred = value.map(SchemaType::of_value).unwrap_or(SchemaType::Null);
                let name = match inferred {
                    SchemaType::Object => "object",
                    SchemaType::Array => "array",
                    SchemaType::String => "string",
                    SchemaType::Number | SchemaType::Integer => "number",
                    SchemaType::Boolean => "boolean",
                    SchemaType::Null => "null",
                };
                let mut synthesized = fragment
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                synthesized.insert("type".into(), Value::String(name.into()));
                // Arrays need an items rule to pass canonicalization.
                if inferred == SchemaType::Array && !synthesized.contains_key("items") {
                    synthesized.insert("items".into(), Value::Object(Map::new()));
                }
                self.resolve(&Value::Object(synthesized), at)
            }
            other => other,
        }
    }

    /// Chases a `$ref` chain to its effective fragment. Keys declared next
    /// to the `$ref` overlay the target. Returns the canonical pointer of
    /// the last ref in the chain, if any.
    fn deref(
        &self,
        fragment: &Value,
        at: &str,
    ) -> Result<(Map<String, Value>, Option<String>, bool), SchemaError> {
        let mut current = fragment
            .as_object()
            .cloned()
            .ok_or_else(|| SchemaError::InvalidFragment { at: at.to_string() })?;
        let mut ref_key: Option<String> = None;
        let mut pure = true;

        for _ in 0..REF_CHAIN_LIMIT {
            let Some(pointer) = current.get("$ref").and_then(Value::as_str).map(str::to_string)
            else {
                return Ok((current, ref_key, pure));
            };
            let target = schema_form_json_pointer::get(&self.root, &pointer).ok_or_else(|| {
                SchemaError::UnresolvableRef {
                    pointer: pointer.clone(),
                }
            })?;
            let mut next = target
                .as_object()
                .cloned()
                .ok_or_else(|| SchemaError::InvalidFragment { at: pointer.clone() })?;
            // Sibling keys next to $ref override the target's.
            for (key, value) in current {
                if key != "$ref" {
                    pure = false;
                    next.insert(key, value);
                }
            }
            ref_key = Some(normalize_pointer(&pointer));
            current = next;
        }
        Err(SchemaError::UnresolvableRef {
            pointer: format!("$ref chain at {at} exceeds {REF_CHAIN_LIMIT} links"),
        })
    }

    fn fold_all_of(
        &self,
        mut map: Map<String, Value>,
        at: &str,
    ) -> Result<Map<String, Value>, SchemaError> {
        let Some(all_of) = map.remove("allOf") else {
            return Ok(map);
        };
        let entries = all_of
            .as_array()
            .cloned()
            .ok_or_else(|| SchemaError::InvalidFragment { at: format!("{at}/allOf") })?;
        for (index, entry) in entries.iter().enumerate() {
            let entry_at = format!("{at}/allOf/{index}");
            let (sub, _, _) = self.deref(entry, &entry_at)?;
            let sub = self.fold_all_of(sub, &entry_at)?;
            merge_fragment(&mut map, sub);
        }
        Ok(map)
    }

    fn canonicalize(
        &self,
        map: Map<String, Value>,
        ref_key: Option<String>,
        at: &str,
    ) -> Result<CanonicalSchema, SchemaError> {
        let raw = Value::Object(map);

        let nullable = raw.get("nullable").and_then(Value::as_bool).unwrap_or(false)
            || type_array_has_null(&raw);
        let ty = self.resolve_type(&raw, at)?;
        let terminal = raw.get("terminal").and_then(Value::as_bool).unwrap_or(false);

        let properties: Vec<(String, Value)> = raw
            .get("properties")
            .and_then(Value::as_object)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let required: Vec<String> = raw
            .get("required")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let default = raw.get("default").cloned();
        let computed = ComputedDirectives::from_fragment(&raw);

        let (variant_keyword, variants) = self.derive_variants(&raw, at)?;

        let mut items: Option<Value> = None;
        let mut items_false = false;
        let mut prefix_items: Vec<Value> = Vec::new();
        let mut min_items = 0usize;
        let mut max_items: Option<usize> = None;

        if ty == SchemaType::Array {
            prefix_items = raw
                .get("prefixItems")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            match raw.get("items") {
                Some(Value::Bool(false)) => {
                    items_false = true;
                    if prefix_items.is_empty() {
                        return Err(SchemaError::TupleWithoutPrefixItems { at: at.to_string() });
                    }
                }
                Some(Value::Bool(true)) => items = Some(Value::Object(Map::new())),
                Some(other) => items = Some(other.clone()),
                None => {
                    if prefix_items.is_empty() {
                        return Err(SchemaError::MissingItems { at: at.to_string() });
                    }
                }
            }
            min_items = raw
                .get("minItems")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;
            max_items = raw
                .get("maxItems")
                .and_then(Value::as_u64)
                .map(|n| n as usize);
        }

        Ok(CanonicalSchema {
            ty,
            nullable,
            terminal,
            raw,
            ref_key,
            properties,
            required,
            default,
            computed,
            variant_keyword,
            variants,
            items,
            items_false,
            prefix_items,
            min_items,
            max_items,
        })
    }

    fn resolve_type(&self, raw: &Value, at: &str) -> Result<SchemaType, SchemaError> {
        match raw.get("type") {
            Some(Value::String(name)) => {
                SchemaType::parse(name).ok_or_else(|| SchemaError::UnknownType {
                    ty: name.clone(),
                    at: at.to_string(),
                })
            }
            Some(Value::Array(names)) => {
                // ["T", "null"] — the non-null entry decides the type.
                let first = names
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|n| *n != "null")
                    .unwrap_or("null");
                SchemaType::parse(first).ok_or_else(|| SchemaError::UnknownType {
                    ty: first.to_string(),
                    at: at.to_string(),
                })
            }
            Some(other) => Err(SchemaError::UnknownType {
                ty: other.to_string(),
                at: at.to_string(),
            }),
            None => {
                if raw.get("properties").is_some() {
                    Ok(SchemaType::Object)
                } else if raw.get("items").is_some() || raw.get("prefixItems").is_some() {
                    Ok(SchemaType::Array)
                } else if raw.get("oneOf").is_some() || raw.get("anyOf").is_some() {
                    Ok(SchemaType::Object)
                } else if let Some(first) =
                    raw.get("enum").and_then(Value::as_array).and_then(|e| e.first())
                {
                    Ok(SchemaType::of_value(first))
                } else if let Some(value) = raw.get("const") {
                    Ok(SchemaType::of_value(value))
                } else if let Some(value) = raw.get("default") {
                    Ok(SchemaType::of_value(value))
                } else {
                    Err(SchemaError::MissingType { at: at.to_string() })
                }
            }
        }
    }

    fn derive_variants(
        &self,
        raw: &Value,
        at: &str,
    ) -> Result<(Option<VariantKeyword>, Vec<VariantDescriptor>), SchemaError> {
        let (keyword, entries) = if let Some(entries) = raw.get("oneOf") {
            (VariantKeyword::OneOf, entries)
        } else if let Some(entries) = raw.get("anyOf") {
            (VariantKeyword::AnyOf, entries)
        } else {
            return Ok((None, Vec::new()));
        };
        let entries = entries.as_array().ok_or_else(|| SchemaError::InvalidFragment {
            at: format!("{at}/{}", keyword.as_str()),
        })?;
        let mut variants = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let entry_at = format!("{at}/{}/{index}", keyword.as_str());
            let (map, _, _) = self.deref(entry, &entry_at)?;
            let map = self.fold_all_of(map, &entry_at)?;
            variants.push(VariantDescriptor::derive(index, Value::Object(map)));
        }
        Ok((Some(keyword), variants))
    }
}

fn type_array_has_null(raw: &Value) -> bool {
    raw.get("type")
        .and_then(Value::as_array)
        .map(|names| names.iter().any(|n| n.as_str() == Some("null")))
        .unwrap_or(false)
}

fn normalize_pointer(pointer: &str) -> String {
    if pointer.starts_with('#') {
        pointer.to_string()
    } else {
        format!("#{pointer}")
    }
}

/// Folds one `allOf` entry into the base fragment: properties may be added,
/// `required` is unioned, lower bounds take the larger value and upper
/// bounds the smaller, everything else keeps the base's setting.
fn merge_fragment(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (key, value) in src {
        match key.as_str() {
            "properties" => {
                let base = dst
                    .entry("properties")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let (Some(base), Some(incoming)) = (base.as_object_mut(), value.as_object()) {
                    for (name, fragment) in incoming {
                        base.entry(name.clone()).or_insert_with(|| fragment.clone());
                    }
                }
            }
            "required" => {
                let base = dst
                    .entry("required")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let (Some(base), Some(incoming)) = (base.as_array_mut(), value.as_array()) {
                    for entry in incoming {
                        if !base.contains(entry) {
                            base.push(entry.clone());
                        }
                    }
                }
            }
            "minimum" | "minLength" | "minItems" | "minProperties" | "exclusiveMinimum" => {
                merge_bound(dst, key, value, true);
            }
            "maximum" | "maxLength" | "maxItems" | "maxProperties" | "exclusiveMaximum" => {
                merge_bound(dst, key, value, false);
            }
            _ => {
                dst.entry(key).or_insert(value);
            }
        }
    }
}

fn merge_bound(dst: &mut Map<String, Value>, key: String, value: Value, lower: bool) {
    let incoming = value.as_f64();
    let existing = dst.get(&key).and_then(Value::as_f64);
    match (existing, incoming) {
        (Some(a), Some(b)) => {
            let stricter = if lower { a.max(b) } else { a.min(b) };
            if stricter != a {
                dst.insert(key, value);
            }
        }
        (None, Some(_)) => {
            dst.insert(key, value);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Discriminator;
    use serde_json::json;

    #[test]
    fn resolves_plain_fragment() {
        let resolver = SchemaResolver::new(json!({"type": "string", "minLength": 2}));
        let schema = resolver.resolve_root().unwrap();
        assert_eq!(schema.ty, SchemaType::String);
        assert!(!schema.nullable);
        assert!(schema.ref_key.is_none());
    }

    #[test]
    fn chases_refs_and_caches_by_pointer() {
        let resolver = SchemaResolver::new(json!({
            "type": "object",
            "properties": {"name": {"$ref": "#/$defs/name"}},
            "$defs": {"name": {"type": "string", "default": "anon"}}
        }));
        let root = resolver.resolve_root().unwrap();
        let (_, fragment) = root.properties[0].clone();
        let first = resolver.resolve(&fragment, "#/properties/name").unwrap();
        let second = resolver.resolve(&fragment, "#/properties/name").unwrap();
        assert_eq!(first.ty, SchemaType::String);
        assert_eq!(first.default, Some(json!("anon")));
        assert_eq!(first.ref_key.as_deref(), Some("#/$defs/name"));
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn ref_siblings_overlay_target() {
        let resolver = SchemaResolver::new(json!({
            "$defs": {"base": {"type": "string"}}
        }));
        let schema = resolver
            .resolve(&json!({"$ref": "#/$defs/base", "default": "x"}), "#")
            .unwrap();
        assert_eq!(schema.default, Some(json!("x")));
        assert_eq!(schema.ty, SchemaType::String);
    }

    #[test]
    fn unresolvable_ref_is_fatal() {
        let resolver = SchemaResolver::new(json!({}));
        let err = resolver.resolve(&json!({"$ref": "#/nope"}), "#").unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvableRef { .. }));
    }

    #[test]
    fn cyclic_ref_chain_is_fatal() {
        let resolver = SchemaResolver::new(json!({
            "$defs": {
                "a": {"$ref": "#/$defs/b"},
                "b": {"$ref": "#/$defs/a"}
            }
        }));
        let err = resolver.resolve(&json!({"$ref": "#/$defs/a"}), "#").unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvableRef { .. }));
    }

    #[test]
    fn self_ref_resolves_lazily() {
        // The fragment's own properties still reference the same pointer;
        // resolution terminates because children stay raw.
        let resolver = SchemaResolver::new(json!({
            "type": "object",
            "properties": {"child": {"$ref": "#"}}
        }));
        let root = resolver.resolve_root().unwrap();
        let (_, child_fragment) = root.properties[0].clone();
        let child = resolver.resolve(&child_fragment, "#/properties/child").unwrap();
        assert_eq!(child.ty, SchemaType::Object);
        assert_eq!(child.ref_key.as_deref(), Some("#"));
    }

    #[test]
    fn folds_all_of() {
        let resolver = SchemaResolver::new(json!({
            "type": "object",
            "allOf": [
                {"properties": {"a": {"type": "string"}}, "required": ["a"]},
                {"properties": {"b": {"type": "number", "default": 1}}, "required": ["b"]}
            ],
            "properties": {"c": {"type": "boolean"}},
            "required": ["c"]
        }));
        let schema = resolver.resolve_root().unwrap();
        let keys: Vec<&str> = schema.properties.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert_eq!(schema.required, vec!["c", "a", "b"]);
    }

    #[test]
    fn all_of_takes_stricter_bounds() {
        let resolver = SchemaResolver::new(json!({
            "type": "string",
            "minLength": 1,
            "allOf": [{"minLength": 3, "maxLength": 10}, {"maxLength": 8}]
        }));
        let schema = resolver.resolve_root().unwrap();
        assert_eq!(schema.raw.get("minLength"), Some(&json!(3)));
        assert_eq!(schema.raw.get("maxLength"), Some(&json!(8)));
    }

    #[test]
    fn nullable_from_type_array() {
        let resolver = SchemaResolver::new(json!({"type": ["string", "null"]}));
        let schema = resolver.resolve_root().unwrap();
        assert!(schema.nullable);
        assert_eq!(schema.ty, SchemaType::String);
    }

    #[test]
    fn items_false_requires_prefix_items() {
        let resolver = SchemaResolver::new(json!({"type": "array", "items": false}));
        assert!(matches!(
            resolver.resolve_root().unwrap_err(),
            SchemaError::TupleWithoutPrefixItems { .. }
        ));
    }

    #[test]
    fn array_needs_some_items_rule() {
        let resolver = SchemaResolver::new(json!({"type": "array"}));
        assert!(matches!(
            resolver.resolve_root().unwrap_err(),
            SchemaError::MissingItems { .. }
        ));
    }

    #[test]
    fn tuple_growth_rules() {
        let resolver = SchemaResolver::new(json!({
            "type": "array",
            "prefixItems": [{"type": "string"}, {"type": "number"}],
            "items": false,
            "maxItems": 10
        }));
        let schema = resolver.resolve_root().unwrap();
        assert!(schema.allows_growth_at(0));
        assert!(schema.allows_growth_at(1));
        assert!(!schema.allows_growth_at(2));
        assert_eq!(schema.item_fragment(1), Some(&json!({"type": "number"})));
        assert_eq!(schema.item_fragment(2), None);
    }

    #[test]
    fn derives_variants_in_order() {
        let resolver = SchemaResolver::new(json!({
            "type": "object",
            "oneOf": [
                {"properties": {"type": {"const": "a"}, "x": {"type": "string"}}},
                {"properties": {"type": {"const": "b"}, "y": {"type": "number"}}}
            ]
        }));
        let schema = resolver.resolve_root().unwrap();
        assert_eq!(schema.variant_keyword, Some(VariantKeyword::OneOf));
        assert_eq!(schema.variants.len(), 2);
        assert_eq!(
            schema.variants[1].discriminator,
            Discriminator::Const { key: "type".into(), value: json!("b") }
        );
    }

    #[test]
    fn resolve_for_value_supplies_missing_items_rule() {
        let resolver = SchemaResolver::new(json!({}));
        let schema = resolver
            .resolve_for_value(&json!({"type": "array"}), Some(&json!([1, 2])), "#/items")
            .unwrap();
        assert_eq!(schema.ty, SchemaType::Array);
        assert_eq!(schema.items, Some(json!({})));
        // Direct resolution of the same fragment stays fatal.
        assert!(matches!(
            resolver.resolve(&json!({"type": "array"}), "#/items").unwrap_err(),
            SchemaError::MissingItems { .. }
        ));
    }

    #[test]
    fn resolve_for_value_infers_permissive_fragments() {
        let resolver = SchemaResolver::new(json!({}));
        let schema = resolver
            .resolve_for_value(&json!({}), Some(&json!("text")), "#/items")
            .unwrap();
        assert_eq!(schema.ty, SchemaType::String);
    }
}
