//! Variant descriptors for `oneOf` / `anyOf` object schemas.
//!
//! Selection is modeled as a tagged union: an ordered list of descriptors
//! plus a pure discriminator per entry. The engine recomputes the selection
//! wholesale on every relevant change; descriptors never mutate.

use serde_json::Value;

use super::ComputedDirectives;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKeyword {
    OneOf,
    AnyOf,
}

impl VariantKeyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKeyword::OneOf => "oneOf",
            VariantKeyword::AnyOf => "anyOf",
        }
    }
}

/// How a variant decides whether it is the selected one.
#[derive(Debug, Clone, PartialEq)]
pub enum Discriminator {
    /// A property of the entry carries `const`; the variant matches when the
    /// instance value at that key equals it.
    Const { key: String, value: Value },
    /// A property of the entry carries `enum`; the variant matches when the
    /// instance value at that key is one of them.
    Enum { key: String, values: Vec<Value> },
    /// A boolean `computed.if` / `&if` expression on the entry.
    Expr { source: String },
    /// No discriminator: the variant never matches. Selection requires an
    /// explicit discriminator to stay deterministic.
    None,
}

/// One `oneOf`/`anyOf` entry, derived once at schema resolution.
#[derive(Debug, Clone)]
pub struct VariantDescriptor {
    pub index: usize,
    /// The entry's raw fragment (after `$ref`/`allOf` folding).
    pub raw: Value,
    /// Properties this entry contributes, in source order.
    pub properties: Vec<(String, Value)>,
    pub required: Vec<String>,
    pub discriminator: Discriminator,
}

impl VariantDescriptor {
    /// Derives a descriptor from an already-dereferenced entry fragment.
    pub fn derive(index: usize, fragment: Value) -> Self {
        let properties: Vec<(String, Value)> = fragment
            .get("properties")
            .and_then(Value::as_object)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let required: Vec<String> = fragment
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

        let directives = ComputedDirectives::from_fragment(&fragment);
        let discriminator = if let Some(source) = directives.condition {
            Discriminator::Expr { source }
        } else {
            derive_property_discriminator(&properties)
        };

        VariantDescriptor {
            index,
            raw: fragment,
            properties,
            required,
            discriminator,
        }
    }

    /// Evaluates the discriminator.
    ///
    /// `property` reads the instance value at a key (over the enhanced
    /// value); `eval_condition` evaluates an `if` expression source at the
    /// owning node. Both are pure for a given snapshot.
    pub fn matches(
        &self,
        property: &dyn Fn(&str) -> Option<Value>,
        eval_condition: &dyn Fn(&str) -> bool,
    ) -> bool {
        match &self.discriminator {
            Discriminator::Const { key, value } => {
                property(key).as_ref() == Some(value)
            }
            Discriminator::Enum { key, values } => property(key)
                .map(|actual| values.contains(&actual))
                .unwrap_or(false),
            Discriminator::Expr { source } => eval_condition(source),
            Discriminator::None => false,
        }
    }
}

/// Finds the first property carrying `const` or `enum`, in source order.
fn derive_property_discriminator(properties: &[(String, Value)]) -> Discriminator {
    for (key, fragment) in properties {
        if let Some(value) = fragment.get("const") {
            return Discriminator::Const {
                key: key.clone(),
                value: value.clone(),
            };
        }
        if let Some(values) = fragment.get("enum").and_then(Value::as_array) {
            return Discriminator::Enum {
                key: key.clone(),
                values: values.clone(),
            };
        }
    }
    Discriminator::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_const_discriminator() {
        let descriptor = VariantDescriptor::derive(
            0,
            json!({
                "properties": {
                    "type": {"const": "a"},
                    "extra": {"type": "string"}
                },
                "required": ["type", "extra"]
            }),
        );
        assert_eq!(
            descriptor.discriminator,
            Discriminator::Const { key: "type".into(), value: json!("a") }
        );
        assert_eq!(descriptor.required, vec!["type", "extra"]);
    }

    #[test]
    fn derives_enum_discriminator() {
        let descriptor = VariantDescriptor::derive(
            1,
            json!({"properties": {"kind": {"enum": ["x", "y"]}}}),
        );
        assert_eq!(
            descriptor.discriminator,
            Discriminator::Enum { key: "kind".into(), values: vec![json!("x"), json!("y")] }
        );
    }

    #[test]
    fn condition_expression_takes_precedence() {
        let descriptor = VariantDescriptor::derive(
            0,
            json!({
                "&if": "./type === 'a'",
                "properties": {"type": {"const": "a"}}
            }),
        );
        assert_eq!(
            descriptor.discriminator,
            Discriminator::Expr { source: "./type === 'a'".into() }
        );
    }

    #[test]
    fn matching() {
        let descriptor = VariantDescriptor::derive(
            0,
            json!({"properties": {"type": {"const": "a"}}}),
        );
        let value = json!({"type": "a"});
        let property = |key: &str| value.get(key).cloned();
        let never = |_: &str| false;
        assert!(descriptor.matches(&property, &never));

        let other = json!({"type": "b"});
        let property = |key: &str| other.get(key).cloned();
        assert!(!descriptor.matches(&property, &never));
    }

    #[test]
    fn no_discriminator_never_matches() {
        let descriptor =
            VariantDescriptor::derive(0, json!({"properties": {"x": {"type": "string"}}}));
        assert_eq!(descriptor.discriminator, Discriminator::None);
        assert!(!descriptor.matches(&|_| Some(json!("anything")), &|_| true));
    }
}
