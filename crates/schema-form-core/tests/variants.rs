use serde_json::{json, Value};

use schema_form_core::{FormOptions, FormTree, ValidationMode};

fn tree(schema: Value) -> FormTree {
    FormTree::new(FormOptions::new(schema).validation_mode(ValidationMode::None))
        .expect("schema should build")
}

fn discriminated() -> FormTree {
    tree(json!({
        "type": "object",
        "properties": {"kind": {"type": "string"}},
        "oneOf": [
            {
                "properties": {
                    "kind": {"const": "a"},
                    "x": {"type": "string"}
                }
            },
            {
                "properties": {
                    "kind": {"const": "b"},
                    "y": {"type": "number"}
                }
            }
        ]
    }))
}

#[test]
fn no_variant_selected_without_discriminator_match() {
    let tree = discriminated();
    assert_eq!(tree.selected_variant(tree.root()), None);
    assert!(tree.find("/x").is_none());
    assert!(tree.find("/y").is_none());
}

#[test]
fn discriminator_switch_swaps_exclusive_children() {
    let mut tree = discriminated();
    let kind = tree.find("/kind").unwrap();

    tree.set_value(kind, json!("a"));
    tree.settle();
    assert_eq!(tree.selected_variant(tree.root()), Some(0));
    assert!(tree.find("/x").is_some());
    assert!(tree.find("/y").is_none());
    // schemaPath encodes the active branch.
    let x = tree.find("/x").unwrap();
    assert_eq!(
        tree.schema_path(x),
        Some("#/oneOf/0/properties/x")
    );

    tree.set_value(kind, json!("b"));
    tree.settle();
    assert_eq!(tree.selected_variant(tree.root()), Some(1));
    assert!(tree.find("/x").is_none());
    assert!(tree.find("/y").is_some());
}

#[test]
fn switch_back_restores_stashed_values() {
    let mut tree = discriminated();
    let kind = tree.find("/kind").unwrap();

    tree.set_value(kind, json!("a"));
    let x = tree.find("/x").unwrap();
    tree.set_value(x, json!("hello"));
    tree.settle();
    assert_eq!(tree.value(), Some(&json!({"kind": "a", "x": "hello"})));

    tree.set_value(kind, json!("b"));
    tree.settle();
    // The dematerialized value leaves the document but survives in the
    // shadow store.
    assert_eq!(tree.value(), Some(&json!({"kind": "b"})));

    tree.set_value(kind, json!("a"));
    tree.settle();
    let x = tree.find("/x").unwrap();
    assert_eq!(tree.node_value(x), Some(&json!("hello")));
}

#[test]
fn initial_value_selects_variant_and_keeps_exclusive_properties() {
    let tree = FormTree::new(
        FormOptions::new(json!({
            "type": "object",
            "properties": {"kind": {"type": "string"}},
            "oneOf": [
                {"properties": {"kind": {"const": "a"}, "x": {"type": "string"}}},
                {"properties": {"kind": {"const": "b"}, "y": {"type": "number"}}}
            ]
        }))
        .default_value(json!({"kind": "b", "y": 7}))
        .validation_mode(ValidationMode::None),
    )
    .unwrap();
    assert_eq!(tree.selected_variant(tree.root()), Some(1));
    let y = tree.find("/y").unwrap();
    assert_eq!(tree.node_value(y), Some(&json!(7)));
    assert_eq!(tree.value(), Some(&json!({"kind": "b", "y": 7})));
}

#[test]
fn enum_discriminator_matches_any_listed_value() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {"kind": {"type": "string"}},
        "anyOf": [
            {"properties": {"kind": {"enum": ["x", "y"]}, "shared": {"type": "string"}}},
            {"properties": {"kind": {"const": "z"}, "other": {"type": "string"}}}
        ]
    }));
    let kind = tree.find("/kind").unwrap();
    tree.set_value(kind, json!("y"));
    tree.settle();
    assert_eq!(tree.selected_variant(tree.root()), Some(0));
    assert!(tree.find("/shared").is_some());
}

#[test]
fn expression_discriminator_selects_variant() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {"type": {"type": "string"}},
        "oneOf": [
            {
                "&if": "./type === 'full_time'",
                "properties": {
                    "type": {"const": "full_time"},
                    "salary": {"type": "number"}
                },
                "required": ["type", "salary"]
            },
            {
                "&if": "./type === 'contract'",
                "properties": {
                    "type": {"const": "contract"},
                    "rate": {"type": "number"}
                },
                "required": ["type"]
            }
        ]
    }));
    let ty = tree.find("/type").unwrap();

    tree.set_value(ty, json!("full_time"));
    tree.settle();
    assert!(tree.find("/salary").is_some());
    assert!(tree.find("/rate").is_none());

    tree.set_value(ty, json!("contract"));
    tree.settle();
    assert!(tree.find("/salary").is_none());
    assert!(tree.find("/rate").is_some());
}
