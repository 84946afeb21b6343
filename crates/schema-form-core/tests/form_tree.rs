use serde_json::{json, Value};

use schema_form_core::{FormOptions, FormTree, NodeKind, SchemaType, ValidationMode};

fn tree(schema: Value) -> FormTree {
    FormTree::new(FormOptions::new(schema).validation_mode(ValidationMode::None))
        .expect("schema should build")
}

#[test]
fn builds_object_with_defaults() {
    let tree = tree(json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "default": "anon"},
            "age": {"type": "integer"}
        }
    }));
    let name = tree.find("/name").unwrap();
    assert_eq!(tree.node_value(name), Some(&json!("anon")));
    assert_eq!(tree.node_type(name), Some(SchemaType::String));
    // An integer with no default stays unset and is absent from the
    // materialized value.
    let age = tree.find("/age").unwrap();
    assert_eq!(tree.node_value(age), None);
    assert_eq!(tree.value(), Some(&json!({"name": "anon"})));
}

#[test]
fn min_items_fill_produces_matching_children_and_paths() {
    let tree = tree(json!({
        "type": "object",
        "properties": {
            "tags": {"type": "array", "items": {"type": "string"}, "minItems": 3}
        }
    }));
    let tags = tree.find("/tags").unwrap();
    assert_eq!(tree.kind(tags), Some(NodeKind::Array));
    let children = tree.children(tags);
    assert_eq!(children.len(), 3);
    for (index, entry) in children.iter().enumerate() {
        assert_eq!(tree.path(entry.node).unwrap(), format!("/tags/{index}"));
    }
    assert_eq!(tree.node_value(tags), Some(&json!(["", "", ""])));
    assert_eq!(tree.value(), Some(&json!({"tags": ["", "", ""]})));
}

#[test]
fn null_assignment_respects_nullability() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "opt": {"type": ["string", "null"]},
            "req": {"type": "string"},
            "num": {"type": "number"}
        }
    }));
    let opt = tree.find("/opt").unwrap();
    let req = tree.find("/req").unwrap();
    let num = tree.find("/num").unwrap();

    tree.set_value(opt, Value::Null);
    tree.set_value(req, Value::Null);
    tree.set_value(num, Value::Null);
    tree.settle();

    assert_eq!(tree.node_value(opt), Some(&Value::Null));
    // Non-nullable strings normalize to the empty string; numbers have no
    // empty value and become unset.
    assert_eq!(tree.node_value(req), Some(&json!("")));
    assert_eq!(tree.node_value(num), None);
    assert_eq!(tree.value(), Some(&json!({"opt": null, "req": ""})));
}

#[test]
fn push_respects_tuple_and_assignment_bypasses_it() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "pair": {
                "type": "array",
                "prefixItems": [{"type": "string"}, {"type": "number"}],
                "items": false
            }
        }
    }));
    let pair = tree.find("/pair").unwrap();

    assert!(tree.push(pair, None).is_some());
    assert!(tree.push(pair, None).is_some());
    assert!(tree.push(pair, None).is_none());
    assert_eq!(tree.children(pair).len(), 2);

    // Whole-value assignment is authoritative and wins over the fixed
    // tuple cap.
    tree.set_value(pair, json!(["a", 1, true, "z"]));
    tree.settle();
    assert_eq!(tree.children(pair).len(), 4);
    assert_eq!(tree.node_value(pair), Some(&json!(["a", 1, true, "z"])));
}

#[test]
fn push_honors_max_items() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "few": {"type": "array", "items": {"type": "string"}, "maxItems": 1}
        }
    }));
    let few = tree.find("/few").unwrap();
    assert!(tree.push(few, Some(json!("only"))).is_some());
    assert!(tree.push(few, Some(json!("extra"))).is_none());
    assert_eq!(tree.node_value(few), Some(&json!(["only"])));
}

#[test]
fn out_of_range_structural_ops_are_rejected() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "tags": {"type": "array", "items": {"type": "string"}}
        }
    }));
    let tags = tree.find("/tags").unwrap();
    tree.set_value(tags, json!(["a", "b"]));
    tree.settle();

    assert!(tree.remove(tags, 5).is_none());
    assert!(tree.update(tags, 5, json!("x")).is_none());
    assert_eq!(tree.node_value(tags), Some(&json!(["a", "b"])));

    assert!(tree.update(tags, 1, json!("B")).is_some());
    assert!(tree.remove(tags, 0).is_some());
    tree.settle();
    assert_eq!(tree.node_value(tags), Some(&json!(["B"])));
    assert_eq!(tree.children(tags).len(), 1);
}

#[test]
fn remove_shifts_later_elements_down() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "tags": {"type": "array", "items": {"type": "string"}}
        }
    }));
    let tags = tree.find("/tags").unwrap();
    tree.set_value(tags, json!(["a", "b", "c"]));
    tree.remove(tags, 1);
    tree.settle();
    assert_eq!(tree.node_value(tags), Some(&json!(["a", "c"])));
    let paths: Vec<&str> = tree
        .children(tags)
        .iter()
        .map(|entry| tree.path(entry.node).unwrap())
        .collect();
    assert_eq!(paths, vec!["/tags/0", "/tags/1"]);
}

#[test]
fn clear_refills_min_items() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "tags": {"type": "array", "items": {"type": "string"}, "minItems": 2}
        }
    }));
    let tags = tree.find("/tags").unwrap();
    tree.set_value(tags, json!(["x", "y", "z"]));
    tree.clear(tags);
    tree.settle();
    assert_eq!(tree.node_value(tags), Some(&json!(["", ""])));
}

#[test]
fn assigned_nested_arrays_materialize_without_inner_items_rule() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "grid": {"type": "array", "items": {"type": "array"}}
        }
    }));
    let grid = tree.find("/grid").unwrap();

    tree.set_value(grid, json!([[1, 2], []]));
    tree.settle();
    // Elements keep their assigned value even though the item schema names
    // no rule for its own elements.
    assert_eq!(tree.node_value(grid), Some(&json!([[1, 2], []])));
    assert_eq!(tree.children(grid).len(), 2);
    assert_eq!(
        tree.node_value(tree.find("/grid/0/1").unwrap()),
        Some(&json!(2))
    );
}

#[test]
fn find_resolves_relative_references() {
    let tree = tree(json!({
        "type": "object",
        "properties": {
            "a": {"type": "object", "properties": {"deep": {"type": "string"}}},
            "b": {"type": "string"}
        }
    }));
    let deep = tree.find("/a/deep").unwrap();
    assert_eq!(tree.find_from(deep, "../../b"), tree.find("/b"));
    assert_eq!(tree.find_from(deep, "/a"), tree.find("/a"));
    assert_eq!(tree.find("#/a/deep"), Some(deep));
    assert!(tree.find("/a/missing").is_none());
}

#[test]
fn terminal_nodes_keep_subtree_opaque() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "blob": {"type": "object", "terminal": true, "properties": {"x": {"type": "number"}}}
        }
    }));
    let blob = tree.find("/blob").unwrap();
    assert_eq!(tree.kind(blob), Some(NodeKind::Scalar));
    assert!(tree.children(blob).is_empty());
    assert!(tree.find("/blob/x").is_none());

    tree.set_value(blob, json!({"x": 1, "y": "kept"}));
    tree.settle();
    assert_eq!(tree.node_value(blob), Some(&json!({"x": 1, "y": "kept"})));
}

#[test]
fn recursive_ref_materializes_with_value_depth() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "child": {"$ref": "#"}
        }
    }));
    // One unexpanded level exists; deeper levels wait for values.
    let child = tree.find("/child").unwrap();
    assert!(tree.find("/child/child").is_none());

    tree.set_value(child, json!({"name": "a", "child": {"name": "b"}}));
    tree.settle();
    assert_eq!(
        tree.node_value(tree.find("/child/child/name").unwrap()),
        Some(&json!("b"))
    );
    assert_eq!(
        tree.value(),
        Some(&json!({"child": {"name": "a", "child": {"name": "b"}}}))
    );
}

#[test]
fn unknown_keys_are_not_materialized() {
    let mut tree = tree(json!({
        "type": "object",
        "properties": {"known": {"type": "string"}}
    }));
    tree.set_value(tree.root(), json!({"known": "yes", "mystery": 1}));
    tree.settle();
    assert_eq!(tree.value(), Some(&json!({"known": "yes"})));
    assert!(tree.find("/mystery").is_none());
}

#[test]
fn schema_errors_are_fatal_at_build() {
    let result = FormTree::new(
        FormOptions::new(json!({"type": "array", "items": false}))
            .validation_mode(ValidationMode::None),
    );
    assert!(result.is_err());

    let result = FormTree::new(
        FormOptions::new(json!({"type": "array"})).validation_mode(ValidationMode::None),
    );
    assert!(result.is_err());
}
