//! Validation boundary and error distribution.
//!
//! The validator is injected: a factory compiles the raw root schema into a
//! function from document to findings. The bundled default is backed by the
//! `jsonschema` crate. Findings are advisory node state, never exceptions;
//! only a validator that itself fails surfaces an error, and only through
//! [`FormTree::validate`].

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::error::{SchemaError, ValidationFailure};
use crate::events::NodeEventFlags;
use crate::node::NodeId;

use super::FormTree;

/// One validation finding, attached to the node at `data_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrorEntry {
    /// Pointer path into the instance. For `required` findings this is the
    /// synthesized path of the missing property itself.
    pub data_path: String,
    /// Pointer path into the schema that raised the finding.
    pub schema_path: String,
    /// The violated keyword (`minLength`, `required`, `oneOf`, ...).
    pub keyword: String,
    pub message: String,
    /// Keyword-specific payload, e.g. `{"missingProperty": "x"}`.
    pub details: Option<Value>,
    /// Identifies the producing validator for mixed setups.
    pub source: Option<String>,
}

/// Compiled validate function: document in, findings out. `Ok(None)` means
/// a clean document.
pub type ValidateFn =
    Box<dyn Fn(&Value) -> Result<Option<Vec<ValidationErrorEntry>>, ValidationFailure>>;

/// Compiles a raw root schema into a [`ValidateFn`]. The sole validation
/// boundary; any schema validator can be substituted.
pub type ValidatorFactory = Box<dyn Fn(&Value) -> Result<ValidateFn, SchemaError>>;

/// The bundled factory, backed by the `jsonschema` crate under draft
/// 2020-12.
pub fn default_validator_factory(schema: &Value) -> Result<ValidateFn, SchemaError> {
    let validator = jsonschema::options()
        .with_draft(jsonschema::Draft::Draft202012)
        .build(schema)
        .map_err(|error| SchemaError::ValidatorBuild {
            reason: error.to_string(),
        })?;
    Ok(Box::new(move |instance: &Value| {
        let entries: Vec<ValidationErrorEntry> = validator
            .iter_errors(instance)
            .map(|error| {
                let schema_path = error.schema_path.to_string();
                let keyword = keyword_of(&schema_path);
                let details = match &error.kind {
                    jsonschema::error::ValidationErrorKind::Required { property } => {
                        Some(json!({ "missingProperty": property.clone() }))
                    }
                    _ => None,
                };
                ValidationErrorEntry {
                    data_path: error.instance_path.to_string(),
                    schema_path,
                    keyword,
                    message: error.to_string(),
                    details,
                    source: Some("jsonschema".to_string()),
                }
            })
            .collect();
        Ok(if entries.is_empty() { None } else { Some(entries) })
    }))
}

/// The violated keyword is the last non-index segment of the schema path.
fn keyword_of(schema_path: &str) -> String {
    schema_path
        .split('/')
        .rev()
        .find(|segment| !segment.is_empty() && !segment.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or("")
        .to_string()
}

impl FormTree {
    /// Validates the materialized document and distributes findings to
    /// nodes. Returns the full unfiltered list. `Err` only when the
    /// injected validator itself fails.
    pub fn validate(&mut self) -> Result<Vec<ValidationErrorEntry>, ValidationFailure> {
        let entries = self.run_validator()?;
        self.distribute_errors(&entries);
        self.deliver_pending();
        Ok(entries)
    }

    pub(crate) fn run_validator(&self) -> Result<Vec<ValidationErrorEntry>, ValidationFailure> {
        let Some(validator) = &self.validator else {
            return Ok(Vec::new());
        };
        let doc = self.nodes[self.root.index()]
            .value
            .clone()
            .unwrap_or(Value::Null);
        Ok(validator(&doc)?.unwrap_or_default())
    }

    /// Routes each finding to the node at its data path. Findings for
    /// dematerialized variant branches have no node and drop out; findings
    /// whose schema path names a different variant branch than the live
    /// node's are excluded too.
    pub(crate) fn distribute_errors(&mut self, entries: &[ValidationErrorEntry]) {
        let mut buckets: BTreeMap<NodeId, Vec<ValidationErrorEntry>> = BTreeMap::new();
        for entry in entries {
            let mut entry = entry.clone();
            if entry.keyword == "required" {
                if let Some(property) = entry
                    .details
                    .as_ref()
                    .and_then(|details| details.get("missingProperty"))
                    .and_then(Value::as_str)
                {
                    entry.data_path =
                        schema_form_json_pointer::append_segment(&entry.data_path, property);
                }
            }
            let Some(node) = self.find_absolute(&entry.data_path) else {
                continue;
            };
            if !variant_compatible(&self.nodes[node.index()].schema_path, &entry.schema_path) {
                continue;
            }
            buckets.entry(node).or_default().push(entry);
        }

        for id in 0..self.nodes.len() {
            let id = NodeId(id as u32);
            if !self.nodes[id.index()].alive {
                continue;
            }
            let fresh = if self.nodes[id.index()].validation_enabled {
                buckets.remove(&id).unwrap_or_default()
            } else {
                Vec::new()
            };
            if self.nodes[id.index()].errors != fresh {
                self.nodes[id.index()].errors = fresh;
                self.queue_event(id, NodeEventFlags::UPDATE_ERROR);
            }
        }

        if self.global_errors != entries {
            self.global_errors = entries.to_vec();
            self.queue_event(self.root, NodeEventFlags::UPDATE_ERROR);
        }
    }
}

/// Whether a finding's schema location agrees with the node's on every
/// variant branch index they share. Diverging right after a `oneOf`/`anyOf`
/// segment means the finding came from a branch the node is not on.
fn variant_compatible(node_schema_path: &str, entry_schema_path: &str) -> bool {
    let node = schema_form_json_pointer::strip_fragment(node_schema_path);
    let entry = schema_form_json_pointer::strip_fragment(entry_schema_path);
    let node_segments: Vec<&str> = node.split('/').filter(|s| !s.is_empty()).collect();
    let entry_segments: Vec<&str> = entry.split('/').filter(|s| !s.is_empty()).collect();
    let mut previous: Option<&str> = None;
    for (a, b) in node_segments.iter().zip(entry_segments.iter()) {
        if a != b {
            return !matches!(previous, Some("oneOf") | Some("anyOf"));
        }
        previous = Some(a);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_from_schema_path() {
        assert_eq!(keyword_of("/properties/name/minLength"), "minLength");
        assert_eq!(keyword_of("/required"), "required");
        assert_eq!(keyword_of("/properties/job/oneOf"), "oneOf");
        assert_eq!(keyword_of("/oneOf/0/required"), "required");
    }

    #[test]
    fn variant_branch_compatibility() {
        assert!(variant_compatible(
            "#/properties/job/oneOf/1/properties/salary",
            "/properties/job/oneOf/1/properties/salary/minimum"
        ));
        assert!(!variant_compatible(
            "#/properties/job/oneOf/1/properties/salary",
            "/properties/job/oneOf/0/properties/salary/minimum"
        ));
        // Unrelated divergence is fine, e.g. required raised on the parent.
        assert!(variant_compatible(
            "#/properties/job/properties/title",
            "/properties/job/required"
        ));
    }
}
