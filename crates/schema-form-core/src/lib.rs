//! Core node-tree engine for `schema-form-rs`.
//!
//! Turns a JSON Schema document into a live, mutable tree of typed nodes:
//! schema resolution (`$ref` including recursion, `allOf` folding,
//! `oneOf`/`anyOf` variants, `prefixItems` tuples), node construction with
//! a branch/terminal strategy, validation-error distribution under
//! dynamically switching variants, computed `visible`/`active`/`watch`/`if`
//! directives, and bitmask event batching with an explicit settle point.
//!
//! ```
//! use schema_form_core::{FormOptions, FormTree, ValidationMode};
//! use serde_json::json;
//!
//! let mut tree = FormTree::new(
//!     FormOptions::new(json!({
//!         "type": "object",
//!         "properties": {
//!             "name": {"type": "string", "default": "anon"}
//!         }
//!     }))
//!     .validation_mode(ValidationMode::None),
//! )
//! .unwrap();
//!
//! let name = tree.find("/name").unwrap();
//! assert_eq!(tree.node_value(name), Some(&json!("anon")));
//!
//! tree.set_value(name, json!("ada"));
//! tree.settle();
//! assert_eq!(tree.value(), Some(&json!({"name": "ada"})));
//! ```

pub mod error;
pub mod events;
pub mod node;
pub mod schema;
pub mod tree;

pub use error::{SchemaError, ValidationFailure};
pub use events::{ChangeListener, NodeEvent, NodeEventFlags, NodeListener};
pub use node::{ChildEntry, NodeId, NodeKind};
pub use schema::{
    CanonicalSchema, ComputedDirectives, Discriminator, SchemaResolver, SchemaType,
    VariantDescriptor, VariantKeyword,
};
pub use tree::validate::{
    default_validator_factory, ValidateFn, ValidationErrorEntry, ValidatorFactory,
};
pub use tree::{FormOptions, FormTree, ValidationMode};
