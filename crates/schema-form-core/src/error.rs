use thiserror::Error;

/// Fatal schema defects, raised synchronously while building a tree.
///
/// Validation findings are never errors; they live on nodes as advisory
/// state (see `ValidationErrorEntry`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema fragment at {at} is not an object")]
    InvalidFragment { at: String },

    #[error("cannot resolve $ref {pointer:?}")]
    UnresolvableRef { pointer: String },

    #[error("array schema at {at} declares items:false without prefixItems")]
    TupleWithoutPrefixItems { at: String },

    #[error("array schema at {at} declares neither items nor prefixItems")]
    MissingItems { at: String },

    #[error("schema at {at} has no resolvable type")]
    MissingType { at: String },

    #[error("unsupported schema type {ty:?} at {at}")]
    UnknownType { ty: String, at: String },

    #[error("validator build failed: {reason}")]
    ValidatorBuild { reason: String },
}

/// The injected validator itself failed (as opposed to reporting findings).
///
/// Surfaces only through `FormTree::validate`; background validation never
/// raises it past the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("validator failed: {reason}")]
pub struct ValidationFailure {
    pub reason: String,
}
