//! JSON Pointer (RFC 6901) utilities for form node paths.
//!
//! Node paths in the form engine are pointer *strings*: the root node is the
//! empty string `""` and every child appends `/` plus an escaped segment
//! (`/user/emails/0`). This crate implements the string-centric helpers the
//! engine needs on top of that representation:
//!
//! - segment escaping per RFC 6901 (`~0` / `~1`),
//! - parsing a pointer into unescaped segments and formatting it back,
//! - joining a base path with an absolute (`/a/b`, optional leading `#`) or
//!   relative (`./a`, `../a`) reference,
//! - value lookup over a [`serde_json::Value`] document.
//!
//! # Example
//!
//! ```
//! use schema_form_json_pointer::{join, get, append_segment};
//! use serde_json::json;
//!
//! let base = "/user/emails/0";
//! assert_eq!(join(base, "../1").unwrap(), "/user/emails/1");
//! assert_eq!(join(base, "/name").unwrap(), "/name");
//! assert_eq!(join(base, "./domain").unwrap(), "/user/emails/0/domain");
//!
//! let doc = json!({"user": {"emails": ["a@x", "b@x"]}});
//! assert_eq!(get(&doc, "/user/emails/1"), Some(&json!("b@x")));
//! assert_eq!(append_segment("", "a/b"), "/a~1b");
//! ```

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JsonPointerError {
    /// A pointer did not start with `/` (after an optional `#`) and was not
    /// a relative reference either.
    #[error("invalid pointer: {0:?}")]
    InvalidPointer(String),
    /// A relative reference walked `..` above the root node.
    #[error("reference escapes above the root")]
    AboveRoot,
}

/// Unescapes one pointer segment. `~1` becomes `/` and `~0` becomes `~`.
///
/// ```
/// use schema_form_json_pointer::unescape_segment;
///
/// assert_eq!(unescape_segment("a~0b"), "a~b");
/// assert_eq!(unescape_segment("c~1d"), "c/d");
/// ```
pub fn unescape_segment(segment: &str) -> String {
    if !segment.contains('~') {
        return segment.to_string();
    }
    // Order matters: ~1 before ~0
    segment.replace("~1", "/").replace("~0", "~")
}

/// Escapes one pointer segment. `~` becomes `~0` and `/` becomes `~1`.
///
/// ```
/// use schema_form_json_pointer::escape_segment;
///
/// assert_eq!(escape_segment("a~b"), "a~0b");
/// assert_eq!(escape_segment("c/d"), "c~1d");
/// ```
pub fn escape_segment(segment: &str) -> String {
    if !segment.contains('~') && !segment.contains('/') {
        return segment.to_string();
    }
    // Order matters: ~ before /
    segment.replace('~', "~0").replace('/', "~1")
}

/// Strips an optional leading `#` from a pointer.
///
/// Node lookups accept both `/a/b` and `#/a/b` (and `#` alone for the root).
pub fn strip_fragment(pointer: &str) -> &str {
    pointer.strip_prefix('#').unwrap_or(pointer)
}

/// Splits a canonical path into unescaped segments.
///
/// The empty string (root) yields no segments.
///
/// ```
/// use schema_form_json_pointer::split_segments;
///
/// assert_eq!(split_segments(""), Vec::<String>::new());
/// assert_eq!(split_segments("/a/0/b"), vec!["a", "0", "b"]);
/// assert_eq!(split_segments("/a~1b"), vec!["a/b"]);
/// ```
pub fn split_segments(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    path[1..].split('/').map(unescape_segment).collect()
}

/// Formats unescaped segments back into a canonical path string.
///
/// ```
/// use schema_form_json_pointer::format_segments;
///
/// assert_eq!(format_segments(&[]), "");
/// assert_eq!(format_segments(&["a".into(), "b/c".into()]), "/a/b~1c");
/// ```
pub fn format_segments(segments: &[String]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&escape_segment(segment));
    }
    out
}

/// Appends one child segment to a base path.
pub fn append_segment(base: &str, segment: &str) -> String {
    let mut out = String::with_capacity(base.len() + segment.len() + 1);
    out.push_str(base);
    out.push('/');
    out.push_str(&escape_segment(segment));
    out
}

/// Appends an array index to a base path.
pub fn append_index(base: &str, index: usize) -> String {
    let mut out = String::with_capacity(base.len() + 8);
    out.push_str(base);
    out.push('/');
    out.push_str(&index.to_string());
    out
}

/// Returns the parent path of a canonical path, or `None` for the root.
///
/// ```
/// use schema_form_json_pointer::parent;
///
/// assert_eq!(parent("/a/b"), Some("/a"));
/// assert_eq!(parent("/a"), Some(""));
/// assert_eq!(parent(""), None);
/// ```
pub fn parent(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    Some(&path[..idx])
}

/// Returns the last (unescaped) segment of a path, or `None` for the root.
pub fn last_segment(path: &str) -> Option<String> {
    let idx = path.rfind('/')?;
    Some(unescape_segment(&path[idx + 1..]))
}

/// Returns `true` when `ancestor` is a strict prefix (path-wise) of `path`.
///
/// The root path `""` is an ancestor of every non-root path.
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor.len() >= path.len() {
        return false;
    }
    path.starts_with(ancestor) && path.as_bytes()[ancestor.len()] == b'/'
}

/// Returns `true` when two paths are equal or one contains the other.
///
/// Used for dependency overlap: a write at `path` affects a watcher of
/// `dep` when the two locations share a line of containment.
pub fn overlaps(a: &str, b: &str) -> bool {
    a == b || is_ancestor(a, b) || is_ancestor(b, a)
}

/// Checks that a string is a canonical non-negative array index.
///
/// Leading zeros are rejected except for `"0"` itself.
pub fn is_valid_index(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    if bytes.is_empty() {
        return false;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_digit())
}

/// Resolves a reference against a base node path.
///
/// Accepted reference forms:
/// - absolute: `""`, `"#"`, `"/a/b"`, `"#/a/b"` — the base is ignored;
/// - current-relative: `"./a/b"` or a bare `"a/b"` — appended to the base;
/// - parent-relative: `"../a"`, `"../../b"` — each `..` pops one segment.
///
/// `..` segments are also honored mid-reference (`"./a/../b"`).
///
/// # Errors
///
/// [`JsonPointerError::AboveRoot`] when `..` walks past the root.
///
/// ```
/// use schema_form_json_pointer::join;
///
/// assert_eq!(join("/a/b", "#").unwrap(), "");
/// assert_eq!(join("/a/b", "../c").unwrap(), "/a/c");
/// assert_eq!(join("/a/b", "c").unwrap(), "/a/b/c");
/// assert!(join("", "../x").is_err());
/// ```
pub fn join(base: &str, reference: &str) -> Result<String, JsonPointerError> {
    let reference = strip_fragment(reference);
    if reference.is_empty() {
        return Ok(String::new());
    }
    let (mut segments, rest) = if let Some(rest) = reference.strip_prefix('/') {
        (Vec::new(), rest)
    } else if let Some(rest) = reference.strip_prefix("./") {
        (split_segments(base), rest)
    } else if reference == "." {
        return Ok(base.to_string());
    } else {
        // Bare and `..`-leading references are relative to the base.
        (split_segments(base), reference)
    };
    for raw in rest.split('/') {
        match raw {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(JsonPointerError::AboveRoot);
                }
            }
            other => segments.push(unescape_segment(other)),
        }
    }
    Ok(format_segments(&segments))
}

/// Looks up a value in a JSON document by canonical path.
///
/// Returns `None` when any step is missing or typed wrong. The `-` array
/// cursor is not a readable location and resolves to `None`.
///
/// ```
/// use schema_form_json_pointer::get;
/// use serde_json::json;
///
/// let doc = json!({"a": {"b": [1, 2]}});
/// assert_eq!(get(&doc, ""), Some(&doc));
/// assert_eq!(get(&doc, "/a/b/1"), Some(&json!(2)));
/// assert_eq!(get(&doc, "/a/missing"), None);
/// ```
pub fn get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let path = strip_fragment(path);
    if path.is_empty() {
        return Some(doc);
    }
    let mut current = doc;
    for raw in path[1..].split('/') {
        let segment = unescape_segment(raw);
        current = match current {
            Value::Object(map) => map.get(&segment)?,
            Value::Array(arr) => {
                if !is_valid_index(&segment) {
                    return None;
                }
                arr.get(segment.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable variant of [`get`].
pub fn get_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let path = strip_fragment(path);
    if path.is_empty() {
        return Some(doc);
    }
    let mut current = doc;
    for raw in path[1..].split('/') {
        let segment = unescape_segment(raw);
        current = match current {
            Value::Object(map) => map.get_mut(&segment)?,
            Value::Array(arr) => {
                if !is_valid_index(&segment) {
                    return None;
                }
                arr.get_mut(segment.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}
