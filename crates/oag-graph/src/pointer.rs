//! JSON Pointer helpers and classification of top-level document locations.
//!
//! Every location in a document is identified by a `#`-prefixed RFC 6901
//! pointer. Namespaced keys (`schema:Foo`, `operation:GET /foo`) identify
//! named top-level resources in the coarser, version-specific graphs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods that may carry an operation inside a path item.
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// One step of a structural path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Build a path from a mix of keys and indices.
#[macro_export]
macro_rules! path {
    () => { Vec::<$crate::pointer::PathSegment>::new() };
    ($($segment:expr),+ $(,)?) => {
        vec![$($crate::pointer::PathSegment::from($segment)),+]
    };
}

/// Escape `~` and `/` in a single pointer segment.
pub fn encode_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Reverse of [`encode_segment`].
pub fn decode_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Encode a structural path as a `#`-prefixed JSON Pointer. The empty path is `#`.
pub fn path_to_pointer(path: &[PathSegment]) -> String {
    let mut pointer = String::from("#");
    for segment in path {
        pointer.push('/');
        match segment {
            PathSegment::Key(key) => pointer.push_str(&encode_segment(key)),
            PathSegment::Index(index) => pointer.push_str(&index.to_string()),
        }
    }
    pointer
}

/// Split a pointer back into decoded segments. `#` and `""` yield an empty path.
///
/// Array indices come back as strings; pointers carry no type information.
pub fn pointer_to_path(pointer: &str) -> Vec<String> {
    let trimmed = pointer.trim();
    let clean = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let clean = clean.strip_prefix('/').unwrap_or(clean);
    if clean.is_empty() {
        return Vec::new();
    }
    clean.split('/').map(decode_segment).collect()
}

/// Canonicalise a pointer: `#` prefix, no trailing slash, no repeated slashes.
pub fn normalize_pointer(pointer: &str) -> String {
    let trimmed = pointer.trim();
    let mut normalized = String::with_capacity(trimmed.len() + 1);
    if !trimmed.starts_with('#') {
        normalized.push('#');
    }
    let mut previous_slash = false;
    for ch in trimmed.chars() {
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(ch);
    }
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Last segment of a `$ref`, decoded.
pub fn ref_to_name(reference: &str) -> String {
    pointer_to_path(reference).pop().unwrap_or_default()
}

/// Value at a structural path.
pub fn value_at<'v>(root: &'v Value, path: &[PathSegment]) -> Option<&'v Value> {
    path.iter().try_fold(root, |node, segment| match (node, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        _ => None,
    })
}

pub fn value_at_mut<'v>(root: &'v mut Value, path: &[PathSegment]) -> Option<&'v mut Value> {
    path.iter().try_fold(root, |node, segment| match (node, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
        _ => None,
    })
}

/// Resolve a local `$ref` against the document root. Remote refs resolve to `None`.
pub fn resolve_ref<'v>(root: &'v Value, reference: &str) -> Option<&'v Value> {
    if !reference.trim().starts_with('#') {
        return None;
    }
    let normalized = normalize_pointer(reference);
    root.pointer(&normalized[1..])
}

/// `path` extended by one segment.
pub fn child_path(path: &[PathSegment], segment: impl Into<PathSegment>) -> Vec<PathSegment> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment.into());
    child
}

/// Kinds of top-level locations the topological walker can group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopLevelKind {
    Schema,
    Parameter,
    RequestBody,
    Operation,
    Server,
    Webhook,
}

impl TopLevelKind {
    /// Default emission preference: types first, then inputs, then operations.
    pub const DEFAULT_PREFER_GROUPS: [TopLevelKind; 6] = [
        TopLevelKind::Schema,
        TopLevelKind::Parameter,
        TopLevelKind::RequestBody,
        TopLevelKind::Operation,
        TopLevelKind::Server,
        TopLevelKind::Webhook,
    ];
}

impl fmt::Display for TopLevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TopLevelKind::Schema => "schema",
            TopLevelKind::Parameter => "parameter",
            TopLevelKind::RequestBody => "requestBody",
            TopLevelKind::Operation => "operation",
            TopLevelKind::Server => "server",
            TopLevelKind::Webhook => "webhook",
        };
        f.write_str(name)
    }
}

static TOP_LEVEL_PATTERNS: LazyLock<Vec<(TopLevelKind, Regex)>> = LazyLock::new(|| {
    let methods = HTTP_METHODS.join("|");
    [
        (TopLevelKind::Schema, r"^#/components/schemas/[^/]+$".to_string()),
        (
            TopLevelKind::Parameter,
            r"^#/components/parameters/[^/]+$".to_string(),
        ),
        (
            TopLevelKind::RequestBody,
            r"^#/components/requestBodies/[^/]+$".to_string(),
        ),
        (TopLevelKind::Server, r"^#/servers/[^/]+$".to_string()),
        (
            TopLevelKind::Operation,
            format!(r"^#/paths/[^/]+/(?:{methods})$"),
        ),
        (
            TopLevelKind::Webhook,
            format!(r"^#/webhooks/[^/]+/(?:{methods})$"),
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(&pattern).expect("valid top-level pattern")))
    .collect()
});

/// Classify a pointer as one of the recognised top-level kinds.
///
/// With `kind` set only that pattern is tested; otherwise the first matching
/// pattern in table order wins.
pub fn match_top_level_kind(pointer: &str, kind: Option<TopLevelKind>) -> Option<TopLevelKind> {
    TOP_LEVEL_PATTERNS
        .iter()
        .filter(|(candidate, _)| kind.is_none_or(|k| k == *candidate))
        .find(|(_, pattern)| pattern.is_match(pointer))
        .map(|(candidate, _)| *candidate)
}

/// Namespace prefix of a resource key in the top-level graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Body,
    Operation,
    Parameter,
    Response,
    Schema,
    Webhook,
    Unknown,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Body => "body",
            Namespace::Operation => "operation",
            Namespace::Parameter => "parameter",
            Namespace::Response => "response",
            Namespace::Schema => "schema",
            Namespace::Webhook => "webhook",
            Namespace::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a collection name (`schemas`, `requestBodies`, ...) to its namespace.
pub fn string_to_namespace(value: &str) -> Namespace {
    match value {
        "body" | "requestBodies" => Namespace::Body,
        "definitions" | "schema" | "schemas" => Namespace::Schema,
        "operation" | "operations" => Namespace::Operation,
        "parameter" | "parameters" => Namespace::Parameter,
        "response" | "responses" => Namespace::Response,
        "webhook" | "webhooks" => Namespace::Webhook,
        _ => Namespace::Unknown,
    }
}

pub fn add_namespace(namespace: Namespace, name: &str) -> String {
    format!("{namespace}:{name}")
}

/// Split `schema:Foo` into its namespace and name.
pub fn remove_namespace(key: &str) -> (Namespace, &str) {
    match key.split_once(':') {
        Some((namespace, name)) => (string_to_namespace(namespace), name),
        None => (Namespace::Unknown, key),
    }
}

/// `GET /pets/{id}` style key for an operation.
pub fn operation_key(method: &str, path: &str) -> String {
    format!("{} {}", method.to_uppercase(), path)
}

/// Namespaced key of the component a `$ref` points at, inferred from the
/// second-to-last ref segment. Unknown collections are logged and kept under
/// the `unknown` namespace.
pub fn ref_to_namespaced_key(reference: &str) -> Option<String> {
    let path = pointer_to_path(reference);
    let [.., collection, name] = path.as_slice() else {
        return None;
    };
    if collection.is_empty() || name.is_empty() {
        return None;
    }
    let namespace = string_to_namespace(collection);
    if namespace == Namespace::Unknown {
        log::warn!("unsupported type: {collection}");
    }
    Some(add_namespace(namespace, name))
}
