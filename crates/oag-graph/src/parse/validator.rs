use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};

use crate::pointer::{PathSegment, operation_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    DuplicateKey,
    InvalidType,
    MissingRequiredField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A structural problem found in the input document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorIssue {
    pub code: IssueCode,
    pub message: String,
    /// Location of the problem, for reporting.
    pub path: Vec<PathSegment>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<IndexMap<String, Value>>,
}

impl ValidatorIssue {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorResult {
    pub valid: bool,
    pub issues: Vec<ValidatorIssue>,
}

impl ValidatorResult {
    pub fn new(issues: Vec<ValidatorIssue>) -> Self {
        Self {
            valid: is_valid(&issues),
            issues,
        }
    }
}

/// True when no issue has error severity.
pub fn is_valid(issues: &[ValidatorIssue]) -> bool {
    !issues.iter().any(ValidatorIssue::is_error)
}

fn context<const N: usize>(entries: [(&str, Value); N]) -> Option<IndexMap<String, Value>> {
    Some(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

/// Tracks which operation first claimed each `operationId`.
#[derive(Debug, Default)]
pub struct OperationIds {
    claimed: HashMap<String, String>,
}

impl OperationIds {
    /// Claim `operation_id` for `method route`, or report it as a duplicate.
    pub fn claim(&mut self, operation_id: &str, route: &str, method: &str) -> Option<ValidatorIssue> {
        if let Some(owner) = self.claimed.get(operation_id) {
            log::debug!("operationId {operation_id} already used by {owner}");
            return Some(ValidatorIssue {
                code: IssueCode::DuplicateKey,
                message: "Duplicate `operationId` found. Each `operationId` must be unique."
                    .to_string(),
                path: crate::path!["paths", route, method, "operationId"],
                severity: Severity::Error,
                context: context([("key", json!("operationId")), ("value", json!(operation_id))]),
            });
        }
        self.claimed
            .insert(operation_id.to_string(), operation_key(method, route));
        None
    }
}

/// JSON type name of a value, as reported in issue context.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check the shape of the root `servers` list.
pub fn validate_servers(spec: &Value) -> Vec<ValidatorIssue> {
    let mut issues = Vec::new();
    let servers = match spec.get("servers") {
        None | Some(Value::Null) => return issues,
        Some(servers) => servers,
    };
    let Value::Array(entries) = servers else {
        issues.push(ValidatorIssue {
            code: IssueCode::InvalidType,
            message: "`servers` must be an array.".to_string(),
            path: Vec::new(),
            severity: Severity::Error,
            context: None,
        });
        return issues;
    };

    for (index, server) in entries.iter().enumerate() {
        let Value::Object(server) = server else {
            issues.push(ValidatorIssue {
                code: IssueCode::InvalidType,
                message: "Each entry in `servers` must be an object.".to_string(),
                path: crate::path!["servers", index],
                severity: Severity::Error,
                context: context([
                    ("actual", json!(json_type_name(server))),
                    ("expected", json!("object")),
                ]),
            });
            continue;
        };
        let has_url = match server.get("url") {
            Some(Value::String(url)) => !url.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if !has_url {
            issues.push(ValidatorIssue {
                code: IssueCode::MissingRequiredField,
                message: "Missing required field `url` in server object.".to_string(),
                path: crate::path!["servers", index],
                severity: Severity::Error,
                context: context([("field", json!("url"))]),
            });
        }
    }
    issues
}
