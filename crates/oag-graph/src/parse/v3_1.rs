use serde_json::Value;

use super::dependencies::OPENAPI_3_1_SHAPE;
use super::v3_0::COMPONENT_COLLECTIONS;
use super::validator::{is_valid, validate_servers};
use super::{ExtractOptions, ExtractResult, GraphExtractor, Layout, SpecVersion, extract};

const LAYOUT: Layout = Layout {
    shape: OPENAPI_3_1_SHAPE,
    schemas: &["components", "schemas"],
    collections: COMPONENT_COLLECTIONS,
    webhooks: true,
};

/// OpenAPI 3.1: adds `webhooks`, JSON Schema 2020-12 keywords, and `servers` checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApi31Extractor;

impl GraphExtractor for OpenApi31Extractor {
    fn version(&self) -> SpecVersion {
        SpecVersion::V3_1
    }

    fn create_graph(&self, spec: &mut Value, options: &ExtractOptions) -> ExtractResult {
        let mut result = extract(&LAYOUT, spec, options);
        if options.validate {
            result.issues.extend(validate_servers(spec));
            result.valid = is_valid(&result.issues);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::validator::IssueCode;
    use serde_json::json;

    fn validating() -> ExtractOptions {
        ExtractOptions {
            validate: true,
            ..ExtractOptions::default()
        }
    }

    #[test]
    fn test_webhooks_and_prefix_items() {
        let mut spec = json!({
            "openapi": "3.1.0",
            "webhooks": {
                "newPet": {
                    "post": {
                        "requestBody": { "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } } },
                        "responses": { "200": { "description": "ok" } }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Pet": { "prefixItems": [{ "$ref": "#/components/schemas/Tag" }] },
                    "Tag": { "type": "string" }
                }
            }
        });
        let result = OpenApi31Extractor.create_graph(&mut spec, &validating());
        assert!(result.valid);
        assert!(result.graph.get("schema:Pet").unwrap().dependencies.contains("schema:Tag"));
        let webhook = result.graph.get("webhook:POST newPet").unwrap();
        assert_eq!(webhook.dependencies.iter().collect::<Vec<_>>(), vec!["schema:Pet"]);
    }

    #[test]
    fn test_servers_not_an_array() {
        let mut spec = json!({ "openapi": "3.1.0", "servers": { "url": "/" } });
        let result = OpenApi31Extractor.create_graph(&mut spec, &validating());
        assert!(!result.valid);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].code, IssueCode::InvalidType);
        assert!(result.issues[0].path.is_empty());
    }

    #[test]
    fn test_servers_skipped_without_validation() {
        let mut spec = json!({ "openapi": "3.1.0", "servers": "nope" });
        let result = OpenApi31Extractor.create_graph(&mut spec, &ExtractOptions::default());
        assert!(result.valid);
        assert!(result.issues.is_empty());
    }
}
