use serde_json::Value;

use super::dependencies::OPENAPI_3_0_SHAPE;
use super::{ExtractOptions, ExtractResult, GraphExtractor, Layout, SpecVersion, extract};
use crate::pointer::Namespace;

pub(crate) const COMPONENT_COLLECTIONS: &[(&[&str], Namespace)] = &[
    (&["components", "schemas"], Namespace::Schema),
    (&["components", "parameters"], Namespace::Parameter),
    (&["components", "requestBodies"], Namespace::Body),
    (&["components", "responses"], Namespace::Response),
];

const LAYOUT: Layout = Layout {
    shape: OPENAPI_3_0_SHAPE,
    schemas: &["components", "schemas"],
    collections: COMPONENT_COLLECTIONS,
    webhooks: false,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApi30Extractor;

impl GraphExtractor for OpenApi30Extractor {
    fn version(&self) -> SpecVersion {
        SpecVersion::V3_0
    }

    fn create_graph(&self, spec: &mut Value, options: &ExtractOptions) -> ExtractResult {
        extract(&LAYOUT, spec, options)
    }
}
