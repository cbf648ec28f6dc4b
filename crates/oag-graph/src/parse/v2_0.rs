use serde_json::Value;

use super::dependencies::SWAGGER_2_0_SHAPE;
use super::{ExtractOptions, ExtractResult, GraphExtractor, Layout, SpecVersion, extract};
use crate::pointer::Namespace;

const LAYOUT: Layout = Layout {
    shape: SWAGGER_2_0_SHAPE,
    schemas: &["definitions"],
    collections: &[
        (&["definitions"], Namespace::Schema),
        (&["parameters"], Namespace::Parameter),
        (&["responses"], Namespace::Response),
    ],
    webhooks: false,
};

/// Swagger 2.0: `definitions`, root `parameters` and `responses`, and `paths`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Swagger2Extractor;

impl GraphExtractor for Swagger2Extractor {
    fn version(&self) -> SpecVersion {
        SpecVersion::V2_0
    }

    fn create_graph(&self, spec: &mut Value, options: &ExtractOptions) -> ExtractResult {
        extract(&LAYOUT, spec, options)
    }
}
