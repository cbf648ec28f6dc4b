pub mod filter;
pub mod read_write;
pub mod schema_name;

use std::time::Instant;

use serde_json::Value;

use crate::config::{ParserConfig, ValidateMode};
use crate::error::TransformError;
use crate::graph::{TopLevelGraph, build_graph, build_resource_metadata};
use crate::parse::validator::{ValidatorIssue, ValidatorResult};
use crate::parse::{ExtractOptions, SpecVersion, detect_version, extractor_for};
use crate::pointer::path_to_pointer;

pub use filter::{FilteredSets, create_filtered_dependencies, filter_spec};
pub use read_write::read_write_transform;
pub use schema_name::schema_name_transform;

/// A document ready for ordering: transformed in place, plus its top-level graph.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub version: SpecVersion,
    pub graph: TopLevelGraph,
    pub issues: Vec<ValidatorIssue>,
}

/// Log every issue. In strict mode any error aborts.
pub fn handle_validator_result(
    result: &ValidatorResult,
    mode: ValidateMode,
) -> Result<(), TransformError> {
    for issue in &result.issues {
        let location = path_to_pointer(&issue.path);
        if issue.is_error() {
            log::error!("{} at {location}", issue.message);
        } else {
            log::warn!("{} at {location}", issue.message);
        }
    }
    let errors = result.issues.iter().filter(|i| i.is_error()).count();
    if mode == ValidateMode::Strict && errors > 0 {
        return Err(TransformError::Validation(errors));
    }
    Ok(())
}

/// Validate, rename, filter, and split `spec` according to `config`.
pub fn prepare(spec: &mut Value, config: &ParserConfig) -> Result<Prepared, TransformError> {
    let started = Instant::now();
    let version = detect_version(spec)?;
    let options = ExtractOptions {
        validate: config.validate.enabled(),
        enums: config.transforms.enums,
    };
    let mut result = extractor_for(version).create_graph(spec, &options);
    if config.validate.enabled() {
        handle_validator_result(&result.validator_result(), config.validate)?;
    }

    let mut rebuild = false;
    if let Some(template) = &config.transforms.schema_name {
        rebuild |= schema_name_transform(template, spec)? > 0;
    }

    if let Some(filters) = &config.filters {
        let sets = {
            let graph = build_graph(spec);
            create_filtered_dependencies(filters, &build_resource_metadata(&graph))?
        };
        filter_spec(spec, &sets, filters.preserve_order);
        rebuild = true;
    }

    if config.transforms.read_write.enabled {
        read_write_transform(&config.transforms.read_write, spec)?;
        rebuild = true;
    }

    if rebuild {
        let options = ExtractOptions {
            validate: false,
            ..options
        };
        result.graph = extractor_for(version).create_graph(spec, &options).graph;
    }

    log::debug!("prepared {version} document in {:?}", started.elapsed());
    Ok(Prepared {
        version,
        graph: result.graph,
        issues: result.issues,
    })
}
