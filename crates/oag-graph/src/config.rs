use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::graph::WalkOrder;
use crate::pointer::TopLevelKind;

/// Top-level configuration loaded from `.oag-graph.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub input: String,
    pub parser: ParserConfig,
    pub walk: WalkConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            input: "openapi.yaml".to_string(),
            parser: ParserConfig::default(),
            walk: WalkConfig::default(),
        }
    }
}

/// How the input document is checked and rewritten before ordering.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub validate: ValidateMode,
    pub transforms: Transforms,
    /// Filtering only runs when this section is present.
    pub filters: Option<Filters>,
}

/// What to do with validation issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidateMode {
    /// Skip validation entirely.
    #[default]
    Off,
    /// Report issues and continue.
    Warn,
    /// Report issues and fail on any error.
    Strict,
}

impl ValidateMode {
    pub fn enabled(self) -> bool {
        self != ValidateMode::Off
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Transforms {
    pub enums: EnumsMode,
    /// Naming template applied to every schema component, e.g. `{{name}}Dto`.
    pub schema_name: Option<String>,
    pub read_write: ReadWriteConfig,
}

/// Enum hoisting applied while extracting the top-level graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumsMode {
    #[default]
    Off,
    /// Move inline enums into the schema collection and reference them.
    Root,
    /// Copy referenced enums inline and drop the originals.
    Inline,
}

/// Splitting of schemas into read and write variants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadWriteConfig {
    pub enabled: bool,
    /// Naming template for the write variant, e.g. `{{name}}Writable`.
    pub requests: String,
    /// Naming template for the read variant.
    pub responses: String,
}

impl Default for ReadWriteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests: "{{name}}Writable".to_string(),
            responses: "{{name}}".to_string(),
        }
    }
}

/// Include/exclude rules applied to the document before ordering.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Keep deprecated resources.
    pub deprecated: bool,
    /// Keep components no kept operation reaches.
    pub orphans: bool,
    /// Keep the document's component order instead of selection order.
    pub preserve_order: bool,
    pub operations: FilterSet,
    pub parameters: FilterSet,
    pub request_bodies: FilterSet,
    pub responses: FilterSet,
    pub schemas: FilterSet,
    pub tags: FilterSet,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            deprecated: true,
            orphans: false,
            preserve_order: false,
            operations: FilterSet::default(),
            parameters: FilterSet::default(),
            request_bodies: FilterSet::default(),
            responses: FilterSet::default(),
            schemas: FilterSet::default(),
            tags: FilterSet::default(),
        }
    }
}

/// Patterns are exact names, `/regex/`, or `@field:value`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Processing order options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    pub order: WalkOrder,
    pub prefer_groups: Vec<TopLevelKind>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            order: WalkOrder::Topological,
            prefer_groups: TopLevelKind::DEFAULT_PREFER_GROUPS.to_vec(),
        }
    }
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".oag-graph.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<GraphConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    let config: GraphConfig =
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: PathBuf::from(path),
            source,
        })?;
    Ok(Some(config))
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# oag-graph configuration
input: openapi.yaml

parser:
  validate: off           # off | warn | strict
  transforms:
    enums: off            # off | root | inline
    # schema_name: "{{name}}Dto"
    read_write:
      enabled: false
      requests: "{{name}}Writable"
      responses: "{{name}}"
  # filters:              # filtering only runs when this section is present
  #   deprecated: true    # keep deprecated resources
  #   orphans: false      # keep components no operation uses
  #   preserve_order: false
  #   operations:
  #     include: ["GET /pets", "/^POST /"]
  #     exclude: ["@deprecated"]
  #   tags:
  #     include: [pets]
  #   schemas:
  #     exclude: [InternalError]

walk:
  order: topological      # topological | declarations
  prefer_groups: [schema, parameter, request_body, operation, server, webhook]
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert_eq!(config.input, "openapi.yaml");
        assert_eq!(config.parser.validate, ValidateMode::Off);
        assert_eq!(config.parser.transforms.enums, EnumsMode::Off);
        assert!(config.parser.transforms.schema_name.is_none());
        assert!(!config.parser.transforms.read_write.enabled);
        assert_eq!(config.parser.transforms.read_write.requests, "{{name}}Writable");
        assert!(config.parser.filters.is_none());
        assert_eq!(config.walk.order, WalkOrder::Topological);
        assert_eq!(config.walk.prefer_groups.len(), 6);
    }

    #[test]
    fn test_default_content_parses_to_defaults() {
        let config: GraphConfig = serde_yaml_ng::from_str(default_config_content()).unwrap();
        assert_eq!(config.input, "openapi.yaml");
        assert_eq!(config.parser.validate, ValidateMode::Off);
        assert_eq!(config.parser.transforms.enums, EnumsMode::Off);
        assert!(config.parser.filters.is_none());
        assert_eq!(config.walk.prefer_groups, TopLevelKind::DEFAULT_PREFER_GROUPS);
    }

    #[test]
    fn test_parse_config_yaml() {
        let yaml = r#"
input: petstore.json
parser:
  validate: strict
  transforms:
    enums: root
    schema_name: "Api{{name}}"
    read_write:
      enabled: true
      requests: "{{name}}Input"
  filters:
    orphans: true
    operations:
      include: ["GET /pets"]
    tags:
      exclude: [internal]
walk:
  order: declarations
  prefer_groups: [operation, schema]
"#;
        let config: GraphConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.input, "petstore.json");
        assert_eq!(config.parser.validate, ValidateMode::Strict);
        assert_eq!(config.parser.transforms.enums, EnumsMode::Root);
        assert_eq!(config.parser.transforms.schema_name.as_deref(), Some("Api{{name}}"));
        let read_write = &config.parser.transforms.read_write;
        assert!(read_write.enabled);
        assert_eq!(read_write.requests, "{{name}}Input");
        assert_eq!(read_write.responses, "{{name}}");
        let filters = config.parser.filters.unwrap();
        assert!(filters.deprecated);
        assert!(filters.orphans);
        assert_eq!(filters.operations.include, vec!["GET /pets"]);
        assert_eq!(filters.tags.exclude, vec!["internal"]);
        assert!(filters.schemas.is_empty());
        assert_eq!(config.walk.order, WalkOrder::Declarations);
        assert_eq!(
            config.walk.prefer_groups,
            vec![TopLevelKind::Operation, TopLevelKind::Schema]
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "parser:\n  validate: warn").unwrap();
        let config = load_config(&path).unwrap().unwrap();
        assert_eq!(config.parser.validate, ValidateMode::Warn);
        assert_eq!(config.input, "openapi.yaml");
    }

    #[test]
    fn test_load_config_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "walk:\n  order: sideways\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
