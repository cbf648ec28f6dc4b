use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use indexmap::IndexMap;
use serde_json::{Value, json};

use oag_graph::config::{self, CONFIG_FILE_NAME, GraphConfig};
use oag_graph::graph::{WalkOptions, WalkOrder, build_graph, walk};
use oag_graph::parse::{self, ExtractOptions, detect_version, extractor_for};
use oag_graph::pointer::path_to_pointer;
use oag_graph::transform::prepare;

#[derive(Parser)]
#[command(
    name = "oag-graph",
    about = "Dependency graph and processing order of OpenAPI documents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the processing order of top-level resources
    Order {
        /// Path to the OpenAPI spec file (YAML or JSON)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Keep declaration order instead of dependency order
        #[arg(long)]
        declarations: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OrderFormat,
    },

    /// Print the reference graph with scopes and dependencies
    Graph {
        /// Path to the OpenAPI spec file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "yaml")]
        format: GraphFormat,
    },

    /// Validate an OpenAPI spec
    Validate {
        /// Path to the OpenAPI spec file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a new oag-graph configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, ValueEnum)]
enum OrderFormat {
    Text,
    Json,
}

#[derive(Clone, ValueEnum)]
enum GraphFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Order {
            input,
            declarations,
            format,
        } => cmd_order(input, declarations, format),

        Commands::Graph { input, format } => cmd_graph(input, format),

        Commands::Validate { input } => cmd_validate(input),

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "oag-graph", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Load the project config from the current directory, or defaults.
fn load_config() -> Result<GraphConfig> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    let loaded = config::load_config(&config_path).map_err(|e| anyhow::anyhow!(e))?;
    Ok(loaded.unwrap_or_default())
}

fn read_spec(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");

    let spec = match ext {
        "json" => parse::from_json(&content)?,
        _ => parse::from_yaml(&content)?,
    };
    Ok(spec)
}

/// Read and prepare the spec named on the command line or in the config.
fn load_prepared(input: Option<PathBuf>, cfg: &GraphConfig) -> Result<(Value, oag_graph::Prepared)> {
    let input = input.unwrap_or_else(|| PathBuf::from(&cfg.input));
    let mut spec = read_spec(&input)?;
    let prepared = prepare(&mut spec, &cfg.parser)
        .with_context(|| format!("failed to prepare {}", input.display()))?;
    log::debug!(
        "prepared {} as OpenAPI {} with {} resources",
        input.display(),
        prepared.version,
        prepared.graph.len()
    );
    Ok((spec, prepared))
}

fn cmd_order(input: Option<PathBuf>, declarations: bool, format: OrderFormat) -> Result<()> {
    let cfg = load_config()?;
    let (_, prepared) = load_prepared(input, &cfg)?;

    let options = WalkOptions {
        order: if declarations {
            WalkOrder::Declarations
        } else {
            cfg.walk.order
        },
        prefer_groups: cfg.walk.prefer_groups.clone(),
        ..WalkOptions::default()
    };

    let mut order = Vec::new();
    walk(&prepared.graph, &options, |key, _| order.push(key.to_string()));

    match format {
        OrderFormat::Text => {
            for key in &order {
                println!("{key}");
            }
        }
        OrderFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
    }
    Ok(())
}

fn cmd_graph(input: Option<PathBuf>, format: GraphFormat) -> Result<()> {
    let cfg = load_config()?;
    let (spec, _) = load_prepared(input, &cfg)?;
    let summary = build_graph_summary(&spec);

    match format {
        GraphFormat::Yaml => {
            let yaml = serde_yaml_ng::to_string(&summary)?;
            print!("{}", yaml);
        }
        GraphFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Nodes that carry scopes or take part in a reference, with their edges.
fn build_graph_summary(spec: &Value) -> Value {
    let graph = build_graph(spec);
    let mut nodes: IndexMap<&str, Value> = IndexMap::new();

    for (pointer, info) in &graph.nodes {
        let dependencies: Vec<&str> = graph.dependencies_of(pointer).collect();
        let reverse: Vec<&str> = graph.reverse_dependencies_of(pointer).collect();
        let all: Vec<&str> = graph.all_dependencies_of(pointer).collect();
        if info.scopes.is_none() && dependencies.is_empty() && reverse.is_empty() {
            continue;
        }
        let mut entry = serde_json::Map::new();
        if let Some(scopes) = &info.scopes {
            entry.insert("scopes".to_string(), json!(scopes));
        }
        if !dependencies.is_empty() {
            entry.insert("dependencies".to_string(), json!(dependencies));
        }
        if !reverse.is_empty() {
            entry.insert("reverse_dependencies".to_string(), json!(reverse));
        }
        if !all.is_empty() {
            entry.insert("all_dependencies".to_string(), json!(all));
        }
        nodes.insert(pointer.as_str(), Value::Object(entry));
    }

    json!({
        "node_count": graph.nodes.len(),
        "nodes": nodes,
    })
}

fn cmd_validate(input: PathBuf) -> Result<()> {
    let mut spec = read_spec(&input)?;
    let version = detect_version(&spec)?;
    let options = ExtractOptions {
        validate: true,
        ..ExtractOptions::default()
    };
    let result = extractor_for(version).create_graph(&mut spec, &options);

    for issue in &result.issues {
        eprintln!(
            "  {:?} {}: {} ({})",
            issue.severity,
            path_to_pointer(&issue.path),
            issue.message,
            serde_json::to_string(&issue.code)?
        );
    }
    if !result.valid {
        anyhow::bail!(
            "{} failed validation with {} issue(s)",
            input.display(),
            result.issues.len()
        );
    }

    eprintln!("Valid OpenAPI {version} spec: {}", input.display());
    eprintln!("  Schemas: {}", result.graph.schemas.len());
    eprintln!("  Operations: {}", result.graph.operations.len());
    eprintln!("  Webhooks: {}", result.graph.webhooks.len());
    eprintln!("Validation successful.");
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}
