pub mod config;
pub mod error;
pub mod graph;
pub mod naming;
pub mod parse;
pub mod pointer;
pub mod transform;

pub use graph::{
    Graph, NodeInfo, Scope, TopLevelGraph, WalkGraph, WalkOptions, WalkOrder, build_graph,
    build_resource_metadata, walk, walk_topological,
};
pub use parse::{GraphExtractor, SpecVersion, detect_version, extractor_for};
pub use transform::{Prepared, prepare};
