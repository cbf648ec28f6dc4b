use oag_graph::graph::{Scope, WalkOptions, build_graph, topological_order};
use oag_graph::parse::{self, ExtractOptions, extractor_for};

const CIRCULAR: &str = include_str!("fixtures/circular-refs-3.1.json");

const FOO: &str = "#/components/schemas/Foo";
const BAR: &str = "#/components/schemas/Bar";
const BAZ: &str = "#/components/schemas/Baz";
const QUX: &str = "#/components/schemas/Qux";

#[test]
fn transitive_dependencies_follow_refs() {
    let spec = parse::from_json(CIRCULAR).expect("should parse circular fixture");
    let graph = build_graph(&spec);

    let foo: Vec<&str> = graph.all_dependencies_of(FOO).collect();
    assert!(foo.contains(&BAR), "Foo should reach Bar, got {foo:?}");

    let operation: Vec<&str> = graph.all_dependencies_of("#/paths/~1foo/get").collect();
    assert_eq!(operation, vec![FOO, BAR]);
}

#[test]
fn mutual_references_reach_each_other() {
    let spec = parse::from_json(CIRCULAR).expect("should parse circular fixture");
    let graph = build_graph(&spec);

    assert!(graph.all_dependencies_of(BAZ).any(|p| p == QUX));
    assert!(graph.all_dependencies_of(QUX).any(|p| p == BAZ));

    let qux_referrers: Vec<&str> = graph.reverse_dependencies_of(QUX).collect();
    assert_eq!(qux_referrers, vec!["#/components/schemas/Baz/properties/qux"]);
    let baz_referrers: Vec<&str> = graph.reverse_dependencies_of(BAZ).collect();
    assert_eq!(baz_referrers, vec!["#/components/schemas/Qux/properties/baz"]);
}

#[test]
fn read_only_scope_reaches_referrers() {
    let spec = parse::from_json(CIRCULAR).expect("should parse circular fixture");
    let graph = build_graph(&spec);

    let bar = graph.scopes(BAR).expect("Bar should have scopes");
    assert!(bar.contains(&Scope::Read));
    let foo = graph.scopes(FOO).expect("Foo should have scopes");
    assert!(foo.contains(&Scope::Read), "Foo inherits Bar's scopes, got {foo:?}");
    assert!(
        graph
            .node("#/components/schemas/Bar/properties/id")
            .expect("id node")
            .has_scope(Scope::Read)
    );
}

#[test]
fn cycles_are_ordered_after_acyclic_schemas() {
    let mut spec = parse::from_json(CIRCULAR).expect("should parse circular fixture");
    let version = parse::detect_version(&spec).expect("version");
    let result = extractor_for(version).create_graph(&mut spec, &ExtractOptions::default());

    let order = topological_order(&result.graph, &WalkOptions::default());
    insta::assert_debug_snapshot!(order, @r#"
    [
        "schema:Bar",
        "schema:Foo",
        "schema:Baz",
        "schema:Qux",
        "operation:GET /foo",
    ]
    "#);
}

#[test]
fn generic_graph_walks_every_node_once() {
    let spec = parse::from_json(CIRCULAR).expect("should parse circular fixture");
    let graph = build_graph(&spec);

    let mut visited = Vec::new();
    oag_graph::walk(&graph, &WalkOptions::default(), |pointer, _| {
        visited.push(pointer.to_string())
    });
    assert_eq!(visited.len(), graph.nodes.len());

    let position = |pointer: &str| visited.iter().position(|p| p == pointer).expect("visited");
    assert!(position(BAR) < position(FOO));
}
