// Integration tests: Fill List behavior under graph edits.
//
// Exercises the public API end to end (registry → graph → node → codegen):
// link preservation across re-typing, idempotent assignment, inference
// priority, provisional links into generic nodes, and registry extensions.

use fillnode::codegen::{self, CopyResolution};
use fillnode::diag::codes;
use fillnode::document;
use fillnode::graph::{Direction, NodeGraph};
use fillnode::id::{NodeId, PortId};
use fillnode::node::{Assignment, FillMode};
use fillnode::ports::PortRole;
use fillnode::registry::{BaseType, CopyExpr, PortKind, Registry};
use std::path::Path;

// ── Test helpers ────────────────────────────────────────────────────────────

fn base(name: &str) -> BaseType {
    BaseType::new(name)
}

fn role(graph: &NodeGraph, node: NodeId, role: PortRole) -> PortId {
    graph
        .find_port(node, role.direction(), role.name())
        .unwrap()
        .id
}

fn source(graph: &mut NodeGraph, name: &str, kind: &str) -> PortId {
    let node = graph.add_node(name, &[], &[("out", PortKind::parse(kind).unwrap())]);
    graph.find_port(node, Direction::Output, "out").unwrap().id
}

fn sink(graph: &mut NodeGraph, name: &str, kind: &str) -> PortId {
    let node = graph.add_node(name, &[("in", PortKind::parse(kind).unwrap())], &[]);
    graph.find_port(node, Direction::Input, "in").unwrap().id
}

fn resolved(graph: &NodeGraph, node: NodeId) -> BaseType {
    graph.fill_node(node).unwrap().resolved_type().clone()
}

// ── Link preservation ───────────────────────────────────────────────────────

#[test]
fn compatible_list_link_survives_retyping() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let ints = source(&mut g, "ints", "Integer List");

    let link = g.connect(ints, role(&g, fill, PortRole::ListIn), &reg).unwrap();
    assert_eq!(resolved(&g, fill), base("Integer"));

    // Integer → Float is a declared conversion, so the link stays valid.
    let outcome = g.assign_type(fill, &base("Float"), &reg);
    match outcome {
        Assignment::Retyped { regeneration, .. } => {
            assert_eq!(regeneration.kept, vec![(PortRole::ListIn, link)]);
            assert!(regeneration.dropped.is_empty());
        }
        other => panic!("expected retype, got {:?}", other),
    }
    let kept = g.link(link).unwrap();
    assert_eq!(kept.from, ints);
    assert_eq!(kept.to, role(&g, fill, PortRole::ListIn));
}

#[test]
fn incompatible_retyping_drops_the_link() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let texts = source(&mut g, "texts", "Text List");
    let link = g.connect(texts, role(&g, fill, PortRole::ListIn), &reg).unwrap();

    let outcome = g.assign_type(fill, &base("Vector"), &reg);
    match outcome {
        Assignment::Retyped { regeneration, .. } => {
            assert_eq!(regeneration.dropped, vec![(PortRole::ListIn, link)]);
        }
        other => panic!("expected retype, got {:?}", other),
    }
    assert!(g.link(link).is_none());
    assert_eq!(resolved(&g, fill), base("Vector"));
}

#[test]
fn length_link_is_independent_of_type() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let count = source(&mut g, "count", "Integer");
    let link = g.connect(count, role(&g, fill, PortRole::Length), &reg).unwrap();

    for name in ["Vector", "Text", "Spline", "Float"] {
        g.assign_type(fill, &base(name), &reg);
        assert_eq!(g.link(link).unwrap().to, role(&g, fill, PortRole::Length));
    }
}

// ── Idempotence ─────────────────────────────────────────────────────────────

#[test]
fn second_assignment_keeps_ports_and_links() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let out = sink(&mut g, "viewer", "Vector List");
    g.assign_type(fill, &base("Vector"), &reg);
    let link = g.connect(role(&g, fill, PortRole::ListOut), out, &reg).unwrap();

    let ports: Vec<PortId> = g.ports_of(fill).map(|p| p.id).collect();
    assert_eq!(g.assign_type(fill, &base("Vector"), &reg), Assignment::Unchanged);
    assert_eq!(g.ports_of(fill).map(|p| p.id).collect::<Vec<_>>(), ports);
    assert!(g.link(link).is_some());
}

#[test]
fn padded_type_names_are_rejected() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let ports: Vec<PortId> = g.ports_of(fill).map(|p| p.id).collect();

    for name in [" Vector", "Vector ", " Vector "] {
        assert_eq!(g.assign_type(fill, &base(name), &reg), Assignment::Rejected);
    }
    assert_eq!(resolved(&g, fill), base("Float"));
    assert_eq!(g.ports_of(fill).map(|p| p.id).collect::<Vec<_>>(), ports);

    let saved = document::to_json(&document::save(&g));
    assert!(saved.contains("\"type\": \"Float\""), "{}", saved);
}

// ── Inference ───────────────────────────────────────────────────────────────

#[test]
fn list_input_evidence_beats_element_input() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let element = source(&mut g, "element", "Text");
    let list = source(&mut g, "list", "Text List");

    g.connect(element, role(&g, fill, PortRole::ElementIn), &reg).unwrap();
    assert_eq!(resolved(&g, fill), base("Text"));

    g.connect(list, role(&g, fill, PortRole::ListIn), &reg).unwrap();
    assert_eq!(resolved(&g, fill), base("Text"));
    assert_eq!(g.links().count(), 2);
}

#[test]
fn conflicting_list_input_wins_and_prunes_element_link() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let element = source(&mut g, "element", "Text");
    let list = source(&mut g, "list", "Spline List");

    let element_link = g.connect(element, role(&g, fill, PortRole::ElementIn), &reg).unwrap();
    g.connect(list, role(&g, fill, PortRole::ListIn), &reg).unwrap();

    assert_eq!(resolved(&g, fill), base("Spline"));
    assert!(g.link(element_link).is_none());
}

#[test]
fn downstream_target_types_an_unlinked_node() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let viewer = sink(&mut g, "viewer", "Matrix List");

    g.connect(role(&g, fill, PortRole::ListOut), viewer, &reg).unwrap();
    assert_eq!(resolved(&g, fill), base("Matrix"));
}

#[test]
fn disconnect_keeps_the_last_inferred_type() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let list = source(&mut g, "list", "Vector List");
    let link = g.connect(list, role(&g, fill, PortRole::ListIn), &reg).unwrap();

    assert!(g.disconnect(link, &reg).is_some());
    assert_eq!(resolved(&g, fill), base("Vector"));
}

// ── Host-level errors ───────────────────────────────────────────────────────

#[test]
fn refused_link_keeps_existing_links() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let vectors = source(&mut g, "vectors", "Vector List");
    let texts = source(&mut g, "texts", "Text List");
    let list_in = role(&g, fill, PortRole::ListIn);

    let link = g.connect(vectors, list_in, &reg).unwrap();
    let err = g.connect(texts, list_in, &reg).unwrap_err();
    assert_eq!(err.code, Some(codes::INCOMPATIBLE_KINDS));

    assert_eq!(g.incoming_link(list_in).map(|l| l.id), Some(link));
    assert_eq!(g.link(link).unwrap().from, vectors);
    assert_eq!(resolved(&g, fill), base("Vector"));
}

#[test]
fn plain_nodes_refuse_incompatible_links() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let text = source(&mut g, "text", "Text");
    let vector = sink(&mut g, "vector", "Vector");

    let err = g.connect(text, vector, &reg).unwrap_err();
    assert_eq!(err.code, Some(codes::INCOMPATIBLE_KINDS));
    assert_eq!(g.links().count(), 0);
}

#[test]
fn shape_mismatch_into_generic_node_is_refused() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let single = source(&mut g, "single", "Vector");

    let err = g.connect(single, role(&g, fill, PortRole::ListIn), &reg).unwrap_err();
    assert_eq!(err.code, Some(codes::INCOMPATIBLE_KINDS));
    assert_eq!(resolved(&g, fill), base("Float"));
    assert_eq!(g.links().count(), 0);
}

// ── Registry extensions ─────────────────────────────────────────────────────

#[test]
fn extension_types_drive_inference_and_copies() {
    let mut reg = Registry::with_builtins();
    let ext = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/mesh_types.json");
    assert_eq!(reg.load_json(&ext).unwrap(), 3);

    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let meshes = source(&mut g, "meshes", "Mesh List");
    g.connect(meshes, role(&g, fill, PortRole::ListIn), &reg).unwrap();
    g.set_mode(fill, FillMode::Prepend);

    let emitted = codegen::emit(&g, fill, &reg).unwrap();
    assert_eq!(
        emitted.copy,
        CopyResolution::Copy(CopyExpr::Function("clone_mesh".to_string()))
    );
    assert!(emitted.render().ends_with("outList = fillList ++ inList\n"));
}

#[test]
fn saved_document_reloads_to_the_same_code() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let list = source(&mut g, "list", "Spline List");
    g.connect(list, role(&g, fill, PortRole::ListIn), &reg).unwrap();
    g.set_mode(fill, FillMode::Prepend);
    let before = codegen::emit(&g, fill, &reg).unwrap().fingerprint();

    let json = document::to_json(&document::save(&g));
    let reloaded = document::load(&document::parse(&json).unwrap(), &reg);
    assert!(reloaded.diagnostics.is_empty(), "{:?}", reloaded.diagnostics);

    let again = reloaded.graph.node_by_name("fill").unwrap();
    assert_eq!(resolved(&reloaded.graph, again), base("Spline"));
    assert_eq!(
        codegen::emit(&reloaded.graph, again, &reg).unwrap().fingerprint(),
        before
    );
}

#[test]
fn assigned_type_survives_reload() {
    let reg = Registry::with_builtins();
    let mut g = NodeGraph::new();
    let fill = g.add_fill_node("fill", &reg).unwrap();
    let ints = source(&mut g, "ints", "Integer List");
    g.connect(ints, role(&g, fill, PortRole::ListIn), &reg).unwrap();
    assert_eq!(resolved(&g, fill), base("Integer"));
    g.assign_type(fill, &base("Float"), &reg);

    let json = document::to_json(&document::save(&g));
    let reloaded = document::load(&document::parse(&json).unwrap(), &reg);
    assert!(reloaded.diagnostics.is_empty(), "{:?}", reloaded.diagnostics);

    let again = reloaded.graph.node_by_name("fill").unwrap();
    assert_eq!(resolved(&reloaded.graph, again), base("Float"));
    assert_eq!(reloaded.graph.links().count(), 1);
    assert_eq!(
        codegen::emit(&reloaded.graph, again, &reg).unwrap().fingerprint(),
        codegen::emit(&g, fill, &reg).unwrap().fingerprint()
    );
}
