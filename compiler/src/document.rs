// document.rs — JSON graph documents
//
// Loads a graph description into a `NodeGraph` and writes one back. Fill
// nodes persist only their state (type and mode); their ports are rebuilt on
// load. Saved state is authoritative: links are replayed without running the
// edit hook, and only fill nodes saved without a usable state infer their
// types afterwards.
//
// Preconditions: none.
// Postconditions: every node and link that could be loaded is present in the
//   returned graph; everything else is reported as a diagnostic.
// Failure modes: malformed JSON → `Diagnostic` from `parse`; duplicate node
//   names, unknown port kinds, unknown nodes/ports and rejected links →
//   diagnostics in `LoadResult`.
// Side effects: none.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::diag::{codes, Diagnostic};
use crate::graph::{Direction, NodeGraph, NodeKind};
use crate::id::{LinkId, NodeId, PortId};
use crate::node::{Assignment, FillNodeState};
use crate::registry::{PortKind, Registry};

// ── Document types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeDecl>,
    #[serde(default)]
    pub links: Vec<LinkDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDecl {
    Plain {
        name: String,
        #[serde(default)]
        inputs: Vec<PortDecl>,
        #[serde(default)]
        outputs: Vec<PortDecl>,
    },
    Fill {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<FillNodeState>,
    },
}

impl NodeDecl {
    pub fn name(&self) -> &str {
        match self {
            NodeDecl::Plain { name, .. } | NodeDecl::Fill { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    /// Kind id, e.g. `"Vector List"`.
    pub kind: String,
}

/// `(node name, port name)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRef(pub String, pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDecl {
    pub from: PortRef,
    pub to: PortRef,
}

/// Result of loading a document.
#[derive(Debug)]
pub struct LoadResult {
    pub graph: NodeGraph,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

// ── Public entry points ─────────────────────────────────────────────────────

pub fn parse(source: &str) -> Result<GraphDocument, Diagnostic> {
    serde_json::from_str(source).map_err(|e| {
        Diagnostic::error(codes::INVALID_DOCUMENT, format!("invalid graph document: {}", e))
    })
}

pub fn to_json(doc: &GraphDocument) -> String {
    serde_json::to_string_pretty(doc).unwrap_or_default()
}

/// Build a graph from `doc`. Nodes are created (and fill state applied)
/// before any link is replayed.
pub fn load(doc: &GraphDocument, registry: &Registry) -> LoadResult {
    let mut graph = NodeGraph::new();
    let mut diagnostics = Vec::new();
    let mut names: HashMap<&str, NodeId> = HashMap::new();
    let mut pinned: HashSet<NodeId> = HashSet::new();
    let mut stateless: Vec<NodeId> = Vec::new();

    for decl in &doc.nodes {
        let subject = format!("node '{}'", decl.name());
        if names.contains_key(decl.name()) {
            diagnostics.push(
                Diagnostic::error(codes::DUPLICATE_NODE, "node name is already used")
                    .with_subject(subject),
            );
            continue;
        }
        let id = match decl {
            NodeDecl::Plain {
                name,
                inputs,
                outputs,
            } => {
                let inputs = port_kinds(inputs, registry, &subject, &mut diagnostics);
                let outputs = port_kinds(outputs, registry, &subject, &mut diagnostics);
                graph.add_node(name, &inputs, &outputs)
            }
            NodeDecl::Fill { name, state } => {
                let id = match graph.add_fill_node(name, registry) {
                    Ok(id) => id,
                    Err(diag) => {
                        diagnostics.push(diag);
                        continue;
                    }
                };
                match state {
                    Some(state) => {
                        if graph.restore_fill_state(id, state, registry) == Assignment::Rejected {
                            diagnostics.push(
                                Diagnostic::warning(
                                    codes::STATE_TYPE_REJECTED,
                                    format!(
                                        "type '{}' is not a registered base type",
                                        state.resolved_type
                                    ),
                                )
                                .with_subject(subject)
                                .with_hint("load the registry file that defines it"),
                            );
                            stateless.push(id);
                        } else {
                            pinned.insert(id);
                        }
                    }
                    None => stateless.push(id),
                }
                id
            }
        };
        names.insert(decl.name(), id);
    }

    // Links into a node that still has to infer its type are provisional.
    let mut replayed: Vec<(LinkId, PortId, String)> = Vec::new();
    for link in &doc.links {
        let subject = format!(
            "link {}.{} -> {}.{}",
            link.from.0, link.from.1, link.to.0, link.to.1
        );
        let from = find_port(&graph, &names, &link.from, Direction::Output);
        let to = find_port(&graph, &names, &link.to, Direction::Input);
        let result = match (from, to) {
            (Ok(from), Ok(to)) => {
                let provisional = [from, to].iter().any(|p| {
                    graph
                        .port(*p)
                        .map_or(false, |port| stateless.contains(&port.node))
                });
                graph
                    .attach(from, to, provisional, registry)
                    .map(|id| (id, to))
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        match result {
            Ok((id, to)) => {
                replayed.retain(|(_, port, _)| *port != to);
                replayed.push((id, to, subject));
            }
            Err(diag) => diagnostics.push(diag.with_subject(subject)),
        }
    }

    graph.propagate_edits_except(stateless, &pinned, registry);
    let fill_nodes: Vec<NodeId> = graph
        .nodes()
        .filter(|n| matches!(n.kind, NodeKind::Fill(_)))
        .map(|n| n.id)
        .collect();
    for id in fill_nodes {
        graph.prune_incompatible(id, registry);
    }
    for (id, _, subject) in replayed {
        if graph.link(id).is_none() {
            diagnostics.push(
                Diagnostic::error(
                    codes::INCOMPATIBLE_KINDS,
                    "link joins incompatible kinds once types are restored",
                )
                .with_subject(subject),
            );
        }
    }

    LoadResult { graph, diagnostics }
}

/// Describe `graph` as a document.
pub fn save(graph: &NodeGraph) -> GraphDocument {
    let decl_ports = |node: NodeId, direction: Direction| -> Vec<PortDecl> {
        graph
            .ports_of(node)
            .filter(|p| p.direction == direction)
            .map(|p| PortDecl {
                name: p.name.clone(),
                kind: p.kind.id(),
            })
            .collect()
    };

    let nodes = graph
        .nodes()
        .map(|node| match &node.kind {
            NodeKind::Plain => NodeDecl::Plain {
                name: node.name.clone(),
                inputs: decl_ports(node.id, Direction::Input),
                outputs: decl_ports(node.id, Direction::Output),
            },
            NodeKind::Fill(fill) => NodeDecl::Fill {
                name: node.name.clone(),
                state: Some(fill.state()),
            },
        })
        .collect();

    let port_ref = |id| {
        let port = graph.port(id)?;
        let node = graph.node(port.node)?;
        Some(PortRef(node.name.clone(), port.name.clone()))
    };
    let links = graph
        .links()
        .filter_map(|link| {
            Some(LinkDecl {
                from: port_ref(link.from)?,
                to: port_ref(link.to)?,
            })
        })
        .collect();

    GraphDocument { nodes, links }
}

fn port_kinds<'a>(
    decls: &'a [PortDecl],
    registry: &Registry,
    subject: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<(&'a str, PortKind)> {
    let mut out = Vec::new();
    for decl in decls {
        match registry.kind_of(&decl.kind) {
            Some(kind) => out.push((decl.name.as_str(), kind)),
            None => diagnostics.push(
                Diagnostic::error(
                    codes::UNKNOWN_PORT_KIND,
                    format!("port '{}' has unknown kind '{}'", decl.name, decl.kind),
                )
                .with_subject(subject.to_string()),
            ),
        }
    }
    out
}

fn find_port(
    graph: &NodeGraph,
    names: &HashMap<&str, NodeId>,
    port: &PortRef,
    direction: Direction,
) -> Result<PortId, Diagnostic> {
    let node = names.get(port.0.as_str()).copied().ok_or_else(|| {
        Diagnostic::error(codes::UNKNOWN_NODE, format!("no node named '{}'", port.0))
    })?;
    let side = match direction {
        Direction::Input => "input",
        Direction::Output => "output",
    };
    graph
        .find_port(node, direction, &port.1)
        .map(|p| p.id)
        .ok_or_else(|| {
            Diagnostic::error(
                codes::UNKNOWN_PORT,
                format!("node '{}' has no {} port '{}'", port.0, side, port.1),
            )
        })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FillMode;
    use crate::registry::BaseType;

    const DOC: &str = r#"{
        "nodes": [
            { "kind": "plain", "name": "points",
              "outputs": [{ "name": "list", "kind": "Vector List" }] },
            { "kind": "plain", "name": "count",
              "outputs": [{ "name": "n", "kind": "Integer" }] },
            { "kind": "fill", "name": "pad", "state": { "type": "Vector", "mode": "left" } }
        ],
        "links": [
            { "from": ["points", "list"], "to": ["pad", "inList"] },
            { "from": ["count", "n"], "to": ["pad", "length"] }
        ]
    }"#;

    #[test]
    fn load_document() {
        let reg = Registry::with_builtins();
        let doc = parse(DOC).unwrap();
        let result = load(&doc, &reg);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

        let g = &result.graph;
        let pad = g.node_by_name("pad").unwrap();
        let fill = g.fill_node(pad).unwrap();
        assert_eq!(fill.resolved_type(), &BaseType::new("Vector"));
        assert_eq!(fill.mode(), FillMode::Prepend);
        assert_eq!(g.links().count(), 2);
    }

    #[test]
    fn save_round_trips() {
        let reg = Registry::with_builtins();
        let doc = parse(DOC).unwrap();
        let saved = save(&load(&doc, &reg).graph);
        let reparsed = parse(&to_json(&saved)).unwrap();
        assert_eq!(reparsed, saved);

        match &saved.nodes[2] {
            NodeDecl::Fill { state: Some(state), .. } => {
                assert_eq!(state.resolved_type, BaseType::new("Vector"));
                assert_eq!(state.mode, FillMode::Prepend);
            }
            other => panic!("expected fill node, got {:?}", other),
        }
        assert_eq!(saved.links.len(), 2);
    }

    #[test]
    fn links_infer_type_without_state() {
        let reg = Registry::with_builtins();
        let doc = parse(
            r#"{
            "nodes": [
                { "kind": "plain", "name": "words", "outputs": [{ "name": "out", "kind": "Text List" }] },
                { "kind": "fill", "name": "pad" }
            ],
            "links": [{ "from": ["words", "out"], "to": ["pad", "inList"] }]
        }"#,
        )
        .unwrap();
        let result = load(&doc, &reg);
        let pad = result.graph.node_by_name("pad").unwrap();
        assert_eq!(
            result.graph.fill_node(pad).unwrap().resolved_type(),
            &BaseType::new("Text")
        );
    }

    #[test]
    fn saved_state_wins_over_link_inference() {
        let reg = Registry::with_builtins();
        let mut g = NodeGraph::new();
        let ints = g.add_node("ints", &[], &[("out", PortKind::parse("Integer List").unwrap())]);
        let pad = g.add_fill_node("pad", &reg).unwrap();
        let out = g.find_port(ints, Direction::Output, "out").unwrap().id;
        let list_in = g.find_port(pad, Direction::Input, "inList").unwrap().id;
        g.connect(out, list_in, &reg).unwrap();
        assert_eq!(g.fill_node(pad).unwrap().resolved_type(), &BaseType::new("Integer"));

        // Integer converts to Float, so the link stays after the assignment.
        g.assign_type(pad, &BaseType::new("Float"), &reg);
        let json = to_json(&save(&g));

        let result = load(&parse(&json).unwrap(), &reg);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let pad = result.graph.node_by_name("pad").unwrap();
        assert_eq!(
            result.graph.fill_node(pad).unwrap().resolved_type(),
            &BaseType::new("Float")
        );
        assert_eq!(result.graph.links().count(), 1);
        assert_eq!(save(&result.graph), parse(&json).unwrap());
    }

    #[test]
    fn link_against_saved_state_is_reported() {
        let reg = Registry::with_builtins();
        let doc = parse(
            r#"{
            "nodes": [
                { "kind": "plain", "name": "words", "outputs": [{ "name": "out", "kind": "Text List" }] },
                { "kind": "fill", "name": "pad", "state": { "type": "Vector" } }
            ],
            "links": [{ "from": ["words", "out"], "to": ["pad", "inList"] }]
        }"#,
        )
        .unwrap();
        let result = load(&doc, &reg);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, Some(codes::INCOMPATIBLE_KINDS));
        let pad = result.graph.node_by_name("pad").unwrap();
        assert_eq!(
            result.graph.fill_node(pad).unwrap().resolved_type(),
            &BaseType::new("Vector")
        );
        assert_eq!(result.graph.links().count(), 0);
    }

    #[test]
    fn stateless_node_follows_a_stateful_neighbor() {
        let reg = Registry::with_builtins();
        let doc = parse(
            r#"{
            "nodes": [
                { "kind": "fill", "name": "first", "state": { "type": "Spline" } },
                { "kind": "fill", "name": "second" }
            ],
            "links": [{ "from": ["first", "outList"], "to": ["second", "inList"] }]
        }"#,
        )
        .unwrap();
        let result = load(&doc, &reg);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let g = &result.graph;
        for (name, expected) in [("first", "Spline"), ("second", "Spline")] {
            let id = g.node_by_name(name).unwrap();
            assert_eq!(g.fill_node(id).unwrap().resolved_type(), &BaseType::new(expected));
        }
        assert_eq!(g.links().count(), 1);
    }

    #[test]
    fn load_reports_problems() {
        let reg = Registry::with_builtins();
        let doc = parse(
            r#"{
            "nodes": [
                { "kind": "plain", "name": "a", "outputs": [{ "name": "out", "kind": "Quaternion" }] },
                { "kind": "plain", "name": "a" },
                { "kind": "fill", "name": "pad", "state": { "type": "Quaternion" } }
            ],
            "links": [
                { "from": ["a", "out"], "to": ["pad", "fill"] },
                { "from": ["ghost", "out"], "to": ["pad", "fill"] }
            ]
        }"#,
        )
        .unwrap();
        let result = load(&doc, &reg);
        let codes_seen: Vec<_> = result.diagnostics.iter().filter_map(|d| d.code).collect();
        assert_eq!(
            codes_seen,
            vec![
                codes::UNKNOWN_PORT_KIND,
                codes::DUPLICATE_NODE,
                codes::STATE_TYPE_REJECTED,
                codes::UNKNOWN_PORT,
                codes::UNKNOWN_NODE,
            ]
        );
        assert!(result.has_errors());
    }

    #[test]
    fn invalid_json() {
        let err = parse("{ \"nodes\": 3 }").unwrap_err();
        assert_eq!(err.code, Some(codes::INVALID_DOCUMENT));
    }
}
