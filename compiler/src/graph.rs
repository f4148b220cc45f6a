// graph.rs — Node graph: nodes, ports, and links
//
// Minimal host graph for generic nodes. Owns every port and link; nodes refer
// to their ports by id. Links are directed output → input, and an input port
// takes at most one incoming link. After every topology change the graph runs
// the edit hook of each affected fill node, so generic nodes re-infer their
// type exactly as they would in an interactive editor.
//
// Preconditions: port kinds of plain nodes come from the same registry that
//   is passed to `connect`/`disconnect`.
// Postconditions: after `connect`/`disconnect` returns, no link attached to a
//   fill node joins incompatible kinds.
// Failure modes: unknown ports, wrong direction, self links, incompatible
//   kinds → `Diagnostic` error; the graph is left unchanged.
// Side effects: none.

use std::collections::BTreeMap;

use log::debug;

use crate::diag::{codes, Diagnostic};
use crate::id::{IdAllocator, LinkId, NodeId, PortId};
use crate::node::FillNode;
use crate::registry::{PortKind, Registry};

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// A connection point on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: PortId,
    pub node: NodeId,
    /// Identifier, unique per node and direction; doubles as the variable
    /// name the port binds in emitted code.
    pub name: String,
    pub label: String,
    pub direction: Direction,
    pub kind: PortKind,
    /// The node may mutate data arriving on this port, so hosts must not
    /// share the source value with other consumers.
    pub consuming: bool,
}

/// A directed link from an output port to an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub from: PortId,
    pub to: PortId,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Fixed-shape node; its ports never change.
    Plain,
    /// Generic Fill List node.
    Fill(FillNode),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    ports: Vec<PortId>,
}

impl Node {
    /// Port ids in declaration order.
    pub fn ports(&self) -> &[PortId] {
        &self.ports
    }

    /// Generic nodes accept links of any kind and re-type to match them.
    pub fn is_generic(&self) -> bool {
        matches!(self.kind, NodeKind::Fill(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    nodes: BTreeMap<NodeId, Node>,
    ports: BTreeMap<PortId, Port>,
    links: BTreeMap<LinkId, Link>,
    ids: IdAllocator,
}

// ── Construction ────────────────────────────────────────────────────────────

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed-shape node with the given `(name, kind)` ports.
    pub fn add_node(
        &mut self,
        name: &str,
        inputs: &[(&str, PortKind)],
        outputs: &[(&str, PortKind)],
    ) -> NodeId {
        let id = self.insert_node(name, NodeKind::Plain);
        for (port_name, kind) in inputs {
            self.add_port(id, port_name, port_name, Direction::Input, kind.clone(), false);
        }
        for (port_name, kind) in outputs {
            self.add_port(id, port_name, port_name, Direction::Output, kind.clone(), false);
        }
        id
    }

    pub(crate) fn insert_node(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let id = self.ids.alloc_node();
        self.nodes.insert(
            id,
            Node {
                id,
                name: name.to_string(),
                kind,
                ports: Vec::new(),
            },
        );
        id
    }

    pub(crate) fn add_port(
        &mut self,
        node: NodeId,
        name: &str,
        label: &str,
        direction: Direction,
        kind: PortKind,
        consuming: bool,
    ) -> PortId {
        let id = self.ids.alloc_port();
        self.ports.insert(
            id,
            Port {
                id,
                node,
                name: name.to_string(),
                label: label.to_string(),
                direction,
                kind,
                consuming,
            },
        );
        if let Some(n) = self.nodes.get_mut(&node) {
            n.ports.push(id);
        }
        id
    }

    /// Remove every port of `node` together with the links attached to them.
    /// Returns the removed links.
    pub(crate) fn remove_ports(&mut self, node: NodeId) -> Vec<Link> {
        let ports = match self.nodes.get_mut(&node) {
            Some(n) => std::mem::take(&mut n.ports),
            None => return Vec::new(),
        };
        let mut removed = Vec::new();
        for port in &ports {
            removed.extend(self.links_of(*port));
            self.ports.remove(port);
        }
        for link in &removed {
            self.links.remove(&link.id);
        }
        removed
    }

    /// Reinsert a link under its original id.
    pub(crate) fn restore_link(&mut self, link: Link) {
        self.links.insert(link.id, link);
    }

    pub(crate) fn fill_node_mut(&mut self, id: NodeId) -> Option<&mut FillNode> {
        match self.nodes.get_mut(&id).map(|n| &mut n.kind) {
            Some(NodeKind::Fill(fill)) => Some(fill),
            _ => None,
        }
    }
}

// ── Queries ─────────────────────────────────────────────────────────────────

impl NodeGraph {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn fill_node(&self, id: NodeId) -> Option<&FillNode> {
        match self.nodes.get(&id).map(|n| &n.kind) {
            Some(NodeKind::Fill(fill)) => Some(fill),
            _ => None,
        }
    }

    pub fn is_generic(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(Node::is_generic)
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(&id)
    }

    /// Ports of `node` in declaration order.
    pub fn ports_of(&self, node: NodeId) -> impl Iterator<Item = &Port> {
        self.nodes
            .get(&node)
            .map(|n| n.ports.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.ports.get(id))
    }

    pub fn find_port(&self, node: NodeId, direction: Direction, name: &str) -> Option<&Port> {
        self.ports_of(node)
            .find(|p| p.direction == direction && p.name == name)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// Links in creation order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Links attached to `port` on either end.
    pub fn links_of(&self, port: PortId) -> Vec<Link> {
        self.links
            .values()
            .filter(|l| l.from == port || l.to == port)
            .copied()
            .collect()
    }

    pub fn incoming_link(&self, port: PortId) -> Option<&Link> {
        self.links.values().find(|l| l.to == port)
    }

    /// The output port feeding `port`, if linked.
    pub fn data_origin(&self, port: PortId) -> Option<&Port> {
        self.incoming_link(port)
            .and_then(|link| self.ports.get(&link.from))
    }

    /// The input ports fed by `port`, in link order.
    pub fn data_targets(&self, port: PortId) -> Vec<&Port> {
        self.links
            .values()
            .filter(|l| l.from == port)
            .filter_map(|l| self.ports.get(&l.to))
            .collect()
    }

    /// Nodes at the far end of any link attached to `node`.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .links
            .values()
            .filter_map(|l| {
                let from = self.ports.get(&l.from)?.node;
                let to = self.ports.get(&l.to)?.node;
                if from == node {
                    Some(to)
                } else if to == node {
                    Some(from)
                } else {
                    None
                }
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn link_is_compatible(&self, link: &Link, registry: &Registry) -> bool {
        match (self.ports.get(&link.from), self.ports.get(&link.to)) {
            (Some(from), Some(to)) => registry.is_compatible(&from.kind, &to.kind),
            _ => false,
        }
    }

    fn describe_port(&self, port: &Port) -> String {
        let node = self
            .nodes
            .get(&port.node)
            .map(|n| n.name.as_str())
            .unwrap_or("?");
        format!("{}.{}", node, port.name)
    }
}

// ── Topology edits ──────────────────────────────────────────────────────────

impl NodeGraph {
    /// Link an output port to an input port. An existing link into `to` is
    /// replaced. Links touching a generic node are accepted provisionally and
    /// kept only if they are compatible once the node has re-inferred its type.
    /// When the new link does not survive, every edit made on its behalf is
    /// rolled back, including the replacement of the old link.
    pub fn connect(
        &mut self,
        from: PortId,
        to: PortId,
        registry: &Registry,
    ) -> Result<LinkId, Diagnostic> {
        let (src, dst, description) = self.link_endpoints(from, to)?;

        let generic = self.is_generic(src.node) || self.is_generic(dst.node);
        if !generic && !registry.is_compatible(&src.kind, &dst.kind) {
            return Err(incompatible(&src.kind, &dst.kind).with_subject(description));
        }

        // Inference may re-type nodes and prune links; keep the prior graph.
        let before = generic.then(|| self.clone());

        let mut touched = vec![src.node, dst.node];
        let (id, replaced_origin) = self.insert_link(from, to);
        touched.extend(replaced_origin);
        debug!("linked {} as {}", description, id);

        self.propagate_edits(touched, registry);

        if !self.links.contains_key(&id) {
            let mut diag = incompatible(&src.kind, &dst.kind).with_subject(description);
            for node in [src.node, dst.node] {
                if let Some(fill) = self.fill_node(node) {
                    let name = self.nodes.get(&node).map(|n| n.name.as_str()).unwrap_or("?");
                    diag = diag.with_note(format!(
                        "generic node '{}' would be bound to {}",
                        name,
                        fill.resolved_type()
                    ));
                }
            }
            if let Some(before) = before {
                self.roll_back(before);
            }
            return Err(diag);
        }
        Ok(id)
    }

    /// Link two ports without running the edit hook. Unless `provisional`,
    /// the kinds must already be compatible.
    pub(crate) fn attach(
        &mut self,
        from: PortId,
        to: PortId,
        provisional: bool,
        registry: &Registry,
    ) -> Result<LinkId, Diagnostic> {
        let (src, dst, description) = self.link_endpoints(from, to)?;
        if !provisional && !registry.is_compatible(&src.kind, &dst.kind) {
            return Err(incompatible(&src.kind, &dst.kind).with_subject(description));
        }
        let (id, _) = self.insert_link(from, to);
        debug!("attached {} as {}", description, id);
        Ok(id)
    }

    /// Validate a link request and describe it for diagnostics.
    fn link_endpoints(&self, from: PortId, to: PortId) -> Result<(Port, Port, String), Diagnostic> {
        let (src, dst) = match (self.ports.get(&from), self.ports.get(&to)) {
            (Some(s), Some(d)) => (s.clone(), d.clone()),
            (None, _) => {
                return Err(Diagnostic::error(
                    codes::UNKNOWN_PORT,
                    format!("no port with id {}", from),
                ))
            }
            (_, None) => {
                return Err(Diagnostic::error(
                    codes::UNKNOWN_PORT,
                    format!("no port with id {}", to),
                ))
            }
        };
        let description = format!("{} -> {}", self.describe_port(&src), self.describe_port(&dst));

        if src.direction != Direction::Output || dst.direction != Direction::Input {
            return Err(Diagnostic::error(
                codes::DIRECTION_MISMATCH,
                "links must run from an output port to an input port",
            )
            .with_subject(description));
        }
        if src.node == dst.node {
            return Err(Diagnostic::error(
                codes::DIRECTION_MISMATCH,
                "a node cannot feed its own inputs",
            )
            .with_subject(description));
        }
        Ok((src, dst, description))
    }

    /// Insert `from -> to`, replacing any link into `to`. Also returns the
    /// node that fed the replaced link.
    fn insert_link(&mut self, from: PortId, to: PortId) -> (LinkId, Option<NodeId>) {
        let mut replaced_origin = None;
        if let Some(old) = self.incoming_link(to).copied() {
            debug!("replacing link {} into {}", old.id, to);
            self.links.remove(&old.id);
            replaced_origin = self.ports.get(&old.from).map(|p| p.node);
        }
        let id = self.ids.alloc_link();
        self.links.insert(id, Link { id, from, to });
        (id, replaced_origin)
    }

    /// Restore `before`, keeping the id allocator so ids are never reused.
    fn roll_back(&mut self, before: NodeGraph) {
        let ids = self.ids.clone();
        *self = before;
        self.ids = ids;
    }

    /// Remove a link and let the nodes at both ends re-infer their types.
    pub fn disconnect(&mut self, link: LinkId, registry: &Registry) -> Option<Link> {
        let removed = self.links.remove(&link)?;
        let touched: Vec<NodeId> = [removed.from, removed.to]
            .iter()
            .filter_map(|p| self.ports.get(p).map(|port| port.node))
            .collect();
        debug!("unlinked {}", link);
        self.propagate_edits(touched, registry);
        Some(removed)
    }

    /// Drop links attached to `node` that join incompatible kinds.
    pub(crate) fn prune_incompatible(&mut self, node: NodeId, registry: &Registry) -> Vec<Link> {
        let attached: Vec<Link> = self
            .ports_of(node)
            .flat_map(|p| self.links_of(p.id))
            .collect();
        let mut pruned = Vec::new();
        for link in attached {
            if !self.link_is_compatible(&link, registry) {
                debug!("pruning incompatible link {}", link.id);
                self.links.remove(&link.id);
                pruned.push(link);
            }
        }
        pruned
    }
}

fn incompatible(from: &PortKind, to: &PortKind) -> Diagnostic {
    Diagnostic::error(
        codes::INCOMPATIBLE_KINDS,
        format!("cannot link '{}' to '{}'", from, to),
    )
    .with_hint("insert a conversion node or change the generic node's type")
}

// ── Tests ───────────────────────────────────────────────────────────────────
