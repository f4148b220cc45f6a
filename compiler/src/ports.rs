// ports.rs — Port set of the Fill List node and its regeneration
//
// The node has four ports identified by role. Their concrete kinds follow the
// node's resolved base type (except `length`, which is always Integer).
// Regeneration replaces the port set and reattaches existing links by role.
//
// Preconditions: `base` is a registered base type.
// Postconditions: the node has exactly one port per role, with kinds derived
//   from `base`; every previous link whose far end is compatible with the new
//   port of the same role is attached again under its original link id. Links
//   whose far end is another generic node are kept until that node has had a
//   chance to re-infer its own type.
// Failure modes: none; incompatible links are dropped and reported in the
//   returned `Regeneration`.
// Side effects: replaces the node's ports in the graph.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::graph::{Direction, Link, NodeGraph};
use crate::id::{LinkId, NodeId, PortId};
use crate::registry::{BaseType, PortKind, Registry};

/// Base type of the `length` port, independent of the resolved type.
pub const LENGTH_TYPE: &str = "Integer";

// ── Roles ───────────────────────────────────────────────────────────────────

/// Fixed logical name of a port, independent of its concrete kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortRole {
    Length,
    ListIn,
    ElementIn,
    ListOut,
}

impl PortRole {
    /// All roles in declaration order.
    pub const ALL: [PortRole; 4] = [
        PortRole::Length,
        PortRole::ListIn,
        PortRole::ElementIn,
        PortRole::ListOut,
    ];

    /// Port identifier and variable name in emitted code.
    pub fn name(self) -> &'static str {
        match self {
            PortRole::Length => "length",
            PortRole::ListIn => "inList",
            PortRole::ElementIn => "fill",
            PortRole::ListOut => "outList",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PortRole::Length => "Length",
            PortRole::ListIn => "List",
            PortRole::ElementIn => "Fill Element",
            PortRole::ListOut => "List",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            PortRole::ListOut => Direction::Output,
            _ => Direction::Input,
        }
    }

    pub fn consuming(self) -> bool {
        matches!(self, PortRole::ListIn | PortRole::ElementIn)
    }

    pub fn from_name(name: &str) -> Option<PortRole> {
        PortRole::ALL.into_iter().find(|role| role.name() == name)
    }

    /// Concrete kind of this role for a node bound to `base`.
    pub fn kind(self, registry: &Registry, base: &BaseType) -> PortKind {
        match self {
            PortRole::Length => registry.single_port_kind(&BaseType::new(LENGTH_TYPE)),
            PortRole::ListIn | PortRole::ListOut => registry.list_port_kind(base),
            PortRole::ElementIn => registry.single_port_kind(base),
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A port the node requires for a given base type.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub role: PortRole,
    pub kind: PortKind,
}

/// The four ports a node bound to `base` declares, in order.
pub fn port_specs(registry: &Registry, base: &BaseType) -> Vec<PortSpec> {
    PortRole::ALL
        .into_iter()
        .map(|role| PortSpec {
            role,
            kind: role.kind(registry, base),
        })
        .collect()
}

// ── Regeneration ────────────────────────────────────────────────────────────

/// What happened to the node's links during one regeneration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Regeneration {
    pub kept: Vec<(PortRole, LinkId)>,
    pub dropped: Vec<(PortRole, LinkId)>,
}

/// Rebuild the ports of `node` for `base`, preserving compatible links.
pub fn regenerate(
    graph: &mut NodeGraph,
    node: NodeId,
    base: &BaseType,
    registry: &Registry,
) -> Regeneration {
    // Snapshot links by role before the old ports disappear.
    let snapshot: Vec<(PortRole, Link)> = graph
        .ports_of(node)
        .filter_map(|p| PortRole::from_name(&p.name).map(|role| (role, p.id)))
        .flat_map(|(role, port)| {
            graph
                .links_of(port)
                .into_iter()
                .map(move |link| (role, link))
        })
        .collect();

    graph.remove_ports(node);

    let mut new_ports: HashMap<PortRole, PortId> = HashMap::new();
    for spec in port_specs(registry, base) {
        let id = graph.add_port(
            node,
            spec.role.name(),
            spec.role.label(),
            spec.role.direction(),
            spec.kind,
            spec.role.consuming(),
        );
        new_ports.insert(spec.role, id);
    }

    let mut result = Regeneration::default();
    for (role, link) in snapshot {
        let Some(&port) = new_ports.get(&role) else {
            continue;
        };
        let relinked = match role.direction() {
            Direction::Input => Link {
                id: link.id,
                from: link.from,
                to: port,
            },
            Direction::Output => Link {
                id: link.id,
                from: port,
                to: link.to,
            },
        };
        let far = match role.direction() {
            Direction::Input => relinked.from,
            Direction::Output => relinked.to,
        };
        let far_is_generic = graph
            .port(far)
            .is_some_and(|p| graph.is_generic(p.node));
        if far_is_generic || graph.link_is_compatible(&relinked, registry) {
            graph.restore_link(relinked);
            result.kept.push((role, link.id));
        } else {
            debug!("{}: dropping link {} incompatible with {}", role, link.id, base);
            result.dropped.push((role, link.id));
        }
    }
    result
}

// ── Tests ───────────────────────────────────────────────────────────────────
