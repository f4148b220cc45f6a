// resolve.rs — Type inference for generic Fill List nodes
//
// Decides which base type a fill node should be bound to, from the kinds of
// the ports it is linked to. Evidence is ranked; the first rule that applies
// wins:
//   1. the output feeding `inList` (its list kind),
//   2. the output feeding `fill` (its single kind),
//   3. the single input fed by `outList` (its list kind),
//   4. otherwise the currently bound type.
// Several targets on `outList` are ambiguous and count as no evidence. A linked
// port decides even when its far end has the wrong shape or an unregistered
// base type: the node then keeps its current type.
//
// Preconditions: `node` is a fill node of `graph`.
// Postconditions: the returned base type is registered, or is the node's
//   current type.
// Failure modes: `None` when `node` is not a fill node.
// Side effects: none.

use std::fmt;

use crate::graph::NodeGraph;
use crate::id::NodeId;
use crate::ports::PortRole;
use crate::registry::{BaseType, PortKind, Registry};

/// Which rule produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    ListInput,
    ElementInput,
    SingleTarget,
    Current,
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Evidence::ListInput => "list input",
            Evidence::ElementInput => "fill element input",
            Evidence::SingleTarget => "single list output target",
            Evidence::Current => "current type",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub base: BaseType,
    pub evidence: Evidence,
}

/// The base type `node` should have given its current neighbors.
pub fn wanted_type(graph: &NodeGraph, node: NodeId, registry: &Registry) -> Option<Resolution> {
    let current = graph.fill_node(node)?.resolved_type().clone();
    let port = |role: PortRole| graph.find_port(node, role.direction(), role.name());

    let keep_current = || Resolution {
        base: current.clone(),
        evidence: Evidence::Current,
    };

    if let Some(origin) = port(PortRole::ListIn).and_then(|p| graph.data_origin(p.id)) {
        return Some(match list_base(&origin.kind, registry) {
            Some(base) => Resolution {
                base,
                evidence: Evidence::ListInput,
            },
            None => keep_current(),
        });
    }

    if let Some(origin) = port(PortRole::ElementIn).and_then(|p| graph.data_origin(p.id)) {
        return Some(match single_base(&origin.kind, registry) {
            Some(base) => Resolution {
                base,
                evidence: Evidence::ElementInput,
            },
            None => keep_current(),
        });
    }

    if let Some(out) = port(PortRole::ListOut) {
        if let [target] = graph.data_targets(out.id).as_slice() {
            return Some(match list_base(&target.kind, registry) {
                Some(base) => Resolution {
                    base,
                    evidence: Evidence::SingleTarget,
                },
                None => keep_current(),
            });
        }
    }

    Some(keep_current())
}

fn list_base(kind: &PortKind, registry: &Registry) -> Option<BaseType> {
    match kind {
        PortKind::List(base) if registry.contains(base) => Some(base.clone()),
        _ => None,
    }
}

fn single_base(kind: &PortKind, registry: &Registry) -> Option<BaseType> {
    match kind {
        PortKind::Single(base) if registry.contains(base) => Some(base.clone()),
        _ => None,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
//
// These tests link ports directly with `restore_link` so that the edit hook
// does not run; they observe the resolver alone.
