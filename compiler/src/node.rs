// node.rs — Fill List node: state, type assignment, and the edit hook
//
// A generic node that pads a list to a minimum length with copies of a fill
// element. Its resolved base type decides the kinds of its ports; the type is
// inferred from neighbors on every graph edit or set explicitly by the user.
//
// Preconditions: the registry passed to every call is the one the node was
//   created with (or a superset of it).
// Postconditions: the resolved type is always a registered base type, and the
//   node's typed ports always match it.
// Failure modes: invalid or unchanged type requests are absorbed and reported
//   only through the returned `Assignment`.
// Side effects: re-typing regenerates ports in the owning graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::diag::{codes, Diagnostic};
use crate::graph::{NodeGraph, NodeKind};
use crate::id::NodeId;
use crate::ports::{self, Regeneration};
use crate::registry::{BaseType, Registry};
use crate::resolve;

/// Upper bound on edit passes per node while propagating one topology change.
const MAX_EDIT_VISITS: usize = 8;

// ── State ───────────────────────────────────────────────────────────────────

/// Where generated fill elements go relative to the input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[serde(alias = "left")]
    Prepend,
    #[default]
    #[serde(alias = "right")]
    Append,
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillMode::Prepend => f.write_str("prepend"),
            FillMode::Append => f.write_str("append"),
        }
    }
}

/// Persisted per-node state. Ports are rebuilt from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillNodeState {
    #[serde(rename = "type")]
    pub resolved_type: BaseType,
    #[serde(default)]
    pub mode: FillMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillNode {
    pub(crate) resolved_type: BaseType,
    pub(crate) mode: FillMode,
}

impl FillNode {
    pub fn resolved_type(&self) -> &BaseType {
        &self.resolved_type
    }

    pub fn mode(&self) -> FillMode {
        self.mode
    }

    pub fn state(&self) -> FillNodeState {
        FillNodeState {
            resolved_type: self.resolved_type.clone(),
            mode: self.mode,
        }
    }
}

/// Outcome of a type assignment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// The type changed and the ports were regenerated.
    Retyped {
        from: BaseType,
        to: BaseType,
        regeneration: Regeneration,
    },
    /// The requested type is already bound.
    Unchanged,
    /// Not a registered base type, or not a fill node.
    Rejected,
}

// ── Operations ──────────────────────────────────────────────────────────────

impl NodeGraph {
    /// Create a Fill List node bound to the registry's default type.
    pub fn add_fill_node(&mut self, name: &str, registry: &Registry) -> Result<NodeId, Diagnostic> {
        let base = registry.default_base_type().ok_or_else(|| {
            Diagnostic::error(codes::EMPTY_REGISTRY, "no base types are registered")
                .with_subject(format!("node '{}'", name))
        })?;
        let fill = FillNode {
            resolved_type: base.clone(),
            mode: FillMode::default(),
        };
        let id = self.insert_node(name, NodeKind::Fill(fill));
        ports::regenerate(self, id, &base, registry);
        Ok(id)
    }

    /// Bind `node` to `candidate`, regenerating its ports on change.
    /// Neighboring generic nodes re-infer their types afterwards.
    pub fn assign_type(
        &mut self,
        node: NodeId,
        candidate: &BaseType,
        registry: &Registry,
    ) -> Assignment {
        let outcome = self.bind_type(node, candidate, registry);
        if matches!(outcome, Assignment::Retyped { .. }) {
            self.settle_neighbors(node, registry);
        }
        outcome
    }

    fn bind_type(&mut self, node: NodeId, candidate: &BaseType, registry: &Registry) -> Assignment {
        let current = match self.fill_node(node) {
            Some(fill) => fill.resolved_type.clone(),
            None => return Assignment::Rejected,
        };
        if !registry.contains(candidate) {
            debug!("{}: ignoring unregistered type '{}'", node, candidate);
            return Assignment::Rejected;
        }
        if *candidate == current {
            return Assignment::Unchanged;
        }
        if let Some(fill) = self.fill_node_mut(node) {
            fill.resolved_type = candidate.clone();
        }
        let regeneration = ports::regenerate(self, node, candidate, registry);
        debug!(
            "{}: retyped {} -> {} (kept {} links, dropped {})",
            node,
            current,
            candidate,
            regeneration.kept.len(),
            regeneration.dropped.len()
        );
        Assignment::Retyped {
            from: current,
            to: candidate.clone(),
            regeneration,
        }
    }

    /// User-facing "change type": accepts a list or single kind id.
    pub fn change_type(&mut self, node: NodeId, kind_id: &str, registry: &Registry) -> Assignment {
        match registry.base_type_of(kind_id) {
            Some(base) => self.assign_type(node, &base, registry),
            None => Assignment::Rejected,
        }
    }

    /// Re-infer the type of `node` from its neighbors.
    pub fn edit(&mut self, node: NodeId, registry: &Registry) -> Assignment {
        let outcome = self.edit_once(node, registry);
        if matches!(outcome, Assignment::Retyped { .. }) {
            self.settle_neighbors(node, registry);
        }
        outcome
    }

    fn edit_once(&mut self, node: NodeId, registry: &Registry) -> Assignment {
        match resolve::wanted_type(self, node, registry) {
            Some(resolution) => self.bind_type(node, &resolution.base, registry),
            None => Assignment::Rejected,
        }
    }

    /// Returns true when the mode changed, which changes the emitted code.
    pub fn set_mode(&mut self, node: NodeId, mode: FillMode) -> bool {
        match self.fill_node_mut(node) {
            Some(fill) if fill.mode != mode => {
                fill.mode = mode;
                true
            }
            _ => false,
        }
    }

    /// Apply persisted state: mode first, then the type.
    pub fn restore_fill_state(
        &mut self,
        node: NodeId,
        state: &FillNodeState,
        registry: &Registry,
    ) -> Assignment {
        if self.fill_node(node).is_none() {
            return Assignment::Rejected;
        }
        self.set_mode(node, state.mode);
        self.assign_type(node, &state.resolved_type, registry)
    }

    /// Run the edit hook on `seeds` and on the neighbors of every node that
    /// re-types, then drop links left incompatible around the edited nodes.
    pub(crate) fn propagate_edits(&mut self, seeds: Vec<NodeId>, registry: &Registry) {
        self.propagate_edits_except(seeds, &HashSet::new(), registry);
    }

    /// `propagate_edits` that never re-infers the `pinned` nodes.
    pub(crate) fn propagate_edits_except(
        &mut self,
        seeds: Vec<NodeId>,
        pinned: &HashSet<NodeId>,
        registry: &Registry,
    ) {
        let mut queue: VecDeque<NodeId> = seeds.into_iter().collect();
        let mut visits: HashMap<NodeId, usize> = HashMap::new();

        while let Some(id) = queue.pop_front() {
            if pinned.contains(&id) || self.fill_node(id).is_none() {
                continue;
            }
            let count = visits.entry(id).or_insert(0);
            *count += 1;
            if *count > MAX_EDIT_VISITS {
                warn!("{}: type inference did not settle; keeping current type", id);
                continue;
            }
            if let Assignment::Retyped { .. } = self.edit_once(id, registry) {
                queue.extend(self.neighbors(id));
            }
        }

        let mut edited: Vec<NodeId> = visits.into_keys().collect();
        edited.sort();
        for id in edited {
            self.prune_incompatible(id, registry);
        }
    }

    /// After `node` re-typed: let its neighbors follow, then drop whatever
    /// is still incompatible around `node`.
    fn settle_neighbors(&mut self, node: NodeId, registry: &Registry) {
        let neighbors = self.neighbors(node);
        self.propagate_edits(neighbors, registry);
        self.prune_incompatible(node, registry);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
