//! Dependency graph over unit identities using petgraph::StableDiGraph

use crate::model::UnitId;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Directed graph of unit identities.
///
/// Outgoing edges are declared dependencies; incoming edges form the reverse
/// index (dependents). Both views come from the same petgraph edge set, so
/// they cannot drift apart.
pub struct DependencyGraph {
    inner: StableDiGraph<UnitId, ()>,
    nodes: HashMap<UnitId, NodeIndex>,
    /// Declared dependency sets of every upserted unit. Identities that only
    /// appear as dependencies (external packages) are absent here.
    declared: HashMap<UnitId, BTreeSet<UnitId>>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("unit_count", &self.declared.len())
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            inner: StableDiGraph::new(),
            nodes: HashMap::new(),
            declared: HashMap::new(),
        }
    }

    /// Insert or replace a unit's forward edges.
    ///
    /// Only the difference between the old and new dependency sets touches
    /// the edge set. A unit seen for the first time (or re-added after
    /// removal) also regains incoming edges from units that declare it.
    pub fn upsert_unit<I>(&mut self, id: &UnitId, dependencies: I)
    where
        I: IntoIterator<Item = UnitId>,
    {
        let new: BTreeSet<UnitId> = dependencies.into_iter().collect();
        let node = self.ensure_node(id);
        let old: BTreeSet<UnitId> = self.dependencies(id).into_iter().collect();

        for removed in old.difference(&new) {
            self.remove_edge(node, removed);
        }
        for added in new.difference(&old) {
            let target = self.ensure_node(added);
            self.inner.update_edge(node, target, ());
        }

        if !self.declared.contains_key(id) {
            let dependents: Vec<NodeIndex> = self
                .declared
                .iter()
                .filter(|(other, deps)| *other != id && deps.contains(id))
                .filter_map(|(other, _)| self.nodes.get(other).copied())
                .collect();
            for dependent in dependents {
                self.inner.update_edge(dependent, node, ());
            }
        }

        debug!(
            "Upserted unit {} (+{} / -{} edges)",
            id,
            new.difference(&old).count(),
            old.difference(&new).count()
        );
        self.declared.insert(id.clone(), new);
    }

    /// Remove a unit together with every edge touching it.
    ///
    /// Returns `false` when the unit was never upserted.
    pub fn remove_unit(&mut self, id: &UnitId) -> bool {
        if self.declared.remove(id).is_none() {
            return false;
        }
        let Some(node) = self.nodes.remove(id) else {
            return false;
        };
        let targets: Vec<NodeIndex> = self
            .inner
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        self.inner.remove_node(node);
        for target in targets {
            self.prune_external(target);
        }
        debug!("Removed unit {}", id);
        true
    }

    /// Whether `target` is reachable from `root` through at least one edge.
    ///
    /// `None` means `root` is not in the graph at all. Cycles terminate via
    /// the visited set.
    pub fn transitively_depends_on(&self, root: &UnitId, target: &UnitId) -> Option<bool> {
        let start = *self.nodes.get(root)?;
        let Some(&goal) = self.nodes.get(target) else {
            return Some(false);
        };

        let mut visited = HashSet::new();
        let mut stack: Vec<NodeIndex> = self
            .inner
            .neighbors_directed(start, Direction::Outgoing)
            .collect();

        while let Some(current) = stack.pop() {
            if current == goal {
                return Some(true);
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(
                self.inner
                    .neighbors_directed(current, Direction::Outgoing)
                    .filter(|next| !visited.contains(next)),
            );
        }

        Some(false)
    }

    /// Direct dependencies of a unit, sorted.
    pub fn dependencies(&self, id: &UnitId) -> Vec<UnitId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Direct dependents of a unit (reverse index), sorted.
    pub fn dependents(&self, id: &UnitId) -> Vec<UnitId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Targets plus every identity that transitively depends on one of them.
    pub fn dependents_closure<'a, I>(&self, targets: I) -> HashSet<UnitId>
    where
        I: IntoIterator<Item = &'a UnitId>,
    {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = targets
            .into_iter()
            .filter_map(|id| self.nodes.get(id).copied())
            .collect();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            queue.extend(self.inner.neighbors_directed(current, Direction::Incoming));
        }

        seen.into_iter()
            .filter_map(|idx| self.inner.node_weight(idx).cloned())
            .collect()
    }

    /// Whether the identity is a node (unit or external dependency).
    pub fn contains(&self, id: &UnitId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Whether the identity was upserted as a unit.
    pub fn is_unit(&self, id: &UnitId) -> bool {
        self.declared.contains_key(id)
    }

    /// Number of upserted units.
    pub fn unit_count(&self) -> usize {
        self.declared.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Every identity in the graph, units and external dependencies alike.
    pub fn identities(&self) -> impl Iterator<Item = &UnitId> {
        self.nodes.keys()
    }

    fn neighbors(&self, id: &UnitId, direction: Direction) -> Vec<UnitId> {
        let Some(&node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<UnitId> = self
            .inner
            .neighbors_directed(node, direction)
            .filter_map(|idx| self.inner.node_weight(idx).cloned())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    fn ensure_node(&mut self, id: &UnitId) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(id) {
            return idx;
        }
        let idx = self.inner.add_node(id.clone());
        self.nodes.insert(id.clone(), idx);
        idx
    }

    fn remove_edge(&mut self, source: NodeIndex, target_id: &UnitId) {
        let Some(&target) = self.nodes.get(target_id) else {
            return;
        };
        if let Some(edge) = self.inner.find_edge(source, target) {
            self.inner.remove_edge(edge);
        }
        self.prune_external(target);
    }

    /// Drop an external placeholder once nothing points at it any more.
    fn prune_external(&mut self, node: NodeIndex) {
        let Some(id) = self.inner.node_weight(node).cloned() else {
            return;
        };
        if self.declared.contains_key(&id) {
            return;
        }
        let has_dependents = self
            .inner
            .neighbors_directed(node, Direction::Incoming)
            .next()
            .is_some();
        if !has_dependents {
            self.inner.remove_node(node);
            self.nodes.remove(&id);
        }
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
