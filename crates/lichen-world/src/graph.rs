//! Directed dominance graph between species.

use lichen_core::{Error, Result, SpeciesId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Edge `(u, v)` means species `u` may overwrite species `v` at an
/// adjacent site.
///
/// Adjacency lists are ordered by id so that anything iterating the graph
/// while drawing random numbers stays reproducible for a given seed. A
/// separate hash set answers `has_edge` in constant time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "GraphRepr", try_from = "GraphRepr")]
pub struct DominanceGraph {
    outgoing: BTreeMap<SpeciesId, BTreeSet<SpeciesId>>,
    incoming: BTreeMap<SpeciesId, BTreeSet<SpeciesId>>,
    edges: HashSet<(SpeciesId, SpeciesId)>,
}

/// Wire form of the graph
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphRepr {
    pub nodes: Vec<SpeciesId>,
    pub edges: Vec<(SpeciesId, SpeciesId)>,
}

impl From<DominanceGraph> for GraphRepr {
    fn from(graph: DominanceGraph) -> Self {
        Self {
            nodes: graph.nodes().collect(),
            edges: graph.edges().collect(),
        }
    }
}

impl TryFrom<GraphRepr> for DominanceGraph {
    type Error = Error;

    fn try_from(repr: GraphRepr) -> Result<Self> {
        let mut graph = DominanceGraph::new();
        for node in repr.nodes {
            graph.add_node(node);
        }
        for (u, v) in repr.edges {
            graph.add_edge(u, v)?;
        }
        Ok(graph)
    }
}

impl DominanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directed Erdős–Rényi graph: every ordered pair of distinct nodes gets
    /// an edge independently with probability `p`.
    pub fn random<R: Rng + ?Sized>(
        nodes: impl IntoIterator<Item = SpeciesId>,
        p: f64,
        rng: &mut R,
    ) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }

        let ordered: Vec<SpeciesId> = graph.nodes().collect();
        for &u in &ordered {
            for &v in &ordered {
                if u != v && rng.gen::<f64>() < p {
                    graph.insert_edge(u, v);
                }
            }
        }
        graph
    }

    /// Add a node; returns false if it was already present
    pub fn add_node(&mut self, id: SpeciesId) -> bool {
        if self.outgoing.contains_key(&id) {
            return false;
        }
        self.outgoing.insert(id, BTreeSet::new());
        self.incoming.insert(id, BTreeSet::new());
        true
    }

    /// Add edge `(u, v)`. Self loops are ignored. Returns true if the edge
    /// was newly inserted.
    pub fn add_edge(&mut self, u: SpeciesId, v: SpeciesId) -> Result<bool> {
        if !self.contains(u) {
            return Err(Error::UnknownSpecies(u));
        }
        if !self.contains(v) {
            return Err(Error::UnknownSpecies(v));
        }
        if u == v {
            return Ok(false);
        }
        Ok(self.insert_edge(u, v))
    }

    fn insert_edge(&mut self, u: SpeciesId, v: SpeciesId) -> bool {
        if !self.edges.insert((u, v)) {
            return false;
        }
        self.outgoing.entry(u).or_default().insert(v);
        self.incoming.entry(v).or_default().insert(u);
        true
    }

    pub fn has_edge(&self, u: SpeciesId, v: SpeciesId) -> bool {
        self.edges.contains(&(u, v))
    }

    /// Remove a node and every edge touching it; returns false if absent
    pub fn remove_node(&mut self, id: SpeciesId) -> bool {
        let Some(targets) = self.outgoing.remove(&id) else {
            return false;
        };
        let sources = self.incoming.remove(&id).unwrap_or_default();

        for v in targets {
            self.edges.remove(&(id, v));
            if let Some(set) = self.incoming.get_mut(&v) {
                set.remove(&id);
            }
        }
        for u in sources {
            self.edges.remove(&(u, id));
            if let Some(set) = self.outgoing.get_mut(&u) {
                set.remove(&id);
            }
        }
        true
    }

    pub fn contains(&self, id: SpeciesId) -> bool {
        self.outgoing.contains_key(&id)
    }

    /// Nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        self.outgoing.keys().copied()
    }

    /// Species that `u` can invade
    pub fn out_neighbors(&self, u: SpeciesId) -> impl Iterator<Item = SpeciesId> + '_ {
        self.outgoing.get(&u).into_iter().flatten().copied()
    }

    /// Species that can invade `v`
    pub fn in_neighbors(&self, v: SpeciesId) -> impl Iterator<Item = SpeciesId> + '_ {
        self.incoming.get(&v).into_iter().flatten().copied()
    }

    /// All edges, ordered by source then target
    pub fn edges(&self) -> impl Iterator<Item = (SpeciesId, SpeciesId)> + '_ {
        self.outgoing
            .iter()
            .flat_map(|(&u, targets)| targets.iter().map(move |&v| (u, v)))
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn max_node(&self) -> Option<SpeciesId> {
        self.outgoing.keys().next_back().copied()
    }

    /// Smallest non-negative id that is not a node, `None` if every id is taken
    pub fn smallest_free_id(&self) -> Option<SpeciesId> {
        let mut candidate = SpeciesId(0);
        for id in self.nodes() {
            if id != candidate {
                break;
            }
            candidate = candidate.checked_next()?;
        }
        Some(candidate)
    }
}
