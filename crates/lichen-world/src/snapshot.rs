//! Read-only views of the engine state for renderers.

use crate::graph::DominanceGraph;
use crate::grid::Grid;
use lichen_core::{PopulationStats, Result, SpeciesId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Deep copy of grid, graph and populations, taken between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub grid: Grid,
    pub graph: DominanceGraph,
    pub populations: BTreeMap<SpeciesId, usize>,
}

/// Dominance edges split by whether their endpoints currently touch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interactions {
    /// Endpoints occupy orthogonally adjacent cells somewhere on the grid
    pub active: Vec<(SpeciesId, SpeciesId)>,
    /// Potential only
    pub inactive: Vec<(SpeciesId, SpeciesId)>,
}

impl Snapshot {
    pub fn new(tick: u64, grid: &Grid, graph: &DominanceGraph) -> Self {
        Self {
            tick,
            grid: grid.clone(),
            graph: graph.clone(),
            populations: grid.populations().clone(),
        }
    }

    pub fn classify_interactions(&self) -> Interactions {
        classify_interactions(&self.grid, &self.graph)
    }

    pub fn stats(&self) -> PopulationStats {
        PopulationStats::from_counts(&self.populations)
    }

    /// Flattened form written to external renderers
    pub fn to_frame(&self) -> RenderFrame {
        let Interactions { active, inactive } = self.classify_interactions();
        RenderFrame {
            tick: self.tick,
            side: self.grid.side(),
            cells: self.grid.cells().to_vec(),
            nodes: self.graph.nodes().collect(),
            active,
            inactive,
            populations: self.populations.clone(),
        }
    }
}

/// One animation frame for an external renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderFrame {
    pub tick: u64,
    pub side: i32,
    /// Row-major species ids
    pub cells: Vec<SpeciesId>,
    pub nodes: Vec<SpeciesId>,
    pub active: Vec<(SpeciesId, SpeciesId)>,
    pub inactive: Vec<(SpeciesId, SpeciesId)>,
    pub populations: BTreeMap<SpeciesId, usize>,
}

impl RenderFrame {
    /// Single-line JSON, no trailing newline
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An edge `(u, v)` is active when some cell holding `u` shares a side with
/// some cell holding `v`, in either direction.
pub fn classify_interactions(grid: &Grid, graph: &DominanceGraph) -> Interactions {
    // Looking right and down from every cell visits each adjacent pair once.
    let mut touching: HashSet<(SpeciesId, SpeciesId)> = HashSet::new();
    for (pos, species) in grid.iter() {
        for neighbor in [pos.add(1, 0), pos.add(0, 1)] {
            if !grid.contains(neighbor) {
                continue;
            }
            if let Ok(other) = grid.get(neighbor) {
                if other != species {
                    touching.insert(unordered(species, other));
                }
            }
        }
    }

    let mut interactions = Interactions::default();
    for (u, v) in graph.edges() {
        if touching.contains(&unordered(u, v)) {
            interactions.active.push((u, v));
        } else {
            interactions.inactive.push((u, v));
        }
    }
    interactions
}

fn unordered(a: SpeciesId, b: SpeciesId) -> (SpeciesId, SpeciesId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lichen_core::Position;

    /// 0 background, 1 at (0, 0), 2 at (4, 4)
    fn fixture() -> (Grid, DominanceGraph) {
        let mut grid = Grid::new(5, SpeciesId(0)).unwrap();
        grid.set(Position::new(0, 0), SpeciesId(1)).unwrap();
        grid.set(Position::new(4, 4), SpeciesId(2)).unwrap();

        let mut graph = DominanceGraph::new();
        for id in 0..3 {
            graph.add_node(SpeciesId(id));
        }
        graph.add_edge(SpeciesId(1), SpeciesId(0)).unwrap();
        graph.add_edge(SpeciesId(0), SpeciesId(2)).unwrap();
        graph.add_edge(SpeciesId(1), SpeciesId(2)).unwrap();
        (grid, graph)
    }

    #[test]
    fn test_classify_interactions() {
        let (grid, graph) = fixture();
        let interactions = classify_interactions(&grid, &graph);

        assert_eq!(
            interactions.active,
            vec![
                (SpeciesId(0), SpeciesId(2)),
                (SpeciesId(1), SpeciesId(0)),
            ]
        );
        assert_eq!(interactions.inactive, vec![(SpeciesId(1), SpeciesId(2))]);
    }

    #[test]
    fn test_classification_is_symmetric() {
        let (grid, _) = fixture();

        // Same pair, opposite directions, same verdict
        let mut forward = DominanceGraph::new();
        let mut backward = DominanceGraph::new();
        for id in 0..3 {
            forward.add_node(SpeciesId(id));
            backward.add_node(SpeciesId(id));
        }
        forward.add_edge(SpeciesId(2), SpeciesId(0)).unwrap();
        backward.add_edge(SpeciesId(0), SpeciesId(2)).unwrap();

        assert_eq!(classify_interactions(&grid, &forward).active.len(), 1);
        assert_eq!(classify_interactions(&grid, &backward).active.len(), 1);
    }

    #[test]
    fn test_diagonal_is_not_adjacent() {
        let mut grid = Grid::new(3, SpeciesId(0)).unwrap();
        grid.set(Position::new(0, 0), SpeciesId(1)).unwrap();
        grid.set(Position::new(1, 1), SpeciesId(2)).unwrap();

        let mut graph = DominanceGraph::new();
        for id in 0..3 {
            graph.add_node(SpeciesId(id));
        }
        graph.add_edge(SpeciesId(1), SpeciesId(2)).unwrap();

        let interactions = classify_interactions(&grid, &graph);
        assert!(interactions.active.is_empty());
        assert_eq!(interactions.inactive.len(), 1);
    }

    #[test]
    fn test_boundary_cells() {
        // Species 1 holds the right column and bottom row only
        let mut grid = Grid::new(3, SpeciesId(0)).unwrap();
        for i in 0..3 {
            grid.set(Position::new(2, i), SpeciesId(1)).unwrap();
            grid.set(Position::new(i, 2), SpeciesId(1)).unwrap();
        }
        let mut graph = DominanceGraph::new();
        graph.add_node(SpeciesId(0));
        graph.add_node(SpeciesId(1));
        graph.add_edge(SpeciesId(0), SpeciesId(1)).unwrap();

        let interactions = classify_interactions(&grid, &graph);
        assert_eq!(interactions.active, vec![(SpeciesId(0), SpeciesId(1))]);

        let single = Grid::new(1, SpeciesId(0)).unwrap();
        let mut lone = DominanceGraph::new();
        lone.add_node(SpeciesId(0));
        let interactions = classify_interactions(&single, &lone);
        assert!(interactions.active.is_empty());
        assert!(interactions.inactive.is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let (mut grid, graph) = fixture();
        let snapshot = Snapshot::new(7, &grid, &graph);

        grid.set(Position::new(2, 2), SpeciesId(1)).unwrap();

        assert_eq!(snapshot.tick, 7);
        assert_eq!(snapshot.grid.get(Position::new(2, 2)).unwrap(), SpeciesId(0));
        assert_eq!(snapshot.populations.get(&SpeciesId(1)), Some(&1));
        assert_eq!(snapshot.stats().richness, 3);
    }

    #[test]
    fn test_render_frame() {
        let (grid, graph) = fixture();
        let frame = Snapshot::new(3, &grid, &graph).to_frame();

        assert_eq!(frame.side, 5);
        assert_eq!(frame.cells.len(), 25);
        assert_eq!(frame.cells[0], SpeciesId(1));
        assert_eq!(frame.nodes.len(), 3);
        assert_eq!(frame.active.len() + frame.inactive.len(), 3);

        let line = frame.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["tick"], 3);
        assert_eq!(value["populations"]["0"], 23);
    }
}
