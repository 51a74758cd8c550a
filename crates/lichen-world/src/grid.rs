//! 2D species grid for the world.

use lichen_core::{Direction, Error, Position, Result, SpeciesId, MAX_SIDE_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A square grid of species identifiers with a hard (non-wrapping) boundary.
///
/// Per-species cell counts are kept up to date on every write, so
/// [`Grid::count`] never scans the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "GridRepr", try_from = "GridRepr")]
pub struct Grid {
    side: i32,
    cells: Vec<SpeciesId>,
    counts: BTreeMap<SpeciesId, usize>,
}

/// Wire form: the counts table is derived, not stored
#[derive(Serialize, Deserialize)]
pub struct GridRepr {
    pub side: i32,
    pub cells: Vec<SpeciesId>,
}

impl From<Grid> for GridRepr {
    fn from(grid: Grid) -> Self {
        Self {
            side: grid.side,
            cells: grid.cells,
        }
    }
}

impl TryFrom<GridRepr> for Grid {
    type Error = Error;

    fn try_from(repr: GridRepr) -> Result<Self> {
        Grid::from_cells(repr.side, repr.cells)
    }
}

fn check_side(side: i32) -> Result<()> {
    if side <= 0 || side > MAX_SIDE_LENGTH {
        return Err(Error::InvalidConfiguration(format!(
            "grid side must lie in [1, {}], got {}",
            MAX_SIDE_LENGTH, side
        )));
    }
    Ok(())
}

impl Grid {
    /// Create a grid filled with a single species
    pub fn new(side: i32, fill: SpeciesId) -> Result<Self> {
        check_side(side)?;
        let size = (side as usize) * (side as usize);
        let mut counts = BTreeMap::new();
        counts.insert(fill, size);
        Ok(Self {
            side,
            cells: vec![fill; size],
            counts,
        })
    }

    /// Create a grid from row-major cells (`index = y * side + x`)
    pub fn from_cells(side: i32, cells: Vec<SpeciesId>) -> Result<Self> {
        check_side(side)?;
        let size = (side as usize) * (side as usize);
        if cells.len() != size {
            return Err(Error::InvalidState(format!(
                "expected {} cells for side {}, got {}",
                size,
                side,
                cells.len()
            )));
        }

        let mut counts = BTreeMap::new();
        for &species in &cells {
            *counts.entry(species).or_insert(0) += 1;
        }
        Ok(Self { side, cells, counts })
    }

    pub fn side(&self) -> i32 {
        self.side
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.in_bounds(self.side)
    }

    /// Species at position
    pub fn get(&self, pos: Position) -> Result<SpeciesId> {
        let index = self.pos_to_index(pos)?;
        Ok(self.cells[index])
    }

    /// Write a species at position, returning the previous occupant
    pub fn set(&mut self, pos: Position, species: SpeciesId) -> Result<SpeciesId> {
        let index = self.pos_to_index(pos)?;
        let previous = std::mem::replace(&mut self.cells[index], species);
        if previous != species {
            self.decrement(previous);
            *self.counts.entry(species).or_insert(0) += 1;
        }
        Ok(previous)
    }

    /// Paint a `size`×`size` square with its top-left corner at `origin`,
    /// clipped to the grid. Returns the number of cells written.
    pub fn fill_block(&mut self, origin: Position, size: i32, species: SpeciesId) -> usize {
        let mut written = 0;
        for y in origin.y..origin.y.saturating_add(size) {
            for x in origin.x..origin.x.saturating_add(size) {
                if self.set(Position::new(x, y), species).is_ok() {
                    written += 1;
                }
            }
        }
        written
    }

    /// Number of cells holding `species`
    pub fn count(&self, species: SpeciesId) -> usize {
        self.counts.get(&species).copied().unwrap_or(0)
    }

    /// Cell counts of every species present, ordered by id
    pub fn populations(&self) -> &BTreeMap<SpeciesId, usize> {
        &self.counts
    }

    /// Distinct species present on the grid, ordered by id
    pub fn species(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        self.counts.keys().copied()
    }

    /// Orthogonal in-grid neighbors. No wraparound: corners have 2,
    /// edge cells 3 and interior cells 4.
    pub fn neighbors(&self, pos: Position) -> Vec<Position> {
        Direction::all()
            .iter()
            .map(|dir| {
                let (dx, dy) = dir.to_delta();
                pos.add(dx, dy)
            })
            .filter(|neighbor| self.contains(*neighbor))
            .collect()
    }

    fn decrement(&mut self, species: SpeciesId) {
        if let Some(count) = self.counts.get_mut(&species) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&species);
            }
        }
    }

    fn pos_to_index(&self, pos: Position) -> Result<usize> {
        if !self.contains(pos) {
            return Err(Error::OutOfRange {
                pos,
                side: self.side,
            });
        }
        Ok(pos.y as usize * self.side as usize + pos.x as usize)
    }

    /// Get position from index
    pub fn index_to_pos(&self, index: usize) -> Position {
        let side = self.side as usize;
        Position::new((index % side) as i32, (index / side) as i32)
    }

    /// Row-major cell slice
    pub fn cells(&self) -> &[SpeciesId] {
        &self.cells
    }

    /// Iterator over all cells with positions
    pub fn iter(&self) -> impl Iterator<Item = (Position, SpeciesId)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &species)| (self.index_to_pos(i), species))
    }
}
