//! Population statistics and event tracking for lichen runs.

use crate::SpeciesId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Diversity statistics computed from per-species cell counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    /// Total number of cells counted
    pub total_cells: usize,
    /// Number of species occupying at least one cell
    pub richness: usize,
    /// Species with the most cells (lowest id wins ties)
    pub dominant_species: Option<SpeciesId>,
    /// Fraction of cells held by the dominant species
    pub dominant_share: f64,
    /// Shannon index, `-sum(p ln p)`
    pub shannon: f64,
    /// Simpson index, `1 - sum(p^2)`
    pub simpson: f64,
}

impl PopulationStats {
    pub fn from_counts(counts: &BTreeMap<SpeciesId, usize>) -> Self {
        let total_cells: usize = counts.values().sum();
        if total_cells == 0 {
            return Self::default();
        }

        let total = total_cells as f64;
        let mut stats = Self {
            total_cells,
            ..Self::default()
        };
        let mut best = 0usize;
        let mut sum_sq = 0.0;

        for (&species, &count) in counts.iter().filter(|(_, count)| **count > 0) {
            stats.richness += 1;
            if count > best {
                best = count;
                stats.dominant_species = Some(species);
            }
            let p = count as f64 / total;
            stats.shannon -= p * p.ln();
            sum_sq += p * p;
        }

        stats.dominant_share = best as f64 / total;
        stats.simpson = 1.0 - sum_sq;
        stats
    }
}

/// Cumulative event counters across the ticks of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventCounters {
    /// Ticks recorded
    pub ticks: u64,
    /// Invasions that changed a cell
    pub invasions: u64,
    pub speciations: u64,
    pub extinctions: u64,
    /// Highest species richness seen at the end of a tick
    pub peak_richness: usize,
    /// Mean end-of-tick richness
    pub mean_richness: f64,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update counters with the outcome of one tick
    pub fn record(&mut self, invaded: bool, speciated: bool, extinct: usize, richness: usize) {
        let n = self.ticks as f64;
        self.mean_richness = (self.mean_richness * n + richness as f64) / (n + 1.0);
        self.ticks += 1;

        if invaded {
            self.invasions += 1;
        }
        if speciated {
            self.speciations += 1;
        }
        self.extinctions += extinct as u64;
        self.peak_richness = self.peak_richness.max(richness);
    }
}
