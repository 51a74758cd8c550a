//! Colonization engine: invasion, speciation and extinction over the
//! species grid and its dominance graph.

use crate::graph::DominanceGraph;
use crate::grid::Grid;
use crate::snapshot::{self, Interactions, Snapshot};
use lichen_core::{
    Error, EventCounters, IdPolicy, InitialLayout, LichenConfig, PopulationStats, Position,
    Result, SpeciesId,
};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, event, info, instrument, trace, Level};

/// A successful invasion: `invader` overwrote `displaced` at `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invasion {
    pub from: Position,
    pub to: Position,
    pub invader: SpeciesId,
    pub displaced: SpeciesId,
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number after the step (first step reports 1)
    pub tick: u64,
    pub invasion: Option<Invasion>,
    pub new_species: Option<SpeciesId>,
    /// Species reaped by the extinction pass
    pub extinct: Vec<SpeciesId>,
}

/// End-of-run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_ticks: u64,
    pub species_alive: usize,
    pub dominance_edges: usize,
    pub active_interactions: usize,
    pub counters: EventCounters,
    pub stats: PopulationStats,
}

pub struct ColonizationEngine {
    grid: Grid,
    graph: DominanceGraph,
    config: LichenConfig,
    speciation_probability: f64,
    rng: ChaCha8Rng,
    tick: u64,
    // One past the largest id ever allocated; `None` once `u32::MAX` is used
    next_id: Option<SpeciesId>,
    counters: EventCounters,
}

impl ColonizationEngine {
    pub fn new(config: LichenConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let grid = initial_grid(&config, &mut rng)?;
        let graph = DominanceGraph::random(grid.species(), config.interaction_probability, &mut rng);

        debug!(
            event = "engine_created",
            side = config.side_length,
            species = graph.node_count(),
            edges = graph.edge_count(),
            seed = seed,
            "Lichen engine initialized"
        );

        Ok(Self::assemble(config, grid, graph, rng))
    }

    /// Build an engine around an explicit grid and graph
    pub fn from_parts(
        config: LichenConfig,
        grid: Grid,
        graph: DominanceGraph,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        if grid.side() != config.side_length {
            return Err(Error::InvalidState(format!(
                "grid side {} does not match configured side {}",
                grid.side(),
                config.side_length
            )));
        }

        let engine = Self::assemble(config, grid, graph, ChaCha8Rng::seed_from_u64(seed));
        engine.check_invariants()?;
        Ok(engine)
    }

    fn assemble(config: LichenConfig, grid: Grid, graph: DominanceGraph, rng: ChaCha8Rng) -> Self {
        let next_id = match graph.max_node() {
            Some(max) => max.checked_next(),
            None => Some(SpeciesId(0)),
        };
        Self {
            speciation_probability: config.speciation_probability(),
            grid,
            graph,
            config,
            rng,
            tick: 0,
            next_id,
            counters: EventCounters::new(),
        }
    }

    /// Run the given number of ticks
    #[instrument(skip(self), fields(side = self.config.side_length))]
    pub fn run(&mut self, num_ticks: u64) -> Result<RunSummary> {
        info!("Starting lichen run for {} ticks", num_ticks);

        for _ in 0..num_ticks {
            self.step()?;

            if self.tick % 1000 == 0 {
                info!(
                    "Tick {}/{}: {} species alive",
                    self.tick,
                    num_ticks,
                    self.graph.node_count()
                );
            }
        }

        let summary = self.summary();
        info!(
            event = "run_summary",
            total_ticks = summary.total_ticks,
            species_alive = summary.species_alive,
            dominance_edges = summary.dominance_edges,
            active_interactions = summary.active_interactions,
            invasions = summary.counters.invasions,
            speciations = summary.counters.speciations,
            extinctions = summary.counters.extinctions,
            peak_richness = summary.counters.peak_richness,
            shannon = summary.stats.shannon,
            "Lichen run complete"
        );
        Ok(summary)
    }

    /// Execute one tick: invasion, then speciation, then extinction
    pub fn step(&mut self) -> Result<TickReport> {
        let invasion = self.invasion_pass()?;
        let new_species = self.speciation_pass()?;
        let extinct = self.extinction_pass();
        self.tick += 1;

        self.counters.record(
            invasion.is_some(),
            new_species.is_some(),
            extinct.len(),
            self.graph.node_count(),
        );

        Ok(TickReport {
            tick: self.tick,
            invasion,
            new_species,
            extinct,
        })
    }

    /// Pick a random cell and a random in-grid neighbor and try to invade it
    pub fn invasion_pass(&mut self) -> Result<Option<Invasion>> {
        let side = self.grid.side();
        let site = Position::new(self.rng.gen_range(0..side), self.rng.gen_range(0..side));
        let neighbors = self.grid.neighbors(site);

        match neighbors.choose(&mut self.rng) {
            Some(&target) => self.invade_at(site, target),
            // 1x1 grid
            None => Ok(None),
        }
    }

    /// Invade `target` from `site` if the occupant of `site` dominates the
    /// occupant of `target`
    pub fn invade_at(&mut self, site: Position, target: Position) -> Result<Option<Invasion>> {
        let invader = self.grid.get(site)?;
        let displaced = self.grid.get(target)?;
        if !site.is_adjacent(&target) {
            return Err(Error::InvalidState(format!(
                "{} and {} are not adjacent",
                site, target
            )));
        }

        if !self.graph.has_edge(invader, displaced) {
            return Ok(None);
        }

        self.grid.set(target, invader)?;
        trace!(
            tick = self.tick,
            invader = %invader,
            displaced = %displaced,
            x = target.x,
            y = target.y,
            "Invasion"
        );
        Ok(Some(Invasion {
            from: site,
            to: target,
            invader,
            displaced,
        }))
    }

    /// With the configured probability, spawn a new species at a random cell
    pub fn speciation_pass(&mut self) -> Result<Option<SpeciesId>> {
        if self.rng.gen::<f64>() >= self.speciation_probability {
            return Ok(None);
        }

        let side = self.grid.side();
        let site = Position::new(self.rng.gen_range(0..side), self.rng.gen_range(0..side));
        self.speciate_at(site).map(Some)
    }

    /// Spawn a new species at `site`. The incumbent always dominates the
    /// newcomer; every other species is wired to and from it with
    /// probability gamma.
    pub fn speciate_at(&mut self, site: Position) -> Result<SpeciesId> {
        let incumbent = self.grid.get(site)?;
        let new_id = self.allocate_id()?;

        self.graph.add_node(new_id);
        self.graph.add_edge(incumbent, new_id)?;
        self.grid.set(site, new_id)?;
        if let Some(next) = self.next_id {
            if new_id >= next {
                self.next_id = new_id.checked_next();
            }
        }

        let gamma = self.config.interaction_probability;
        let others: Vec<SpeciesId> = self.graph.nodes().filter(|&v| v != new_id).collect();
        for v in others {
            if self.rng.gen::<f64>() < gamma {
                self.graph.add_edge(new_id, v)?;
            }
            if self.rng.gen::<f64>() < gamma {
                self.graph.add_edge(v, new_id)?;
            }
        }

        debug!(
            event = "speciation",
            tick = self.tick,
            species = %new_id,
            incumbent = %incumbent,
            x = site.x,
            y = site.y,
            dominates = self.graph.out_neighbors(new_id).count(),
            dominated_by = self.graph.in_neighbors(new_id).count(),
            "New species"
        );
        Ok(new_id)
    }

    fn allocate_id(&self) -> Result<SpeciesId> {
        let id = match self.config.id_policy {
            IdPolicy::Monotonic => self.next_id,
            IdPolicy::Reuse => self.graph.smallest_free_id(),
        };
        id.ok_or_else(|| {
            Error::InvalidState(format!(
                "species id space exhausted under {:?} policy",
                self.config.id_policy
            ))
        })
    }

    /// Remove every species that no longer occupies a cell
    pub fn extinction_pass(&mut self) -> Vec<SpeciesId> {
        let extinct: Vec<SpeciesId> = self
            .graph
            .nodes()
            .filter(|&species| self.grid.count(species) == 0)
            .collect();

        for &species in &extinct {
            self.graph.remove_node(species);
            event!(
                Level::DEBUG,
                event = "extinction",
                tick = self.tick,
                species = %species,
                "Species extinct"
            );
        }
        extinct
    }

    /// Check that every grid value is a graph node and that no self loop
    /// exists
    pub fn check_invariants(&self) -> Result<()> {
        if let Some(missing) = self.grid.species().find(|&s| !self.graph.contains(s)) {
            return Err(Error::InvalidState(format!(
                "species {} is on the grid but not in the dominance graph",
                missing
            )));
        }
        if let Some((u, _)) = self.graph.edges().find(|(u, v)| u == v) {
            return Err(Error::InvalidState(format!("self loop on species {}", u)));
        }
        Ok(())
    }

    /// Immutable copy of the current state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.tick, &self.grid, &self.graph)
    }

    /// Split dominance edges into currently adjacent and potential-only pairs
    pub fn classify_interactions(&self) -> Interactions {
        snapshot::classify_interactions(&self.grid, &self.graph)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_ticks: self.tick,
            species_alive: self.graph.node_count(),
            dominance_edges: self.graph.edge_count(),
            active_interactions: self.classify_interactions().active.len(),
            counters: self.counters.clone(),
            stats: PopulationStats::from_counts(self.grid.populations()),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn graph(&self) -> &DominanceGraph {
        &self.graph
    }

    pub fn config(&self) -> &LichenConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    pub fn speciation_probability(&self) -> f64 {
        self.speciation_probability
    }
}

fn initial_grid(config: &LichenConfig, rng: &mut ChaCha8Rng) -> Result<Grid> {
    let side = config.side_length;
    match config.initial_layout {
        InitialLayout::Blocks => {
            let mut grid = Grid::new(side, SpeciesId::BACKGROUND)?;
            let block = (side / 5).max(1);
            grid.fill_block(Position::new(side / 4, side / 4), block, SpeciesId(1));
            grid.fill_block(Position::new(3 * side / 4, 3 * side / 4), block, SpeciesId(2));
            Ok(grid)
        }
        InitialLayout::Uniform { species } => {
            let cells = (0..side as usize * side as usize)
                .map(|_| SpeciesId(rng.gen_range(0..species)))
                .collect();
            Grid::from_cells(side, cells)
        }
    }
}
