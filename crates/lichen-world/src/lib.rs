//! Lichen world simulation engine.
//!
//! A square grid of species identifiers coupled to a directed dominance
//! graph. Each tick runs an invasion, a speciation and an extinction pass.

pub mod grid;
pub mod graph;
pub mod engine;
pub mod snapshot;
pub mod job;

pub use grid::Grid;
pub use graph::DominanceGraph;
pub use engine::{ColonizationEngine, Invasion, RunSummary, TickReport};
pub use snapshot::{Interactions, RenderFrame, Snapshot};
pub use job::{JobResult, LichenJob};
