//! Error types for the simulation.

use crate::types::{Position, SpeciesId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Grid access outside `[0, side)`. Only reachable through an engine bug
    /// or a caller-supplied position.
    #[error("Position ({}, {}) out of range for grid of side {side}", pos.x, pos.y)]
    OutOfRange { pos: Position, side: i32 },

    #[error("Unknown species: {0}")]
    UnknownSpecies(SpeciesId),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = Error::OutOfRange {
            pos: Position::new(-1, 4),
            side: 10,
        };
        assert_eq!(
            err.to_string(),
            "Position (-1, 4) out of range for grid of side 10"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err: Error = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
