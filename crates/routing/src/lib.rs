//! Board model and constrained route search for the 4x3 guidance grid.

mod board;
mod finder;

pub use board::Board;
pub use finder::{PathFinder, RouteCandidate, DEFAULT_MIN_REAL};
