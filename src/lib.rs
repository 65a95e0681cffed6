pub mod accumulator;
pub mod candidates;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod scene;
pub mod selection;
pub mod session;
pub mod skeleton;
pub mod tracking;
pub mod visibility;

pub use error::{PlacementError, PlacementResult};
