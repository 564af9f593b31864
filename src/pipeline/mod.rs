//! Lab colorization pipeline.

pub mod assemble;
pub mod color;
mod colorize;
pub mod inference;

pub use colorize::{Config, Pipeline};
