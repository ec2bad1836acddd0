//! The plot core: filtering, scaling, indexing, styling, rasterization,
//! interaction and legend aggregation. Nothing in here does I/O or fails.

pub mod catalog;
pub mod filter;
pub mod geometry;
pub mod interaction;
pub mod legend;
pub mod renderer;
pub mod scale;
pub mod spatial;
pub mod style;
pub mod viewport;
