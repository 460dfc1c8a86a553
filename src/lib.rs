//! Cargo stowage service: places, retrieves, and rearranges cuboid items
//! inside fixed-size containers, tracking waste and an audit log over CSV.
//!
//! Split into a library and a thin binary (`main.rs`) so integration tests
//! under `tests/` can drive the HTTP router and CSV adapter directly.

pub mod api;
pub mod candidates;
pub mod config;
pub mod csv_io;
pub mod error;
pub mod geometry;
pub mod model;
pub mod planner;
pub mod spatial;
pub mod waste;
pub mod world;
