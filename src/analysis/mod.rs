//! Analysis modules.
//!
//! `aggregator` holds the six fixed reports, `schema` the scalar projection
//! handed to the analysis engine.

pub mod aggregator;
pub mod schema;

pub use aggregator::*;
pub use schema::{scalar_projection, ScalarProjection};
