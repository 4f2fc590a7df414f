//! Dashboard and answer rendering.

pub mod generator;

pub use generator::*;
