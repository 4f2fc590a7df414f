//! Input data handling.

pub mod cache;
pub mod loader;

pub use cache::TableCache;

