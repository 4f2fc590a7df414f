//! LLM-backed stages: completion client, question refinement and
//! delegated analysis.

pub mod bridge;
pub mod client;
pub mod refiner;

pub use bridge::{AnalysisEngine, LlmAnalysisEngine, PredefinedQuestion};
pub use client::{ClientConfig, CompletionClient, OpenAiClient};
pub use refiner::QueryRefiner;
