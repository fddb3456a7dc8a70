// Restock prediction pipeline, leaves first
pub mod normalizer;
pub mod forecasting;
pub mod depletion;
pub mod alerts;

// Orchestration of the full run
pub mod restock;

pub use restock::RestockPipeline;
