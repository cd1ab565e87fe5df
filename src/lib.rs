pub mod classifier;
pub mod config;
pub mod io;
pub mod llm;
pub mod models;
pub mod stages;

#[cfg(test)]
mod testing;

pub use classifier::{LinearTextModel, LocalConfidenceGate, TrainConfig, UncertaintyBand};
pub use config::PipelineConfig;
pub use io::{JsonlSink, RecordSink, collect_inputs, load_input};
pub use llm::{GeminiClient, GeminiConfig, ResilientCallClient, TokioSleeper};
pub use models::{AnalysisResult, ScenarioCatalog};
pub use stages::{BatchPacing, BatchSummary, PipelineError, PipelineOrchestrator, run_batch};
