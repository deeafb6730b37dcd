pub mod adapter;
pub mod pipeline;
pub mod scorer;

pub use adapter::{PredictionAdapter, ScoredBatch};
pub use pipeline::{LinearPipeline, PipelineArtifact, ScalerParams};
pub use scorer::{ScoreError, Scorer};
