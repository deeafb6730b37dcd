pub mod prediction;
pub mod record;

pub use prediction::{ResultSummary, StressLevel};
pub use record::{parse_number, FeatureRecord, RecordBatch};
