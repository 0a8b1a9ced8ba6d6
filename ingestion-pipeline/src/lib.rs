pub mod pipeline;
pub mod progress;

pub use pipeline::{CsvIngestionPipeline, IngestionOutcome};
pub use progress::{ProgressSink, ProgressUpdate};
