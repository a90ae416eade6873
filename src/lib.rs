pub mod api; // Server-side fallback extraction endpoint
pub mod config;
pub mod embedding_config;
pub mod logging;
pub mod pipeline;

pub use pipeline::extraction::{
    clean, is_binary_data, ExtractionError, ExtractionOrchestrator, ExtractionOutcome,
    ExtractionReport,
};
