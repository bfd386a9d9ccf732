//! facefair-core — demographic face-verification benchmarking.
//!
//! Identity catalog splitting and balanced group sampling for training sets,
//! the center-loss regularizer, and the pairwise verification evaluator that
//! sweeps distance thresholds into ROC points.

pub mod catalog;
pub mod center_loss;
pub mod evaluator;
pub mod pairs;
pub mod pipeline;
pub mod recognizer;
pub mod sampler;
pub mod types;

pub use catalog::{CatalogError, Split, SplitRule};
pub use center_loss::{CenterLoss, CenterLossError};
pub use evaluator::{EvaluationError, RocPoint, RocReport};
pub use pairs::{ManifestError, PairedDataset};
pub use pipeline::{PairEvaluation, PipelineError};
pub use recognizer::{Embedder, OnnxEmbedder, RecognizerError};
pub use sampler::{CombinedPool, GroupPartition, QuotaPolicy, SamplerError};
pub use types::{Embedding, Identity, SampleRecord, VerificationPair};
