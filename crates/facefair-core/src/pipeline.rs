//! Pair evaluation: embed every pair of a [`PairedDataset`] and sweep
//! thresholds over the squared distances.

use crate::evaluator::{self, EvaluationError, RocReport};
use crate::pairs::PairedDataset;
use crate::recognizer::{Embedder, RecognizerError};
use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("embedding of {path} has {actual} dimensions, expected {expected}")]
    EmbeddingWidth {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

/// Distances in manifest order and the sweep over them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairEvaluation {
    /// Model that produced the embeddings, when the embedder reports one.
    pub model_version: Option<String>,
    pub distances: Vec<f32>,
    pub matches: Vec<bool>,
    pub report: RocReport,
}

/// Embed both sides of every pair and evaluate.
///
/// Each distinct image path is embedded once, even when it appears in several
/// pairs.
pub fn evaluate_pairs<E: Embedder + ?Sized>(
    dataset: &PairedDataset,
    embedder: &mut E,
    thresholds: &[f32],
) -> Result<PairEvaluation, PipelineError> {
    let mut cache: HashMap<PathBuf, Embedding> = HashMap::new();
    let mut width: Option<usize> = None;
    let mut model_version: Option<String> = None;
    let mut distances = Vec::with_capacity(dataset.len());

    for (i, pair) in dataset.pairs().iter().enumerate() {
        for path in [&pair.path_a, &pair.path_b] {
            if cache.contains_key(path) {
                continue;
            }
            let embedding = embedder.embed(path)?;
            let expected = *width.get_or_insert(embedding.dim());
            if embedding.dim() != expected {
                return Err(PipelineError::EmbeddingWidth {
                    path: path.clone(),
                    expected,
                    actual: embedding.dim(),
                });
            }
            if model_version.is_none() {
                model_version.clone_from(&embedding.model_version);
            }
            cache.insert(path.clone(), embedding);
        }

        distances.push(cache[&pair.path_a].squared_distance(&cache[&pair.path_b]));

        if (i + 1) % 500 == 0 {
            tracing::debug!(pairs = i + 1, total = dataset.len(), images = cache.len(), "embedded pairs");
        }
    }

    let matches: Vec<bool> = dataset.matches().collect();
    let report = evaluator::evaluate(&distances, &matches, thresholds)?;

    tracing::info!(
        pairs = dataset.len(),
        images = cache.len(),
        model = model_version.as_deref().unwrap_or("unknown"),
        best_threshold = report.best_threshold,
        best_accuracy = report.best_accuracy,
        "evaluated pairs"
    );

    Ok(PairEvaluation {
        model_version,
        distances,
        matches,
        report,
    })
}

/// Squared distance between the embeddings of two images.
pub fn verify<E: Embedder + ?Sized>(embedder: &mut E, image_a: &Path, image_b: &Path) -> Result<f32, PipelineError> {
    let a = embedder.embed(image_a)?;
    let b = embedder.embed(image_b)?;
    if a.dim() != b.dim() {
        return Err(PipelineError::EmbeddingWidth {
            path: image_b.to_path_buf(),
            expected: a.dim(),
            actual: b.dim(),
        });
    }
    Ok(a.squared_distance(&b))
}
