//! Center loss regularizer.
//!
//! Keeps one centroid per class in embedding space. The loss pulls every
//! embedding toward the centroid of its class:
//!
//! ```text
//! L = λ/2 · Σ_i ‖x_i − c_{y_i}‖²
//! ```
//!
//! and centroids follow their members with a damped step:
//!
//! ```text
//! Δc_j = Σ_{i: y_i = j} (x_i − c_j) / (1 + n_j)
//! ```
//!
//! The `+ 1` in the denominator limits the step for classes with few members
//! in the batch and must not be dropped.

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CenterLossError {
    #[error("target class {class_index} is outside the centroid table ({num_classes} classes)")]
    UnknownClass { class_index: usize, num_classes: usize },
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// Center loss value for a batch against a centroid snapshot. Does not
/// touch the centroids.
pub fn center_loss(
    embeddings: ArrayView2<f32>,
    centroids: ArrayView2<f32>,
    targets: &[usize],
    lambda: f32,
) -> Result<f32, CenterLossError> {
    check_batch(embeddings, centroids, targets)?;

    let mut total = 0.0f32;
    for (row, &class) in embeddings.outer_iter().zip(targets) {
        let diff = &row - &centroids.row(class);
        total += diff.dot(&diff);
    }
    Ok(lambda / 2.0 * total)
}

/// Per-class centroid deltas, shaped like `centroids`. Rows of classes absent
/// from the batch are zero.
pub fn center_delta(
    embeddings: ArrayView2<f32>,
    centroids: ArrayView2<f32>,
    targets: &[usize],
) -> Result<Array2<f32>, CenterLossError> {
    check_batch(embeddings, centroids, targets)?;

    let mut delta = Array2::<f32>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; centroids.nrows()];

    for (row, &class) in embeddings.outer_iter().zip(targets) {
        let residual = &row - &centroids.row(class);
        let mut acc = delta.row_mut(class);
        acc += &residual;
        counts[class] += 1;
    }

    for (mut acc, &n) in delta.outer_iter_mut().zip(&counts) {
        acc /= (1 + n) as f32;
    }

    Ok(delta)
}

fn check_batch(
    embeddings: ArrayView2<f32>,
    centroids: ArrayView2<f32>,
    targets: &[usize],
) -> Result<(), CenterLossError> {
    if embeddings.nrows() != targets.len() {
        return Err(CenterLossError::DimensionMismatch(format!(
            "{} embeddings but {} targets",
            embeddings.nrows(),
            targets.len()
        )));
    }
    if embeddings.ncols() != centroids.ncols() {
        return Err(CenterLossError::DimensionMismatch(format!(
            "embedding width {} but centroid width {}",
            embeddings.ncols(),
            centroids.ncols()
        )));
    }
    let num_classes = centroids.nrows();
    if let Some(&class_index) = targets.iter().find(|&&c| c >= num_classes) {
        return Err(CenterLossError::UnknownClass {
            class_index,
            num_classes,
        });
    }
    Ok(())
}

/// Centroid table plus loss weight, owned by the training loop.
#[derive(Debug, Clone)]
pub struct CenterLoss {
    lambda: f32,
    centroids: Array2<f32>,
}

impl CenterLoss {
    /// Zero-initialised table for `num_classes` classes of width `dim`.
    pub fn new(num_classes: usize, dim: usize, lambda: f32) -> Self {
        Self::from_centroids(Array2::zeros((num_classes, dim)), lambda)
    }

    /// Resume from an existing table (one row per class).
    pub fn from_centroids(centroids: Array2<f32>, lambda: f32) -> Self {
        Self { lambda, centroids }
    }

    pub fn lambda(&self) -> f32 {
        self.lambda
    }

    pub fn num_classes(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn dim(&self) -> usize {
        self.centroids.ncols()
    }

    pub fn centroids(&self) -> ArrayView2<'_, f32> {
        self.centroids.view()
    }

    pub fn into_centroids(self) -> Array2<f32> {
        self.centroids
    }

    pub fn loss(&self, embeddings: ArrayView2<f32>, targets: &[usize]) -> Result<f32, CenterLossError> {
        center_loss(embeddings, self.centroids.view(), targets, self.lambda)
    }

    pub fn delta(&self, embeddings: ArrayView2<f32>, targets: &[usize]) -> Result<Array2<f32>, CenterLossError> {
        center_delta(embeddings, self.centroids.view(), targets)
    }

    /// `centroid ← centroid + delta`.
    pub fn apply(&mut self, delta: ArrayView2<f32>) -> Result<(), CenterLossError> {
        if delta.dim() != self.centroids.dim() {
            return Err(CenterLossError::DimensionMismatch(format!(
                "delta shape {:?} but centroid table shape {:?}",
                delta.dim(),
                self.centroids.dim()
            )));
        }
        self.centroids += &delta;
        Ok(())
    }

    /// Loss on the current snapshot, then move the centroids. Returns the loss.
    pub fn step(&mut self, embeddings: ArrayView2<f32>, targets: &[usize]) -> Result<f32, CenterLossError> {
        let loss = self.loss(embeddings, targets)?;
        let delta = self.delta(embeddings, targets)?;
        self.apply(delta.view())?;
        tracing::trace!(loss, batch = targets.len(), "center loss step");
        Ok(loss)
    }
}
