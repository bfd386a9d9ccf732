//! Assembly of the balanced multi-group pool and the fold handed to training.

use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use facefair_core::catalog::{self, Fold};
use facefair_core::sampler::{self, CombinedPool, GroupPartition};
use facefair_core::SampleRecord;
use rand::Rng;
use serde::Serialize;

/// Scan every configured group into one label space and draw the balanced pool.
///
/// Returns the total number of classes alongside the pool.
pub fn build_pool<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> Result<(usize, CombinedPool)> {
    let mut partitions = Vec::with_capacity(config.groups.len());
    let mut num_classes = 0;
    for group in &config.groups {
        let root = config.group_root(&group.name);
        let identities = catalog::scan_from(&root, num_classes)
            .with_context(|| format!("scanning group {}", group.name))?;
        num_classes += identities.len();

        let split = catalog::split_all(&identities, config.train_val_split, config.split_rule)?;
        partitions.push(GroupPartition {
            name: group.name.clone(),
            split,
            quota: group.quota,
        });
    }

    let pool = sampler::combine(partitions, config.quota_policy, rng)?;
    Ok((num_classes, pool))
}

/// The configured k-fold rotation over the pool's training records.
pub fn select_fold<'a>(config: &Config, pool: &'a CombinedPool) -> Result<Fold<'a, SampleRecord>> {
    let rotation = catalog::folds(&pool.training, config.folds)?;
    rotation.get(config.fold_index).ok_or_else(|| {
        anyhow!(
            "fold index {} out of range for {} folds",
            config.fold_index,
            config.folds
        )
    })
}

/// Record lists handed to the training dataloader.
#[derive(Serialize)]
pub struct SplitManifest<'a> {
    pub num_classes: usize,
    pub folds: usize,
    pub fold_index: usize,
    pub train: Vec<&'a SampleRecord>,
    pub validation: &'a [SampleRecord],
    /// Per-group validation draws from the sampler, never trained on.
    pub holdout: &'a [SampleRecord],
}

impl<'a> SplitManifest<'a> {
    pub fn new(num_classes: usize, folds: usize, fold: &Fold<'a, SampleRecord>, pool: &'a CombinedPool) -> Self {
        Self {
            num_classes,
            folds,
            fold_index: fold.index,
            train: fold.train().collect(),
            validation: fold.validation(),
            holdout: &pool.validation,
        }
    }
}
