//! Identity catalog: folder scan, per-identity train/validation split and
//! k-fold rotation over a flat record sequence.
//!
//! Layout consumed: `{images_root}/{identity_name}/{image_file}`. Identities
//! and images are visited in sorted order so class indices are stable across
//! scans of an unchanged tree.

use crate::types::{Identity, SampleRecord};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("empty dataset: no identity folders under {0}")]
    EmptyDataset(PathBuf),
    #[error("identity {name} has no images in {path}")]
    EmptyIdentity { name: String, path: PathBuf },
    #[error("identity folder name is not valid UTF-8: {0}")]
    NonUtf8Name(PathBuf),
    #[error("split ratio must be in (0, 1), got {0}")]
    InvalidRatio(f64),
    #[error("fold count must be in [1, {len}], got {k}")]
    InvalidFoldCount { k: usize, len: usize },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Boundary rule for cutting one identity's images at `total * ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitRule {
    /// Train ends at `ceil(t·r)`, validation starts at `floor(t·r)`. When
    /// `t·r` is fractional the image at `floor(t·r)` lands in both sets.
    #[default]
    Inclusive,
    /// Train ends and validation starts at `floor(t·r)`; the sets partition
    /// the images exactly.
    Exclusive,
}

impl SplitRule {
    /// Returns `(train_end, validation_start)` for `total` images.
    pub fn boundaries(self, total: usize, ratio: f64) -> (usize, usize) {
        let cut = total as f64 * ratio;
        let floor = (cut.floor() as usize).min(total);
        let ceil = (cut.ceil() as usize).min(total);
        match self {
            SplitRule::Inclusive => (ceil, floor),
            SplitRule::Exclusive => (floor, floor),
        }
    }
}

/// Train and validation records, concatenated across identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<SampleRecord>,
    pub validation: Vec<SampleRecord>,
}

impl Split {
    pub fn extend(&mut self, other: Split) {
        self.train.extend(other.train);
        self.validation.extend(other.validation);
    }
}

/// Scan `images_root`, assigning class indices from zero.
pub fn scan(images_root: &Path) -> Result<Vec<Identity>, CatalogError> {
    scan_from(images_root, 0)
}

/// Scan `images_root`, assigning class indices from `first_class_index`.
///
/// Used to lay several demographic groups side by side in one label space.
/// Fails on the first identity folder without images.
pub fn scan_from(images_root: &Path, first_class_index: usize) -> Result<Vec<Identity>, CatalogError> {
    let folders = sorted_entries(images_root, Path::is_dir)?;
    if folders.is_empty() {
        return Err(CatalogError::EmptyDataset(images_root.to_path_buf()));
    }

    let mut identities = Vec::with_capacity(folders.len());
    for (position, (name, dir)) in folders.into_iter().enumerate() {
        let name = name
            .into_string()
            .map_err(|_| CatalogError::NonUtf8Name(dir.clone()))?;
        let image_paths: Vec<PathBuf> = sorted_entries(&dir, Path::is_file)?
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        if image_paths.is_empty() {
            return Err(CatalogError::EmptyIdentity { name, path: dir });
        }

        let class_index = first_class_index + position;
        tracing::debug!(identity = %name, class_index, images = image_paths.len(), "catalogued identity");

        identities.push(Identity {
            name,
            class_index,
            image_paths,
        });
    }

    tracing::info!(
        root = %images_root.display(),
        identities = identities.len(),
        first_class_index,
        "scanned identity catalog"
    );
    Ok(identities)
}

/// Build the record for one image of one identity.
pub fn sample_record(image_path: &Path, class_index: usize, identity_name: &str) -> SampleRecord {
    SampleRecord {
        image_path: image_path.to_path_buf(),
        class_index,
        identity_name: identity_name.to_string(),
    }
}

/// Split one identity's images at `ratio` under `rule`.
pub fn split(identity: &Identity, ratio: f64, rule: SplitRule) -> Result<Split, CatalogError> {
    validate_ratio(ratio)?;

    let total = identity.image_paths.len();
    let (train_end, validation_start) = rule.boundaries(total, ratio);
    let records = |paths: &[PathBuf]| -> Vec<SampleRecord> {
        paths
            .iter()
            .map(|path| sample_record(path, identity.class_index, &identity.name))
            .collect()
    };

    Ok(Split {
        train: records(&identity.image_paths[..train_end]),
        validation: records(&identity.image_paths[validation_start..]),
    })
}

/// Split every identity and concatenate the results in catalog order.
pub fn split_all(identities: &[Identity], ratio: f64, rule: SplitRule) -> Result<Split, CatalogError> {
    validate_ratio(ratio)?;

    let mut combined = Split::default();
    for identity in identities {
        combined.extend(split(identity, ratio, rule)?);
    }

    tracing::debug!(
        identities = identities.len(),
        train = combined.train.len(),
        validation = combined.validation.len(),
        ?rule,
        "split catalog"
    );
    Ok(combined)
}

/// k-fold rotation over `data`.
///
/// Fails unless `1 <= k <= data.len()`. The returned iterator borrows `data`
/// and can be cloned to restart the rotation.
pub fn folds<T>(data: &[T], k: usize) -> Result<Folds<'_, T>, CatalogError> {
    if k == 0 || k > data.len() {
        return Err(CatalogError::InvalidFoldCount { k, len: data.len() });
    }
    Ok(Folds {
        data,
        k,
        window: data.len() / k,
        next: 0,
    })
}

/// Iterator over the `k` rotations of a k-fold partition.
#[derive(Debug)]
pub struct Folds<'a, T> {
    data: &'a [T],
    k: usize,
    window: usize,
    next: usize,
}

impl<T> Clone for Folds<'_, T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            k: self.k,
            window: self.window,
            next: self.next,
        }
    }
}

impl<'a, T> Folds<'a, T> {
    pub fn k(&self) -> usize {
        self.k
    }

    /// Validation window length, `len / k`.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Fold `index` directly, independent of iteration state.
    pub fn get(&self, index: usize) -> Option<Fold<'a, T>> {
        if index >= self.k {
            return None;
        }
        let start = index * self.window;
        let end = start + self.window;
        Some(Fold {
            index,
            head: &self.data[..start],
            validation: &self.data[start..end],
            tail: &self.data[end..],
        })
    }
}

impl<'a, T> Iterator for Folds<'a, T> {
    type Item = Fold<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let fold = self.get(self.next)?;
        self.next += 1;
        Some(fold)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.k - self.next;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Folds<'_, T> {}

/// One rotation: a contiguous validation window and everything around it.
#[derive(Debug)]
pub struct Fold<'a, T> {
    pub index: usize,
    head: &'a [T],
    validation: &'a [T],
    tail: &'a [T],
}

impl<'a, T> Fold<'a, T> {
    pub fn validation(&self) -> &'a [T] {
        self.validation
    }

    /// Training records: the data before the window followed by the data after it.
    pub fn train(&self) -> std::iter::Chain<std::slice::Iter<'a, T>, std::slice::Iter<'a, T>> {
        self.head.iter().chain(self.tail.iter())
    }

    pub fn train_len(&self) -> usize {
        self.head.len() + self.tail.len()
    }
}

fn validate_ratio(ratio: f64) -> Result<(), CatalogError> {
    if ratio > 0.0 && ratio < 1.0 {
        Ok(())
    } else {
        Err(CatalogError::InvalidRatio(ratio))
    }
}

/// Non-hidden entries of `dir` accepted by `keep`, as `(file name, path)`
/// sorted by file name.
fn sorted_entries(dir: &Path, keep: fn(&Path) -> bool) -> Result<Vec<(OsString, PathBuf)>, CatalogError> {
    let io_err = |source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        let path = entry.path();
        if name.as_encoded_bytes().starts_with(b".") || !keep(&path) {
            continue;
        }
        entries.push((name, path));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
