//! Balanced multi-group sampler.
//!
//! Each demographic group contributes at most `quota` records: 90% of the
//! quota from its training split and 10% from its validation split, drawn
//! after an independent shuffle of each split.

use crate::catalog::Split;
use crate::types::SampleRecord;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("group {group}: {pool} quota {requested} exceeds the {available} available records")]
    QuotaExceeded {
        group: String,
        pool: &'static str,
        requested: usize,
        available: usize,
    },
}

/// What to do when a group's quota asks for more records than it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPolicy {
    /// Keep every available record and log a warning.
    #[default]
    Cap,
    /// Fail with [`SamplerError::QuotaExceeded`].
    Strict,
}

/// One group's split records and the number of samples wanted from it.
#[derive(Debug, Clone)]
pub struct GroupPartition {
    pub name: String,
    pub split: Split,
    pub quota: usize,
}

/// Records drawn from every group, in group order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedPool {
    pub training: Vec<SampleRecord>,
    pub validation: Vec<SampleRecord>,
}

/// `floor(quota * 0.9)`.
pub fn training_quota(quota: usize) -> usize {
    (quota as u128 * 9 / 10) as usize
}

/// `floor(quota * 0.1)`.
pub fn validation_quota(quota: usize) -> usize {
    quota / 10
}

/// Shuffle and truncate every group, then concatenate the pools.
pub fn combine<R: Rng + ?Sized>(
    groups: Vec<GroupPartition>,
    policy: QuotaPolicy,
    rng: &mut R,
) -> Result<CombinedPool, SamplerError> {
    let mut pool = CombinedPool::default();

    for group in groups {
        let GroupPartition { name, split, quota } = group;

        let validation = draw(&name, "validation", split.validation, validation_quota(quota), policy, rng)?;
        let training = draw(&name, "training", split.train, training_quota(quota), policy, rng)?;

        tracing::info!(
            group = %name,
            quota,
            training = training.len(),
            validation = validation.len(),
            "sampled group"
        );

        pool.training.extend(training);
        pool.validation.extend(validation);
    }

    Ok(pool)
}

fn draw<R: Rng + ?Sized>(
    group: &str,
    pool: &'static str,
    mut records: Vec<SampleRecord>,
    wanted: usize,
    policy: QuotaPolicy,
    rng: &mut R,
) -> Result<Vec<SampleRecord>, SamplerError> {
    let available = records.len();
    if wanted > available {
        match policy {
            QuotaPolicy::Strict => {
                return Err(SamplerError::QuotaExceeded {
                    group: group.to_string(),
                    pool,
                    requested: wanted,
                    available,
                });
            }
            QuotaPolicy::Cap => {
                tracing::warn!(group, pool, requested = wanted, available, "quota capped at available records");
            }
        }
    }

    records.shuffle(rng);
    records.truncate(wanted);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;
    use crate::catalog::sample_record;
    use std::path::PathBuf;

    fn records(identity: &str, class_index: usize, count: usize) -> Vec<SampleRecord> {
        (0..count)
            .map(|i| sample_record(&PathBuf::from(format!("{identity}_{i:04}.jpg")), class_index, identity))
            .collect()
    }

    fn group(name: &str, class_index: usize, train: usize, validation: usize, quota: usize) -> GroupPartition {
        GroupPartition {
            name: name.to_string(),
            split: Split {
                train: records(&format!("{name}_train"), class_index, train),
                validation: records(&format!("{name}_val"), class_index, validation),
            },
            quota,
        }
    }

    #[rstest]
    #[case(0, 0, 0)]
    #[case(9, 8, 0)]
    #[case(10, 9, 1)]
    #[case(7000, 6300, 700)]
    #[case(15, 13, 1)]
    fn test_quotas(#[case] quota: usize, #[case] training: usize, #[case] validation: usize) {
        assert_eq!(training_quota(quota), training);
        assert_eq!(validation_quota(quota), validation);
    }

    #[test]
    fn test_combine_sizes_per_group() {
        let mut rng = StdRng::seed_from_u64(42);
        let groups = vec![group("African", 0, 100, 20, 50), group("Asian", 1, 100, 20, 100)];

        let pool = combine(groups, QuotaPolicy::Cap, &mut rng).unwrap();
        assert_eq!(pool.training.len(), 45 + 90);
        assert_eq!(pool.validation.len(), 5 + 10);

        // Groups are concatenated in input order.
        assert!(pool.training[..45].iter().all(|r| r.class_index == 0));
        assert!(pool.training[45..].iter().all(|r| r.class_index == 1));
    }

    #[test]
    fn test_combine_draws_without_replacement() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = combine(vec![group("Indian", 0, 50, 10, 40)], QuotaPolicy::Cap, &mut rng).unwrap();

        let mut paths: Vec<_> = pool.training.iter().map(|r| r.image_path.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 36);
        assert!(pool
            .training
            .iter()
            .all(|r| r.identity_name == "Indian_train"));
    }

    #[test]
    fn test_combine_is_reproducible_with_seed() {
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            combine(vec![group("Caucasian", 0, 200, 40, 100)], QuotaPolicy::Cap, &mut rng).unwrap()
        };
        assert_eq!(run(3), run(3));
        assert_ne!(run(3).training, run(4).training);
    }

    #[test]
    fn test_combine_caps_at_available() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = combine(vec![group("African", 0, 30, 2, 1000)], QuotaPolicy::Cap, &mut rng).unwrap();
        assert_eq!(pool.training.len(), 30);
        assert_eq!(pool.validation.len(), 2);
    }

    #[test]
    fn test_combine_strict_rejects_excess_quota() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = combine(vec![group("African", 0, 30, 2, 1000)], QuotaPolicy::Strict, &mut rng).unwrap_err();
        let SamplerError::QuotaExceeded {
            group,
            pool,
            requested,
            available,
        } = err;
        assert_eq!(group, "African");
        assert_eq!(pool, "validation");
        assert_eq!(requested, 100);
        assert_eq!(available, 2);
    }

    #[test]
    fn test_combine_strict_within_quota() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = combine(vec![group("Asian", 0, 30, 5, 20)], QuotaPolicy::Strict, &mut rng).unwrap();
        assert_eq!(pool.training.len(), 18);
        assert_eq!(pool.validation.len(), 2);
    }

    #[test]
    fn test_combine_zero_quota() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = combine(vec![group("Asian", 0, 30, 5, 0)], QuotaPolicy::Strict, &mut rng).unwrap();
        assert!(pool.training.is_empty());
        assert!(pool.validation.is_empty());
    }
}
