use anyhow::{Context, Result};
use facefair_core::evaluator;
use facefair_core::recognizer::DEFAULT_INPUT_SIZE;
use facefair_core::{QuotaPolicy, SplitRule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Benchmark configuration: TOML file (optional) overlaid by `FACEFAIR_*`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root holding one folder per demographic group.
    pub dataset_root: PathBuf,
    /// Where reports and ROC images go when no explicit path is given.
    pub log_dir: PathBuf,
    /// Fraction of each identity's images used for training.
    pub train_val_split: f64,
    pub split_rule: SplitRule,
    /// Number of k-fold rotations over the combined training pool.
    pub folds: usize,
    /// Rotation used for the emitted train/validation lists.
    pub fold_index: usize,
    /// Sampler seed; drawn from entropy when unset.
    pub seed: Option<u64>,
    pub quota_policy: QuotaPolicy,
    pub groups: Vec<GroupConfig>,
    pub evaluation: EvaluationConfig,
}

/// One demographic group folder and how many samples to take from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub quota: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub threshold_start: f64,
    pub threshold_stop: f64,
    pub threshold_step: f64,
    /// Square input side of the embedding model.
    pub input_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from("datasets/RFW/race_per_7000"),
            log_dir: PathBuf::from("logs"),
            train_val_split: 0.9,
            split_rule: SplitRule::default(),
            folds: 10,
            fold_index: 0,
            seed: None,
            quota_policy: QuotaPolicy::default(),
            groups: ["Caucasian", "Indian", "Asian", "African"]
                .into_iter()
                .map(|name| GroupConfig {
                    name: name.to_string(),
                    quota: 7000,
                })
                .collect(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            threshold_start: evaluator::DEFAULT_THRESHOLD_START,
            threshold_stop: evaluator::DEFAULT_THRESHOLD_STOP,
            threshold_step: evaluator::DEFAULT_THRESHOLD_STEP,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl Config {
    /// Load from `path` (if any), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(root) = std::env::var("FACEFAIR_DATASET_ROOT") {
            self.dataset_root = PathBuf::from(root);
        }
        if let Ok(dir) = std::env::var("FACEFAIR_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        self.train_val_split = env_or("FACEFAIR_TRAIN_VAL_SPLIT", self.train_val_split);
        self.folds = env_or("FACEFAIR_FOLDS", self.folds);
        self.fold_index = env_or("FACEFAIR_FOLD_INDEX", self.fold_index);
        self.seed = env_parse("FACEFAIR_SEED").or(self.seed);
        self.evaluation.input_size = env_or("FACEFAIR_INPUT_SIZE", self.evaluation.input_size);
    }

    pub fn group_root(&self, group: &str) -> PathBuf {
        self.dataset_root.join(group)
    }

    pub fn thresholds(&self) -> Vec<f32> {
        evaluator::threshold_range(
            self.evaluation.threshold_start,
            self.evaluation.threshold_stop,
            self.evaluation.threshold_step,
        )
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_parse(key).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.train_val_split, 0.9);
        assert_eq!(config.folds, 10);
        assert_eq!(config.groups.len(), 4);
        assert_eq!(config.split_rule, SplitRule::Inclusive);
        assert_eq!(config.quota_policy, QuotaPolicy::Cap);
        assert_eq!(config.thresholds().len(), 40);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            dataset_root = "/data/rfw"
            seed = 42
            split_rule = "exclusive"
            quota_policy = "strict"

            [[groups]]
            name = "African"
            quota = 500

            [evaluation]
            threshold_step = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset_root, PathBuf::from("/data/rfw"));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.split_rule, SplitRule::Exclusive);
        assert_eq!(config.quota_policy, QuotaPolicy::Strict);
        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.groups[0].quota, 500);
        assert_eq!(config.folds, 10);
        assert_eq!(config.evaluation.input_size, DEFAULT_INPUT_SIZE);
        assert_eq!(config.thresholds(), vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
        assert_eq!(config.group_root("African"), PathBuf::from("/data/rfw/African"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml_str("folds = \"ten\"").is_err());
    }
}
