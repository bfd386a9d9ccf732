use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One labeled individual: a folder of face images under a group root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    /// Position of the identity in the scan order (plus any group offset).
    pub class_index: usize,
    /// Image files, sorted by file name.
    pub image_paths: Vec<PathBuf>,
}

impl Identity {
    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }
}

/// A single labeled training or validation image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub image_path: PathBuf,
    pub class_index: usize,
    pub identity_name: String,
}

/// Two images and whether they show the same person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPair {
    pub path_a: PathBuf,
    pub path_b: PathBuf,
    pub is_match: bool,
}

/// Face embedding vector produced by the model under evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model that produced this embedding, carried into evaluation reports.
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Squared Euclidean distance, the metric the verification sweep thresholds.
    pub fn squared_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_squared_distance() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        let b = Embedding::new(vec![4.0, 6.0, 3.0]);
        assert_relative_eq!(a.squared_distance(&b), 25.0);
    }

    #[test]
    fn test_squared_distance_identical() {
        let a = Embedding::new(vec![0.5, -0.5]);
        assert_eq!(a.squared_distance(&a), 0.0);
    }

    #[test]
    fn test_identity_len() {
        let identity = Identity {
            name: "Alice".into(),
            class_index: 0,
            image_paths: vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")],
        };
        assert_eq!(identity.len(), 2);
        assert!(!identity.is_empty());
    }
}
