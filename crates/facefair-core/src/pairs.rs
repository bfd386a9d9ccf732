//! Paired verification dataset read from an LFW-style pairs manifest.
//!
//! Each line is either `name idx1 idx2` (same identity) or
//! `name_a idx_a name_b idx_b` (different identities). Indices resolve to
//! `{root}/{name}/{name}_{index:04}.jpg`.

use crate::types::VerificationPair;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("pairs manifest line {line}: {reason}: {content:?}")]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },
    #[error("failed to read pairs manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Verification pairs in manifest order.
#[derive(Debug, Clone, Default)]
pub struct PairedDataset {
    root: PathBuf,
    pairs: Vec<VerificationPair>,
}

impl PairedDataset {
    /// Read and resolve a manifest file against `root`.
    pub fn load(manifest_path: &Path, root: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(manifest_path).map_err(|source| ManifestError::Io {
            path: manifest_path.to_path_buf(),
            source,
        })?;
        let dataset = Self::parse(&text, root)?;

        tracing::info!(
            manifest = %manifest_path.display(),
            pairs = dataset.len(),
            matches = dataset.matches().filter(|&m| m).count(),
            "loaded verification pairs"
        );
        Ok(dataset)
    }

    /// Parse manifest text. Blank lines are skipped; a first line of one or
    /// two unsigned integers is an LFW header and skipped too.
    pub fn parse(text: &str, root: &Path) -> Result<Self, ManifestError> {
        let mut pairs = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() || (idx == 0 && is_header(&tokens)) {
                continue;
            }
            pairs.push(parse_tokens(&tokens, root).map_err(|reason| ManifestError::Parse {
                line: idx + 1,
                content: line.to_string(),
                reason,
            })?);
        }

        Ok(Self {
            root: root.to_path_buf(),
            pairs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pairs(&self) -> &[VerificationPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn matches(&self) -> impl Iterator<Item = bool> + '_ {
        self.pairs.iter().map(|p| p.is_match)
    }
}

/// Parse one manifest line. `line_number` is only used for error context.
pub fn parse_line(line: &str, line_number: usize, root: &Path) -> Result<VerificationPair, ManifestError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    parse_tokens(&tokens, root).map_err(|reason| ManifestError::Parse {
        line: line_number,
        content: line.to_string(),
        reason,
    })
}

/// `{root}/{name}/{name}_{index:04}.jpg`
pub fn image_path(root: &Path, name: &str, index: u32) -> PathBuf {
    root.join(name).join(format!("{name}_{index:04}.jpg"))
}

fn parse_tokens(tokens: &[&str], root: &Path) -> Result<VerificationPair, String> {
    match *tokens {
        [name, idx_a, idx_b] => Ok(VerificationPair {
            path_a: image_path(root, name, parse_index(idx_a)?),
            path_b: image_path(root, name, parse_index(idx_b)?),
            is_match: true,
        }),
        [name_a, idx_a, name_b, idx_b] => Ok(VerificationPair {
            path_a: image_path(root, name_a, parse_index(idx_a)?),
            path_b: image_path(root, name_b, parse_index(idx_b)?),
            is_match: false,
        }),
        _ => Err(format!("expected 3 or 4 fields, found {}", tokens.len())),
    }
}

fn parse_index(token: &str) -> Result<u32, String> {
    token
        .parse()
        .map_err(|_| format!("image index {token:?} is not a non-negative integer"))
}

fn is_header(tokens: &[&str]) -> bool {
    tokens.len() <= 2 && tokens.iter().all(|t| t.parse::<u32>().is_ok())
}
