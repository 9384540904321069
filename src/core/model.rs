//! Trained scoring models.
//!
//! Models are fit offline and shipped as JSON documents. Only the
//! packet-count feature is used. Depending on its kind a document loads
//! into one of the three scorer capabilities the classifier understands.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(PathBuf),
    #[error("I/O error reading model {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Model parsing error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid model: {0}")]
    Invalid(String),
}

/// Model that yields one probability per class
#[cfg_attr(test, mockall::automock)]
pub trait ProbabilityModel: Send + Sync {
    fn class_probabilities(&self, packet_count: u64) -> Vec<f64>;
}

/// Model that yields a (normal, attack) probability pair
#[cfg_attr(test, mockall::automock)]
pub trait PairModel: Send + Sync {
    fn probability_pair(&self, packet_count: u64) -> (f64, f64);
}

/// Scoring capability of a loaded model
pub enum Scorer {
    Probabilistic(Box<dyn ProbabilityModel>),
    Raw(Box<dyn PairModel>),
    Unavailable,
}

impl Scorer {
    pub fn describe(&self) -> &'static str {
        match self {
            Scorer::Probabilistic(_) => "probabilistic",
            Scorer::Raw(_) => "raw",
            Scorer::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scorer::{}", self.describe())
    }
}

/// Single-feature decision tree in interval form
///
/// A count falls right of a split when strictly greater than it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalTree {
    pub splits: Vec<f64>,
    pub leaves: Vec<Vec<f64>>,
}

impl IntervalTree {
    fn leaf_index(splits: &[f64], packet_count: u64) -> usize {
        let x = packet_count as f64;
        splits.iter().take_while(|threshold| x > **threshold).count()
    }

    fn validate(&self) -> Result<usize, ModelError> {
        validate_splits(&self.splits, self.leaves.len())?;
        let classes = self.leaves.first().map(Vec::len).unwrap_or(0);
        if classes == 0 {
            return Err(ModelError::Invalid("leaves carry no class probabilities".to_string()));
        }
        for leaf in &self.leaves {
            if leaf.len() != classes {
                return Err(ModelError::Invalid("leaves disagree on class count".to_string()));
            }
            if leaf.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(ModelError::Invalid("leaf probability out of range".to_string()));
            }
        }
        Ok(classes)
    }
}

impl ProbabilityModel for IntervalTree {
    fn class_probabilities(&self, packet_count: u64) -> Vec<f64> {
        self.leaves[Self::leaf_index(&self.splits, packet_count)].clone()
    }
}

/// Averaged ensemble of interval trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forest {
    pub trees: Vec<IntervalTree>,
}

impl ProbabilityModel for Forest {
    fn class_probabilities(&self, packet_count: u64) -> Vec<f64> {
        let mut sum: Vec<f64> = Vec::new();
        for tree in &self.trees {
            let probs = tree.class_probabilities(packet_count);
            if sum.is_empty() {
                sum = probs;
            } else {
                sum.iter_mut().zip(probs).for_each(|(acc, p)| *acc += p);
            }
        }
        let n = self.trees.len().max(1) as f64;
        sum.into_iter().map(|p| p / n).collect()
    }
}

/// Logistic curve over packet count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logistic {
    pub weight: f64,
    pub bias: f64,
}

impl PairModel for Logistic {
    fn probability_pair(&self, packet_count: u64) -> (f64, f64) {
        let z = self.weight * packet_count as f64 + self.bias;
        let attack = 1.0 / (1.0 + (-z).exp());
        (1.0 - attack, attack)
    }
}

/// On-disk model document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelDocument {
    DecisionTree(IntervalTree),
    RandomForest(Forest),
    Logistic(Logistic),
    /// Hard labels only; carries no scoring capability
    LabelTree { splits: Vec<f64>, labels: Vec<u8> },
}

fn validate_splits(splits: &[f64], leaves: usize) -> Result<(), ModelError> {
    if leaves != splits.len() + 1 {
        return Err(ModelError::Invalid(format!(
            "{} splits need {} leaves, found {}",
            splits.len(),
            splits.len() + 1,
            leaves
        )));
    }
    if splits.iter().any(|s| !s.is_finite()) || splits.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ModelError::Invalid("splits must be finite and strictly ascending".to_string()));
    }
    Ok(())
}

impl ModelDocument {
    /// Validate the document and expose its scoring capability
    pub fn into_scorer(self) -> Result<Scorer, ModelError> {
        match self {
            ModelDocument::DecisionTree(tree) => {
                tree.validate()?;
                Ok(Scorer::Probabilistic(Box::new(tree)))
            }
            ModelDocument::RandomForest(forest) => {
                if forest.trees.is_empty() {
                    return Err(ModelError::Invalid("forest has no trees".to_string()));
                }
                let mut classes = None;
                for tree in &forest.trees {
                    let n = tree.validate()?;
                    if classes.replace(n).map_or(false, |prev| prev != n) {
                        return Err(ModelError::Invalid("trees disagree on class count".to_string()));
                    }
                }
                Ok(Scorer::Probabilistic(Box::new(forest)))
            }
            ModelDocument::Logistic(model) => {
                if !model.weight.is_finite() || !model.bias.is_finite() {
                    return Err(ModelError::Invalid("logistic coefficients must be finite".to_string()));
                }
                Ok(Scorer::Raw(Box::new(model)))
            }
            ModelDocument::LabelTree { splits, labels } => {
                validate_splits(&splits, labels.len())?;
                Ok(Scorer::Unavailable)
            }
        }
    }
}

/// Load a model document from `path`
pub fn load_model(path: impl AsRef<Path>) -> Result<Scorer, ModelError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ModelError::NotFound(path.to_path_buf())
        } else {
            ModelError::Io { path: path.to_path_buf(), source }
        }
    })?;
    let document: ModelDocument = serde_json::from_str(&raw)?;
    let scorer = document.into_scorer()?;
    info!("Loaded {} model from {}", scorer.describe(), path.display());
    Ok(scorer)
}
