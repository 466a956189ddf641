//! ML Models
//!
//! The classifier is a replaceable capability behind [`Classifier`]. The
//! bundled implementation is a bagged ensemble of `linfa-trees` decision
//! trees, bootstrapped from synthetic data when nothing is persisted.

use crate::{config::ForestConfig, features::MODEL_FEATURE_COUNT, Result, SafetyError};
use chrono::{DateTime, Utc};
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Exp, Normal, Poisson};
use std::path::{Path, PathBuf};

/// Risk classes: safe, caution, danger
pub const NUM_CLASSES: usize = 3;

/// Persisted classifier artifact name
pub const MODEL_FILE: &str = "safety_model.json";
/// Persisted scaler artifact name
pub const SCALER_FILE: &str = "safety_scaler.json";

/// Trained classifier contract
pub trait Classifier: Send + Sync {
    /// Expected input width
    fn n_features(&self) -> usize;

    /// Per-class probabilities, one row per input row
    fn predict_proba(&self, records: &Array2<f64>) -> Result<Array2<f64>>;

    /// Class per input row. Defaults to the most probable class.
    fn predict(&self, records: &Array2<f64>) -> Result<Array1<usize>> {
        let proba = self.predict_proba(records)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| argmax(row.iter().copied()))
            .collect())
    }

    /// When the classifier was fitted, if known
    fn trained_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

fn check_width(records: &Array2<f64>, expected: usize) -> Result<()> {
    if records.ncols() != expected {
        return Err(SafetyError::ShapeMismatch {
            expected,
            found: records.ncols(),
        });
    }
    Ok(())
}

/// Per-feature mean/variance normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Build from explicit parameters
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(SafetyError::ShapeMismatch {
                expected: mean.len(),
                found: scale.len(),
            });
        }
        if scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(SafetyError::Numeric("scaler scale must be finite and non-zero".into()));
        }
        Ok(Self { mean, scale })
    }

    /// Fit on training records. Constant columns get a scale of 1.
    pub fn fit(records: &Array2<f64>) -> Result<Self> {
        if records.nrows() == 0 {
            return Err(SafetyError::NotFitted);
        }
        let mean = records
            .mean_axis(Axis(0))
            .ok_or(SafetyError::NotFitted)?
            .to_vec();
        let scale = records
            .std_axis(Axis(0), 0.0)
            .iter()
            .map(|&s| if s > f64::EPSILON { s } else { 1.0 })
            .collect();
        Self::new(mean, scale)
    }

    /// Width the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Normalize records column-wise
    pub fn transform(&self, records: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(records, self.n_features())?;
        let mut out = records.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, scale) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|x| (x - mean) / scale);
        }
        if out.iter().any(|x| !x.is_finite()) {
            return Err(SafetyError::Numeric("non-finite value after scaling".into()));
        }
        Ok(out)
    }
}

/// Bagged decision-tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestClassifier {
    trees: Vec<DecisionTree<f64, usize>>,
    n_features: usize,
    trained_at: DateTime<Utc>,
}

impl ForestClassifier {
    /// Fit `config.n_estimators` trees on bootstrap resamples
    pub fn fit(records: &Array2<f64>, targets: &Array1<usize>, config: &ForestConfig) -> Result<Self> {
        let n = records.nrows();
        if n == 0 || n != targets.len() {
            return Err(SafetyError::ShapeMismatch {
                expected: n,
                found: targets.len(),
            });
        }
        if config.n_estimators == 0 {
            return Err(SafetyError::Model("n_estimators must be positive".into()));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut trees: Vec<DecisionTree<f64, usize>> = Vec::with_capacity(config.n_estimators);

        for _ in 0..config.n_estimators {
            let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let dataset = Dataset::new(
                records.select(Axis(0), &indices),
                targets.select(Axis(0), &indices),
            );
            let tree = DecisionTree::params()
                .max_depth(Some(config.max_depth))
                .fit(&dataset)
                .map_err(|e| SafetyError::Model(e.to_string()))?;
            trees.push(tree);
        }

        tracing::info!(
            trees = trees.len(),
            samples = n,
            max_depth = config.max_depth,
            "forest fitted"
        );

        Ok(Self {
            trees,
            n_features: records.ncols(),
            trained_at: Utc::now(),
        })
    }

    /// Trees in the ensemble
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for ForestClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, records: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(records, self.n_features)?;
        if self.trees.is_empty() {
            return Err(SafetyError::NotFitted);
        }

        let mut votes = Array2::<f64>::zeros((records.nrows(), NUM_CLASSES));
        for tree in &self.trees {
            let predicted: Array1<usize> = tree.predict(records);
            for (row, &class) in predicted.iter().enumerate() {
                votes[[row, class.min(NUM_CLASSES - 1)]] += 1.0;
            }
        }
        votes /= self.trees.len() as f64;
        Ok(votes)
    }

    fn trained_at(&self) -> Option<DateTime<Utc>> {
        Some(self.trained_at)
    }
}

/// Classifier and scaler, always held together
pub struct TrainedModel {
    classifier: Box<dyn Classifier>,
    scaler: StandardScaler,
}

impl TrainedModel {
    /// Pair a classifier with the scaler it was trained behind
    pub fn new(classifier: Box<dyn Classifier>, scaler: StandardScaler) -> Self {
        Self { classifier, scaler }
    }

    /// Underlying classifier
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Feature scaler
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("n_features", &self.classifier.n_features())
            .field("scaler", &self.scaler)
            .finish()
    }
}

/// Generate labelled synthetic training data.
///
/// Columns: screen time, app opens, hours since check-in, location changes.
pub fn generate_sample_data(n_samples: usize, seed: u64) -> Result<(Array2<f64>, Array1<usize>)> {
    let dist_err = |e: statrs::StatsError| SafetyError::Distribution(e.to_string());
    let screen_time = Normal::new(180.0, 60.0).map_err(dist_err)?;
    let app_opens = Poisson::new(20.0).map_err(dist_err)?;
    let checkin_gap = Exp::new(1.0 / 12.0).map_err(dist_err)?;
    let location_changes = Poisson::new(5.0).map_err(dist_err)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Array2::<f64>::zeros((n_samples, MODEL_FEATURE_COUNT));
    let mut targets = Array1::<usize>::zeros(n_samples);

    for i in 0..n_samples {
        let row = [
            screen_time.sample(&mut rng),
            app_opens.sample(&mut rng),
            checkin_gap.sample(&mut rng),
            location_changes.sample(&mut rng),
        ];
        targets[i] = synthetic_label(&row);
        for (j, v) in row.into_iter().enumerate() {
            records[[i, j]] = v;
        }
    }

    Ok((records, targets))
}

/// Label a synthetic row: 0 safe, 1 caution, 2 danger
pub fn synthetic_label(row: &[f64; MODEL_FEATURE_COUNT]) -> usize {
    let [screen_time, app_opens, checkin_gap, location_changes] = *row;
    let mut score = 0;
    if screen_time < 60.0 {
        score += 2;
    }
    if app_opens < 5.0 {
        score += 2;
    }
    if checkin_gap > 24.0 {
        score += 3;
    }
    if location_changes == 0.0 {
        score += 1;
    }
    match score {
        s if s < 2 => 0,
        s if s < 5 => 1,
        _ => 2,
    }
}

/// Synthesize a scaler + forest from generated data
pub fn synthesize(config: &ForestConfig) -> Result<(ForestClassifier, StandardScaler)> {
    let (records, targets) = generate_sample_data(config.sample_count, config.seed)?;
    let scaler = StandardScaler::fit(&records)?;
    let scaled = scaler.transform(&records)?;
    let forest = ForestClassifier::fit(&scaled, &targets, config)?;
    Ok((forest, scaler))
}

/// On-disk home of the classifier and scaler artifacts
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Classifier artifact path
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// Scaler artifact path
    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }

    /// Load both artifacts. `Ok(None)` unless both are present.
    pub fn load(&self) -> Result<Option<(ForestClassifier, StandardScaler)>> {
        let (model_path, scaler_path) = (self.model_path(), self.scaler_path());
        match (model_path.exists(), scaler_path.exists()) {
            (true, true) => {
                let forest: ForestClassifier = read_json(&model_path)?;
                let scaler: StandardScaler = read_json(&scaler_path)?;
                if forest.n_features() != scaler.n_features() {
                    return Err(SafetyError::ShapeMismatch {
                        expected: scaler.n_features(),
                        found: forest.n_features(),
                    });
                }
                Ok(Some((forest, scaler)))
            }
            (false, false) => Ok(None),
            _ => {
                tracing::warn!(
                    "Only one model artifact present in {}, ignoring it",
                    self.dir.display()
                );
                Ok(None)
            }
        }
    }

    /// Persist both artifacts
    pub fn save(&self, forest: &ForestClassifier, scaler: &StandardScaler) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.model_path(), serde_json::to_vec(forest)?)?;
        std::fs::write(self.scaler_path(), serde_json::to_vec(scaler)?)?;
        tracing::info!("Model artifacts saved to {}", self.dir.display());
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}
