//! Linear classification pipeline loaded from a JSON artifact.
//!
//! The artifact holds a standard scaler (per-feature mean and scale) followed
//! by a multinomial linear classifier (one coefficient row and intercept per
//! class). Prediction is the class with the highest decision score; ties go to
//! the earlier class.

use std::{collections::HashSet, fs, path::Path};

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use super::scorer::{ScoreError, Scorer};
use crate::models::StressLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub feature_names: Vec<String>,
    pub scaler: ScalerParams,
    pub classes: Vec<u8>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinearPipeline {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    classes: Vec<u8>,
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl LinearPipeline {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline artifact {}", path.display()))?;
        let pipeline = Self::from_json_str(&contents)
            .with_context(|| format!("invalid pipeline artifact {}", path.display()))?;

        info!(
            "Loaded scoring pipeline from {} ({} features, {} classes)",
            path.display(),
            pipeline.feature_names.len(),
            pipeline.classes.len()
        );
        Ok(pipeline)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let artifact: PipelineArtifact =
            serde_json::from_str(contents).context("failed to parse pipeline JSON")?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: PipelineArtifact) -> Result<Self> {
        let n_features = artifact.feature_names.len();
        let n_classes = artifact.classes.len();

        if n_features == 0 {
            bail!("pipeline declares no features");
        }
        let mut seen = HashSet::new();
        for name in &artifact.feature_names {
            if !seen.insert(name.as_str()) {
                bail!("feature '{name}' is declared twice");
            }
        }
        if artifact.scaler.mean.len() != n_features || artifact.scaler.scale.len() != n_features {
            bail!(
                "scaler has {} means and {} scales for {} features",
                artifact.scaler.mean.len(),
                artifact.scaler.scale.len(),
                n_features
            );
        }
        if n_classes < 2 {
            bail!("pipeline needs at least two classes, found {n_classes}");
        }
        let mut seen_classes = HashSet::new();
        for &class in &artifact.classes {
            if StressLevel::from_label(class).is_none() {
                bail!("class {class} is not a stress level label (expected 0, 1 or 2)");
            }
            if !seen_classes.insert(class) {
                bail!("class {class} is declared twice");
            }
        }
        if artifact.coefficients.len() != n_classes || artifact.intercepts.len() != n_classes {
            bail!(
                "expected {n_classes} coefficient rows and intercepts, found {} and {}",
                artifact.coefficients.len(),
                artifact.intercepts.len()
            );
        }
        if let Some(row) = artifact
            .coefficients
            .iter()
            .position(|row| row.len() != n_features)
        {
            bail!("coefficient row {row} does not have {n_features} entries");
        }

        let all_finite = artifact
            .scaler
            .mean
            .iter()
            .chain(&artifact.scaler.scale)
            .chain(artifact.coefficients.iter().flatten())
            .chain(&artifact.intercepts)
            .all(|value| value.is_finite());
        if !all_finite {
            bail!("pipeline parameters contain NaN or infinity");
        }

        // A zero scale means a constant feature during training; leave it unscaled.
        let scale = artifact
            .scaler
            .scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self {
            feature_names: artifact.feature_names,
            mean: artifact.scaler.mean,
            scale,
            classes: artifact.classes,
            coefficients: artifact.coefficients,
            intercepts: artifact.intercepts,
        })
    }

    /// `row_number` is 1-based and only used in rejection messages.
    fn predict_row(&self, row_number: usize, row: &[f64]) -> Result<u8, ScoreError> {
        let standardized: Vec<f64> = row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect();
        if standardized.iter().any(|z| !z.is_finite()) {
            return Err(ScoreError::Rejected(format!(
                "Row {row_number} has values too large to score"
            )));
        }

        // Parameters are finite (checked at load), so an overflow here comes from the row.
        let mut best: Option<(usize, f64)> = None;
        for (class_idx, (weights, intercept)) in
            self.coefficients.iter().zip(&self.intercepts).enumerate()
        {
            let score = weights
                .iter()
                .zip(&standardized)
                .map(|(w, z)| w * z)
                .sum::<f64>()
                + intercept;
            if !score.is_finite() {
                return Err(ScoreError::Rejected(format!(
                    "Row {row_number} has values too large to score"
                )));
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((class_idx, score)),
            }
        }

        best.map(|(idx, _)| self.classes[idx])
            .ok_or_else(|| ScoreError::Internal("pipeline has no classes".into()))
    }
}

impl Scorer for LinearPipeline {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<u8>, ScoreError> {
        let expected = self.feature_names.len();
        let mut labels = Vec::with_capacity(rows.len());

        for (idx, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(ScoreError::Rejected(format!(
                    "Row {} has {} features, but the model expects {}",
                    idx + 1,
                    row.len(),
                    expected
                )));
            }
            if row.iter().any(|value| !value.is_finite()) {
                return Err(ScoreError::Rejected(format!(
                    "Row {} contains NaN or infinity",
                    idx + 1
                )));
            }
            labels.push(self.predict_row(idx + 1, row)?);
        }

        Ok(labels)
    }
}
