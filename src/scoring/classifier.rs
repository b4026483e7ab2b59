//! Risk classifier adapter - ONNX Runtime integration
//!
//! Wraps the trained aggression model behind the `ProbabilityModel`
//! capability. The artifact pair (ONNX graph + JSON meta sidecar) is loaded
//! once at startup; a load or inference failure degrades scoring to a safe
//! default instead of blocking ingestion.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;

use super::features::{FeatureError, FeatureSet};

/// Scale denominators are floored to avoid division blow-ups
const MIN_SCALE: f32 = 1e-8;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model session error: {0}")]
    Session(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("model returned an empty distribution")]
    EmptyOutput,
}

/// The opaque scoring capability: feature vector in, probability
/// distribution over risk classes out.
pub trait ProbabilityModel: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<Vec<f32>, ModelError>;
}

/// Standard-scaling parameters fitted at training time
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl ScalerParams {
    pub fn transform(&self, features: &[f32]) -> Vec<f32> {
        features
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let mean = self.mean.get(i).copied().unwrap_or(0.0);
                let scale = self.scale.get(i).copied().unwrap_or(1.0).max(MIN_SCALE);
                (x - mean) / scale
            })
            .collect()
    }
}

/// Meta sidecar shipped next to the ONNX graph
#[derive(Debug, Clone, Deserialize)]
pub struct ModelMeta {
    pub feature_names: Vec<String>,
    pub scaler: ScalerParams,
    pub labels: Vec<String>,
}

impl ModelMeta {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading model meta {}", path))?;
        let meta: ModelMeta = serde_json::from_str(&raw)
            .with_context(|| format!("parsing model meta {}", path))?;
        Ok(meta)
    }
}

/// Output of one scoring call
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub class_index: usize,
    pub label: String,
    pub probability: f32,
}

impl ScoreResult {
    /// Returned whenever the model is unavailable or misbehaves
    pub fn safe_default() -> Self {
        Self {
            class_index: 0,
            label: "CALM".to_string(),
            probability: 0.1,
        }
    }
}

/// ONNX-backed probability model
pub struct OnnxModel {
    session: Mutex<Session>,
    output_names: Vec<String>,
}

impl OnnxModel {
    pub fn load(path: &str) -> Result<Self, ModelError> {
        if !Path::new(path).exists() {
            return Err(ModelError::Session(format!("model not found: {}", path)));
        }

        let session = Session::builder()
            .map_err(|e| ModelError::Session(format!("session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Session(format!("optimization level: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| ModelError::Session(format!("loading model: {}", e)))?;

        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect::<Vec<_>>();
        if output_names.is_empty() {
            return Err(ModelError::Session("model has no outputs".to_string()));
        }

        Ok(Self {
            session: Mutex::new(session),
            output_names,
        })
    }

}

impl ProbabilityModel for OnnxModel {
    fn predict(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        let input = Array2::<f32>::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| ModelError::Inference(format!("input shape: {}", e)))?;

        let tensor = Value::from_array(input)
            .map_err(|e| ModelError::Inference(format!("input tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ModelError::Inference(format!("run: {}", e)))?;

        let extract = |name: &str| -> Result<Vec<f32>, ModelError> {
            let output = outputs
                .get(name)
                .ok_or_else(|| ModelError::Inference(format!("missing output '{}'", name)))?;
            let tensor = output
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::Inference(format!("extracting '{}': {}", name, e)))?;
            Ok(tensor.1.to_vec())
        };

        // The distribution is the sole output, or the second of a
        // (labels, probabilities) pair. Some exports put a non-tensor label
        // sequence second instead, so fall back to the first output.
        let chosen = if self.output_names.len() == 1 { 0 } else { 1 };
        let probs = match extract(&self.output_names[chosen]) {
            Ok(p) => p,
            Err(_) if chosen != 0 => extract(&self.output_names[0])?,
            Err(e) => return Err(e),
        };

        if probs.is_empty() {
            return Err(ModelError::EmptyOutput);
        }
        Ok(probs)
    }
}

/// The risk classifier adapter: column ordering, scaling, invocation and
/// class-to-label mapping. Degrades instead of failing.
pub struct RiskClassifier {
    backend: Option<Backend>,
    scored: AtomicU64,
    degraded: AtomicU64,
}

struct Backend {
    model: Box<dyn ProbabilityModel>,
    meta: ModelMeta,
}

impl RiskClassifier {
    /// Load the artifact pair. Failure yields a degraded classifier that
    /// scores everything with the safe default; the process keeps serving.
    pub fn load(model_path: &str, meta_path: &str) -> Self {
        match Self::load_backend(model_path, meta_path) {
            Ok(backend) => {
                tracing::info!(
                    "Aggression model loaded: {} features, {} classes",
                    backend.meta.feature_names.len(),
                    backend.meta.labels.len()
                );
                Self::with_model(backend.model, backend.meta)
            }
            Err(e) => {
                tracing::warn!("Could not load aggression model, scoring degraded: {:#}", e);
                Self::degraded()
            }
        }
    }

    fn load_backend(model_path: &str, meta_path: &str) -> anyhow::Result<Backend> {
        let meta = ModelMeta::load(meta_path)?;
        let model = OnnxModel::load(model_path)
            .with_context(|| format!("loading ONNX model {}", model_path))?;
        Ok(Backend {
            model: Box::new(model),
            meta,
        })
    }

    pub fn with_model(model: Box<dyn ProbabilityModel>, meta: ModelMeta) -> Self {
        Self {
            backend: Some(Backend { model, meta }),
            scored: AtomicU64::new(0),
            degraded: AtomicU64::new(0),
        }
    }

    pub fn degraded() -> Self {
        Self {
            backend: None,
            scored: AtomicU64::new(0),
            degraded: AtomicU64::new(0),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.backend.is_some()
    }

    pub fn scored_count(&self) -> u64 {
        self.scored.load(Ordering::Relaxed)
    }

    pub fn degraded_count(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Score one feature set. Never fails: any model problem yields the safe
    /// default and bumps the degraded counter.
    pub fn score(&self, features: &FeatureSet) -> ScoreResult {
        self.scored.fetch_add(1, Ordering::Relaxed);

        let Some(backend) = &self.backend else {
            return self.fall_back("model not loaded");
        };

        match Self::try_score(backend, features) {
            Ok(result) => result,
            Err(e) => self.fall_back(&e.to_string()),
        }
    }

    fn try_score(backend: &Backend, features: &FeatureSet) -> Result<ScoreResult, ModelError> {
        let raw = features.vector(&backend.meta.feature_names)?;
        let scaled = backend.meta.scaler.transform(&raw);
        let probs = backend.model.predict(&scaled)?;

        if probs.is_empty() {
            return Err(ModelError::EmptyOutput);
        }

        // First maximum wins, so ties break toward the lower class index
        let mut class_index = 0usize;
        let mut probability = probs[0];
        for (i, &p) in probs.iter().enumerate().skip(1) {
            if p > probability {
                class_index = i;
                probability = p;
            }
        }

        let label = backend
            .meta
            .labels
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| class_index.to_string());

        Ok(ScoreResult {
            class_index,
            label,
            probability: probability.clamp(0.0, 1.0),
        })
    }

    fn fall_back(&self, reason: &str) -> ScoreResult {
        self.degraded.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Scoring degraded to safe default: {}", reason);
        ScoreResult::safe_default()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Deterministic stand-in for the ONNX backend
    pub struct StubModel {
        pub probs: Vec<f32>,
    }

    impl ProbabilityModel for StubModel {
        fn predict(&self, _features: &[f32]) -> Result<Vec<f32>, ModelError> {
            Ok(self.probs.clone())
        }
    }

    /// Returns the scaled input as the distribution, exposing the scaling
    pub struct EchoModel;

    impl ProbabilityModel for EchoModel {
        fn predict(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
            Ok(features.to_vec())
        }
    }

    pub struct FailingModel;

    impl ProbabilityModel for FailingModel {
        fn predict(&self, _features: &[f32]) -> Result<Vec<f32>, ModelError> {
            Err(ModelError::Inference("backend unavailable".to_string()))
        }
    }

    pub fn meta(feature_names: &[&str]) -> ModelMeta {
        let n = feature_names.len();
        ModelMeta {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            scaler: ScalerParams {
                mean: vec![0.0; n],
                scale: vec![1.0; n],
            },
            labels: vec![
                "CALM".to_string(),
                "ALERT".to_string(),
                "AGITATED".to_string(),
                "AGGRESSIVE".to_string(),
                "DANGEROUS".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::reading::CreateReading;
    use crate::scoring::features::{build_features, SubjectProfile};
    use uuid::Uuid;

    fn features() -> FeatureSet {
        let reading = CreateReading {
            dog_id: Uuid::new_v4(),
            heart_rate_bpm: 170.0,
            hrv_rmssd: None,
            body_temperature: 39.8,
            stress_cortisol: None,
            body_posture: None,
            tail_position: None,
            ear_position: None,
            vocalization_type: None,
            time_of_day: None,
            human_proximity_meters: None,
            other_dogs_nearby: None,
            gps_latitude: None,
            gps_longitude: None,
            gps_accuracy: None,
        };
        build_features(&reading, &SubjectProfile::default())
    }

    #[test]
    fn test_selects_class_with_highest_probability() {
        let clf = RiskClassifier::with_model(
            Box::new(StubModel {
                probs: vec![0.05, 0.1, 0.15, 0.65, 0.05],
            }),
            meta(&["heart_rate_bpm"]),
        );
        let result = clf.score(&features());
        assert_eq!(result.class_index, 3);
        assert_eq!(result.label, "AGGRESSIVE");
        assert!((result.probability - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_tie_breaks_toward_lowest_class_index() {
        let clf = RiskClassifier::with_model(
            Box::new(StubModel {
                probs: vec![0.4, 0.4, 0.2],
            }),
            meta(&["heart_rate_bpm"]),
        );
        assert_eq!(clf.score(&features()).class_index, 0);
    }

    #[test]
    fn test_unknown_class_index_labels_as_stringified_index() {
        let clf = RiskClassifier::with_model(
            Box::new(StubModel {
                probs: vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            }),
            meta(&["heart_rate_bpm"]),
        );
        let result = clf.score(&features());
        assert_eq!(result.class_index, 6);
        assert_eq!(result.label, "6");
    }

    #[test]
    fn test_probability_clamped_to_unit_interval() {
        let clf = RiskClassifier::with_model(
            Box::new(StubModel { probs: vec![1.7] }),
            meta(&["heart_rate_bpm"]),
        );
        assert_eq!(clf.score(&features()).probability, 1.0);
    }

    #[test]
    fn test_standard_scaling_applied_before_invocation() {
        let mut m = meta(&["heart_rate_bpm"]);
        m.scaler.mean = vec![85.0];
        m.scaler.scale = vec![170.0];

        let clf = RiskClassifier::with_model(Box::new(EchoModel), m);
        let result = clf.score(&features());

        // (170 - 85) / 170 = 0.5 reaches the model unchanged
        assert_eq!(result.class_index, 0);
        assert!((result.probability - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scaler_transform_is_column_wise() {
        let params = ScalerParams {
            mean: vec![85.0, 38.8],
            scale: vec![85.0, 2.0],
        };
        let out = params.transform(&[170.0, 39.8]);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_degraded_classifier_returns_safe_default() {
        let clf = RiskClassifier::degraded();
        let result = clf.score(&features());
        assert_eq!(result, ScoreResult::safe_default());
        assert_eq!(result.label, "CALM");
        assert!((result.probability - 0.1).abs() < 1e-6);
        assert_eq!(clf.degraded_count(), 1);
        assert_eq!(clf.scored_count(), 1);
    }

    #[test]
    fn test_inference_failure_falls_back_to_safe_default() {
        let clf = RiskClassifier::with_model(Box::new(FailingModel), meta(&["heart_rate_bpm"]));
        assert_eq!(clf.score(&features()), ScoreResult::safe_default());
        assert_eq!(clf.degraded_count(), 1);
    }

    #[test]
    fn test_artifact_feature_mismatch_falls_back() {
        let clf = RiskClassifier::with_model(
            Box::new(StubModel { probs: vec![1.0] }),
            meta(&["not_a_feature"]),
        );
        assert_eq!(clf.score(&features()), ScoreResult::safe_default());
        assert_eq!(clf.degraded_count(), 1);
    }

    #[test]
    fn test_scaler_floors_tiny_scales() {
        let params = ScalerParams {
            mean: vec![0.0],
            scale: vec![0.0],
        };
        let out = params.transform(&[1.0]);
        assert!(out[0].is_finite());
    }
}
