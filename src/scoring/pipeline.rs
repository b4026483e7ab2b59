//! Scoring pipeline
//!
//! One ingest call: feature transform, classifier invocation, intervention
//! decision, then the side effects in their required order. The enriched
//! reading is persisted before any observer is notified, so a subscriber
//! querying storage right after a push sees the record it was told about.

use uuid::Uuid;

use crate::models::{
    CreateIntervention, CreateReading, Dog, Intervention, ReadingScore, RiskLevel, SensorReading,
};
use crate::realtime::registry::EventKind;
use crate::scoring::classifier::{RiskClassifier, ScoreResult};
use crate::scoring::features::{build_features, SubjectProfile};
use crate::scoring::policy::{self, InterventionPlan};
use crate::{AppError, AppResult, AppState};

/// Heart rate at or above this raises a health alert (bpm)
pub const HEALTH_ALERT_HR_BPM: f32 = 180.0;

/// Body temperature bounds outside which a health alert is raised (°C)
pub const HEALTH_ALERT_TEMP_HIGH_C: f32 = 40.5;
pub const HEALTH_ALERT_TEMP_LOW_C: f32 = 36.0;

/// Classifier output joined with the policy decision
#[derive(Debug, Clone)]
pub struct ScoredOutcome {
    pub score: ScoreResult,
    pub plan: InterventionPlan,
}

/// The synchronous part of the pipeline: transform, score, decide.
pub fn evaluate(
    classifier: &RiskClassifier,
    reading: &CreateReading,
    profile: &SubjectProfile,
) -> ScoredOutcome {
    let features = build_features(reading, profile);
    let score = classifier.score(&features);
    let plan = policy::decide(score.probability, score.class_index);
    ScoredOutcome { score, plan }
}

/// Score one validated reading and run its side effects: persist the
/// enriched reading, persist the intervention when triggered, refresh the
/// latest-reading cache, then notify observers.
pub async fn score_and_record(
    state: &AppState,
    collar_id: Uuid,
    payload: CreateReading,
) -> AppResult<SensorReading> {
    let dog = Dog::find_by_id(&state.pool, payload.dog_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Dog not found".to_string()))?;

    let outcome = evaluate(&state.classifier, &payload, &dog.profile());
    let tier = outcome.plan.tier;

    let reading = SensorReading::insert_scored(
        &state.pool,
        collar_id,
        &payload,
        ReadingScore {
            level: RiskLevel::from_index(outcome.score.class_index),
            probability: outcome.score.probability,
            intervention_required: tier.is_actionable(),
        },
    )
    .await?;

    let intervention = if tier.is_actionable() {
        let record = Intervention::create(
            &state.pool,
            CreateIntervention {
                dog_id: reading.dog_id,
                collar_id,
                reading_id: reading.id,
                intervention_type: tier.as_str().to_string(),
                ultrasonic_frequency: outcome.plan.ultrasonic_frequency_hz as i32,
                duration_seconds: outcome.plan.duration_seconds as i32,
                aggression_level: RiskLevel::from_index(outcome.score.class_index),
                confidence: outcome.score.probability,
            },
        )
        .await?;

        tracing::info!(
            "Intervention triggered for dog {}: {} ({} Hz, {} s, p={:.2})",
            reading.dog_id,
            tier,
            record.ultrasonic_frequency.unwrap_or(0),
            record.duration_seconds.unwrap_or(0),
            outcome.score.probability,
        );
        Some(record)
    } else {
        None
    };

    let event_payload = reading.to_event_payload(tier);
    state.latest.put(reading.dog_id, event_payload.clone());

    state
        .realtime
        .send_to_subscribers(reading.dog_id, EventKind::SensorUpdate, event_payload);

    if let Some(intervention) = &intervention {
        let data = serde_json::to_value(intervention)
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        state
            .realtime
            .send_intervention_alert(reading.dog_id, tier, data);
    }

    let reasons = health_alert_reasons(&payload);
    if !reasons.is_empty() {
        let data = serde_json::json!({
            "dog_name": dog.name,
            "heart_rate_bpm": payload.heart_rate_bpm,
            "body_temperature": payload.body_temperature,
            "reasons": reasons,
        });
        state
            .realtime
            .send_to_subscribers(reading.dog_id, EventKind::HealthAlert, data);
    }

    Ok(reading)
}

/// Vitals checks backing the health_alert push and the dashboard alert list
pub fn health_alert_reasons(reading: &CreateReading) -> Vec<String> {
    let mut reasons = Vec::new();
    if reading.heart_rate_bpm >= HEALTH_ALERT_HR_BPM {
        reasons.push(format!("heart rate {:.0} bpm", reading.heart_rate_bpm));
    }
    if reading.body_temperature >= HEALTH_ALERT_TEMP_HIGH_C {
        reasons.push(format!("body temperature {:.1} °C", reading.body_temperature));
    } else if reading.body_temperature <= HEALTH_ALERT_TEMP_LOW_C {
        reasons.push(format!("body temperature {:.1} °C", reading.body_temperature));
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reading::{BodyPosture, EarPosition, TailPosition, Vocalization};
    use crate::scoring::classifier::test_support::{meta, StubModel};
    use crate::scoring::policy::InterventionTier;

    fn reading() -> CreateReading {
        CreateReading {
            dog_id: Uuid::new_v4(),
            heart_rate_bpm: 120.0,
            hrv_rmssd: Some(30.0),
            body_temperature: 39.0,
            stress_cortisol: None,
            body_posture: Some(BodyPosture::Alert),
            tail_position: Some(TailPosition::Up),
            ear_position: Some(EarPosition::Alert),
            vocalization_type: Some(Vocalization::Barking),
            time_of_day: None,
            human_proximity_meters: Some(10.0),
            other_dogs_nearby: Some(2),
            gps_latitude: None,
            gps_longitude: None,
            gps_accuracy: None,
        }
    }

    fn classifier_with(probs: Vec<f32>) -> RiskClassifier {
        RiskClassifier::with_model(
            Box::new(StubModel { probs }),
            meta(&["heart_rate_bpm", "body_temperature"]),
        )
    }

    #[test]
    fn test_aggressive_class_with_high_probability_is_critical() {
        let clf = classifier_with(vec![0.02, 0.03, 0.05, 0.85, 0.05]);
        let outcome = evaluate(&clf, &reading(), &SubjectProfile::default());

        assert_eq!(outcome.score.class_index, 3);
        assert_eq!(outcome.score.label, "AGGRESSIVE");
        assert_eq!(outcome.plan.tier, InterventionTier::Critical);
        assert_eq!(outcome.plan.ultrasonic_frequency_hz, 22_000);
        assert_eq!(outcome.plan.duration_seconds, 5);
    }

    #[test]
    fn test_calm_low_probability_requires_no_intervention() {
        let clf = classifier_with(vec![0.3, 0.25, 0.2, 0.15, 0.1]);
        let outcome = evaluate(&clf, &reading(), &SubjectProfile::default());

        assert_eq!(outcome.score.class_index, 0);
        assert_eq!(outcome.plan.tier, InterventionTier::Low);
        assert!(!outcome.plan.tier.is_actionable());
    }

    #[test]
    fn test_agitated_class_fires_medium_despite_low_probability() {
        let clf = classifier_with(vec![0.2, 0.2, 0.4, 0.1, 0.1]);
        let outcome = evaluate(&clf, &reading(), &SubjectProfile::default());

        assert_eq!(outcome.score.class_index, 2);
        assert_eq!(outcome.plan.tier, InterventionTier::Medium);
        assert_eq!(outcome.plan.ultrasonic_frequency_hz, 18_000);
        assert_eq!(outcome.plan.duration_seconds, 2);
    }

    #[test]
    fn test_degraded_classifier_still_yields_a_definite_outcome() {
        let clf = RiskClassifier::degraded();
        let outcome = evaluate(&clf, &reading(), &SubjectProfile::default());

        assert_eq!(outcome.score.class_index, 0);
        assert_eq!(outcome.score.label, "CALM");
        assert!((outcome.score.probability - 0.1).abs() < 1e-6);
        assert_eq!(outcome.plan.tier, InterventionTier::Low);
    }

    #[test]
    fn test_health_alert_reasons() {
        let mut r = reading();
        assert!(health_alert_reasons(&r).is_empty());

        r.heart_rate_bpm = 185.0;
        assert_eq!(health_alert_reasons(&r).len(), 1);

        r.body_temperature = 41.0;
        assert_eq!(health_alert_reasons(&r).len(), 2);

        r.heart_rate_bpm = 120.0;
        r.body_temperature = 35.5;
        let reasons = health_alert_reasons(&r);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("35.5"));
    }
}
