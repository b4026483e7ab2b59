//! Feature engineering for the aggression classifier
//!
//! Turns one validated telemetry payload plus the subject's static profile
//! into the named feature set the trained model was fitted on. Deterministic
//! and side-effect-free; the classifier adapter decides the column order.

use serde::Serialize;
use thiserror::Error;

use crate::models::reading::{CreateReading, Sex, Sterilization, TimeOfDay};

/// Resting heart rate the stress indicator centers on (bpm)
const RESTING_HEART_RATE_BPM: f32 = 85.0;

/// Canine resting body temperature (°C)
const RESTING_BODY_TEMPERATURE_C: f32 = 38.8;

/// A human closer than this counts as a proximity stressor (meters)
const CLOSE_HUMAN_DISTANCE_M: f32 = 5.0;

/// Encoding for "no human observed" when the proximity sensor reports nothing
const NO_HUMAN_DISTANCE_M: f32 = 100.0;

/// Amplified weight for the nocturnal risk flag
const NIGHT_RISK_WEIGHT: f32 = 3.0;

/// Below this age an unsterilized male scores the young-male flag
const YOUNG_AGE_YEARS: i32 = 3;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("unknown feature column '{0}'")]
    UnknownColumn(String),
}

/// Static subject attributes required by the transform
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectProfile {
    pub age_years: Option<i32>,
    pub sex: Option<Sex>,
    pub sterilization: Option<Sterilization>,
}

/// The complete named feature set for one reading.
///
/// Missing optional inputs encode as the neutral/zero value, except human
/// proximity where zero would mean "human at 0 m": absence encodes as
/// NO_HUMAN_DISTANCE_M so the proximity flag cannot fire.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSet {
    pub heart_rate_bpm: f32,
    pub hrv_rmssd: f32,
    pub body_temperature: f32,
    pub stress_cortisol: f32,
    pub body_posture: f32,
    pub tail_position: f32,
    pub ear_position: f32,
    pub vocalization_type: f32,
    pub time_of_day: f32,
    pub human_proximity_meters: f32,
    pub other_dogs_nearby: f32,
    pub age_years: f32,
    pub sex: f32,
    pub sterilization_status: f32,
    pub hr_stress_indicator: f32,
    pub night_risk: f32,
    pub close_human_stress: f32,
    pub pack_isolation: f32,
    pub young_male_risk: f32,
    pub behavioral_composite: f32,
    pub temp_deviation: f32,
}

impl FeatureSet {
    /// Look up one feature by the column name the model artifact uses
    pub fn value(&self, column: &str) -> Result<f32, FeatureError> {
        let v = match column {
            "heart_rate_bpm" => self.heart_rate_bpm,
            "hrv_rmssd" => self.hrv_rmssd,
            "body_temperature" => self.body_temperature,
            "stress_cortisol" => self.stress_cortisol,
            "body_posture" => self.body_posture,
            "tail_position" => self.tail_position,
            "ear_position" => self.ear_position,
            "vocalization_type" => self.vocalization_type,
            "time_of_day" => self.time_of_day,
            "human_proximity_meters" => self.human_proximity_meters,
            "other_dogs_nearby" => self.other_dogs_nearby,
            "age_years" => self.age_years,
            "sex" => self.sex,
            "sterilization_status" => self.sterilization_status,
            "hr_stress_indicator" => self.hr_stress_indicator,
            "night_risk" => self.night_risk,
            "close_human_stress" => self.close_human_stress,
            "pack_isolation" => self.pack_isolation,
            "young_male_risk" => self.young_male_risk,
            "behavioral_composite" => self.behavioral_composite,
            "temp_deviation" => self.temp_deviation,
            other => return Err(FeatureError::UnknownColumn(other.to_string())),
        };
        Ok(v)
    }

    /// Assemble the vector in the caller-specified column order
    pub fn vector(&self, columns: &[String]) -> Result<Vec<f32>, FeatureError> {
        columns.iter().map(|c| self.value(c)).collect()
    }
}

/// Compute the feature set for one reading
pub fn build_features(reading: &CreateReading, profile: &SubjectProfile) -> FeatureSet {
    let heart_rate = reading.heart_rate_bpm;
    let temperature = reading.body_temperature;

    let body_posture = reading.body_posture.map(|p| p as i16 as f32).unwrap_or(0.0);
    let tail_position = reading.tail_position.map(|p| p as i16 as f32).unwrap_or(0.0);
    let ear_position = reading.ear_position.map(|p| p as i16 as f32).unwrap_or(0.0);
    let vocalization = reading.vocalization_type.map(|v| v as i16 as f32).unwrap_or(0.0);
    let time_of_day = reading.time_of_day.map(|t| t as i16 as f32).unwrap_or(0.0);

    let proximity = reading.human_proximity_meters.unwrap_or(NO_HUMAN_DISTANCE_M);
    let dogs_nearby = reading.other_dogs_nearby.unwrap_or(0) as f32;

    let age = profile.age_years.map(|a| a as f32).unwrap_or(0.0);
    let sex = profile.sex.map(|s| s as i16 as f32).unwrap_or(0.0);
    let sterilized = profile.sterilization.map(|s| s as i16 as f32).unwrap_or(0.0);

    let night = reading.time_of_day == Some(TimeOfDay::Night);

    // The young-male flag needs all three attributes; any absence yields 0
    let young_male = profile.age_years.map_or(false, |a| a < YOUNG_AGE_YEARS)
        && profile.sex == Some(Sex::Male)
        && profile.sterilization == Some(Sterilization::NotSterilized);

    FeatureSet {
        heart_rate_bpm: heart_rate,
        hrv_rmssd: reading.hrv_rmssd.unwrap_or(0.0),
        body_temperature: temperature,
        stress_cortisol: reading.stress_cortisol.unwrap_or(0.0),
        body_posture,
        tail_position,
        ear_position,
        vocalization_type: vocalization,
        time_of_day,
        human_proximity_meters: proximity,
        other_dogs_nearby: dogs_nearby,
        age_years: age,
        sex,
        sterilization_status: sterilized,
        hr_stress_indicator: (heart_rate - RESTING_HEART_RATE_BPM) / RESTING_HEART_RATE_BPM,
        night_risk: if night { NIGHT_RISK_WEIGHT } else { 0.0 },
        close_human_stress: if proximity < CLOSE_HUMAN_DISTANCE_M { 1.0 } else { 0.0 },
        pack_isolation: if dogs_nearby == 0.0 { 1.0 } else { 0.0 },
        young_male_risk: if young_male { 1.0 } else { 0.0 },
        behavioral_composite: (body_posture + tail_position + ear_position + vocalization) / 4.0,
        temp_deviation: (temperature - RESTING_BODY_TEMPERATURE_C).abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reading::{BodyPosture, EarPosition, TailPosition, Vocalization};
    use uuid::Uuid;

    fn sample_reading() -> CreateReading {
        CreateReading {
            dog_id: Uuid::new_v4(),
            heart_rate_bpm: 110.0,
            hrv_rmssd: Some(42.0),
            body_temperature: 39.2,
            stress_cortisol: Some(15.0),
            body_posture: Some(BodyPosture::Tense),
            tail_position: Some(TailPosition::Stiff),
            ear_position: Some(EarPosition::Flattened),
            vocalization_type: Some(Vocalization::Growling),
            time_of_day: Some(TimeOfDay::Night),
            human_proximity_meters: Some(2.5),
            other_dogs_nearby: Some(0),
            gps_latitude: None,
            gps_longitude: None,
            gps_accuracy: None,
        }
    }

    fn young_male() -> SubjectProfile {
        SubjectProfile {
            age_years: Some(2),
            sex: Some(Sex::Male),
            sterilization: Some(Sterilization::NotSterilized),
        }
    }

    #[test]
    fn test_derived_signals() {
        let f = build_features(&sample_reading(), &young_male());

        assert!((f.hr_stress_indicator - (110.0 - 85.0) / 85.0).abs() < 1e-6);
        assert_eq!(f.night_risk, 3.0);
        assert_eq!(f.close_human_stress, 1.0);
        assert_eq!(f.pack_isolation, 1.0);
        assert_eq!(f.young_male_risk, 1.0);
        // TENSE(2) + STIFF(3) + FLATTENED(2) + GROWLING(3) = 10 / 4
        assert!((f.behavioral_composite - 2.5).abs() < 1e-6);
        assert!((f.temp_deviation - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_resting_heart_rate_is_neutral() {
        let mut reading = sample_reading();
        reading.heart_rate_bpm = 85.0;
        let f = build_features(&reading, &SubjectProfile::default());
        assert_eq!(f.hr_stress_indicator, 0.0);
    }

    #[test]
    fn test_deterministic() {
        let reading = sample_reading();
        let profile = young_male();
        let a = build_features(&reading, &profile);
        let b = build_features(&reading, &profile);
        assert_eq!(a.vector(&columns()).unwrap(), b.vector(&columns()).unwrap());
    }

    #[test]
    fn test_missing_optionals_fall_back_to_neutral() {
        let reading = CreateReading {
            dog_id: Uuid::new_v4(),
            heart_rate_bpm: 90.0,
            hrv_rmssd: None,
            body_temperature: 38.8,
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
        let f = build_features(&reading, &SubjectProfile::default());

        assert_eq!(f.behavioral_composite, 0.0);
        assert_eq!(f.night_risk, 0.0);
        // Absent proximity means "no human observed", not "human at 0 m"
        assert_eq!(f.human_proximity_meters, 100.0);
        assert_eq!(f.close_human_stress, 0.0);
        assert_eq!(f.pack_isolation, 1.0);
        assert_eq!(f.young_male_risk, 0.0);
        assert_eq!(f.temp_deviation, 0.0);
    }

    #[test]
    fn test_young_male_requires_all_attributes() {
        let reading = sample_reading();

        let missing_age = SubjectProfile {
            age_years: None,
            sex: Some(Sex::Male),
            sterilization: Some(Sterilization::NotSterilized),
        };
        assert_eq!(build_features(&reading, &missing_age).young_male_risk, 0.0);

        let sterilized = SubjectProfile {
            age_years: Some(2),
            sex: Some(Sex::Male),
            sterilization: Some(Sterilization::Sterilized),
        };
        assert_eq!(build_features(&reading, &sterilized).young_male_risk, 0.0);

        let female = SubjectProfile {
            age_years: Some(2),
            sex: Some(Sex::Female),
            sterilization: Some(Sterilization::NotSterilized),
        };
        assert_eq!(build_features(&reading, &female).young_male_risk, 0.0);
    }

    #[test]
    fn test_vector_respects_column_order() {
        let f = build_features(&sample_reading(), &young_male());
        let cols = vec!["body_temperature".to_string(), "heart_rate_bpm".to_string()];
        let v = f.vector(&cols).unwrap();
        assert_eq!(v, vec![39.2, 110.0]);
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let f = build_features(&sample_reading(), &young_male());
        let err = f.value("not_a_feature").unwrap_err();
        assert!(matches!(err, FeatureError::UnknownColumn(_)));
    }

    fn columns() -> Vec<String> {
        [
            "heart_rate_bpm",
            "body_temperature",
            "hr_stress_indicator",
            "night_risk",
            "behavioral_composite",
            "temp_deviation",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}
