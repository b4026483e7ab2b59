//! Intervention policy
//!
//! Maps a (probability, class index) pair to a graduated ultrasonic
//! deterrent. CRITICAL and HIGH trigger on probability alone; MEDIUM
//! triggers on class alone. The asymmetry is intentional and must not be
//! "fixed" without flagging it as a behavioral change.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Class index at and above which the class-based MEDIUM rule fires
/// (AGITATED or above)
const MEDIUM_CLASS_FLOOR: usize = 2;

/// Intervention severity tiers, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionTier {
    Low,
    Medium,
    High,
    Critical,
}

impl InterventionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// LOW carries no physical action and produces no intervention record
    pub fn is_actionable(&self) -> bool {
        *self > Self::Low
    }

    /// HIGH and CRITICAL alerts are broadcast to every connected observer
    pub fn is_escalation(&self) -> bool {
        *self >= Self::High
    }
}

impl fmt::Display for InterventionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterrent parameters for one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterventionPlan {
    pub tier: InterventionTier,
    pub ultrasonic_frequency_hz: u32,
    pub duration_seconds: u32,
}

/// Threshold table, first match wins. Probability comparisons are strict.
pub fn decide(probability: f32, class_index: usize) -> InterventionPlan {
    if probability > 0.8 {
        InterventionPlan {
            tier: InterventionTier::Critical,
            ultrasonic_frequency_hz: 22_000,
            duration_seconds: 5,
        }
    } else if probability > 0.6 {
        InterventionPlan {
            tier: InterventionTier::High,
            ultrasonic_frequency_hz: 20_000,
            duration_seconds: 3,
        }
    } else if class_index >= MEDIUM_CLASS_FLOOR {
        InterventionPlan {
            tier: InterventionTier::Medium,
            ultrasonic_frequency_hz: 18_000,
            duration_seconds: 2,
        }
    } else {
        InterventionPlan {
            tier: InterventionTier::Low,
            ultrasonic_frequency_hz: 0,
            duration_seconds: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_on_high_probability() {
        let plan = decide(0.85, 3);
        assert_eq!(plan.tier, InterventionTier::Critical);
        assert_eq!(plan.ultrasonic_frequency_hz, 22_000);
        assert_eq!(plan.duration_seconds, 5);
    }

    #[test]
    fn test_high_on_moderate_probability_regardless_of_class() {
        let plan = decide(0.7, 0);
        assert_eq!(plan.tier, InterventionTier::High);
        assert_eq!(plan.ultrasonic_frequency_hz, 20_000);
        assert_eq!(plan.duration_seconds, 3);
    }

    #[test]
    fn test_medium_on_class_regardless_of_probability() {
        let plan = decide(0.4, 2);
        assert_eq!(plan.tier, InterventionTier::Medium);
        assert_eq!(plan.ultrasonic_frequency_hz, 18_000);
        assert_eq!(plan.duration_seconds, 2);
    }

    #[test]
    fn test_low_otherwise() {
        let plan = decide(0.3, 0);
        assert_eq!(plan.tier, InterventionTier::Low);
        assert_eq!(plan.ultrasonic_frequency_hz, 0);
        assert_eq!(plan.duration_seconds, 0);
        assert!(!plan.tier.is_actionable());
    }

    #[test]
    fn test_boundaries_are_strict() {
        // Exactly 0.8 is HIGH, not CRITICAL
        assert_eq!(decide(0.8, 4).tier, InterventionTier::High);
        // Exactly 0.6 falls through to the class rule
        assert_eq!(decide(0.6, 2).tier, InterventionTier::Medium);
        assert_eq!(decide(0.6, 1).tier, InterventionTier::Low);
    }

    #[test]
    fn test_table_is_total() {
        for class_index in 0..=6 {
            for p in [0.0, 0.1, 0.5, 0.6, 0.61, 0.8, 0.81, 1.0] {
                let plan = decide(p, class_index);
                let actionable = plan.tier.is_actionable();
                assert_eq!(actionable, plan.ultrasonic_frequency_hz > 0);
                assert_eq!(actionable, plan.duration_seconds > 0);
            }
        }
    }

    #[test]
    fn test_tier_ordering() {
        assert!(InterventionTier::Critical > InterventionTier::High);
        assert!(InterventionTier::High.is_escalation());
        assert!(InterventionTier::Critical.is_escalation());
        assert!(!InterventionTier::Medium.is_escalation());
        assert!(InterventionTier::Medium.is_actionable());
    }
}
