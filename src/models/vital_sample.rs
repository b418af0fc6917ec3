use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured vital signs pulled out of one assistant reply.
///
/// Every field is independently optional — absence means the reply did
/// not mention that signal, not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    pub heart_rate: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub spo2: Option<f64>,
    pub temperature: Option<f64>,
}

impl VitalReading {
    /// True when no signal matched at all.
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none()
            && self.systolic.is_none()
            && self.diastolic.is_none()
            && self.respiratory_rate.is_none()
            && self.spo2.is_none()
            && self.temperature.is_none()
    }
}

/// A persisted [`VitalReading`] tied to an assistant thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalSample {
    pub id: Uuid,
    pub thread_id: String,
    #[serde(flatten)]
    pub reading: VitalReading,
    pub recorded_at: NaiveDateTime,
}

/// An extracted performance score for one learner on one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: Uuid,
    pub scenario_ref: String,
    pub user_id: Uuid,
    /// Normalized to a 0–100 scale.
    pub score: f64,
    /// The full assistant feedback text the score was read from.
    pub raw_feedback: String,
    pub recorded_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reading_is_empty() {
        assert!(VitalReading::default().is_empty());
    }

    #[test]
    fn single_field_makes_reading_non_empty() {
        let reading = VitalReading {
            spo2: Some(97.0),
            ..Default::default()
        };
        assert!(!reading.is_empty());
    }
}
