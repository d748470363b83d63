use serde::{Deserialize, Serialize};

/// A fix as delivered by the platform location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: Option<f64>,
    /// Meters per second
    pub speed: Option<f64>,
    /// Degrees from true north
    pub heading: Option<f64>,
    /// Fix time, Unix milliseconds
    pub timestamp: i64,
}

/// A captured sample. Never mutated after capture; the queue stores a stamped copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub timestamp: i64,
    /// When the sample entered the persisted queue, Unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<i64>,
}

impl LocationSample {
    pub fn stamped(self, processed_at: i64) -> Self {
        Self {
            processed_at: Some(processed_at),
            ..self
        }
    }
}

impl From<RawSample> for LocationSample {
    fn from(raw: RawSample) -> Self {
        Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            accuracy: raw.accuracy,
            speed: raw.speed,
            heading: raw.heading,
            timestamp: raw.timestamp,
            processed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamped_keeps_fix() {
        let raw = RawSample {
            latitude: 52.37,
            longitude: 4.89,
            accuracy: Some(5.0),
            speed: Some(8.3),
            heading: None,
            timestamp: 1_700_000_000_000,
        };
        let sample = LocationSample::from(raw);
        assert_eq!(sample.processed_at, None);

        let stamped = sample.stamped(1_700_000_000_250);
        assert_eq!(stamped.processed_at, Some(1_700_000_000_250));
        assert_eq!(stamped.latitude, raw.latitude);
        assert_eq!(stamped.timestamp, raw.timestamp);
    }

    #[test]
    fn test_unstamped_sample_omits_processed_at() {
        let sample = LocationSample {
            latitude: 0.0,
            longitude: 0.0,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp: 1,
            processed_at: None,
        };
        let json = serde_json::to_value(sample).unwrap();
        assert!(json.get("processed_at").is_none());
    }
}
