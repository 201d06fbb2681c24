use serde::{Deserialize, Serialize};

use crate::geodesy::LatLon;

/// Location fix as delivered by the platform location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius (m), >= 0
    pub accuracy_m: f32,
    /// When the fix was taken (ms)
    pub capture_time_ms: i64,
    /// When the fix reached us (ms)
    pub receipt_time_ms: i64,
}

impl RawSample {
    pub fn new(
        latitude: f64,
        longitude: f64,
        accuracy_m: f32,
        capture_time_ms: i64,
        receipt_time_ms: i64,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            capture_time_ms,
            receipt_time_ms,
        }
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }

    /// Capture time truncated to whole seconds
    pub fn capture_time_s(&self) -> i64 {
        self.capture_time_ms / 1000
    }
}

/// Fix that passed admission, ready for batching
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdmittedSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f32,
    pub created_time_s: i64,
    pub speed_kmph: f32,
}

impl AdmittedSample {
    pub fn from_raw(raw: &RawSample, speed_kmph: f32) -> Self {
        Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            accuracy_m: raw.accuracy_m,
            created_time_s: raw.capture_time_s(),
            speed_kmph,
        }
    }
}
