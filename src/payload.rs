use serde::{Deserialize, Serialize};

use crate::sample::AdmittedSample;

/// Who the fixes belong to, stamped on every event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventContext {
    pub company_id: String,
    pub user_id: String,
    pub battery_level: String,
    /// Source tag the backend uses to tell tracking test traffic apart
    pub test_tracking: bool,
}

impl Default for EventContext {
    fn default() -> Self {
        Self {
            company_id: String::new(),
            user_id: String::new(),
            battery_level: String::new(),
            test_tracking: true,
        }
    }
}

/// GeoJSON-like point. Coordinates are `[lat, lon]`, in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [latitude, longitude],
        }
    }
}

/// One backend event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub company_id: String,
    pub user_id: String,
    /// Capture time (s since epoch)
    pub created: i64,
    pub location: GeoPoint,
    pub battery_level: String,
    pub accuracy: f32,
    pub speed: f32,
    #[serde(rename = "testTracking")]
    pub test_tracking: bool,
}

impl LocationEvent {
    pub fn from_sample(sample: &AdmittedSample, context: &EventContext) -> Self {
        Self {
            company_id: context.company_id.clone(),
            user_id: context.user_id.clone(),
            created: sample.created_time_s,
            location: GeoPoint::new(sample.latitude, sample.longitude),
            battery_level: context.battery_level.clone(),
            accuracy: sample.accuracy_m,
            speed: sample.speed_kmph,
            test_tracking: context.test_tracking,
        }
    }
}

/// Batch payload: `{"events": [...], "company_id": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<LocationEvent>,
    pub company_id: String,
}

impl EventBatch {
    pub fn from_samples<'a, I>(samples: I, context: &EventContext) -> Self
    where
        I: IntoIterator<Item = &'a AdmittedSample>,
    {
        EventBatch {
            events: samples
                .into_iter()
                .map(|sample| LocationEvent::from_sample(sample, context))
                .collect(),
            company_id: context.company_id.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Compact JSON body
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
