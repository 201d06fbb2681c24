use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::admission::AdmissionLimits;
use crate::error::{TrackerError, TrackerResult};
use crate::payload::EventContext;

/// Which stream, if any, the position filter runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    #[default]
    Off,
    /// Every received fix, before admission
    RawStream,
    /// Admitted fixes only; batches carry the smoothed coordinates
    AdmittedStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Position uncertainty growth (m/√s)
    pub process_noise_rate: f32,
    pub smoothing: SmoothingMode,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            process_noise_rate: 3.0,
            smoothing: SmoothingMode::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Admitted fixes per outbound batch
    pub batch_size: usize,
    /// Batches that may wait for the sender
    pub channel_capacity: usize,
    /// Admitted fixes kept while the sender is backed up; oldest dropped beyond this
    pub max_buffered: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            channel_capacity: 8,
            max_buffered: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub admission: AdmissionLimits,
    pub filter: FilterConfig,
    pub batch: BatchConfig,
    pub identity: EventContext,
}

impl TrackerConfig {
    pub fn from_json_str(json: &str) -> TrackerResult<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> TrackerResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> TrackerResult<()> {
        let rate = self.filter.process_noise_rate;
        if !rate.is_finite() || rate < 0.0 {
            return Err(TrackerError::InvalidParameters(format!(
                "process_noise_rate must be finite and >= 0, got {}",
                rate
            )));
        }
        if self.batch.batch_size == 0 {
            return Err(TrackerError::InvalidParameters(
                "batch_size must be >= 1".to_string(),
            ));
        }
        if self.batch.channel_capacity == 0 {
            return Err(TrackerError::InvalidParameters(
                "channel_capacity must be >= 1".to_string(),
            ));
        }
        if self.batch.max_buffered < self.batch.batch_size {
            return Err(TrackerError::InvalidParameters(format!(
                "max_buffered ({}) must be >= batch_size ({})",
                self.batch.max_buffered, self.batch.batch_size
            )));
        }
        if self.admission.min_spacing_s < 0 {
            return Err(TrackerError::InvalidParameters(
                "min_spacing_s must be >= 0".to_string(),
            ));
        }
        let max_speed = self.admission.max_speed_kmph;
        if max_speed.is_nan() || max_speed <= 0.0 {
            return Err(TrackerError::InvalidParameters(format!(
                "max_speed_kmph must be > 0, got {}",
                max_speed
            )));
        }
        Ok(())
    }
}
