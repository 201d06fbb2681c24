use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};

/// Accuracy floor applied to every measurement (m)
pub const MIN_ACCURACY_M: f32 = 1.0;

/// Internal estimate once the filter has been seeded
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub latitude: f64,
    pub longitude: f64,
    /// P, in squared-accuracy units. Always >= 0.
    pub variance: f32,
    pub timestamp_ms: i64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterState {
    Uninitialized,
    Initialized(PositionEstimate),
}

/// Public view of the estimate: accuracy instead of variance
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f32,
    pub timestamp_ms: i64,
}

impl From<PositionEstimate> for PositionFix {
    fn from(estimate: PositionEstimate) -> Self {
        PositionFix {
            latitude: estimate.latitude,
            longitude: estimate.longitude,
            accuracy_m: estimate.variance.sqrt(),
            timestamp_ms: estimate.timestamp_ms,
        }
    }
}

/// Scalar gain K = P / (P + R) with R = accuracy².
///
/// Lies in [0, 1] whenever `variance >= 0` and `accuracy_m >= 1`.
pub fn kalman_gain(variance: f32, accuracy_m: f32) -> f32 {
    variance / (variance + accuracy_m * accuracy_m)
}

/// Single-object lat/lon smoother.
///
/// Uncertainty grows linearly with elapsed time (`rate² · Δt_s`) and shrinks
/// on each measurement. Lat and lon share one variance; since K is
/// dimensionless the mixed units between degrees and metres do not matter.
#[derive(Clone, Debug)]
pub struct PositionFilter {
    process_noise_rate: f32,
    state: FilterState,
    update_count: u64,
}

impl PositionFilter {
    /// `process_noise_rate` is in metres per √second and must be non-negative.
    pub fn new(process_noise_rate: f32) -> Self {
        Self {
            process_noise_rate,
            state: FilterState::Uninitialized,
            update_count: 0,
        }
    }

    pub fn process_noise_rate(&self) -> f32 {
        self.process_noise_rate
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, FilterState::Initialized(_))
    }

    /// Number of measurements absorbed since construction or the last reset
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn variance(&self) -> Option<f32> {
        match self.state {
            FilterState::Uninitialized => None,
            FilterState::Initialized(estimate) => Some(estimate.variance),
        }
    }

    /// Forget everything; the next measurement seeds the filter again.
    pub fn reset(&mut self) {
        self.state = FilterState::Uninitialized;
        self.update_count = 0;
    }

    /// Overwrite the estimate with a known position and accuracy.
    pub fn set_state(&mut self, latitude: f64, longitude: f64, accuracy_m: f32, timestamp_ms: i64) {
        self.state = FilterState::Initialized(PositionEstimate {
            latitude,
            longitude,
            variance: accuracy_m * accuracy_m,
            timestamp_ms,
        });
    }

    /// Absorb one measurement and return the updated estimate.
    pub fn process(
        &mut self,
        lat_measurement: f64,
        lon_measurement: f64,
        accuracy_m: f32,
        timestamp_ms: i64,
    ) -> PositionFix {
        let accuracy = accuracy_m.max(MIN_ACCURACY_M);
        self.update_count += 1;

        let estimate = match self.state {
            FilterState::Uninitialized => PositionEstimate {
                latitude: lat_measurement,
                longitude: lon_measurement,
                variance: accuracy * accuracy,
                timestamp_ms,
            },
            FilterState::Initialized(mut estimate) => {
                let elapsed_ms = timestamp_ms - estimate.timestamp_ms;
                // Duplicate or out-of-order timestamps add no process noise
                if elapsed_ms > 0 {
                    estimate.variance += elapsed_ms as f32
                        * self.process_noise_rate
                        * self.process_noise_rate
                        / 1000.0;
                    estimate.timestamp_ms = timestamp_ms;
                }

                let k = kalman_gain(estimate.variance, accuracy);
                estimate.latitude += k as f64 * (lat_measurement - estimate.latitude);
                estimate.longitude += k as f64 * (lon_measurement - estimate.longitude);
                estimate.variance *= 1.0 - k;
                estimate
            }
        };

        self.state = FilterState::Initialized(estimate);
        estimate.into()
    }

    /// Current estimate. Fails until `process` or `set_state` has been called.
    pub fn estimate(&self) -> TrackerResult<PositionFix> {
        match self.state {
            FilterState::Uninitialized => Err(TrackerError::NotInitialized),
            FilterState::Initialized(estimate) => Ok(estimate.into()),
        }
    }
}
