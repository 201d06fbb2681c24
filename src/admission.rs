use serde::{Deserialize, Serialize};

use crate::geodesy::{haversine_km, speed_kmph};
use crate::sample::{AdmittedSample, RawSample};

/// Thresholds for the admission gates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionLimits {
    /// Fixes this old (receipt vs capture) or older are dropped (s)
    pub max_capture_age_s: i64,
    /// Minimum gap to the last admitted fix (s)
    pub min_spacing_s: i64,
    /// Implied ground speed above this is treated as a GPS jump (km/h)
    pub max_speed_kmph: f64,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_capture_age_s: 20,
            min_spacing_s: 30,
            max_speed_kmph: 120.0,
        }
    }
}

/// Why a fix was not admitted. Expected and frequent; not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    Stale { age_s: i64 },
    TooSoon { spacing_s: i64 },
    /// Same capture second as the baseline; speed is undefined
    ZeroInterval,
    TooFast { speed_kmph: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Admitted(AdmittedSample),
    Rejected(Rejection),
}

impl Verdict {
    pub fn admitted(self) -> Option<AdmittedSample> {
        match self {
            Verdict::Admitted(sample) => Some(sample),
            Verdict::Rejected(_) => None,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admitted(_))
    }
}

/// Per-entity admission state. The baseline fix and its time always move together.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AdmissionState {
    /// Nothing admitted yet
    #[default]
    Empty,
    Tracking {
        last_admitted: RawSample,
        last_admitted_time_s: i64,
    },
}

impl AdmissionState {
    pub fn last_admitted_sample(&self) -> Option<&RawSample> {
        match self {
            AdmissionState::Empty => None,
            AdmissionState::Tracking { last_admitted, .. } => Some(last_admitted),
        }
    }

    pub fn last_admitted_time_s(&self) -> Option<i64> {
        match self {
            AdmissionState::Empty => None,
            AdmissionState::Tracking {
                last_admitted_time_s,
                ..
            } => Some(*last_admitted_time_s),
        }
    }
}

/// Decides, fix by fix, which raw samples become part of the curated stream.
///
/// Gates in order: staleness, spacing to the last admitted fix, then implied
/// speed. A rejected fix never touches the state, so a single glitch cannot
/// move the baseline the next fixes are compared against.
#[derive(Debug, Clone)]
pub struct SampleAdmissionPolicy {
    limits: AdmissionLimits,
    state: AdmissionState,
}

impl SampleAdmissionPolicy {
    pub fn new(limits: AdmissionLimits) -> Self {
        Self {
            limits,
            state: AdmissionState::Empty,
        }
    }

    pub fn limits(&self) -> &AdmissionLimits {
        &self.limits
    }

    pub fn state(&self) -> &AdmissionState {
        &self.state
    }

    /// Drop the baseline (e.g. when tracking is restarted)
    pub fn reset(&mut self) {
        self.state = AdmissionState::Empty;
    }

    pub fn evaluate(&mut self, raw: &RawSample, now_ms: i64) -> Verdict {
        let age_s = now_ms.saturating_sub(raw.capture_time_ms) / 1000;
        if age_s >= self.limits.max_capture_age_s {
            return Verdict::Rejected(Rejection::Stale { age_s });
        }

        let current_time_s = raw.capture_time_s();
        let speed = match &self.state {
            AdmissionState::Empty => 0.0,
            AdmissionState::Tracking {
                last_admitted,
                last_admitted_time_s,
            } => {
                let spacing_s = current_time_s.saturating_sub(*last_admitted_time_s);
                if spacing_s < self.limits.min_spacing_s {
                    return Verdict::Rejected(Rejection::TooSoon { spacing_s });
                }

                let distance_km = haversine_km(last_admitted.position(), raw.position());
                let time_diff_s = raw
                    .capture_time_ms
                    .saturating_sub(last_admitted.capture_time_ms)
                    / 1000;
                let speed = match speed_kmph(distance_km, time_diff_s) {
                    Some(speed) => speed,
                    None => return Verdict::Rejected(Rejection::ZeroInterval),
                };
                if speed > self.limits.max_speed_kmph {
                    return Verdict::Rejected(Rejection::TooFast { speed_kmph: speed });
                }
                speed
            }
        };

        self.state = AdmissionState::Tracking {
            last_admitted: *raw,
            last_admitted_time_s: current_time_s,
        };
        Verdict::Admitted(AdmittedSample::from_raw(raw, speed as f32))
    }
}

impl Default for SampleAdmissionPolicy {
    fn default() -> Self {
        Self::new(AdmissionLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::EARTH_RADIUS_KM;

    /// Fix received 1 s after capture
    fn fix(lat: f64, lon: f64, capture_ms: i64) -> RawSample {
        RawSample::new(lat, lon, 5.0, capture_ms, capture_ms + 1_000)
    }

    /// Latitude offset that is `km` kilometres north of the equator
    fn lat_for_km(km: f64) -> f64 {
        (km / EARTH_RADIUS_KM).to_degrees()
    }

    #[test]
    fn test_first_sample_admitted_with_zero_speed() {
        let mut policy = SampleAdmissionPolicy::default();
        let raw = fix(0.0, 0.0, 0);

        let admitted = policy.evaluate(&raw, 1_000).admitted().unwrap();
        assert_eq!(admitted.speed_kmph, 0.0);
        assert_eq!(admitted.created_time_s, 0);
        assert_eq!(policy.state().last_admitted_sample(), Some(&raw));
        assert_eq!(policy.state().last_admitted_time_s(), Some(0));
    }

    #[test]
    fn test_stale_sample_rejected_in_any_state() {
        let mut policy = SampleAdmissionPolicy::default();
        let raw = fix(0.0, 0.0, 0);

        assert_eq!(
            policy.evaluate(&raw, 20_000),
            Verdict::Rejected(Rejection::Stale { age_s: 20 })
        );
        assert_eq!(*policy.state(), AdmissionState::Empty);

        // 19.999 s truncates to 19 s and passes
        assert!(policy.evaluate(&raw, 19_999).is_admitted());

        let later = fix(0.0, 0.0, 60_000);
        assert!(matches!(
            policy.evaluate(&later, 95_000),
            Verdict::Rejected(Rejection::Stale { age_s: 35 })
        ));
        assert_eq!(policy.state().last_admitted_time_s(), Some(0));
    }

    #[test]
    fn test_spacing_rejects_even_plausible_speed() {
        let mut policy = SampleAdmissionPolicy::default();
        policy.evaluate(&fix(0.0, 0.0, 100_000), 100_000);

        // Stationary, 29 s later
        let verdict = policy.evaluate(&fix(0.0, 0.0, 129_000), 129_000);
        assert_eq!(verdict, Verdict::Rejected(Rejection::TooSoon { spacing_s: 29 }));
        assert_eq!(policy.state().last_admitted_time_s(), Some(100));

        assert!(policy.evaluate(&fix(0.0, 0.0, 130_000), 130_000).is_admitted());
    }

    #[test]
    fn test_speed_gate() {
        let ten_km = lat_for_km(10.0);

        // 10 km in 60 s = 600 km/h
        let mut policy = SampleAdmissionPolicy::default();
        policy.evaluate(&fix(0.0, 0.0, 0), 0);
        let verdict = policy.evaluate(&fix(ten_km, 0.0, 60_000), 60_000);
        match verdict {
            Verdict::Rejected(Rejection::TooFast { speed_kmph }) => {
                assert!((speed_kmph - 600.0).abs() < 1e-6)
            }
            other => panic!("expected TooFast, got {:?}", other),
        }
        assert_eq!(policy.state().last_admitted_time_s(), Some(0));

        // 10 km in 600 s = 60 km/h
        let mut policy = SampleAdmissionPolicy::default();
        policy.evaluate(&fix(0.0, 0.0, 0), 0);
        let admitted = policy
            .evaluate(&fix(ten_km, 0.0, 600_000), 600_000)
            .admitted()
            .unwrap();
        assert!((admitted.speed_kmph - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_speed_limit_is_inclusive() {
        let origin = fix(0.0, 0.0, 0);
        let next = fix(lat_for_km(2.0), 0.0, 60_000);
        let exact = speed_kmph(haversine_km(origin.position(), next.position()), 60).unwrap();

        let limits = AdmissionLimits {
            max_speed_kmph: exact,
            ..AdmissionLimits::default()
        };
        let mut policy = SampleAdmissionPolicy::new(limits);
        policy.evaluate(&origin, 0);
        assert!(policy.evaluate(&next, 60_000).is_admitted());
    }

    #[test]
    fn test_glitch_does_not_move_baseline() {
        let mut policy = SampleAdmissionPolicy::default();
        let origin = fix(0.0, 0.0, 0);
        policy.evaluate(&origin, 0);

        // Jump 50 km away in 40 s
        let glitch = fix(lat_for_km(50.0), 0.0, 40_000);
        assert!(!policy.evaluate(&glitch, 40_000).is_admitted());
        assert_eq!(policy.state().last_admitted_sample(), Some(&origin));

        // Next real fix is compared against the origin, not the glitch
        let next = policy
            .evaluate(&fix(lat_for_km(0.5), 0.0, 80_000), 80_000)
            .admitted()
            .unwrap();
        assert!((next.speed_kmph - 22.5).abs() < 1e-3);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let limits = AdmissionLimits {
            min_spacing_s: 0,
            ..AdmissionLimits::default()
        };
        let mut policy = SampleAdmissionPolicy::new(limits);
        policy.evaluate(&fix(0.0, 0.0, 5_000), 5_000);

        let verdict = policy.evaluate(&fix(0.0, 0.001, 5_400), 5_400);
        assert_eq!(verdict, Verdict::Rejected(Rejection::ZeroInterval));
        assert_eq!(policy.state().last_admitted_time_s(), Some(5));
    }

    #[test]
    fn test_scenario() {
        let mut policy = SampleAdmissionPolicy::default();

        let first = fix(0.0, 0.0, 0);
        let admitted = policy.evaluate(&first, 0).admitted().unwrap();
        assert_eq!(admitted.speed_kmph, 0.0);
        assert_eq!(
            *policy.state(),
            AdmissionState::Tracking {
                last_admitted: first,
                last_admitted_time_s: 0
            }
        );

        // ~0.111 km in 40 s ≈ 10 km/h
        let second = fix(0.0, 0.001, 40_000);
        let admitted = policy.evaluate(&second, 40_000).admitted().unwrap();
        assert!((admitted.speed_kmph - 10.0).abs() < 0.05);

        // 10 s after the second fix
        let third = fix(0.0, 0.002, 50_000);
        let before = *policy.state();
        assert_eq!(
            policy.evaluate(&third, 50_000),
            Verdict::Rejected(Rejection::TooSoon { spacing_s: 10 })
        );
        assert_eq!(*policy.state(), before);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let mut policy = SampleAdmissionPolicy::default();

        let ancient = RawSample::new(0.0, 0.0, 5.0, i64::MIN, i64::MIN);
        assert!(matches!(
            policy.evaluate(&ancient, 1),
            Verdict::Rejected(Rejection::Stale { .. })
        ));
        assert_eq!(*policy.state(), AdmissionState::Empty);

        assert!(policy.evaluate(&ancient, i64::MIN).is_admitted());
        let far_future = RawSample::new(0.0, 0.0, 5.0, i64::MAX, i64::MAX);
        let admitted = policy.evaluate(&far_future, i64::MAX).admitted().unwrap();
        assert_eq!(admitted.speed_kmph, 0.0);
    }

    #[test]
    fn test_reset_returns_to_empty() {
        let mut policy = SampleAdmissionPolicy::default();
        policy.evaluate(&fix(0.0, 0.0, 0), 0);
        policy.reset();
        assert_eq!(*policy.state(), AdmissionState::Empty);
        assert!(policy.evaluate(&fix(1.0, 1.0, 5_000), 5_000).is_admitted());
    }
}
