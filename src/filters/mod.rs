/// Position estimators
///
/// Currently a single scalar-variance Kalman filter over latitude/longitude.
/// It has no velocity state; the admission policy works on raw fixes and the
/// pipeline decides whether this filter smooths the raw or the admitted stream.

pub mod position_kalman;

pub use position_kalman::{FilterState, PositionEstimate, PositionFilter, PositionFix};
