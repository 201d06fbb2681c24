// Location foreground tracker core
// Curates a noisy location stream into batched backend events

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod geodesy;
pub mod payload;
pub mod pipeline;
pub mod provider;
pub mod sample;

pub use admission::{AdmissionLimits, AdmissionState, Rejection, SampleAdmissionPolicy, Verdict};
pub use config::{BatchConfig, FilterConfig, SmoothingMode, TrackerConfig};
pub use dispatch::{dispatch_loop, BatchSink, DispatchReport, JsonLinesSink, LogSink};
pub use error::{TrackerError, TrackerResult};
pub use filters::{PositionFilter, PositionFix};
pub use geodesy::{haversine_km, LatLon};
pub use payload::{EventBatch, EventContext, LocationEvent};
pub use pipeline::{FlushOutcome, IngestOutcome, IngestStats, IngestionPipeline};
pub use provider::{location_loop, ReaderSource, SampleSource, LOCATION_INTERVAL};
pub use sample::{AdmittedSample, RawSample};
