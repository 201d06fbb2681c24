use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::admission::{AdmissionState, Rejection, SampleAdmissionPolicy, Verdict};
use crate::config::{BatchConfig, SmoothingMode, TrackerConfig};
use crate::error::{TrackerError, TrackerResult};
use crate::filters::{PositionFilter, PositionFix};
use crate::payload::{EventBatch, EventContext};
use crate::sample::{AdmittedSample, RawSample};

/// Running counters for one tracked entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub received: u64,
    pub admitted: u64,
    pub rejected_stale: u64,
    pub rejected_spacing: u64,
    pub rejected_speed: u64,
    pub rejected_zero_interval: u64,
    pub batches_sent: u64,
    pub flushes_deferred: u64,
    pub samples_dropped: u64,
}

impl IngestStats {
    pub fn rejected(&self) -> u64 {
        self.rejected_stale + self.rejected_spacing + self.rejected_speed + self.rejected_zero_interval
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Buffer below batch size (or empty on a forced flush)
    NotDue,
    Sent { events: usize },
    /// Outbound channel full; samples stay buffered for the next attempt
    Deferred { buffered: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    Admitted {
        sample: AdmittedSample,
        flush: FlushOutcome,
    },
    Rejected {
        rejection: Rejection,
        /// A backlog that was already due is retried even when the fix is not admitted
        flush: FlushOutcome,
    },
}

/// Raw fix in, batches out.
///
/// Owns one admission policy, the buffer of admitted fixes and, when
/// smoothing is enabled, one position filter. Batches go to a bounded channel
/// with `try_send`, so ingestion never waits on the sender.
pub struct IngestionPipeline {
    policy: SampleAdmissionPolicy,
    smoothing: SmoothingMode,
    filter: Option<PositionFilter>,
    buffer: VecDeque<AdmittedSample>,
    batch: BatchConfig,
    context: EventContext,
    outbound: mpsc::Sender<EventBatch>,
    stats: IngestStats,
}

impl IngestionPipeline {
    /// Fails with `InvalidParameters` when `config` does not validate
    pub fn new(config: &TrackerConfig, outbound: mpsc::Sender<EventBatch>) -> TrackerResult<Self> {
        config.validate()?;
        let filter = match config.filter.smoothing {
            SmoothingMode::Off => None,
            SmoothingMode::RawStream | SmoothingMode::AdmittedStream => {
                Some(PositionFilter::new(config.filter.process_noise_rate))
            }
        };

        Ok(Self {
            policy: SampleAdmissionPolicy::new(config.admission),
            smoothing: config.filter.smoothing,
            filter,
            buffer: VecDeque::with_capacity(config.batch.max_buffered),
            batch: config.batch,
            context: config.identity.clone(),
            outbound,
            stats: IngestStats::default(),
        })
    }

    /// Pipeline plus the receiving end of its outbound channel
    pub fn with_channel(
        config: &TrackerConfig,
    ) -> TrackerResult<(Self, mpsc::Receiver<EventBatch>)> {
        // Validate before sizing the channel; zero capacity panics in tokio
        config.validate()?;
        let (tx, rx) = mpsc::channel(config.batch.channel_capacity);
        Ok((Self::new(config, tx)?, rx))
    }

    pub fn ingest(&mut self, raw: &RawSample, now_ms: i64) -> TrackerResult<IngestOutcome> {
        self.stats.received += 1;

        if self.smoothing == SmoothingMode::RawStream {
            if let Some(filter) = self.filter.as_mut() {
                filter.process(raw.latitude, raw.longitude, raw.accuracy_m, raw.capture_time_ms);
            }
        }

        let mut sample = match self.policy.evaluate(raw, now_ms) {
            Verdict::Admitted(sample) => sample,
            Verdict::Rejected(rejection) => {
                self.record_rejection(rejection);
                log::debug!("Fix at {} ms rejected: {:?}", raw.capture_time_ms, rejection);
                let flush = self.flush_if_due()?;
                return Ok(IngestOutcome::Rejected { rejection, flush });
            }
        };

        if self.smoothing == SmoothingMode::AdmittedStream {
            if let Some(filter) = self.filter.as_mut() {
                let fix = filter.process(
                    raw.latitude,
                    raw.longitude,
                    raw.accuracy_m,
                    raw.capture_time_ms,
                );
                sample.latitude = fix.latitude;
                sample.longitude = fix.longitude;
                sample.accuracy_m = fix.accuracy_m;
            }
        }

        self.stats.admitted += 1;
        log::debug!(
            "Fix admitted: created={} speed={:.1} km/h",
            sample.created_time_s,
            sample.speed_kmph
        );
        self.push(sample);

        let flush = self.flush_if_due()?;

        Ok(IngestOutcome::Admitted { sample, flush })
    }

    /// Send whatever is buffered, even a partial batch (shutdown path)
    pub fn flush(&mut self) -> TrackerResult<FlushOutcome> {
        self.send_buffer()
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_samples(&self) -> impl Iterator<Item = &AdmittedSample> {
        self.buffer.iter()
    }

    pub fn admission_state(&self) -> &AdmissionState {
        self.policy.state()
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    /// Battery level stamped on subsequent batches
    pub fn set_battery_level(&mut self, battery_level: impl Into<String>) {
        self.context.battery_level = battery_level.into();
    }

    /// Smoothed position; `NotInitialized` when smoothing is off or nothing was absorbed
    pub fn estimate(&self) -> TrackerResult<PositionFix> {
        match &self.filter {
            Some(filter) => filter.estimate(),
            None => Err(TrackerError::NotInitialized),
        }
    }

    fn record_rejection(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Stale { .. } => self.stats.rejected_stale += 1,
            Rejection::TooSoon { .. } => self.stats.rejected_spacing += 1,
            Rejection::ZeroInterval => self.stats.rejected_zero_interval += 1,
            Rejection::TooFast { .. } => self.stats.rejected_speed += 1,
        }
    }

    fn push(&mut self, sample: AdmittedSample) {
        self.buffer.push_back(sample);
        while self.buffer.len() > self.batch.max_buffered {
            if let Some(dropped) = self.buffer.pop_front() {
                self.stats.samples_dropped += 1;
                log::warn!(
                    "Outbound backlog over {} fixes, dropping fix created at {}",
                    self.batch.max_buffered,
                    dropped.created_time_s
                );
            }
        }
    }

    fn flush_if_due(&mut self) -> TrackerResult<FlushOutcome> {
        if self.buffer.len() >= self.batch.batch_size {
            self.send_buffer()
        } else {
            Ok(FlushOutcome::NotDue)
        }
    }

    fn send_buffer(&mut self) -> TrackerResult<FlushOutcome> {
        if self.buffer.is_empty() {
            return Ok(FlushOutcome::NotDue);
        }

        let batch = EventBatch::from_samples(self.buffer.iter(), &self.context);
        let events = batch.len();
        match self.outbound.try_send(batch) {
            Ok(()) => {
                self.buffer.clear();
                self.stats.batches_sent += 1;
                log::debug!("Batch of {} events handed to sender", events);
                Ok(FlushOutcome::Sent { events })
            }
            Err(TrySendError::Full(_)) => {
                self.stats.flushes_deferred += 1;
                log::warn!("Sender backed up, keeping {} fixes buffered", events);
                Ok(FlushOutcome::Deferred { buffered: events })
            }
            Err(TrySendError::Closed(_)) => Err(TrackerError::ChannelClosed(
                "batch receiver dropped".to_string(),
            )),
        }
    }
}
