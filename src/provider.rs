use std::io::BufRead;
use std::time::Duration;

use tokio::sync::mpsc::{error::TrySendError, Sender};
use tokio::time::interval;

use crate::error::TrackerResult;
use crate::sample::RawSample;

/// Reference request period of the platform location provider
pub const LOCATION_INTERVAL: Duration = Duration::from_secs(30);

/// Anything that can hand out raw fixes, one at a time
pub trait SampleSource {
    /// `Ok(None)` once the source is exhausted
    fn next_sample(&mut self) -> TrackerResult<Option<RawSample>>;
}

/// Reads one JSON `RawSample` per line
pub struct ReaderSource<R: BufRead> {
    reader: R,
    line: String,
    line_number: usize,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> SampleSource for ReaderSource<R> {
    fn next_sample(&mut self) -> TrackerResult<Option<RawSample>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let sample = serde_json::from_str(trimmed).map_err(|e| {
                log::warn!("Malformed fix on line {}: {}", self.line_number, e);
                e
            })?;
            return Ok(Some(sample));
        }
    }
}

/// Pull fixes from `source` and push them into `tx`.
///
/// With a non-zero `period` this behaves like the live provider: one fix per
/// tick, dropped if the channel is full. With a zero period the source is a
/// finished recording and each fix waits for room instead. A closed channel,
/// an exhausted source or a source error ends the loop.
/// Returns the number of fixes forwarded.
pub async fn location_loop<S: SampleSource>(tx: Sender<RawSample>, mut source: S, period: Duration) -> u64 {
    let mut ticker = if period.is_zero() {
        None
    } else {
        Some(interval(period))
    };
    let mut sample_count = 0u64;

    loop {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }

        let raw = match source.next_sample() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::debug!("[location] Source exhausted after {} fixes", sample_count);
                break;
            }
            Err(e) => {
                log::warn!("[location] Source failed after {} fixes: {}", sample_count, e);
                break;
            }
        };

        if ticker.is_none() {
            if tx.send(raw).await.is_err() {
                log::debug!("[location] Channel closed after {} fixes", sample_count);
                break;
            }
            sample_count += 1;
            continue;
        }

        match tx.try_send(raw) {
            Ok(_) => {
                sample_count += 1;
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("[location] Channel closed after {} fixes", sample_count);
                break;
            }
            Err(TrySendError::Full(_)) => {
                // Consumer is behind; drop this fix
                log::debug!("[location] Channel full, dropping fix at {} ms", raw.capture_time_ms);
            }
        }
    }

    sample_count
}
