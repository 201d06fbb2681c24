//! Outbound side of the pipeline.
//!
//! The pipeline only hands batches to a bounded channel. `dispatch_loop`
//! drains that channel into a [`BatchSink`] and keeps count of what made it,
//! so a failing sink shows up in the report and the logs instead of vanishing.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;

use crate::error::{TrackerError, TrackerResult};
use crate::payload::EventBatch;

/// Destination for outbound batches
pub trait BatchSink {
    fn deliver(&mut self, batch: &EventBatch) -> TrackerResult<()>;
}

impl<S: BatchSink + ?Sized> BatchSink for Box<S> {
    fn deliver(&mut self, batch: &EventBatch) -> TrackerResult<()> {
        (**self).deliver(batch)
    }
}

/// Logs each payload at info level
#[derive(Debug, Default)]
pub struct LogSink;

impl BatchSink for LogSink {
    fn deliver(&mut self, batch: &EventBatch) -> TrackerResult<()> {
        let json = batch.to_json()?;
        log::info!("Batch for {} ({} events): {}", batch.company_id, batch.len(), json);
        Ok(())
    }
}

/// One compact JSON payload per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> BatchSink for JsonLinesSink<W> {
    fn deliver(&mut self, batch: &EventBatch) -> TrackerResult<()> {
        let mut line = batch.to_json_bytes()?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| TrackerError::Sink(format!("write failed: {}", e)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub delivered: u64,
    pub failed: u64,
    /// Events in delivered batches
    pub events: u64,
}

/// Deliver batches until every sender is dropped.
pub async fn dispatch_loop<S: BatchSink>(mut rx: Receiver<EventBatch>, mut sink: S) -> DispatchReport {
    let mut report = DispatchReport::default();

    while let Some(batch) = rx.recv().await {
        match sink.deliver(&batch) {
            Ok(()) => {
                report.delivered += 1;
                report.events += batch.len() as u64;
            }
            Err(e) => {
                report.failed += 1;
                log::warn!("Dropping batch of {} events: {}", batch.len(), e);
            }
        }
    }

    log::debug!(
        "Dispatch finished: {} delivered, {} failed",
        report.delivered,
        report.failed
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::EventContext;
    use crate::sample::AdmittedSample;
    use tokio::sync::mpsc;

    fn batch(n: usize) -> EventBatch {
        let samples: Vec<AdmittedSample> = (0..n)
            .map(|i| AdmittedSample {
                latitude: 1.0,
                longitude: 2.0,
                accuracy_m: 3.0,
                created_time_s: i as i64 * 40,
                speed_kmph: 0.0,
            })
            .collect();
        let context = EventContext {
            company_id: "acme".to_string(),
            ..EventContext::default()
        };
        EventBatch::from_samples(&samples, &context)
    }

    /// Fails every other delivery
    struct FlakySink {
        calls: usize,
    }

    impl BatchSink for FlakySink {
        fn deliver(&mut self, _batch: &EventBatch) -> TrackerResult<()> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                Err(TrackerError::Sink("backend unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_json_lines_sink() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.deliver(&batch(2)).unwrap();
        sink.deliver(&batch(1)).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: EventBatch = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, batch(2));
    }

    #[test]
    fn test_log_sink_accepts_batches() {
        let mut sink = LogSink;
        assert!(sink.deliver(&batch(3)).is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_loop_counts_outcomes() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(dispatch_loop(rx, FlakySink { calls: 0 }));

        tx.send(batch(4)).await.unwrap();
        tx.send(batch(4)).await.unwrap();
        tx.send(batch(2)).await.unwrap();
        drop(tx);

        let report = handle.await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.events, 6);
    }

    #[tokio::test]
    async fn test_dispatch_loop_with_boxed_sink() {
        let (tx, rx) = mpsc::channel(1);
        let sink: Box<dyn BatchSink + Send> = Box::new(JsonLinesSink::new(Vec::new()));
        let handle = tokio::spawn(dispatch_loop(rx, sink));

        tx.send(batch(1)).await.unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap().delivered, 1);
    }
}
