//! Job Queue and termination protocol
//!
//! The producer enqueues every record, then exactly one `WorkerDone` per
//! worker. Each worker stops at the first sentinel it sees, so every worker
//! observes exactly one, however the records happened to be distributed.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use sdf_protocol::{JobMessage, Record, ResultMessage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;
use crate::reader::ReaderError;

pub type JobSender = Sender<JobMessage>;
pub type JobReceiver = Receiver<JobMessage>;
pub type ResultSender = Sender<ResultMessage>;
pub type ResultReceiver = Receiver<ResultMessage>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Every consumer of the job queue is gone.
    #[error("Job queue disconnected after {records_sent} records")]
    Disconnected { records_sent: u64 },

    /// The archive stream failed mid-way. Sentinels were still queued.
    #[error("Archive stream failed after {records_sent} records: {source}")]
    Reader {
        records_sent: u64,
        #[source]
        source: ReaderError,
    },
}

/// Create the job queue. `None` makes it unbounded.
pub fn job_channel(capacity: Option<usize>) -> (JobSender, JobReceiver) {
    match capacity {
        Some(cap) => bounded(cap),
        None => unbounded(),
    }
}

/// Create the result queue. `None` makes it unbounded.
pub fn result_channel(capacity: Option<usize>) -> (ResultSender, ResultReceiver) {
    match capacity {
        Some(cap) => bounded(cap),
        None => unbounded(),
    }
}

/// What the producer pushed onto the job queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub records_sent: u64,
    pub sentinels_sent: usize,
}

/// Feed every record into the job queue, then one sentinel per worker.
///
/// Blocks while a bounded queue is full.
pub fn produce<I>(
    records: I,
    job_tx: &JobSender,
    workers: usize,
    metrics: &Metrics,
) -> Result<ProducerStats, QueueError>
where
    I: IntoIterator<Item = Result<Record, ReaderError>>,
{
    let mut stats = ProducerStats::default();
    let mut stream_error = None;

    for item in records {
        match item {
            Ok(record) => {
                if job_tx.send(JobMessage::Record(record)).is_err() {
                    warn!(
                        records_sent = stats.records_sent,
                        "Job queue closed, producer stopping"
                    );
                    return Err(QueueError::Disconnected {
                        records_sent: stats.records_sent,
                    });
                }
                stats.records_sent += 1;
                metrics.inc_records_read();
            }
            Err(e) => {
                stream_error = Some(e);
                break;
            }
        }
    }

    for _ in 0..workers {
        if job_tx.send(JobMessage::WorkerDone).is_err() {
            return Err(QueueError::Disconnected {
                records_sent: stats.records_sent,
            });
        }
        stats.sentinels_sent += 1;
    }
    debug!(sentinels = stats.sentinels_sent, "Queued worker sentinels");

    if let Some(source) = stream_error {
        return Err(QueueError::Reader {
            records_sent: stats.records_sent,
            source,
        });
    }

    info!("Done producing {} records", stats.records_sent);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn records(n: u64) -> Vec<Result<Record, ReaderError>> {
        (0..n).map(|i| Ok(Record::new(i, format!("R{}\n", i)))).collect()
    }

    fn drain(rx: &JobReceiver) -> (usize, usize) {
        let mut recs = 0;
        let mut sentinels = 0;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                JobMessage::Record(_) => recs += 1,
                JobMessage::WorkerDone => sentinels += 1,
            }
        }
        (recs, sentinels)
    }

    #[test]
    fn test_one_sentinel_per_worker_after_records() {
        let (tx, rx) = job_channel(None);
        let metrics = Metrics::new();
        let stats = produce(records(5), &tx, 3, &metrics).unwrap();

        assert_eq!(stats, ProducerStats { records_sent: 5, sentinels_sent: 3 });
        assert_eq!(metrics.snapshot().records_read, 5);

        // Sentinels come strictly after the records.
        let order: Vec<bool> = rx
            .try_iter()
            .map(|m| matches!(m, JobMessage::WorkerDone))
            .collect();
        assert_eq!(order, vec![false, false, false, false, false, true, true, true]);
    }

    #[test]
    fn test_reader_error_still_queues_sentinels() {
        let (tx, rx) = job_channel(None);
        let mut input = records(2);
        input.push(Err(ReaderError::Io {
            line: 9,
            source: io::Error::new(io::ErrorKind::InvalidData, "corrupt deflate stream"),
        }));
        input.extend(records(1));

        let err = produce(input, &tx, 2, &Metrics::new()).unwrap_err();
        assert!(matches!(err, QueueError::Reader { records_sent: 2, .. }));
        assert_eq!(drain(&rx), (2, 2));
    }

    #[test]
    fn test_disconnected_queue_stops_producer() {
        let (tx, rx) = job_channel(Some(1));
        drop(rx);
        let err = produce(records(3), &tx, 2, &Metrics::new()).unwrap_err();
        assert!(matches!(err, QueueError::Disconnected { records_sent: 0 }));
    }

    #[test]
    fn test_bounded_queue_applies_backpressure() {
        let (tx, rx) = job_channel(Some(2));
        let producer = std::thread::spawn(move || produce(records(10), &tx, 1, &Metrics::new()));

        let mut seen = 0;
        for msg in rx.iter() {
            match msg {
                JobMessage::Record(_) => seen += 1,
                JobMessage::WorkerDone => break,
            }
        }
        assert_eq!(seen, 10);
        assert_eq!(producer.join().unwrap().unwrap().records_sent, 10);
    }
}
