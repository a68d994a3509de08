//! Per-job progress event bus.
//!
//! Every job mutation produces a seq-numbered event pushed into a bounded
//! ring and delivered to live subscribers. A new subscriber receives the
//! latest ring entry as a snapshot, then the live tail. Delivery is
//! best-effort within the process; slow subscribers are dropped and can
//! reconnect to resynchronize from the snapshot.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use clipforge_models::{Job, JobId, ProgressEvent};

/// Default bound on the per-job event ring.
pub const DEFAULT_RING_SIZE: usize = 128;

/// Send-queue capacity per subscriber; exceeding it drops the subscriber.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// How long a terminal job's ring stays available for late subscribers
/// before it is retired.
pub const RING_RETENTION_SECS: u64 = 900;

struct JobChannel {
    ring: VecDeque<ProgressEvent>,
    next_seq: u64,
    subscribers: Vec<mpsc::Sender<ProgressEvent>>,
}

impl JobChannel {
    fn new() -> Self {
        Self {
            ring: VecDeque::new(),
            next_seq: 1,
            subscribers: Vec::new(),
        }
    }
}

/// In-process fan-out of progress events, one channel per job.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<String, JobChannel>>>,
    ring_size: usize,
}

impl EventBus {
    pub fn new(ring_size: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            ring_size: ring_size.max(1),
        }
    }

    /// Publish an event for a job; assigns the next `seq` and returns it.
    pub async fn publish(&self, event: ProgressEvent) -> u64 {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(event.job_id.as_str().to_string())
            .or_insert_with(JobChannel::new);

        let seq = channel.next_seq;
        channel.next_seq += 1;
        let event = event.with_seq(seq);

        if channel.ring.len() == self.ring_size {
            channel.ring.pop_front();
        }
        channel.ring.push_back(event.clone());

        // Deliver to live subscribers; drop the ones that can't keep up.
        channel.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(job_id = %event.job_id, "Dropping slow event subscriber");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        seq
    }

    /// Convenience: publish the current snapshot of a job row.
    pub async fn publish_job(&self, job: &Job) -> u64 {
        self.publish(ProgressEvent::snapshot(
            job.id.clone(),
            job.status,
            &job.progress,
        ))
        .await
    }

    /// Subscribe to a job's events: the latest ring entry is delivered
    /// immediately (when one exists), then the live tail in seq order.
    pub async fn subscribe(&self, job_id: &JobId) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(job_id.as_str().to_string())
            .or_insert_with(JobChannel::new);

        if let Some(snapshot) = channel.ring.back() {
            // Buffer is empty at this point, the snapshot always fits.
            let _ = tx.try_send(snapshot.clone());
        }
        channel.subscribers.push(tx);
        debug!(job_id = %job_id, "Event subscriber attached");
        rx
    }

    /// Recent events with `seq` greater than `since`, from the ring.
    pub async fn history_since(&self, job_id: &JobId, since: u64) -> Vec<ProgressEvent> {
        let channels = self.channels.lock().await;
        channels
            .get(job_id.as_str())
            .map(|c| {
                c.ring
                    .iter()
                    .filter(|e| e.seq > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop a job's channel once its terminal event has drained.
    pub async fn retire(&self, job_id: &JobId) {
        self.channels.lock().await.remove(job_id.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::{Phase, Progress, ProgressEvent};

    fn event(job: &JobId, percent: u8) -> ProgressEvent {
        ProgressEvent::snapshot(
            job.clone(),
            clipforge_models::JobStatus::Running,
            &Progress::new(Phase::Transcribe, percent, "working"),
        )
    }

    #[tokio::test]
    async fn seq_is_monotone_per_job() {
        let bus = EventBus::new(8);
        let job = JobId::from("job-1");
        assert_eq!(bus.publish(event(&job, 10)).await, 1);
        assert_eq!(bus.publish(event(&job, 20)).await, 2);

        let other = JobId::from("job-2");
        assert_eq!(bus.publish(event(&other, 5)).await, 1);
    }

    #[tokio::test]
    async fn subscriber_gets_snapshot_then_tail() {
        let bus = EventBus::new(8);
        let job = JobId::from("job-1");
        bus.publish(event(&job, 10)).await;
        bus.publish(event(&job, 20)).await;

        let mut rx = bus.subscribe(&job).await;
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.seq, 2);
        assert_eq!(snapshot.percent, 20);

        bus.publish(event(&job, 30)).await;
        let live = rx.recv().await.unwrap();
        assert_eq!(live.seq, 3);
        assert_eq!(live.percent, 30);
    }

    #[tokio::test]
    async fn ring_is_bounded() {
        let bus = EventBus::new(4);
        let job = JobId::from("job-1");
        for i in 0..10 {
            bus.publish(event(&job, i * 10)).await;
        }
        let history = bus.history_since(&job, 0).await;
        assert_eq!(history.len(), 4);
        assert_eq!(history.first().unwrap().seq, 7);
        assert_eq!(history.last().unwrap().seq, 10);
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_but_bus_continues() {
        let bus = EventBus::new(256);
        let job = JobId::from("job-1");
        let rx = bus.subscribe(&job).await;
        // Never read from rx; fill its buffer past capacity.
        for i in 0..(SUBSCRIBER_BUFFER + 8) {
            bus.publish(event(&job, (i % 100) as u8)).await;
        }
        drop(rx);
        // A fresh subscriber still synchronizes from the snapshot.
        let mut rx2 = bus.subscribe(&job).await;
        let snapshot = rx2.recv().await.unwrap();
        assert_eq!(snapshot.seq, (SUBSCRIBER_BUFFER + 8) as u64);
    }
}
