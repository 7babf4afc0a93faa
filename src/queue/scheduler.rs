use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::{debug, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::SchedulerStats;
use crate::core::types::GroupId;
use crate::queue::group_queue::GroupQueue;
use crate::queue::job::{JobEnvelope, PendingJob};

/// Consumer side of the scheduler
pub trait JobHandler: Send + Sync {
    fn handle(&self, group: &GroupId, job: PendingJob) -> Result<()>;
}

/// Group-serialized job scheduler over a `GroupQueue`
pub struct GroupScheduler {
    queue: Arc<dyn GroupQueue>,
    poll_interval: Duration,
    processed: AtomicU64,
    failed: AtomicU64,
    poisoned: AtomicU64,
}

impl GroupScheduler {
    pub fn new(queue: Arc<dyn GroupQueue>, config: &Config) -> Self {
        GroupScheduler {
            queue,
            poll_interval: config.poll_interval(),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            poisoned: AtomicU64::new(0),
        }
    }

    pub fn send(&self, group: &GroupId, job: PendingJob) -> Result<()> {
        let payload = JobEnvelope::new(group.clone(), job).encode()?;
        self.queue.send(group, payload)
    }

    pub fn purge(&self, group: &GroupId) -> Result<usize> {
        self.queue.purge(group)
    }

    pub fn pending_count(&self) -> Result<usize> {
        self.queue.pending_count()
    }

    /// Receives and handles at most one job; `false` when nothing arrived within `wait`
    pub fn process_one(&self, handler: &dyn JobHandler, wait: Duration) -> Result<bool> {
        let delivery = match self.queue.receive(wait)? {
            Some(delivery) => delivery,
            None => return Ok(false),
        };

        let envelope = match JobEnvelope::decode(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                // Undecodable payloads would otherwise block their group forever
                warn!(group = %delivery.group, error = %err, "dropping undecodable job");
                self.poisoned.fetch_add(1, Ordering::Relaxed);
                self.queue.ack(&delivery)?;
                return Ok(true);
            }
        };

        match handler.handle(&delivery.group, envelope.job) {
            Ok(()) => {
                if !self.queue.ack(&delivery)? {
                    debug!(group = %delivery.group, "lease expired before ack; job will run again");
                }
                self.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!(group = %delivery.group, attempt = delivery.attempt, error = %err, "job failed, releasing for redelivery");
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.queue.release(&delivery)?;
            }
        }
        Ok(true)
    }

    /// Starts `concurrency` workers; the queue keeps each group on one worker at a time
    pub fn consume(self: &Arc<Self>, handler: Arc<dyn JobHandler>, concurrency: usize) -> Result<ConsumerHandle> {
        if concurrency == 0 {
            return Err(Error::new(ErrorKind::InvalidArgument, "consumer concurrency must be at least 1"));
        }
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let mut workers = Vec::with_capacity(concurrency);
        for index in 0..concurrency {
            let scheduler = Arc::clone(self);
            let handler = Arc::clone(&handler);
            let shutdown = shutdown_rx.clone();
            let worker = thread::Builder::new()
                .name(format!("sortfield-worker-{}", index))
                .spawn(move || scheduler.worker_loop(handler, shutdown))?;
            workers.push(worker);
        }
        debug!(workers = concurrency, "consumers started");
        Ok(ConsumerHandle { shutdown: Some(shutdown_tx), workers })
    }

    fn worker_loop(&self, handler: Arc<dyn JobHandler>, shutdown: Receiver<()>) {
        loop {
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }
            if let Err(err) = self.process_one(handler.as_ref(), self.poll_interval) {
                warn!(error = %err, "queue error in worker");
                thread::sleep(self.poll_interval);
            }
        }
    }

    /// Blocks until the backlog is empty; `false` on timeout
    pub fn wait_idle(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let nap = self.poll_interval.min(Duration::from_millis(10));
        loop {
            if self.pending_count()? == 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(nap);
        }
    }

    pub fn stats(&self) -> Result<SchedulerStats> {
        Ok(SchedulerStats {
            pending: self.pending_count()?,
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            poisoned: self.poisoned.load(Ordering::Relaxed),
        })
    }
}

/// Running worker pool; stops and joins on `shutdown` or drop
pub struct ConsumerHandle {
    shutdown: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Disconnecting the channel is the stop signal
        self.shutdown.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
