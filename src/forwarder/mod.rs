//! Reliable delivery of encoded windows to the collector.
use std::{
    io,
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{debug, error, info, warn};

use tokio::{runtime::Handle, sync::mpsc::UnboundedSender, task::JoinHandle};

use crate::{
    collecter::Stream,
    error::{Error, Result},
};

mod queue;
mod uplink;

pub use queue::DurableQueue;
pub use uplink::{Claims, HttpUplink, Signer, Uplink};

/// Default number of delivery attempts per batch
pub const DEFAULT_ATTEMPTS: usize = 5;

/// Queue file of `stream` for `location`.
pub fn queue_path<P: AsRef<Path>>(dir: P, location: &str, stream: Stream) -> std::path::PathBuf {
    dir.as_ref()
        .join(format!("{}-{}.queue", location, stream.endpoint()))
}

/// Outcome of [Forwarder::forward]
#[derive(Debug)]
pub enum Dispatch {
    /// A delivery task was spawned
    Spawned(JoinHandle<()>),
    /// A task is already running: the batch was queued behind it
    Deferred,
}

struct Backlog {
    queue: DurableQueue,
    /// Entries appended while the current task is in flight
    deferred: usize,
}

/// [Forwarder] delivers the batches of one [Stream].
///
/// At most one delivery task runs at a time. The task drains the durable
/// queue first, then sends its fresh batch, so the collector receives the
/// stream's windows in closing order. Batches that cannot be delivered stay
/// in the queue until a later task succeeds.
pub struct Forwarder<U: Uplink + 'static> {
    stream: Stream,
    uplink: Arc<U>,
    backlog: Arc<Mutex<Backlog>>,
    in_flight: Arc<AtomicBool>,
    attempts: usize,
    fatal: UnboundedSender<Error>,
    runtime: Handle,
}

impl<U: Uplink + 'static> Forwarder<U> {
    /// Builds a new [Forwarder]. Must be called from within the tokio runtime.
    /// Unrecoverable task errors are reported on `fatal`.
    pub fn new(
        stream: Stream,
        uplink: Arc<U>,
        queue: DurableQueue,
        attempts: usize,
        fatal: UnboundedSender<Error>,
    ) -> Self {
        if !queue.is_empty() {
            info!(
                "{} - {} batches awaiting delivery in {}",
                stream,
                queue.len(),
                queue.path().display()
            );
        }

        Self {
            stream,
            uplink,
            fatal,
            attempts: attempts.max(1),
            runtime: Handle::current(),
            in_flight: Arc::new(AtomicBool::new(false)),
            backlog: Arc::new(Mutex::new(Backlog { queue, deferred: 0 })),
        }
    }

    pub fn stream(&self) -> Stream {
        self.stream
    }

    /// Number of batches in the durable queue.
    pub fn queued(&self) -> Result<usize> {
        Ok(lock(&self.backlog)?.queue.len())
    }

    /// True while a delivery task runs.
    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Hands `payload` over for delivery, without blocking.
    /// Fails only when the batch could not be queued.
    pub fn forward(&self, payload: Vec<u8>) -> Result<Dispatch> {
        // serialized with the task releasing the flag
        let mut backlog = lock(&self.backlog)?;

        if self.in_flight.swap(true, Ordering::AcqRel) {
            backlog.queue.push_back(&payload)?;
            backlog.deferred += 1;

            warn!(
                "{} - delivery in progress, {} bytes queued",
                self.stream,
                payload.len()
            );

            return Ok(Dispatch::Deferred);
        }

        backlog.deferred = 0;
        drop(backlog);

        let task = Task {
            stream: self.stream,
            uplink: Arc::clone(&self.uplink),
            backlog: Arc::clone(&self.backlog),
            attempts: self.attempts,
        };

        let in_flight = Arc::clone(&self.in_flight);
        let fatal = self.fatal.clone();

        let handle = self.runtime.spawn(async move {
            let result = task.run(payload).await;

            if let Err(e) = task.finish(result, &in_flight).await {
                error!("{} - forwarder failure: {}", task.stream, e);
                let _ = fatal.send(e);
            }
        });

        Ok(Dispatch::Spawned(handle))
    }

    /// Waits for the running task, if any.
    pub async fn settle(&self) {
        while self.in_flight() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

fn lock(backlog: &Mutex<Backlog>) -> Result<MutexGuard<'_, Backlog>> {
    backlog.lock().map_err(|_| Error::Poisoned("forwarder"))
}

struct Task<U: Uplink> {
    stream: Stream,
    uplink: Arc<U>,
    backlog: Arc<Mutex<Backlog>>,
    attempts: usize,
}

impl<U: Uplink> Task<U> {
    /// Delivers the backlog, then `payload`.
    /// Returns false if a batch had to be queued.
    async fn run(&self, payload: Vec<u8>) -> Result<bool> {
        if !self.drain(false).await? {
            info!(
                "{} - backlog pending, {} bytes queued",
                self.stream,
                payload.len()
            );
            self.requeue(payload).await?;
            return Ok(false);
        }

        if !self.deliver(&payload).await {
            warn!(
                "{} - delivery failed, {} bytes queued",
                self.stream,
                payload.len()
            );
            self.requeue(payload).await?;
            return Ok(false);
        }

        self.with_backlog(|backlog| {
            backlog.deferred = 0;
            Ok(())
        })
        .await?;

        // batches deferred during our flight
        self.drain(true).await
    }

    /// Clears the in-flight flag once nothing is left behind: batches
    /// deferred after the last drain are delivered by this task.
    async fn finish(&self, mut result: Result<bool>, in_flight: &AtomicBool) -> Result<()> {
        while let Ok(true) = result {
            match self.release(in_flight) {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    debug!("{} - batches deferred after drain", self.stream);
                    result = self.drain(true).await;
                },
                Err(e) => result = Err(e),
            }
        }

        in_flight.store(false, Ordering::Release);
        result.map(|_| ())
    }

    /// Clears `in_flight` if the queue is empty.
    fn release(&self, in_flight: &AtomicBool) -> Result<bool> {
        let backlog = lock(&self.backlog)?;

        if !backlog.queue.is_empty() {
            return Ok(false);
        }

        in_flight.store(false, Ordering::Release);
        Ok(true)
    }

    /// Posts `payload`, retrying immediately. Returns true on success.
    async fn deliver(&self, payload: &[u8]) -> bool {
        for attempt in 1..=self.attempts {
            match self.uplink.post(self.stream, payload).await {
                Ok(()) => {
                    info!("{} - delivered {} bytes", self.stream, payload.len());
                    return true;
                },
                Err(e) => {
                    warn!(
                        "{} - attempt {}/{} failed: {}",
                        self.stream, attempt, self.attempts, e
                    );
                },
            }
        }
        false
    }

    /// Delivers queued entries, oldest first. Entries deferred during this
    /// flight are left alone unless `deferred` is set.
    /// Returns false if an entry could not be delivered.
    async fn drain(&self, deferred: bool) -> Result<bool> {
        loop {
            let entry = self
                .with_backlog(move |backlog| {
                    let pending = if deferred {
                        backlog.queue.len()
                    } else {
                        backlog.queue.len().saturating_sub(backlog.deferred)
                    };

                    if pending == 0 {
                        return Ok(None);
                    }

                    backlog.queue.front()
                })
                .await?;

            let Some(entry) = entry else {
                return Ok(true);
            };

            debug!("{} - draining {} queued bytes", self.stream, entry.len());

            if !self.deliver(&entry).await {
                return Ok(false);
            }

            self.with_backlog(move |backlog| {
                backlog.queue.pop_front()?;

                if deferred {
                    backlog.deferred = backlog.deferred.saturating_sub(1);
                }
                Ok(())
            })
            .await?;
        }
    }

    /// Queues our own batch ahead of the ones deferred during our flight.
    async fn requeue(&self, payload: Vec<u8>) -> Result<()> {
        self.with_backlog(move |backlog| {
            let index = backlog.queue.len().saturating_sub(backlog.deferred);
            backlog.queue.insert(index, &payload)
        })
        .await
    }

    /// Runs `op` on the locked backlog, off the async workers.
    async fn with_backlog<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Backlog) -> Result<T> + Send + 'static,
    {
        let backlog = Arc::clone(&self.backlog);

        tokio::task::spawn_blocking(move || op(&mut *lock(&backlog)?))
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))?
    }
}
