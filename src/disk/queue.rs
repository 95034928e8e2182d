//! Disk Queue Module
//!
//! A single worker thread running disk jobs strictly in submission order.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, info};

use crate::error::{CacheError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

// == Queue Handle ==
/// Cloneable submission side of a [`DiskQueue`].
#[derive(Clone)]
pub struct QueueHandle {
    sender: Sender<Job>,
}

impl QueueHandle {
    // == Submit ==
    /// Enqueues a job without waiting for it.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        self.sender
            .send(Box::new(job))
            .map_err(|_| CacheError::QueueClosed)
    }

    // == Run ==
    /// Enqueues a job and blocks the calling thread until it has run.
    ///
    /// Safe to call from any thread, including async runtime workers.
    pub fn run<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (reply, result) = channel::bounded(1);
        self.submit(move || {
            let _ = reply.send(job());
        })?;
        result.recv().map_err(|_| CacheError::QueueClosed)
    }

    // == Run Async ==
    /// Enqueues a job and awaits its result without blocking the executor.
    pub async fn run_async<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (reply, result) = tokio::sync::oneshot::channel();
        self.submit(move || {
            let _ = reply.send(job());
        })?;
        result.await.map_err(|_| CacheError::QueueClosed)
    }
}

// == Disk Queue ==
/// Owns the worker thread. Dropping it closes the queue and waits for every
/// job already submitted to finish.
pub struct DiskQueue {
    handle: QueueHandle,
    worker: Option<JoinHandle<()>>,
    name: String,
}

impl DiskQueue {
    // == Constructor ==
    /// Spawns the worker thread `jwcache-disk-<name>`.
    pub fn spawn(name: &str) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Job>();

        let worker = thread::Builder::new()
            .name(format!("jwcache-disk-{}", name.replace('\0', "_")))
            .spawn({
                let name = name.to_string();
                move || run_worker(&name, receiver)
            })
            .map_err(CacheError::Runtime)?;

        Ok(Self {
            handle: QueueHandle { sender },
            worker: Some(worker),
            name: name.to_string(),
        })
    }

    /// Submission handle, cloneable into async tasks.
    pub fn handle(&self) -> &QueueHandle {
        &self.handle
    }
}

fn run_worker(name: &str, receiver: Receiver<Job>) {
    info!("Starting disk queue for cache '{}'", name);
    let mut processed: u64 = 0;
    for job in receiver.iter() {
        job();
        processed += 1;
    }
    debug!(
        "Disk queue for cache '{}' drained after {} jobs",
        name, processed
    );
}

impl Drop for DiskQueue {
    fn drop(&mut self) {
        // Closing our sender lets the worker exit once every clone is gone
        let (closed, _) = channel::unbounded();
        drop(std::mem::replace(&mut self.handle, QueueHandle { sender: closed }));

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("Disk queue worker for cache '{}' panicked", self.name);
            }
        }
    }
}
