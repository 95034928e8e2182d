//! Background Runtime
//!
//! A process-wide multi-thread tokio runtime, started on first use, whose
//! worker threads are named `jwcache-worker`.

use std::future::Future;

use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{CacheError, Result};

/// Worker threads in the background runtime
const WORKER_THREADS: usize = 2;

static BACKGROUND: OnceCell<Runtime> = OnceCell::new();

/// Returns the background runtime, starting it if needed.
pub fn background() -> Result<&'static Runtime> {
    BACKGROUND.get_or_try_init(|| {
        let runtime = Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("jwcache-worker")
            .enable_all()
            .build()
            .map_err(CacheError::Runtime)?;
        info!(
            "Started background runtime with {} worker threads",
            WORKER_THREADS
        );
        Ok(runtime)
    })
}

/// Spawns a future on the background runtime.
///
/// The future never runs on the caller's stack: it is only polled by the
/// runtime's own workers.
pub fn spawn<F>(future: F) -> Result<JoinHandle<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Ok(background()?.spawn(future))
}
