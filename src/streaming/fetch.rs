//! Asynchronous byte fetching with bounded concurrency
//!
//! Requests go over a channel to a worker task which runs up to
//! `max_concurrent` fetches at once. Results come back in completion order
//! and are drained without blocking by the owning thread, so all registry and
//! material state is only ever touched there.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::core::{Error, Result};
use crate::material::texture::is_absolute_url;

/// Future returned by a [`ByteSource`]
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'static>>;

/// Opaque source of file bytes (filesystem, in-memory, network)
pub trait ByteSource: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> FetchFuture;
}

/// Reads paths relative to a root directory
#[derive(Clone, Debug)]
pub struct FsByteSource {
    root: PathBuf,
}

impl FsByteSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl ByteSource for FsByteSource {
    fn fetch(&self, path: &str) -> FetchFuture {
        let path = path.to_string();
        if is_absolute_url(&path) {
            return Box::pin(async move {
                Err(Error::fetch(path, "network sources are not supported"))
            });
        }
        let full = self.root.join(&path);
        Box::pin(async move {
            tokio::fs::read(&full)
                .await
                .map_err(|e| Error::fetch(path, e))
        })
    }
}

/// Byte source backed by a shared map; paths not present fail with `Error::Fetch`
#[derive(Clone, Debug, Default)]
pub struct MemoryByteSource {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), bytes);
        }
    }

    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().ok().and_then(|mut files| files.remove(path))
    }

    pub fn len(&self) -> usize {
        self.files.lock().map_or(0, |files| files.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for MemoryByteSource {
    fn fetch(&self, path: &str) -> FetchFuture {
        let found = self
            .files
            .lock()
            .ok()
            .and_then(|files| files.get(path).cloned());
        let path = path.to_string();
        Box::pin(async move { found.ok_or_else(|| Error::fetch(path, "not found")) })
    }
}

/// Request to fetch one path
#[derive(Debug)]
struct FetchRequest<T> {
    tag: T,
    path: String,
}

/// A completed fetch
#[derive(Debug)]
pub struct FetchResult<T> {
    /// Caller-supplied tag identifying what the bytes are for
    pub tag: T,
    pub path: String,
    pub result: Result<Vec<u8>>,
}

/// Concurrent fetch queue driven by a background worker task
pub struct FetchQueue<T> {
    request_tx: mpsc::UnboundedSender<FetchRequest<T>>,
    result_rx: mpsc::UnboundedReceiver<FetchResult<T>>,
    in_flight: usize,
    /// Dedicated runtime when not created inside one
    #[allow(dead_code)]
    runtime: Option<Runtime>,
}

impl<T: Send + 'static> FetchQueue<T> {
    /// Create a queue with its own runtime.
    ///
    /// Must not be dropped from within an async context.
    pub fn new(source: Arc<dyn ByteSource>, max_concurrent: usize) -> Result<Self> {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<FetchRequest<T>>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<FetchResult<T>>();

        let runtime = Runtime::new()?;
        runtime.spawn(async move {
            Self::worker_loop(source, max_concurrent, &mut request_rx, result_tx).await;
        });

        Ok(Self {
            request_tx,
            result_rx,
            in_flight: 0,
            runtime: Some(runtime),
        })
    }

    /// Create a queue on the current tokio runtime.
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new_with_current_runtime(source: Arc<dyn ByteSource>, max_concurrent: usize) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<FetchRequest<T>>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<FetchResult<T>>();

        tokio::spawn(async move {
            Self::worker_loop(source, max_concurrent, &mut request_rx, result_tx).await;
        });

        Self {
            request_tx,
            result_rx,
            in_flight: 0,
            runtime: None,
        }
    }

    async fn worker_loop(
        source: Arc<dyn ByteSource>,
        max_concurrent: usize,
        request_rx: &mut mpsc::UnboundedReceiver<FetchRequest<T>>,
        result_tx: mpsc::UnboundedSender<FetchResult<T>>,
    ) {
        let max_concurrent = max_concurrent.max(1);
        let mut active_tasks = JoinSet::new();
        let mut queued: VecDeque<FetchRequest<T>> = VecDeque::new();

        loop {
            tokio::select! {
                Some(request) = request_rx.recv() => {
                    queued.push_back(request);
                }

                Some(joined) = active_tasks.join_next(), if !active_tasks.is_empty() => {
                    match joined {
                        Ok(result) => {
                            // Receiver gone means the queue was dropped
                            if result_tx.send(result).is_err() {
                                break;
                            }
                        }
                        Err(e) => log::error!("Fetch task panicked: {}", e),
                    }
                }

                else => {
                    if queued.is_empty() && active_tasks.is_empty() {
                        break;
                    }
                }
            }

            // Issue order is request order; the caller already prioritized
            while active_tasks.len() < max_concurrent {
                let Some(FetchRequest { tag, path }) = queued.pop_front() else {
                    break;
                };
                let fetch = source.fetch(&path);
                active_tasks.spawn(async move {
                    let result = fetch.await;
                    FetchResult { tag, path, result }
                });
            }
        }
    }

    /// Queue a fetch of `path`; the result comes back with `tag`
    pub fn request(&mut self, tag: T, path: String) -> Result<()> {
        self.request_tx
            .send(FetchRequest { tag, path })
            .map_err(|e| Error::fetch(e.0.path, "fetch worker stopped"))?;
        self.in_flight += 1;
        Ok(())
    }

    /// Drain completed fetches (non-blocking)
    pub fn poll_results(&mut self) -> Vec<FetchResult<T>> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(result);
        }
        self.in_flight = self.in_flight.saturating_sub(results.len());
        results
    }

    /// Wait for the next completed fetch.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_result(&mut self) -> Option<FetchResult<T>> {
        if self.in_flight == 0 {
            return None;
        }
        let result = self.result_rx.recv().await?;
        self.in_flight -= 1;
        Some(result)
    }

    /// Requests issued but not yet drained
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
