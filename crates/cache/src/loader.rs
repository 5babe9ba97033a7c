//! Asynchronous tile loaders.
//!
//! A loader accepts tile keys from the owner thread, copies the tiles out of
//! the pyramid somewhere else, and hands the results back through a publish
//! queue the owner drains once per frame.

use relief_pyramid::{HostTile, PyramidError, TileKey, TilePyramid};
use relief_scheduler::{IoExecutor, IoThread, IoThreadConfig, OwnerQueue, OwnerSender, SubmitError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A finished load, successful or not.
#[derive(Debug)]
pub struct LoadResult {
    pub key: TileKey,
    pub outcome: Result<HostTile, PyramidError>,
}

/// Why a load request was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoadRejected {
    #[error("loader queue is full")]
    Full,
    #[error("loader is shut down")]
    ShutDown,
}

/// Moves tile reads off the owner thread.
pub trait TileLoader {
    /// Queue a read of `key`. Never blocks.
    fn request(&mut self, key: TileKey) -> Result<(), LoadRejected>;

    /// Take every result published since the last drain.
    fn drain(&mut self) -> Vec<LoadResult>;

    /// Stop accepting work without waiting for reads in flight. Results
    /// published afterwards are dropped by the worker. Returns the number of
    /// undrained results discarded.
    fn shutdown(&mut self) -> usize;

    fn is_shut_down(&self) -> bool;
}

fn load(pyramid: &TilePyramid, key: TileKey, border_cells: usize) -> LoadResult {
    let outcome = pyramid.copy_tile(key, border_cells);
    if let Err(e) = &outcome {
        log::warn!("failed to load tile {key}: {e}");
    }
    LoadResult { key, outcome }
}

fn publish_or_drop(sender: &OwnerSender<LoadResult>, result: LoadResult) {
    if let Err(result) = sender.publish(result) {
        log::debug!("dropping tile {} loaded after shutdown", result.key);
    }
}

/// Loads tiles on a dedicated IO thread.
pub struct ThreadedLoader {
    io: Option<IoThread<TileKey>>,
    queue: OwnerQueue<LoadResult>,
}

impl ThreadedLoader {
    /// # Arguments
    ///
    /// * `pyramid` - Source of tiles, shared with the IO thread
    /// * `border_cells` - Margin read around every tile
    /// * `queue_capacity` - Requests that may wait for the IO thread
    pub fn new(pyramid: Arc<TilePyramid>, border_cells: usize, queue_capacity: usize) -> Self {
        let queue = OwnerQueue::new();
        let sender = queue.sender();
        let executor: IoExecutor<TileKey> = Arc::new(move |key| {
            publish_or_drop(&sender, load(&pyramid, key, border_cells));
        });
        let io = IoThread::new(
            executor,
            IoThreadConfig::new().with_queue_capacity(queue_capacity),
        );
        Self {
            io: Some(io),
            queue,
        }
    }
}

impl TileLoader for ThreadedLoader {
    fn request(&mut self, key: TileKey) -> Result<(), LoadRejected> {
        match &self.io {
            Some(io) => io.try_submit(key).map_err(|e| match e {
                SubmitError::Full(_) => LoadRejected::Full,
                SubmitError::ShutDown(_) => LoadRejected::ShutDown,
            }),
            None => Err(LoadRejected::ShutDown),
        }
    }

    fn drain(&mut self) -> Vec<LoadResult> {
        self.queue.drain()
    }

    fn shutdown(&mut self) -> usize {
        // Close first so a read still running publishes into a closed queue
        let discarded = self.queue.close().len();
        if let Some(io) = self.io.take() {
            io.detach();
        }
        discarded
    }

    fn is_shut_down(&self) -> bool {
        self.io.is_none()
    }
}

impl Drop for ThreadedLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Loads tiles synchronously inside [`TileLoader::request`].
///
/// Results are still delivered through [`TileLoader::drain`], so the cache
/// sees them one frame later exactly as with a threaded loader.
pub struct InlineLoader {
    pyramid: Arc<TilePyramid>,
    border_cells: usize,
    capacity: usize,
    ready: VecDeque<LoadResult>,
    shut_down: bool,
}

impl InlineLoader {
    pub fn new(pyramid: Arc<TilePyramid>, border_cells: usize, capacity: usize) -> Self {
        Self {
            pyramid,
            border_cells,
            capacity,
            ready: VecDeque::new(),
            shut_down: false,
        }
    }
}

impl TileLoader for InlineLoader {
    fn request(&mut self, key: TileKey) -> Result<(), LoadRejected> {
        if self.shut_down {
            return Err(LoadRejected::ShutDown);
        }
        if self.ready.len() >= self.capacity {
            return Err(LoadRejected::Full);
        }
        self.ready
            .push_back(load(&self.pyramid, key, self.border_cells));
        Ok(())
    }

    fn drain(&mut self) -> Vec<LoadResult> {
        self.ready.drain(..).collect()
    }

    fn shutdown(&mut self) -> usize {
        self.shut_down = true;
        let discarded = self.ready.len();
        self.ready.clear();
        discarded
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

type RequestQueue = Arc<Mutex<VecDeque<TileKey>>>;

fn lock(requests: &RequestQueue) -> std::sync::MutexGuard<'_, VecDeque<TileKey>> {
    requests.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Loader whose requests wait until a [`ManualLoaderHandle`] runs them.
///
/// Lets a caller decide exactly when each load completes, including after
/// the cache has shut the loader down.
pub struct ManualLoader {
    requests: RequestQueue,
    queue: OwnerQueue<LoadResult>,
    capacity: usize,
    shut_down: Arc<AtomicBool>,
}

/// Runs the requests of a [`ManualLoader`].
#[derive(Clone)]
pub struct ManualLoaderHandle {
    pyramid: Arc<TilePyramid>,
    border_cells: usize,
    requests: RequestQueue,
    sender: OwnerSender<LoadResult>,
    shut_down: Arc<AtomicBool>,
}

impl ManualLoader {
    pub fn new(
        pyramid: Arc<TilePyramid>,
        border_cells: usize,
        capacity: usize,
    ) -> (Self, ManualLoaderHandle) {
        let requests: RequestQueue = Arc::default();
        let queue = OwnerQueue::new();
        let shut_down = Arc::new(AtomicBool::new(false));
        let handle = ManualLoaderHandle {
            pyramid,
            border_cells,
            requests: requests.clone(),
            sender: queue.sender(),
            shut_down: shut_down.clone(),
        };
        let loader = Self {
            requests,
            queue,
            capacity,
            shut_down,
        };
        (loader, handle)
    }
}

impl TileLoader for ManualLoader {
    fn request(&mut self, key: TileKey) -> Result<(), LoadRejected> {
        if self.is_shut_down() {
            return Err(LoadRejected::ShutDown);
        }
        let mut requests = lock(&self.requests);
        if requests.len() >= self.capacity {
            return Err(LoadRejected::Full);
        }
        requests.push_back(key);
        Ok(())
    }

    fn drain(&mut self) -> Vec<LoadResult> {
        self.queue.drain()
    }

    fn shutdown(&mut self) -> usize {
        self.shut_down.store(true, Ordering::Release);
        self.queue.close().len()
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl ManualLoaderHandle {
    /// Requests not yet run, oldest first
    pub fn pending(&self) -> Vec<TileKey> {
        lock(&self.requests).iter().copied().collect()
    }

    /// Run the oldest request and publish its result.
    pub fn run_next(&self) -> Option<TileKey> {
        let key = lock(&self.requests).pop_front()?;
        publish_or_drop(&self.sender, load(&self.pyramid, key, self.border_cells));
        Some(key)
    }

    /// Run every pending request. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        while self.run_next().is_some() {
            count += 1;
        }
        count
    }

    /// Complete the oldest request with a read error.
    pub fn fail_next(&self) -> Option<TileKey> {
        let key = lock(&self.requests).pop_front()?;
        let error = PyramidError::Level {
            level: key.level,
            source: relief_pyramid::LevelError::Read {
                band: key.band,
                tile: key.tile,
                source: std::io::Error::other("injected failure"),
            },
        };
        publish_or_drop(
            &self.sender,
            LoadResult {
                key,
                outcome: Err(error),
            },
        );
        Some(key)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}
