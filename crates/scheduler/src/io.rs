//! IO thread for tile reads.
//!
//! This module provides a single dedicated IO thread that runs disk reads
//! off the render thread. Tasks arrive over a bounded channel; when the channel
//! is full the submitter gets the task back and may retry on a later frame.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};

/// Callback run on the IO thread for every task it receives.
///
/// # Arguments
///
/// * `task` - The task to execute, moved onto the IO thread
pub type IoExecutor<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Default number of tasks that may wait for the IO thread
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Configuration for the IO thread.
#[derive(Debug, Clone)]
pub struct IoThreadConfig {
    /// Thread name. Default: `relief-io`.
    pub name: String,

    /// Maximum number of tasks waiting to run. Default: 256.
    pub queue_capacity: usize,
}

impl Default for IoThreadConfig {
    fn default() -> Self {
        Self {
            name: "relief-io".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl IoThreadConfig {
    /// Create a new IO thread configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the thread name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Why a task was not accepted. The task is handed back.
#[derive(PartialEq, Eq)]
pub enum SubmitError<T> {
    /// The task queue is at capacity
    Full(T),
    /// The IO thread is shutting down
    ShutDown(T),
}

impl<T> SubmitError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SubmitError::Full(task) | SubmitError::ShutDown(task) => task,
        }
    }
}

impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("Full(..)"),
            SubmitError::ShutDown(_) => f.write_str("ShutDown(..)"),
        }
    }
}

/// Dedicated IO thread.
///
/// Tasks run one at a time, in submission order. After shutdown is signalled
/// queued tasks are skipped; the task already running finishes.
///
/// # Example
///
/// ```
/// use relief_scheduler::{IoExecutor, IoThread, IoThreadConfig};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let bytes_read = Arc::new(AtomicUsize::new(0));
/// let counter = bytes_read.clone();
///
/// // Create an IO executor callback
/// let executor: IoExecutor<usize> = Arc::new(move |len| {
///     counter.fetch_add(len, Ordering::SeqCst);
/// });
///
/// let io_thread = IoThread::new(executor, IoThreadConfig::default());
/// io_thread.try_submit(4096).unwrap();
///
/// // Shutdown when done
/// io_thread.shutdown();
/// ```
pub struct IoThread<T: Send + 'static> {
    sender: Option<Sender<T>>,
    thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl<T: Send + 'static> IoThread<T> {
    /// Create and start a new IO thread.
    ///
    /// # Arguments
    ///
    /// * `executor` - Callback run for every task
    /// * `config` - IO thread configuration
    pub fn new(executor: IoExecutor<T>, config: IoThreadConfig) -> Self {
        let (sender, receiver) = channel::bounded(config.queue_capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let thread = thread::Builder::new()
            .name(config.name)
            .spawn(move || {
                Self::run(receiver, executor, shutdown_clone);
            })
            .expect("Failed to spawn IO thread");

        Self {
            sender: Some(sender),
            thread: Some(thread),
            shutdown,
        }
    }

    /// Queue a task without blocking.
    pub fn try_submit(&self, task: T) -> Result<(), SubmitError<T>> {
        if self.is_shutting_down() {
            return Err(SubmitError::ShutDown(task));
        }
        match &self.sender {
            Some(sender) => sender.try_send(task).map_err(|e| match e {
                TrySendError::Full(task) => SubmitError::Full(task),
                TrySendError::Disconnected(task) => SubmitError::ShutDown(task),
            }),
            None => Err(SubmitError::ShutDown(task)),
        }
    }

    /// Check if the IO thread is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Shutdown the IO thread gracefully.
    ///
    /// This signals the IO thread to stop and waits for it to finish
    /// its current task and exit. Tasks still queued are dropped.
    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Signal the IO thread to stop without waiting for it.
    ///
    /// Tasks still queued are dropped. The task already running finishes in
    /// the background, after which the thread exits on its own.
    pub fn detach(mut self) {
        self.signal();
        // Dropping the handle detaches the thread
        self.thread = None;
    }

    fn signal(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        // Disconnecting wakes the thread if it is waiting for work
        self.sender = None;
    }

    fn stop(&mut self) {
        self.signal();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("IO thread panicked");
            }
        }
    }

    /// Main IO thread loop.
    fn run(receiver: Receiver<T>, executor: IoExecutor<T>, shutdown: Arc<AtomicBool>) {
        while let Ok(task) = receiver.recv() {
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            executor(task);
        }
        log::debug!("IO thread exiting");
    }
}

impl<T: Send + 'static> Drop for IoThread<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
