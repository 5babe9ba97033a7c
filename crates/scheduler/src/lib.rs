//! Relief Scheduler Library
//!
//! Threading and per-frame budgeting for tile streaming.
//!
//! This crate provides the single dedicated IO thread that reads tiles off the
//! render thread, the publish queue that carries finished reads back to the
//! thread owning the cache, and the count-based quotas that bound per-frame
//! work.
//!
//! # Example
//!
//! ```
//! use relief_scheduler::{IoExecutor, IoThread, IoThreadConfig, OwnerQueue};
//! use std::sync::Arc;
//!
//! let queue = OwnerQueue::new();
//! let publish = queue.sender();
//!
//! // The IO thread squares numbers and hands them back
//! let executor: IoExecutor<u64> = Arc::new(move |n| {
//!     let _ = publish.publish(n * n);
//! });
//! let io_thread = IoThread::new(executor, IoThreadConfig::default());
//! io_thread.try_submit(7).unwrap();
//!
//! // The owner thread drains results at a point of its choosing
//! let mut results = Vec::new();
//! while results.is_empty() {
//!     results = queue.drain();
//!     std::thread::yield_now();
//! }
//! assert_eq!(results, vec![49]);
//!
//! io_thread.shutdown();
//! ```

pub mod frame_budget;
mod io;
mod owner;

// Re-export public API
pub use frame_budget::FrameQuota;
pub use io::{IoExecutor, IoThread, IoThreadConfig, SubmitError, DEFAULT_QUEUE_CAPACITY};
pub use owner::{OwnerQueue, OwnerSender};
