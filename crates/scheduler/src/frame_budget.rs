//! Per-frame work quotas
//!
//! Each frame the cache is allowed a fixed number of host evictions, device
//! evictions and host-to-device transfers. A [`FrameQuota`] counts one of
//! those allowances down as work is done, so the render loop never does
//! more than its share in a single frame.

/// Count-limited allowance for one kind of work within one frame
///
/// # Example
///
/// ```
/// use relief_scheduler::FrameQuota;
///
/// let mut transfers = FrameQuota::new(2);
/// assert!(transfers.try_take());
/// assert!(transfers.try_take());
///
/// // Third transfer waits for the next frame
/// assert!(!transfers.try_take());
/// assert!(transfers.is_spent());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameQuota {
    /// Units allowed per frame
    limit: usize,

    /// Units taken so far this frame
    used: usize,
}

impl FrameQuota {
    /// Create a quota allowing `limit` units per frame
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Take one unit if any remain
    pub fn try_take(&mut self) -> bool {
        if self.used < self.limit {
            self.used += 1;
            true
        } else {
            false
        }
    }

    pub fn is_spent(&self) -> bool {
        self.used >= self.limit
    }
}
