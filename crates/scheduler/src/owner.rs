//! Publish queue back to the owner thread.
//!
//! Work finished on the IO thread is handed to the thread that owns the
//! cache through an [`OwnerQueue`]. The worker holds an [`OwnerSender`]; the
//! owner drains the queue at a point of its choosing. Once the owner closes
//! the queue every later publish fails and the value comes back to the
//! worker, which drops it.

use crossbeam::channel::{self, Receiver, Sender};

/// Owner side of the publish queue.
#[derive(Debug)]
pub struct OwnerQueue<T> {
    sender: Sender<T>,
    receiver: Option<Receiver<T>>,
}

/// Worker side of the publish queue.
#[derive(Debug)]
pub struct OwnerSender<T> {
    sender: Sender<T>,
}

impl<T> Clone for OwnerSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> OwnerSender<T> {
    /// Hand `value` to the owner thread.
    ///
    /// Returns the value back if the owner has closed the queue.
    pub fn publish(&self, value: T) -> Result<(), T> {
        self.sender.send(value).map_err(|e| e.into_inner())
    }
}

impl<T> Default for OwnerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OwnerQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }

    pub fn sender(&self) -> OwnerSender<T> {
        OwnerSender {
            sender: self.sender.clone(),
        }
    }

    /// Take every value published so far, in publish order.
    pub fn drain(&self) -> Vec<T> {
        match &self.receiver {
            Some(receiver) => receiver.try_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Number of values waiting to be drained
    pub fn len(&self) -> usize {
        self.receiver.as_ref().map_or(0, |r| r.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the queue, returning the values that were never drained.
    ///
    /// Publishes after this point fail.
    pub fn close(&mut self) -> Vec<T> {
        match self.receiver.take() {
            Some(receiver) => receiver.try_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }
}
