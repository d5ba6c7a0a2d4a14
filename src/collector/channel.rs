//! Channel-backed input collector.
//!
//! Producers (the camera loop, the browser relay, a replay file) push
//! `SessionInput`s through a cloneable `InputSender`; the session loop drains
//! the receiver. Nothing is buffered beyond the channel itself.

use crate::collector::types::SessionInput;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Channel capacity; roughly five minutes of 30fps frames.
pub const CHANNEL_CAPACITY: usize = 10_000;

/// Errors that can occur while collecting inputs.
#[derive(Debug, PartialEq, Eq)]
pub enum CollectorError {
    AlreadyRunning,
    NotRunning,
    Backpressure,
    Disconnected,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::NotRunning => write!(f, "Collector is not running"),
            CollectorError::Backpressure => write!(f, "Input channel is full"),
            CollectorError::Disconnected => write!(f, "Input channel disconnected"),
        }
    }
}

impl std::error::Error for CollectorError {}

/// Producer handle for a collector.
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<SessionInput>,
    running: Arc<AtomicBool>,
}

impl InputSender {
    /// Push an input without blocking.
    pub fn send(&self, input: SessionInput) -> Result<(), CollectorError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::NotRunning);
        }
        self.sender.try_send(input).map_err(|e| match e {
            TrySendError::Full(_) => CollectorError::Backpressure,
            TrySendError::Disconnected(_) => CollectorError::Disconnected,
        })
    }
}

/// Collects session inputs from any number of producers.
pub struct InputCollector {
    sender: Sender<SessionInput>,
    receiver: Receiver<SessionInput>,
    running: Arc<AtomicBool>,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start accepting inputs.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop accepting inputs. Already queued inputs stay receivable.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get a producer handle.
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
            running: self.running.clone(),
        }
    }

    pub fn receiver(&self) -> &Receiver<SessionInput> {
        &self.receiver
    }

    /// Try to receive an input without blocking.
    pub fn try_recv(&self) -> Option<SessionInput> {
        self.receiver.try_recv().ok()
    }
}

impl Default for InputCollector {
    fn default() -> Self {
        Self::new()
    }
}
