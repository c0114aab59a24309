//! Sample ring buffer bridging the acquisition interrupt and the poll task.
//!
//! Single producer (ADC interrupt/DMA callback), single consumer (poll task).
//! Backed by a lock-free bounded channel, so the producer side never waits:
//! a push against a full buffer fails immediately and the sample is dropped
//! and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Number of sample slots in the ring.
pub const RING_CAPACITY: usize = 1500;

/// Producer half, handed to the acquisition interrupt context.
#[derive(Clone)]
pub struct SampleProducer {
    tx: flume::Sender<i16>,
    dropped: Arc<AtomicU64>,
}

impl SampleProducer {
    /// Push one sample. Returns `false` (and counts a drop) when the ring
    /// is full; never blocks.
    pub fn push(&self, sample: i16) -> bool {
        match self.tx.try_send(sample) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The ring itself; the consumer side lives with the modem.
pub struct SampleRing {
    tx: flume::Sender<i16>,
    rx: flume::Receiver<i16>,
    dropped: Arc<AtomicU64>,
}

impl SampleRing {
    pub fn new() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Obtain a producer handle for the interrupt context.
    pub fn producer(&self) -> SampleProducer {
        SampleProducer {
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Push from the owning side. Same semantics as `SampleProducer::push`.
    pub fn push(&self, sample: i16) -> bool {
        match self.tx.try_send(sample) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop one sample without waiting.
    pub fn pop(&self) -> Option<i16> {
        self.rx.try_recv().ok()
    }

    /// Pop with a strictly bounded wait for an in-flight writer; fails
    /// rather than stalling.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<i16> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Samples the producer failed to enqueue so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Discard everything queued (receive-inhibit while transmitting).
    pub fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new()
    }
}
