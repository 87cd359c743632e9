//! In-memory transport
//!
//! A transport backed by two fixed-capacity byte queues. Used on the host for
//! tests and simulations, and on targets whose driver delivers bytes in
//! chunks (async reads) rather than one at a time.

use heapless::{Deque, Vec};

use crate::transport::Transport;

/// Error from in-memory transmit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryError {
    /// Transmit queue has no room left
    TxFull,
}

/// Transport over a receive queue of `RX` bytes and a transmit queue of `TX` bytes
#[derive(Debug, Clone)]
pub struct MemoryTransport<const RX: usize, const TX: usize> {
    rx: Deque<u8, RX>,
    tx: Vec<u8, TX>,
    /// Received bytes refused because the receive queue was full
    dropped: u32,
}

impl<const RX: usize, const TX: usize> Default for MemoryTransport<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const RX: usize, const TX: usize> MemoryTransport<RX, TX> {
    /// Create an empty transport
    pub const fn new() -> Self {
        Self {
            rx: Deque::new(),
            tx: Vec::new(),
            dropped: 0,
        }
    }

    /// Make bytes available on the receive side
    ///
    /// Returns the number of bytes accepted. Bytes that do not fit are
    /// dropped and counted in [`Self::dropped`].
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in bytes {
            if self.rx.push_back(byte).is_err() {
                self.dropped = self.dropped.saturating_add(1);
            } else {
                accepted += 1;
            }
        }
        accepted
    }

    /// Number of received bytes not yet pulled
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Received bytes lost to a full receive queue
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Bytes pushed for transmission so far
    pub fn sent(&self) -> &[u8] {
        &self.tx
    }

    /// Forget everything transmitted so far
    pub fn clear_sent(&mut self) {
        self.tx.clear();
    }
}

impl<const RX: usize, const TX: usize> Transport for MemoryTransport<RX, TX> {
    type Error = MemoryError;

    fn pull(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn push(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.tx.push(byte).map_err(|_| MemoryError::TxFull)
    }

    fn is_source_empty(&mut self) -> bool {
        self.rx.is_empty()
    }
}
