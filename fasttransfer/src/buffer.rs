//! Fixed-capacity ring buffer with indexed peek
//!
//! Each port reassembles incoming packets in one of these. The scanner needs
//! to look at arbitrary offsets from the oldest byte before deciding whether
//! to consume anything, which is why this is not a plain FIFO.

use core::ops::Index;

/// Circular byte queue holding at most `C` bytes
///
/// Pushing into a full buffer is refused; nothing is ever overwritten.
#[derive(Debug, Clone)]
pub struct RingBuffer<const C: usize> {
    data: [u8; C],
    /// Physical slot of the oldest byte
    head: usize,
    /// Number of bytes stored
    len: usize,
}

impl<const C: usize> Default for RingBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> RingBuffer<C> {
    const NON_ZERO: () = assert!(C > 0, "ring buffer capacity must be non-zero");

    /// Create an empty buffer
    pub const fn new() -> Self {
        let () = Self::NON_ZERO;
        Self {
            data: [0; C],
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of bytes the buffer can hold
    pub const fn capacity(&self) -> usize {
        C
    }

    /// Number of bytes currently stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == C
    }

    /// Append a byte at the back
    ///
    /// Returns `false` (and leaves the buffer untouched) if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = self.slot(self.len);
        self.data[tail] = byte;
        self.len += 1;
        true
    }

    /// Remove and return the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.data[self.head];
        self.head = (self.head + 1) % C;
        self.len -= 1;
        Some(byte)
    }

    /// Byte at logical offset `index` from the oldest byte, without removing it
    pub fn peek(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.data[self.slot(index)])
        } else {
            None
        }
    }

    /// Drop up to `count` bytes from the front
    ///
    /// Returns how many were actually dropped.
    pub fn discard(&mut self, count: usize) -> usize {
        let count = count.min(self.len);
        if count > 0 {
            self.head = (self.head + count) % C;
            self.len -= count;
        }
        count
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Iterate over the stored bytes, oldest first
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).map(move |i| self.data[self.slot(i)])
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.head + index) % C
    }
}

impl<const C: usize> Index<usize> for RingBuffer<C> {
    type Output = u8;

    /// # Panics
    /// Panics if `index >= self.len()`.
    fn index(&self, index: usize) -> &u8 {
        assert!(index < self.len, "ring buffer index out of range");
        &self.data[self.slot(index)]
    }
}
