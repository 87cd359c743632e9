//! Communication ports
//!
//! A port is one channel to a peer: the transport that moves bytes plus the
//! ring buffer that holds partially received packets between scans.

use fasttransfer_hal::Transport;

use crate::buffer::RingBuffer;
use crate::DEFAULT_MAX_PACKET_SIZE;

/// Identity of a port, used to reserve array entries for a single writer
///
/// Handed out by [`crate::Node::create_port`]; unique for the lifetime of the
/// node that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortId(u32);

impl PortId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric value, for logging
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// One communication channel with a `C` byte reassembly buffer
pub struct Port<T, const C: usize = DEFAULT_MAX_PACKET_SIZE> {
    id: PortId,
    transport: T,
    buffer: RingBuffer<C>,
}

impl<T: Transport, const C: usize> Port<T, C> {
    pub(crate) fn new(id: PortId, transport: T) -> Self {
        Self {
            id,
            transport,
            buffer: RingBuffer::new(),
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Received bytes not yet consumed by the scanner
    pub fn buffer(&self) -> &RingBuffer<C> {
        &self.buffer
    }

    /// Move bytes from the transport into the ring buffer
    ///
    /// Stops when the source reports empty or the buffer is full; whatever is
    /// left in the transport waits for the next call. Returns the number of
    /// bytes moved.
    pub fn fill(&mut self) -> usize {
        let mut moved = 0;
        while !self.buffer.is_full() && !self.transport.is_source_empty() {
            match self.transport.pull() {
                Some(byte) => {
                    self.buffer.push(byte);
                    moved += 1;
                }
                None => break,
            }
        }
        moved
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut RingBuffer<C> {
        &mut self.buffer
    }

    pub(crate) fn into_transport(self) -> T {
        self.transport
    }
}

impl<T, const C: usize> core::fmt::Debug for Port<T, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
