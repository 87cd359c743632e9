//! Byte transport abstractions
//!
//! Provides the non-blocking source/sink trait a FastTransfer port is built
//! on. Every method must return immediately: the protocol core polls and
//! never waits.

use core::convert::Infallible;

/// Non-blocking byte transport
///
/// One physical channel (typically a UART) seen as a byte source and a byte
/// sink.
pub trait Transport {
    /// Error type for transmit operations
    type Error;

    /// Take one received byte, or `None` if nothing is available
    fn pull(&mut self) -> Option<u8>;

    /// Queue one byte for transmission
    fn push(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Check whether the receive side has no bytes waiting
    fn is_source_empty(&mut self) -> bool;

    /// Queue a run of bytes for transmission
    ///
    /// Stops at the first error.
    fn push_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for &byte in bytes {
            self.push(byte)?;
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn pull(&mut self) -> Option<u8> {
        (**self).pull()
    }

    fn push(&mut self, byte: u8) -> Result<(), Self::Error> {
        (**self).push(byte)
    }

    fn is_source_empty(&mut self) -> bool {
        (**self).is_source_empty()
    }
}

/// Transport built from three callbacks
///
/// For drivers that already expose "get one byte", "put one byte" and
/// "receive FIFO empty" as plain functions.
///
/// ```
/// use fasttransfer_hal::{FnTransport, Transport};
///
/// let mut rx = [0x06u8, 0x85].into_iter();
/// let mut sent = 0usize;
/// let mut transport = FnTransport::new(
///     || rx.next(),
///     |_byte| sent += 1,
///     || false,
/// );
/// assert_eq!(transport.pull(), Some(0x06));
/// transport.push(0xAA).unwrap();
/// ```
pub struct FnTransport<G, P, E> {
    get: G,
    put: P,
    empty: E,
}

impl<G, P, E> FnTransport<G, P, E>
where
    G: FnMut() -> Option<u8>,
    P: FnMut(u8),
    E: FnMut() -> bool,
{
    /// Bind the three callbacks
    pub fn new(get: G, put: P, empty: E) -> Self {
        Self { get, put, empty }
    }
}

impl<G, P, E> Transport for FnTransport<G, P, E>
where
    G: FnMut() -> Option<u8>,
    P: FnMut(u8),
    E: FnMut() -> bool,
{
    type Error = Infallible;

    fn pull(&mut self) -> Option<u8> {
        (self.get)()
    }

    fn push(&mut self, byte: u8) -> Result<(), Self::Error> {
        (self.put)(byte);
        Ok(())
    }

    fn is_source_empty(&mut self) -> bool {
        (self.empty)()
    }
}
