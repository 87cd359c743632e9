//! Packet layout and outgoing packet construction
//!
//! Packet format:
//! - HEADER_0 (1 byte): 0x06 synchronization byte
//! - HEADER_1 (1 byte): 0x85 synchronization byte
//! - SOURCE (1 byte): sender's node address
//! - DESTINATION (1 byte): receiver's node address
//! - LENGTH (1 byte): data length, a multiple of 4
//! - DATA (LENGTH bytes): (index: u16 BE, value: i16 BE) entries
//! - CRC (1 byte): CRC-8 of the DATA bytes only

use heapless::Vec;

use fasttransfer_hal::Transport;

use crate::convert::{
    least_significant_byte, least_significant_byte_unsigned, most_significant_byte,
    most_significant_byte_unsigned, to_signed, to_unsigned,
};
use crate::crc::crc8;

/// First synchronization byte
pub const HEADER_0: u8 = 0x06;

/// Second synchronization byte
pub const HEADER_1: u8 = 0x85;

/// Bytes before the data segment (two sync bytes, two addresses, length)
pub const HEADER_SIZE: usize = 5;

/// Offset of the length byte within the header
pub const SIZE_INDEX: usize = 4;

/// Trailing checksum size
pub const CRC_SIZE: usize = 1;

/// Framing bytes around the data segment
pub const PACKET_OVERHEAD: usize = HEADER_SIZE + CRC_SIZE;

/// Bytes per (index, value) entry
pub const ENTRY_SIZE: usize = 4;

/// Largest data length the one-byte length field can carry
pub const MAX_DATA_LEN: usize = 252;

/// Largest data segment that fits in a packet of `max_packet_size` bytes
pub const fn max_data_len(max_packet_size: usize) -> usize {
    let room = max_packet_size.saturating_sub(PACKET_OVERHEAD);
    let room = if room > MAX_DATA_LEN { MAX_DATA_LEN } else { room };
    room - room % ENTRY_SIZE
}

/// Errors from building or encoding packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Staging buffer cannot take another entry
    PacketFull,
    /// Output buffer too small for the encoded packet
    BufferTooSmall,
}

/// Error from sending a packet through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError<E> {
    /// Transport refused a byte
    Transport(E),
}

/// One (index, value) pair as carried in a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Entry {
    pub index: u16,
    pub value: i16,
}

impl Entry {
    pub const fn new(index: u16, value: i16) -> Self {
        Self { index, value }
    }

    /// Wire form: index MSB, index LSB, value MSB, value LSB
    pub const fn to_bytes(self) -> [u8; ENTRY_SIZE] {
        [
            most_significant_byte_unsigned(self.index),
            least_significant_byte_unsigned(self.index),
            most_significant_byte(self.value),
            least_significant_byte(self.value),
        ]
    }

    pub const fn from_bytes(bytes: [u8; ENTRY_SIZE]) -> Self {
        Self {
            index: to_unsigned(bytes[0], bytes[1]),
            value: to_signed(bytes[2], bytes[3]),
        }
    }
}

/// Decoded packet header
///
/// Only the sync bytes are checked when parsing. Address and length policy
/// belong to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub source: u8,
    pub destination: u8,
    pub data_len: u8,
}

impl Header {
    /// Parse the first [`HEADER_SIZE`] bytes of a candidate packet
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Option<Self> {
        if bytes[0] != HEADER_0 || bytes[1] != HEADER_1 {
            return None;
        }
        Some(Self {
            source: bytes[2],
            destination: bytes[3],
            data_len: bytes[SIZE_INDEX],
        })
    }

    pub const fn to_bytes(self) -> [u8; HEADER_SIZE] {
        [HEADER_0, HEADER_1, self.source, self.destination, self.data_len]
    }

    /// Complete framed size, header through CRC
    pub const fn packet_size(&self) -> usize {
        self.data_len as usize + PACKET_OVERHEAD
    }

    /// Length is a whole number of entries and the packet fits in `max_packet_size`
    pub const fn is_well_formed(&self, max_packet_size: usize) -> bool {
        self.data_len as usize % ENTRY_SIZE == 0 && self.packet_size() <= max_packet_size
    }
}

/// Staging area for one outgoing packet of at most `P` bytes
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder<const P: usize> {
    data: Vec<u8, P>,
}

impl<const P: usize> PacketBuilder<P> {
    /// Data bytes this builder accepts before reporting full
    pub const DATA_CAPACITY: usize = max_data_len(P);

    /// Create an empty builder
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Stage one entry
    ///
    /// Rejects the entry, leaving the staged data unchanged, if it would not
    /// fit.
    pub fn queue_entry(&mut self, index: u16, value: i16) -> Result<(), PacketError> {
        self.queue(Entry::new(index, value))
    }

    /// Stage one entry
    pub fn queue(&mut self, entry: Entry) -> Result<(), PacketError> {
        if self.data.len() + ENTRY_SIZE > Self::DATA_CAPACITY {
            return Err(PacketError::PacketFull);
        }
        self.data
            .extend_from_slice(&entry.to_bytes())
            .map_err(|_| PacketError::PacketFull)
    }

    /// Drop all staged entries
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Staged data segment
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of staged data bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Staged entries, in queue order
    pub fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
        self.data
            .chunks_exact(ENTRY_SIZE)
            .map(|c| Entry::from_bytes([c[0], c[1], c[2], c[3]]))
    }

    fn header(&self, source: u8, destination: u8) -> Header {
        Header {
            source,
            destination,
            // DATA_CAPACITY never exceeds MAX_DATA_LEN
            data_len: self.data.len() as u8,
        }
    }

    /// Encode the staged entries as a complete packet into `buffer`
    ///
    /// Returns the number of bytes written.
    pub fn encode(
        &self,
        source: u8,
        destination: u8,
        buffer: &mut [u8],
    ) -> Result<usize, PacketError> {
        let header = self.header(source, destination);
        let packet_len = header.packet_size();
        if buffer.len() < packet_len {
            return Err(PacketError::BufferTooSmall);
        }

        let data_end = HEADER_SIZE + self.data.len();
        buffer[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
        buffer[HEADER_SIZE..data_end].copy_from_slice(&self.data);
        buffer[data_end] = crc8(&self.data);

        Ok(packet_len)
    }

    /// Encode the staged entries as a complete packet into a heapless Vec
    pub fn encode_to_vec(&self, source: u8, destination: u8) -> Result<Vec<u8, P>, PacketError> {
        let mut vec = Vec::new();
        vec.resize_default(self.data.len() + PACKET_OVERHEAD)
            .map_err(|_| PacketError::BufferTooSmall)?;
        let len = self.encode(source, destination, &mut vec)?;
        vec.truncate(len);
        Ok(vec)
    }

    /// Write the staged entries as a complete packet to `transport`
    ///
    /// Returns the number of bytes written. Staged data is left untouched.
    pub fn write_to<T: Transport + ?Sized>(
        &self,
        source: u8,
        destination: u8,
        transport: &mut T,
    ) -> Result<usize, SendError<T::Error>> {
        let header = self.header(source, destination);
        transport
            .push_all(&header.to_bytes())
            .map_err(SendError::Transport)?;
        transport
            .push_all(&self.data)
            .map_err(SendError::Transport)?;
        transport
            .push(crc8(&self.data))
            .map_err(SendError::Transport)?;
        Ok(header.packet_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fasttransfer_hal::MemoryTransport;

    #[test]
    fn test_max_data_len() {
        assert_eq!(max_data_len(64), 56);
        assert_eq!(max_data_len(10), 4);
        assert_eq!(max_data_len(9), 0);
        assert_eq!(max_data_len(0), 0);
        assert_eq!(max_data_len(1024), MAX_DATA_LEN);
    }

    #[test]
    fn test_entry_wire_form() {
        let entry = Entry::new(0x0102, -20000);
        assert_eq!(entry.to_bytes(), [0x01, 0x02, 0xB1, 0xE0]);
        assert_eq!(Entry::from_bytes([0x01, 0x02, 0xB1, 0xE0]), entry);
    }

    #[test]
    fn test_header_parse() {
        let header = Header::parse(&[HEADER_0, HEADER_1, 2, 1, 8]).unwrap();
        assert_eq!(header.source, 2);
        assert_eq!(header.destination, 1);
        assert_eq!(header.data_len, 8);
        assert_eq!(header.packet_size(), 14);
        assert!(header.is_well_formed(64));
        assert!(!header.is_well_formed(13));

        assert!(Header::parse(&[HEADER_0, 0x00, 2, 1, 8]).is_none());
        assert!(Header::parse(&[0x00, HEADER_1, 2, 1, 8]).is_none());
    }

    #[test]
    fn test_header_length_not_multiple_of_entry() {
        let header = Header::parse(&[HEADER_0, HEADER_1, 2, 1, 6]).unwrap();
        assert!(!header.is_well_formed(64));
    }

    #[test]
    fn test_encode_single_entry() {
        let mut builder = PacketBuilder::<64>::new();
        builder.queue_entry(5, 10).unwrap();

        let mut buffer = [0u8; 16];
        let len = builder.encode(1, 2, &mut buffer).unwrap();

        assert_eq!(len, 10);
        assert_eq!(&buffer[..5], &[HEADER_0, HEADER_1, 1, 2, 4]);
        assert_eq!(&buffer[5..9], &[0x00, 0x05, 0x00, 0x0A]);
        assert_eq!(buffer[9], crc8(&[0x00, 0x05, 0x00, 0x0A]));
    }

    #[test]
    fn test_encode_empty_packet() {
        let builder = PacketBuilder::<64>::new();
        let encoded = builder.encode_to_vec(3, 4).unwrap();
        assert_eq!(encoded.as_slice(), &[HEADER_0, HEADER_1, 3, 4, 0, 0]);
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut builder = PacketBuilder::<64>::new();
        builder.queue_entry(1, 1).unwrap();
        let mut buffer = [0u8; 9];
        assert_eq!(
            builder.encode(1, 2, &mut buffer),
            Err(PacketError::BufferTooSmall)
        );
    }

    #[test]
    fn test_queue_rejects_overflow() {
        // 18-byte packets leave room for exactly three entries
        let mut builder = PacketBuilder::<18>::new();
        for i in 0..3 {
            builder.queue_entry(i, i as i16).unwrap();
        }
        assert_eq!(builder.queue_entry(3, 3), Err(PacketError::PacketFull));
        assert_eq!(builder.len(), 12);

        builder.clear();
        assert!(builder.is_empty());
        builder.queue_entry(3, 3).unwrap();
    }

    #[test]
    fn test_entries_iterate_in_order() {
        let mut builder = PacketBuilder::<64>::new();
        builder.queue_entry(1, -1).unwrap();
        builder.queue_entry(2, 300).unwrap();

        let mut entries = builder.entries();
        assert_eq!(entries.next(), Some(Entry::new(1, -1)));
        assert_eq!(entries.next(), Some(Entry::new(2, 300)));
        assert_eq!(entries.next(), None);
    }

    #[test]
    fn test_write_to_matches_encode() {
        let mut builder = PacketBuilder::<64>::new();
        builder.queue_entry(7, -10).unwrap();
        builder.queue_entry(8, 20000).unwrap();

        let mut transport = MemoryTransport::<4, 64>::new();
        let written = builder.write_to(9, 1, &mut transport).unwrap();

        let encoded = builder.encode_to_vec(9, 1).unwrap();
        assert_eq!(written, encoded.len());
        assert_eq!(transport.sent(), encoded.as_slice());
    }

    #[test]
    fn test_write_to_reports_transport_error() {
        let mut builder = PacketBuilder::<64>::new();
        builder.queue_entry(7, -10).unwrap();

        let mut transport = MemoryTransport::<4, 4>::new();
        assert!(matches!(
            builder.write_to(9, 1, &mut transport),
            Err(SendError::Transport(_))
        ));
    }
}
