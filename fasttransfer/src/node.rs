//! FastTransfer node
//!
//! A node owns the shared value array and everything that touches it: the
//! per-entry dirty flags and write permissions, the packet scanner that
//! commits received entries, and the staging buffer for outgoing packets.
//!
//! # Scanning
//!
//! [`Node::scan_port`] is re-entrant across calls. All progress lives in the
//! port's ring buffer, so a packet that arrives over several scans is
//! completed by whichever scan first sees its last byte:
//!
//! ```text
//!  drain transport ─▶ sync on HEADER_0 ─▶ header valid? ──no──▶ drop 1 byte ─┐
//!                           ▲                  │yes                           │
//!                           │                  ▼                              │
//!                           │          whole packet buffered? ──no──▶ return  │
//!                           │                  │yes                           │
//!                           │                  ▼                              │
//!                           │             CRC matches? ──no──▶ drop 1 byte ───┤
//!                           │                  │yes                           │
//!                           │                  ▼                              │
//!                           └──────── commit entries, drop packet ◀───────────┘
//! ```
//!
//! Any validation failure drops exactly one byte, so a corrupted length field
//! or a sync pattern inside a data segment can never hide the next real
//! packet.

use fasttransfer_hal::Transport;

use crate::config::NodeConfig;
use crate::crc::crc8;
use crate::packet::{
    Entry, Header, PacketBuilder, PacketError, SendError, ENTRY_SIZE, HEADER_0, HEADER_SIZE,
};
use crate::port::{Port, PortId};
use crate::{DEFAULT_ARRAY_SIZE, DEFAULT_MAX_PACKET_SIZE};

/// Outcome of one [`Node::scan_port`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanReport {
    /// Bytes moved from the transport into the port buffer
    pub bytes_received: usize,
    /// Packets that passed every check and were committed
    pub packets: usize,
    /// Entries written to the array
    pub entries_written: usize,
    /// Entries dropped because their index is past the end of the array
    pub entries_out_of_range: usize,
    /// Entries dropped because the index is reserved for another port
    pub entries_denied: usize,
    /// Bytes thrown away while looking for a valid packet
    pub bytes_discarded: usize,
    /// Candidate packets rejected on checksum
    pub crc_errors: usize,
    /// Scan stopped on a partial packet that needs more bytes
    pub awaiting_data: bool,
}

impl ScanReport {
    /// Add the counts of a later scan to this one
    pub fn absorb(&mut self, later: &ScanReport) {
        self.bytes_received += later.bytes_received;
        self.packets += later.packets;
        self.entries_written += later.entries_written;
        self.entries_out_of_range += later.entries_out_of_range;
        self.entries_denied += later.entries_denied;
        self.bytes_discarded += later.bytes_discarded;
        self.crc_errors += later.crc_errors;
        self.awaiting_data = later.awaiting_data;
    }
}

/// One FastTransfer node with an `N` entry array and `P` byte packets
#[derive(Debug, Clone)]
pub struct Node<const N: usize = DEFAULT_ARRAY_SIZE, const P: usize = DEFAULT_MAX_PACKET_SIZE> {
    address: u8,
    values: [i16; N],
    /// Set on remote write, cleared on read
    flags: [bool; N],
    /// Sole port allowed to write each entry; `None` means any port
    owners: [Option<PortId>; N],
    outgoing: PacketBuilder<P>,
    next_port: u32,
}

impl<const N: usize, const P: usize> Node<N, P> {
    /// Create a node answering to `address`, with every entry zero
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            values: [0; N],
            flags: [false; N],
            owners: [None; N],
            outgoing: PacketBuilder::new(),
            next_port: 0,
        }
    }

    /// Create a node from persisted configuration
    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.address)
    }

    /// Reset the array, flags, permissions and staged packet, and take a new address
    ///
    /// Existing ports stay usable; their ids are not reissued.
    pub fn initialize(&mut self, address: u8) {
        self.address = address;
        self.values = [0; N];
        self.flags = [false; N];
        self.owners = [None; N];
        self.outgoing.clear();
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Number of entries in the shared array
    pub const fn array_size(&self) -> usize {
        N
    }

    /// Open a port over `transport` with a `C` byte reassembly buffer
    pub fn create_port<T: Transport, const C: usize>(&mut self, transport: T) -> Port<T, C> {
        let id = PortId::new(self.next_port);
        self.next_port = self.next_port.wrapping_add(1);
        Port::new(id, transport)
    }

    /// Close a port and hand back its transport
    ///
    /// Every entry reserved for this port becomes writable by any port again.
    pub fn destroy_port<T: Transport, const C: usize>(&mut self, port: Port<T, C>) -> T {
        let id = port.id();
        for owner in self.owners.iter_mut() {
            if *owner == Some(id) {
                *owner = None;
            }
        }
        port.into_transport()
    }

    /// Read an entry and clear its dirty flag
    ///
    /// Returns `None` if `index` is past the end of the array.
    pub fn read_array(&mut self, index: u16) -> Option<i16> {
        let index = usize::from(index);
        if index >= N {
            return None;
        }
        self.flags[index] = false;
        Some(self.values[index])
    }

    /// Check whether an entry was written remotely since it was last read
    pub fn read_flag(&self, index: u16) -> bool {
        self.flags
            .get(usize::from(index))
            .copied()
            .unwrap_or(false)
    }

    /// Set an entry locally, leaving its dirty flag alone
    ///
    /// Returns `false` if `index` is past the end of the array.
    pub fn write_array(&mut self, index: u16, value: i16) -> bool {
        match self.values.get_mut(usize::from(index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Reserve an entry so only `port` may write it
    ///
    /// Ignored if `index` is past the end of the array.
    pub fn limit_access(&mut self, index: u16, port: PortId) {
        if let Some(owner) = self.owners.get_mut(usize::from(index)) {
            *owner = Some(port);
        }
    }

    /// Let any port write an entry again
    pub fn release_access(&mut self, index: u16) {
        if let Some(owner) = self.owners.get_mut(usize::from(index)) {
            *owner = None;
        }
    }

    /// Port an entry is reserved for, if any
    pub fn owner(&self, index: u16) -> Option<PortId> {
        self.owners.get(usize::from(index)).copied().flatten()
    }

    /// Stage one entry for the next [`Self::send`]
    pub fn queue_entry(&mut self, index: u16, value: i16) -> Result<(), PacketError> {
        self.outgoing.queue_entry(index, value)
    }

    /// Drop every staged entry
    pub fn clear_packet(&mut self) {
        self.outgoing.clear();
    }

    /// Entries staged for the next send
    pub fn pending_packet(&self) -> &PacketBuilder<P> {
        &self.outgoing
    }

    /// Send the staged entries to `destination` through `port`
    ///
    /// The staging buffer is cleared afterwards whether or not the transport
    /// accepted every byte. Returns the number of bytes written.
    pub fn send<T: Transport, const C: usize>(
        &mut self,
        port: &mut Port<T, C>,
        destination: u8,
    ) -> Result<usize, SendError<T::Error>> {
        let result = self
            .outgoing
            .write_to(self.address, destination, port.transport_mut());
        self.outgoing.clear();

        #[cfg(feature = "defmt")]
        if result.is_err() {
            defmt::warn!("port {}: transport refused packet to {}", port.id().raw(), destination);
        }

        result
    }

    /// Pull everything waiting on `port` and commit every complete valid packet
    pub fn scan_port<T: Transport, const C: usize>(&mut self, port: &mut Port<T, C>) -> ScanReport {
        let mut report = ScanReport {
            bytes_received: port.fill(),
            ..ScanReport::default()
        };

        let id = port.id();
        let buffer = port.buffer_mut();

        while !buffer.is_empty() {
            // Skip to the next possible packet start
            while buffer.peek(0).is_some_and(|byte| byte != HEADER_0) {
                buffer.pop();
                report.bytes_discarded += 1;
            }

            if buffer.len() < HEADER_SIZE {
                report.awaiting_data = !buffer.is_empty();
                break;
            }

            let raw: [u8; HEADER_SIZE] = core::array::from_fn(|i| buffer[i]);
            let header = match Header::parse(&raw) {
                Some(header) if self.accepts(&header, buffer.capacity()) => header,
                _ => {
                    buffer.pop();
                    report.bytes_discarded += 1;
                    continue;
                }
            };

            let packet_size = header.packet_size();
            if buffer.len() < packet_size {
                report.awaiting_data = true;
                break;
            }

            let data_len = usize::from(header.data_len);
            let mut scratch = [0u8; P];
            let data = &mut scratch[..data_len];
            for (i, byte) in data.iter_mut().enumerate() {
                *byte = buffer[HEADER_SIZE + i];
            }

            if crc8(data) != buffer[HEADER_SIZE + data_len] {
                // The header may have been data that happened to look like one
                #[cfg(feature = "defmt")]
                defmt::trace!("port {}: CRC mismatch from {}", id.raw(), header.source);
                report.crc_errors += 1;
                buffer.pop();
                report.bytes_discarded += 1;
                continue;
            }

            self.commit(id, data, &mut report);
            buffer.discard(packet_size);
            report.packets += 1;

            #[cfg(feature = "defmt")]
            defmt::trace!(
                "port {}: packet from {} with {} entries",
                id.raw(),
                header.source,
                data_len / ENTRY_SIZE
            );
        }

        report
    }

    /// Scan `port` repeatedly until its transport is idle
    ///
    /// A single [`Self::scan_port`] moves at most one ring's worth of bytes,
    /// so a transport holding a longer burst needs several passes. Stops when
    /// the source is empty or a pass receives nothing. The returned report
    /// sums every pass; `awaiting_data` reflects the last one.
    pub fn drain_port<T: Transport, const C: usize>(&mut self, port: &mut Port<T, C>) -> ScanReport {
        let mut total = ScanReport::default();
        loop {
            let pass = self.scan_port(port);
            total.absorb(&pass);
            if pass.bytes_received == 0 || port.transport_mut().is_source_empty() {
                return total;
            }
        }
    }

    /// Header is addressed to this node and describes a packet we can hold
    ///
    /// The packet must fit both the node's packet limit and the port's ring.
    fn accepts(&self, header: &Header, ring_capacity: usize) -> bool {
        header.destination == self.address && header.is_well_formed(P.min(ring_capacity))
    }

    /// Write every permitted in-range entry of a validated data segment
    fn commit(&mut self, port: PortId, data: &[u8], report: &mut ScanReport) {
        for chunk in data.chunks_exact(ENTRY_SIZE) {
            let entry = Entry::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let index = usize::from(entry.index);

            if index >= N {
                #[cfg(feature = "defmt")]
                defmt::debug!("port {}: index {} out of range", port.raw(), entry.index);
                report.entries_out_of_range += 1;
                continue;
            }

            if let Some(owner) = self.owners[index] {
                if owner != port {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "port {}: index {} reserved for port {}",
                        port.raw(),
                        entry.index,
                        owner.raw()
                    );
                    report.entries_denied += 1;
                    continue;
                }
            }

            self.values[index] = entry.value;
            self.flags[index] = true;
            report.entries_written += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::HEADER_1;
    use fasttransfer_hal::MemoryTransport;

    type TestNode = Node<16, 32>;
    type TestTransport = MemoryTransport<64, 64>;

    fn packet(source: u8, destination: u8, entries: &[(u16, i16)]) -> heapless::Vec<u8, 32> {
        let mut builder = PacketBuilder::<32>::new();
        for &(index, value) in entries {
            builder.queue_entry(index, value).unwrap();
        }
        builder.encode_to_vec(source, destination).unwrap()
    }

    #[test]
    fn test_new_node_is_zeroed() {
        let mut node = TestNode::new(1);
        assert_eq!(node.address(), 1);
        assert_eq!(node.array_size(), 16);
        for i in 0..16 {
            assert!(!node.read_flag(i));
            assert_eq!(node.read_array(i), Some(0));
            assert_eq!(node.owner(i), None);
        }
    }

    #[test]
    fn test_read_out_of_range() {
        let mut node = TestNode::new(1);
        assert_eq!(node.read_array(16), None);
        assert!(!node.read_flag(16));
        assert!(!node.write_array(16, 5));
    }

    #[test]
    fn test_local_write_does_not_flag() {
        let mut node = TestNode::new(1);
        assert!(node.write_array(3, -7));
        assert!(!node.read_flag(3));
        assert_eq!(node.read_array(3), Some(-7));
    }

    #[test]
    fn test_limit_access_out_of_range_is_ignored() {
        let mut node = TestNode::new(1);
        let port = node.create_port::<_, 32>(TestTransport::new());
        node.limit_access(100, port.id());
        assert_eq!(node.owner(100), None);
    }

    #[test]
    fn test_ports_get_distinct_ids() {
        let mut node = TestNode::new(1);
        let a = node.create_port::<_, 32>(TestTransport::new());
        let b = node.create_port::<_, 32>(TestTransport::new());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_destroy_port_releases_reservations() {
        let mut node = TestNode::new(1);
        let a = node.create_port::<_, 32>(TestTransport::new());
        let b = node.create_port::<_, 32>(TestTransport::new());
        node.limit_access(2, a.id());
        node.limit_access(3, b.id());

        node.destroy_port(a);

        assert_eq!(node.owner(2), None);
        assert_eq!(node.owner(3), Some(b.id()));
    }

    #[test]
    fn test_scan_commits_packet() {
        let mut node = TestNode::new(1);
        let mut port = node.create_port::<_, 32>(TestTransport::new());
        port.transport_mut().feed(&packet(2, 1, &[(4, 1234), (5, -1)]));

        let report = node.scan_port(&mut port);

        assert_eq!(report.packets, 1);
        assert_eq!(report.entries_written, 2);
        assert_eq!(report.bytes_discarded, 0);
        assert!(!report.awaiting_data);
        assert!(node.read_flag(4));
        assert_eq!(node.read_array(4), Some(1234));
        assert!(!node.read_flag(4));
        assert_eq!(node.read_array(5), Some(-1));
        assert!(port.buffer().is_empty());
    }

    #[test]
    fn test_scan_ignores_other_destination() {
        let mut node = TestNode::new(1);
        let mut port = node.create_port::<_, 32>(TestTransport::new());
        port.transport_mut().feed(&packet(2, 9, &[(4, 1234)]));

        let report = node.scan_port(&mut port);

        assert_eq!(report.packets, 0);
        assert!(!node.read_flag(4));
        assert!(port.buffer().is_empty());
    }

    #[test]
    fn test_scan_rejects_oversized_length() {
        let mut node = TestNode::new(1);
        let mut port = node.create_port::<_, 32>(TestTransport::new());
        // 28 data bytes would make a 34 byte packet, larger than 32
        port.transport_mut()
            .feed(&[HEADER_0, HEADER_1, 2, 1, 28, 0, 0, 0, 0]);

        let report = node.scan_port(&mut port);

        assert_eq!(report.packets, 0);
        assert!(!report.awaiting_data);
        assert!(port.buffer().is_empty());
    }

    #[test]
    fn test_scan_rejects_misaligned_length() {
        let mut node = TestNode::new(1);
        let mut port = node.create_port::<_, 32>(TestTransport::new());
        port.transport_mut()
            .feed(&[HEADER_0, HEADER_1, 2, 1, 3, 0, 1, 0, 0]);

        let report = node.scan_port(&mut port);
        assert_eq!(report.packets, 0);
        assert!(port.buffer().is_empty());
    }

    #[test]
    fn test_scan_drops_out_of_range_entries_only() {
        let mut node = TestNode::new(1);
        let mut port = node.create_port::<_, 32>(TestTransport::new());
        port.transport_mut()
            .feed(&packet(2, 1, &[(200, 5), (6, 66)]));

        let report = node.scan_port(&mut port);

        assert_eq!(report.packets, 1);
        assert_eq!(report.entries_out_of_range, 1);
        assert_eq!(report.entries_written, 1);
        assert_eq!(node.read_array(6), Some(66));
    }

    #[test]
    fn test_scan_rejects_packet_larger_than_ring() {
        let mut node = TestNode::new(1);
        // 18 byte packet fits the node's 32 byte limit but not a 16 byte ring
        let mut port = node.create_port::<_, 16>(TestTransport::new());
        port.transport_mut()
            .feed(&packet(2, 1, &[(1, 1), (2, 2), (3, 3)]));
        port.transport_mut().feed(&packet(2, 1, &[(9, 99)]));

        let report = node.drain_port(&mut port);

        assert_eq!(report.packets, 1);
        assert!(!report.awaiting_data);
        assert!(!node.read_flag(1));
        assert_eq!(node.read_array(9), Some(99));
        assert!(port.buffer().is_empty());
        assert_eq!(port.transport().pending(), 0);
    }

    #[test]
    fn test_drain_port_handles_burst_in_one_call() {
        let mut node = TestNode::new(1);
        let mut port = node.create_port::<_, 16>(TestTransport::new());
        for i in 0..3u16 {
            port.transport_mut()
                .feed(&packet(2, 1, &[(i, 10 * i as i16)]));
        }

        let report = node.drain_port(&mut port);

        assert_eq!(report.bytes_received, 30);
        assert_eq!(report.packets, 3);
        assert_eq!(report.entries_written, 3);
        assert!(!report.awaiting_data);
        for i in 0..3u16 {
            assert_eq!(node.read_array(i), Some(10 * i as i16));
        }
    }

    #[test]
    fn test_drain_port_stops_on_idle_transport() {
        let mut node = TestNode::new(1);
        let mut port = node.create_port::<_, 32>(TestTransport::new());
        assert_eq!(node.drain_port(&mut port), ScanReport::default());
    }

    #[test]
    fn test_report_absorb_sums_counts() {
        let mut total = ScanReport {
            packets: 1,
            bytes_received: 10,
            awaiting_data: true,
            ..ScanReport::default()
        };
        total.absorb(&ScanReport {
            packets: 2,
            crc_errors: 1,
            bytes_received: 5,
            ..ScanReport::default()
        });

        assert_eq!(total.packets, 3);
        assert_eq!(total.crc_errors, 1);
        assert_eq!(total.bytes_received, 15);
        assert!(!total.awaiting_data);
    }

    #[test]
    fn test_send_writes_frame_and_clears() {
        let mut node = TestNode::new(7);
        let mut port = node.create_port::<_, 32>(TestTransport::new());
        node.queue_entry(1, 100).unwrap();

        let written = node.send(&mut port, 3).unwrap();

        assert_eq!(written, 10);
        assert_eq!(port.transport().sent(), packet(7, 3, &[(1, 100)]).as_slice());
        assert!(node.pending_packet().is_empty());
    }

    #[test]
    fn test_send_clears_even_on_transport_error() {
        let mut node = Node::<16, 32>::new(7);
        let mut port = node.create_port::<_, 32>(MemoryTransport::<4, 4>::new());
        node.queue_entry(1, 100).unwrap();

        assert!(node.send(&mut port, 3).is_err());
        assert!(node.pending_packet().is_empty());
    }

    #[test]
    fn test_initialize_resets_state() {
        let mut node = TestNode::new(1);
        let mut port = node.create_port::<_, 32>(TestTransport::new());
        port.transport_mut().feed(&packet(2, 1, &[(4, 1234)]));
        node.scan_port(&mut port);
        node.limit_access(4, port.id());
        node.queue_entry(1, 1).unwrap();

        node.initialize(9);

        assert_eq!(node.address(), 9);
        assert!(!node.read_flag(4));
        assert_eq!(node.read_array(4), Some(0));
        assert_eq!(node.owner(4), None);
        assert!(node.pending_packet().is_empty());
    }
}
