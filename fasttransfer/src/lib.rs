//! FastTransfer Protocol
//!
//! Point-to-point framing for nodes that share an array of 16-bit values
//! over an unreliable byte stream (typically a UART). A peer updates entries
//! of this node's array by sending it a packet; this node applies every
//! packet that is addressed to it and passes its CRC.
//!
//! # Packet Overview
//!
//! ```text
//! ┌──────┬──────┬─────┬─────┬────────┬──────────────────────┬─────┐
//! │ 0x06 │ 0x85 │ SRC │ DST │ LENGTH │ DATA                 │ CRC │
//! │ 1B   │ 1B   │ 1B  │ 1B  │ 1B     │ LENGTH bytes, 4B/ent │ 1B  │
//! └──────┴──────┴─────┴─────┴────────┴──────────────────────┴─────┘
//! ```
//!
//! Each data entry is an index (u16, big-endian) followed by a value (i16,
//! big-endian). The CRC-8 (polynomial 0x8C) covers the data bytes only.
//!
//! # Usage
//!
//! ```
//! use fasttransfer::{Node, Port};
//! use fasttransfer_hal::MemoryTransport;
//!
//! let mut sender: Node = Node::new(1);
//! let mut receiver: Node = Node::new(2);
//!
//! let mut tx: Port<MemoryTransport<64, 64>> = sender.create_port(MemoryTransport::new());
//! let mut rx: Port<MemoryTransport<64, 64>> = receiver.create_port(MemoryTransport::new());
//!
//! sender.queue_entry(3, -42).unwrap();
//! sender.send(&mut tx, 2).unwrap();
//!
//! rx.transport_mut().feed(tx.transport().sent());
//! receiver.scan_port(&mut rx);
//!
//! assert!(receiver.read_flag(3));
//! assert_eq!(receiver.read_array(3), Some(-42));
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod convert;
pub mod crc;
pub mod node;
pub mod packet;
pub mod port;

/// Default number of entries in a node's shared array
pub const DEFAULT_ARRAY_SIZE: usize = 64;

/// Default largest packet, header through CRC
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64;

pub use buffer::RingBuffer;
pub use config::{ConfigError, NodeConfig};
pub use crc::crc8;
pub use node::{Node, ScanReport};
pub use packet::{Entry, Header, PacketBuilder, PacketError, SendError, HEADER_0, HEADER_1};
pub use port::{Port, PortId};

pub use fasttransfer_hal::Transport;
