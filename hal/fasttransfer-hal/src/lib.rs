//! FastTransfer Hardware Abstraction Layer
//!
//! This crate defines the byte transport seam between the FastTransfer
//! protocol core and whatever actually moves bytes (a UART FIFO, a USB CDC
//! endpoint, an in-memory queue on the host).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  fasttransfer (scanner, packet sender)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  fasttransfer-hal (this crate - traits) │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ FnTransport   │       │ MemoryTransport│
//! │ (callbacks)   │       │ (byte queues) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`transport::Transport`] - Non-blocking byte source and sink

#![no_std]
#![deny(unsafe_code)]

pub mod memory;
pub mod transport;

// Re-export key items at crate root for convenience
pub use memory::MemoryTransport;
pub use transport::{FnTransport, Transport};
