//! FastTransfer link task
//!
//! Owns the node and its single port. Received chunks are queued into the
//! port's in-memory transport and scanned immediately; outgoing packets are
//! collected the same way and flushed to the UART in one write.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embassy_time::{Duration, Ticker};
use embedded_io_async::{Read, Write};

use fasttransfer::{Node, Port};
use fasttransfer_hal::MemoryTransport;

use crate::config;

/// Buffer size for one UART read
const RX_CHUNK_SIZE: usize = 64;

/// Port transport: room for a few packets in each direction
type LinkTransport = MemoryTransport<256, 128>;

/// Link task - scans incoming packets and sends heartbeats to the peer
#[embassy_executor::task]
pub async fn link_task(mut tx: BufferedUartTx, mut rx: BufferedUartRx) {
    info!("Link task started");

    let mut node: Node = Node::new(config::NODE_ADDRESS);
    let mut port: Port<LinkTransport> = node.create_port(LinkTransport::new());

    // Only this link may write the reserved slot
    node.limit_access(config::RESERVED_INDEX, port.id());

    let mut ticker = Ticker::every(Duration::from_millis(config::HEARTBEAT_INTERVAL_MS));
    let mut chunk = [0u8; RX_CHUNK_SIZE];
    let mut heartbeat: i16 = 0;

    loop {
        let event = select(rx.read(&mut chunk), ticker.next()).await;

        match event {
            Either::First(Ok(n)) if n > 0 => {
                trace!("RX: {} bytes", n);
                let accepted = port.transport_mut().feed(&chunk[..n]);
                if accepted < n {
                    warn!("Link receive queue full, dropped {} bytes", n - accepted);
                }
                scan(&mut node, &mut port);
            }
            Either::First(Ok(_)) => {
                // No bytes read, continue
            }
            Either::First(Err(e)) => {
                warn!("UART read error: {:?}", e);
            }
            Either::Second(()) => {
                heartbeat = heartbeat.wrapping_add(1);
                send_heartbeat(&mut node, &mut port, heartbeat);
                flush(&mut tx, port.transport_mut()).await;
            }
        }
    }
}

/// Scan until the port is idle and log every entry the peer changed
fn scan(node: &mut Node, port: &mut Port<LinkTransport>) {
    let report = node.drain_port(port);
    trace!("Scan: {:?}", report);

    if report.crc_errors > 0 {
        warn!("{} packets failed CRC", report.crc_errors);
    }
    if report.entries_denied > 0 {
        warn!("{} entries rejected by access control", report.entries_denied);
    }

    if report.entries_written == 0 {
        return;
    }

    for index in 0..node.array_size() as u16 {
        if node.read_flag(index) {
            if let Some(value) = node.read_array(index) {
                info!("Entry {} = {}", index, value);
            }
        }
    }
}

/// Stage and send one heartbeat packet to the peer
fn send_heartbeat(node: &mut Node, port: &mut Port<LinkTransport>, counter: i16) {
    if let Err(e) = node.queue_entry(config::HEARTBEAT_INDEX, counter) {
        warn!("Failed to queue heartbeat: {:?}", e);
        return;
    }

    match node.send(port, config::PEER_ADDRESS) {
        Ok(len) => trace!("Heartbeat {} queued ({} bytes)", counter, len),
        Err(e) => warn!("Failed to queue heartbeat packet: {:?}", e),
    }
}

/// Write everything the node has sent to the UART
async fn flush(tx: &mut BufferedUartTx, transport: &mut LinkTransport) {
    if transport.sent().is_empty() {
        return;
    }

    if let Err(e) = tx.write_all(transport.sent()).await {
        warn!("Failed to write packet: {:?}", e);
    }
    transport.clear_sent();
}
