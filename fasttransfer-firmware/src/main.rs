//! FastTransfer demonstration node
//!
//! Runs one FastTransfer node on UART0 of an RP2040. Every byte received is
//! scanned for packets; entries written by the peer are logged as they
//! arrive, and a heartbeat counter is sent to the peer on a fixed interval.
//! Node and peer addresses come from node.toml at build time.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

mod link;

/// Values generated by build.rs from node.toml
mod config {
    include!(concat!(env!("OUT_DIR"), "/node_config.rs"));
}

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!(
        "FastTransfer node {} starting (peer {})",
        config::NODE_ADDRESS,
        config::PEER_ADDRESS
    );

    let p = embassy_rp::init(Default::default());

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config::BAUDRATE;

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("UART0 initialized at {} baud", config::BAUDRATE);

    spawner.spawn(link::link_task(tx, rx)).unwrap();

    // Main task has nothing else to do - all work happens in the link task
    loop {
        embassy_time::Timer::after_secs(60).await;
    }
}
