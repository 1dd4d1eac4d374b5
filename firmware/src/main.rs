// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! UART bridge to an ATSHA204 host/client pair on two SWI lines.

#![no_std]
#![no_main]

mod board;
mod comms;

#[cfg(feature = "debug")]
use defmt_rtt as _;
// time driver
use embassy_nrf as _;
use panic_probe as _;

use board::{CycleDelay, OpenDrainLine, CPU_HZ};
use comms::{CLIENT, HOST};
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::gpio::Pin;
use embassy_nrf::{bind_interrupts, peripherals, uarte};
use sha204::session::Bus;
use sha204::swi::{SwiPhy, SwiTiming};

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<peripherals::UARTE0>;
});

#[cfg(not(feature = "debug"))]
mod dummy_logging {
    #[defmt::global_logger]
    struct Logger;

    unsafe impl defmt::Logger for Logger {
        fn acquire() {}

        unsafe fn flush() {}

        unsafe fn release() {}

        unsafe fn write(_bytes: &[u8]) {}
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());

    let mut config_uart = uarte::Config::default();
    config_uart.parity = uarte::Parity::EXCLUDED;
    config_uart.baudrate = uarte::Baudrate::BAUD115200;

    let uart = uarte::Uarte::new(p.UARTE0, Irqs, p.P0_16, p.P0_18, config_uart);
    let (tx, rx) = uart.split_with_idle(p.TIMER0, p.PPI_CH0, p.PPI_CH1);

    // Line index is the device id: host first, client second.
    let lines = [OpenDrainLine::new(p.P0_12.degrade()), OpenDrainLine::new(p.P0_14.degrade())];
    let mut bus = Bus::new(SwiPhy::new(lines, CycleDelay, SwiTiming::from_cpu_hz(CPU_HZ)));
    unwrap!(bus.attach(HOST));
    unwrap!(bus.attach(CLIENT));

    info!("SHA204 bridge ready");
    comms::run(tx, rx, bus).await
}
