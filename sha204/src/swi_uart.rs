// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Single-wire interface driven by a UART in half-duplex mode.
//! Each SWI bit travels as one 7-bit UART character.

use crate::phy::{check_count, DeviceId, Phy};
use crate::timing::{stretch, TimingProvider};
use crate::Error;
use consts::{
    RSP_SIZE_MAX, SWI_BAUD, SWI_BIT_TIMEOUT_US, SWI_FLAG_CMD, SWI_FLAG_IDLE, SWI_FLAG_SLEEP, SWI_FLAG_TX, SWI_RECEIVE_TIMEOUT_US,
    SWI_SYNC_TIMEOUT_US, SWI_TURNAROUND_US, SWI_UART_ONE, SWI_UART_ONE_MASK, SWI_UART_ZERO, WAKE_DELAY_US,
};

const POLL_US: u32 = 1;

/// Half-duplex UART wired to the SWI signal.
pub trait SwiUart {
    fn set_baud(&mut self, baud: u32);
    fn write(&mut self, byte: u8);
    /// Blocks until every written character has left the shifter.
    fn flush_tx(&mut self);
    /// A received character, if one is waiting.
    fn read(&mut self) -> Option<u8>;
    /// Drops received characters, including the echo of our own transmission.
    fn flush_rx(&mut self);
}

pub fn encode_bit(one: bool) -> u8 {
    if one {
        SWI_UART_ONE
    } else {
        SWI_UART_ZERO
    }
}

/// A device one keeps bits 2 to 6 of the sampled character high.
pub fn decode_bit(received: u8) -> bool {
    (received ^ SWI_UART_ONE) & SWI_UART_ONE_MASK == 0
}

pub struct SwiUartPhy<U, T> {
    uart: U,
    timer: T,
}

impl<U: SwiUart, T: TimingProvider> SwiUartPhy<U, T> {
    pub fn new(mut uart: U, timer: T) -> Self {
        uart.set_baud(SWI_BAUD);
        Self { uart, timer }
    }

    pub fn uart(&mut self) -> &mut U {
        &mut self.uart
    }

    pub fn send_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.uart.write(encode_bit(byte & (1 << i) != 0));
        }
    }

    fn send_flagged(&mut self, flag: u8, bytes: &[u8]) {
        self.timer.delay_us(SWI_TURNAROUND_US);
        self.send_byte(flag);
        for &byte in bytes {
            self.send_byte(byte);
        }
        self.uart.flush_tx();
        self.uart.flush_rx();
    }

    fn read_char(&mut self, timeout_us: u32) -> Result<u8, Error> {
        for _ in 0..timeout_us.div_ceil(POLL_US) {
            if let Some(c) = self.uart.read() {
                return Ok(c);
            }
            self.timer.delay_us(POLL_US);
        }
        self.uart.read().ok_or(Error::Timeout)
    }

    pub fn receive_byte(&mut self, first_timeout_us: u32) -> Result<u8, Error> {
        let mut byte = 0;
        for i in 0..8 {
            let timeout = if i == 0 { first_timeout_us } else { stretch(SWI_BIT_TIMEOUT_US) };
            if decode_bit(self.read_char(timeout)?) {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }
}

impl<U: SwiUart, T: TimingProvider> Phy for SwiUartPhy<U, T> {
    type Timer = T;

    fn timer(&mut self) -> &mut T {
        &mut self.timer
    }

    fn select(&mut self, device: DeviceId) -> Result<(), Error> {
        match device.0 {
            0 => Ok(()),
            _ => Err(Error::BadParameter),
        }
    }

    fn wake(&mut self) -> Result<(), Error> {
        // At half the baud rate a zero character holds the line low long enough.
        self.uart.set_baud(SWI_BAUD / 2);
        self.uart.write(0x00);
        self.uart.flush_tx();
        self.uart.set_baud(SWI_BAUD);
        self.timer.delay_us(WAKE_DELAY_US);
        self.uart.flush_rx();
        Ok(())
    }

    fn send_command(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.send_flagged(SWI_FLAG_CMD, frame);
        Ok(())
    }

    fn receive_response(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.send_flagged(SWI_FLAG_TX, &[]);

        let first = self.receive_byte(stretch(SWI_RECEIVE_TIMEOUT_US))?;
        let count = check_count(first, buf.len())?;
        buf[0] = first;
        for slot in buf[1..count].iter_mut() {
            *slot = self.receive_byte(stretch(SWI_BIT_TIMEOUT_US)).map_err(|_| Error::RxFail)?;
        }
        Ok(count)
    }

    fn idle(&mut self) -> Result<(), Error> {
        self.send_flagged(SWI_FLAG_IDLE, &[]);
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), Error> {
        self.send_flagged(SWI_FLAG_SLEEP, &[]);
        Ok(())
    }

    fn reset_io(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        self.timer.delay_us(SWI_SYNC_TIMEOUT_US);
        self.uart.flush_rx();
        Ok(())
    }

    fn probe(&mut self) -> Result<bool, Error> {
        let mut scratch = [0u8; RSP_SIZE_MAX];
        match self.receive_response(&mut scratch) {
            Ok(_) | Err(Error::SizeError) | Err(Error::RxFail) => Ok(true),
            Err(Error::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
