// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Two-wire interface. Every write starts with a word address that tells the
//! device what follows; a NACKed address means the device is asleep or busy.

use crate::phy::{check_count, DeviceId, Phy};
use crate::timing::TimingProvider;
use crate::Error;
use consts::{
    I2C_READ_FLAG, I2C_RESYNC_BYTE, I2C_WORD_COMMAND, I2C_WORD_IDLE, I2C_WORD_RESET, I2C_WORD_SLEEP, WAKE_DELAY_US,
    WAKE_PULSE_US,
};

/// Bit-level I2C master operations. Peripheral drivers rarely expose a bare
/// start condition, which the resync pattern needs.
pub trait TwiBus {
    fn start(&mut self) -> Result<(), Error>;
    fn stop(&mut self) -> Result<(), Error>;
    /// Clocks out one byte and returns whether it was acknowledged.
    fn write_byte(&mut self, byte: u8) -> Result<bool, Error>;
    /// Clocks in one byte, acknowledging it when `ack` is set.
    fn read_byte(&mut self, ack: bool) -> Result<u8, Error>;
    /// Holds SDA low for `us` microseconds. Wakes every device on the bus.
    fn hold_sda_low(&mut self, us: u32) -> Result<(), Error>;
}

pub struct I2cPhy<B, T> {
    bus: B,
    timer: T,
    address: u8,
}

impl<B: TwiBus, T: TimingProvider> I2cPhy<B, T> {
    /// `address` is the 8-bit write address, e.g. `I2C_DEFAULT_ADDRESS`.
    pub fn new(bus: B, timer: T, address: u8) -> Self {
        Self { bus, timer, address }
    }

    pub fn bus(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    fn begin(&mut self, read: bool) -> Result<(), Error> {
        self.bus.start()?;
        let address = if read { self.address | I2C_READ_FLAG } else { self.address };
        if !self.bus.write_byte(address)? {
            self.bus.stop()?;
            return Err(Error::Timeout);
        }
        Ok(())
    }

    fn send(&mut self, word_address: u8, bytes: &[u8]) -> Result<(), Error> {
        self.begin(false)?;
        for &byte in core::iter::once(&word_address).chain(bytes) {
            if !self.bus.write_byte(byte)? {
                self.bus.stop()?;
                return Err(Error::Timeout);
            }
        }
        self.bus.stop()
    }

    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let first = self.bus.read_byte(true)?;
        let count = match check_count(first, buf.len()) {
            Ok(count) => count,
            Err(e) => {
                // Terminate the transfer cleanly before reporting.
                self.bus.read_byte(false)?;
                return Err(e);
            }
        };
        buf[0] = first;
        for i in 1..count {
            buf[i] = self.bus.read_byte(i + 1 < count)?;
        }
        Ok(count)
    }
}

impl<B: TwiBus, T: TimingProvider> Phy for I2cPhy<B, T> {
    type Timer = T;

    fn timer(&mut self) -> &mut T {
        &mut self.timer
    }

    fn select(&mut self, device: DeviceId) -> Result<(), Error> {
        if device.0 & I2C_READ_FLAG != 0 {
            return Err(Error::BadParameter);
        }
        self.address = device.0;
        Ok(())
    }

    fn wake(&mut self) -> Result<(), Error> {
        self.bus.hold_sda_low(WAKE_PULSE_US)?;
        self.timer.delay_us(WAKE_DELAY_US);
        Ok(())
    }

    fn send_command(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.send(I2C_WORD_COMMAND, frame)
    }

    fn receive_response(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.begin(true)?;
        let result = self.read_frame(buf);
        self.bus.stop()?;
        result
    }

    fn idle(&mut self) -> Result<(), Error> {
        self.send(I2C_WORD_IDLE, &[])
    }

    fn sleep(&mut self) -> Result<(), Error> {
        self.send(I2C_WORD_SLEEP, &[])
    }

    fn reset_io(&mut self) -> Result<(), Error> {
        self.send(I2C_WORD_RESET, &[])
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        // Nine clocks with SDA high end any transfer a device is stuck in.
        self.bus.start()?;
        self.bus.write_byte(I2C_RESYNC_BYTE)?;
        self.bus.start()?;
        self.bus.stop()
    }

    fn probe(&mut self) -> Result<bool, Error> {
        self.bus.start()?;
        let acked = self.bus.write_byte(self.address | I2C_READ_FLAG)?;
        if acked {
            self.bus.read_byte(false)?;
        }
        self.bus.stop()?;
        Ok(acked)
    }
}
