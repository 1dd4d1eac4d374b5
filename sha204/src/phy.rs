// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Byte-level view of a physical interface, implemented by every bit transport.

use crate::timing::TimingProvider;
use crate::Error;
use consts::RSP_SIZE_MIN;

/// Identifies a device on a bus: the I2C address, or the line index of a single-wire bus.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(pub u8);

pub trait Phy {
    type Timer: TimingProvider;

    fn timer(&mut self) -> &mut Self::Timer;

    /// Routes the following transfers to `device`.
    fn select(&mut self, device: DeviceId) -> Result<(), Error>;

    /// Generates the wake condition and waits until the device can talk.
    /// On a shared bus every device sees the pulse.
    fn wake(&mut self) -> Result<(), Error>;

    fn send_command(&mut self, frame: &[u8]) -> Result<(), Error>;

    /// Reads one response into `buf` and returns its length.
    fn receive_response(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    fn idle(&mut self) -> Result<(), Error>;

    fn sleep(&mut self) -> Result<(), Error>;

    /// Clears the device's I/O buffer without changing its power state.
    fn reset_io(&mut self) -> Result<(), Error>;

    /// Drives the bus recovery pattern of the first resync step.
    fn recover_bus(&mut self) -> Result<(), Error>;

    /// Whether the selected device is awake and answering.
    fn probe(&mut self) -> Result<bool, Error>;
}

/// Validates a received count byte against the protocol minimum and the caller's buffer.
pub(crate) fn check_count(count: u8, capacity: usize) -> Result<usize, Error> {
    let count = count as usize;
    if count < RSP_SIZE_MIN || count > capacity {
        return Err(Error::SizeError);
    }
    Ok(count)
}
