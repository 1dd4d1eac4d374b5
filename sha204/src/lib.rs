// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Communication stack for the ATSHA204 CryptoAuthentication device.
//!
//! Layers, bottom up: a [`phy::Phy`] moves bytes over the single-wire
//! interface or I2C, [`frame`] adds the count and CRC, [`session::Bus`]
//! tracks which device is awake, [`command::execute`] runs one command with
//! retries, and [`auth`] strings commands into authentication sequences,
//! checked against the host-side digests in [`mirror`].

#![no_std]

#[cfg(test)]
extern crate std;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod auth;
pub mod command;
mod error;
pub mod frame;
#[cfg(feature = "i2c")]
pub mod i2c;
pub mod mirror;
pub mod phy;
pub mod session;
#[cfg(feature = "swi")]
pub mod swi;
#[cfg(feature = "swi-uart")]
pub mod swi_uart;
pub mod timing;

pub use error::{Error, Status};

#[cfg(test)]
mod tests;
