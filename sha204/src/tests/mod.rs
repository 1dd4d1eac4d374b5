// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

mod clock;


#[cfg(feature = "i2c")]
mod auth;
#[cfg(feature = "i2c")]
mod session;
#[cfg(feature = "swi")]
mod swi;
#[cfg(feature = "swi-uart")]
mod swi_uart;
