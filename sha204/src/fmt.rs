// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Logging macros that forward to `defmt` on the target and to `log` on a host.
//! Without either feature they only evaluate their arguments by reference.

#![macro_use]
#![allow(unused_macros)]

macro_rules! log_at {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::$level!($s $(, $x)*);
            #[cfg(feature = "log")]
            ::log::$level!($s $(, $x)*);
            #[cfg(not(any(feature = "defmt", feature = "log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! trace {
    ($($arg:tt)*) => { log_at!(trace, $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { log_at!(debug, $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { log_at!(info, $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { log_at!(warn, $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { log_at!(error, $($arg)*) };
}
