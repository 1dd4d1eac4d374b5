// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Delay source used by the transports and the session layer.
//!
//! Firmware busy-waits on CPU cycles; tests advance a virtual clock.

use consts::CPU_CLOCK_DEVIATION_PERCENT;

const NS_PER_US: u32 = 1_000;
// Largest chunk handed to `delay_ns` so the nanosecond count never overflows.
const MAX_CHUNK_US: u32 = 1_000_000;

pub trait TimingProvider {
    /// Waits at least `ns` nanoseconds.
    fn delay_ns(&mut self, ns: u32);

    fn delay_us(&mut self, mut us: u32) {
        while us > 0 {
            let chunk = us.min(MAX_CHUNK_US);
            self.delay_ns(chunk * NS_PER_US);
            us -= chunk;
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }
}

impl<T: TimingProvider + ?Sized> TimingProvider for &mut T {
    fn delay_ns(&mut self, ns: u32) {
        (**self).delay_ns(ns)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Stretches a maximum time by the clock tolerance so a fast host clock never waits too little.
pub const fn stretch(value: u32) -> u32 {
    value.saturating_mul(100 + CPU_CLOCK_DEVIATION_PERCENT) / 100 + 1
}

/// Shrinks a typical time by the clock tolerance so a slow host clock never waits too long.
pub const fn shrink(value: u32) -> u32 {
    value.saturating_mul(100 - CPU_CLOCK_DEVIATION_PERCENT) / 100
}

/// Nanoseconds taken by `cycles` CPU cycles at `cpu_hz`, rounded up.
pub const fn cycles_to_ns(cycles: u32, cpu_hz: u32) -> u32 {
    let ns = (cycles as u64 * 1_000_000_000).div_ceil(cpu_hz as u64);
    if ns > u32::MAX as u64 {
        u32::MAX
    } else {
        ns as u32
    }
}

/// CPU cycles needed to cover `ns` nanoseconds at `cpu_hz`, rounded up.
pub const fn ns_to_cycles(ns: u32, cpu_hz: u32) -> u32 {
    let cycles = (ns as u64 * cpu_hz as u64).div_ceil(1_000_000_000);
    if cycles > u32::MAX as u64 {
        u32::MAX
    } else {
        cycles as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_bounds() {
        assert_eq!(stretch(35_000), 35_351);
        assert_eq!(shrink(12_000), 11_880);
    }

    #[test]
    fn cycle_conversion_rounds_up() {
        assert_eq!(cycles_to_ns(10, 64_000_000), 157);
        assert_eq!(ns_to_cycles(4_340, 64_000_000), 278);
        assert_eq!(ns_to_cycles(1_000, 1_000_000), 1);
    }
}
