// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use embassy_nrf::gpio::{AnyPin, Flex, OutputDrive, Pull};
use sha204::swi::SwiLine;
use sha204::timing::{ns_to_cycles, TimingProvider};

/// nRF52805 core clock.
pub const CPU_HZ: u32 = 64_000_000;

/// SWI signal on a GPIO: driven low or left to the pull-up.
pub struct OpenDrainLine<'d> {
    pin: Flex<'d, AnyPin>,
}

impl<'d> OpenDrainLine<'d> {
    pub fn new(pin: AnyPin) -> Self {
        let mut pin = Flex::new(pin);
        pin.set_high();
        pin.set_as_input_output(Pull::Up, OutputDrive::Standard0Disconnect1);
        Self { pin }
    }
}

impl SwiLine for OpenDrainLine<'_> {
    fn drive_low(&mut self) {
        self.pin.set_low();
    }

    fn release(&mut self) {
        self.pin.set_high();
    }

    fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }
}

/// Busy-waits on CPU cycles.
pub struct CycleDelay;

impl TimingProvider for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        cortex_m::asm::delay(ns_to_cycles(ns, CPU_HZ));
    }
}
