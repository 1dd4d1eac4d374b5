// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Single-wire interface bit-banged on a GPIO, one line per device.
//!
//! Every SWI bit is shaped like a 7-bit UART frame at 230.4 kbaud: a one is a
//! single low bit-time followed by high, a zero adds a second low bit-time
//! after one high bit-time. Bytes go least significant bit first.

use crate::phy::{check_count, DeviceId, Phy};
use crate::timing::{cycles_to_ns, stretch, TimingProvider};
use crate::Error;
use consts::{
    RSP_SIZE_MAX, SWI_BAUD, SWI_BIT_FRAME, SWI_BIT_TIMEOUT_US, SWI_FLAG_CMD, SWI_FLAG_IDLE, SWI_FLAG_SLEEP, SWI_FLAG_TX,
    SWI_RECEIVE_TIMEOUT_US, SWI_SYNC_TIMEOUT_US, SWI_TURNAROUND_US, SWI_ZERO_PULSE_WINDOW_NS, WAKE_DELAY_US, WAKE_PULSE_US,
};

/// Open-drain signal line with a pull-up.
pub trait SwiLine {
    fn drive_low(&mut self);
    /// Stops driving so the pull-up brings the line high.
    fn release(&mut self);
    fn is_high(&mut self) -> bool;
}

/// CPU cycles of one iteration of the edge-polling loop, pin read included.
pub const POLL_LOOP_CYCLES: u32 = 16;

/// Bit timing and edge timeouts derived from the CPU clock.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SwiTiming {
    /// One UART bit-time.
    pub bit_ns: u32,
    /// Time between two samples while waiting for an edge.
    pub poll_ns: u32,
    /// Samples allowed before the first bit of a response.
    pub response_polls: u32,
    /// Samples allowed between two bits of a response.
    pub bit_polls: u32,
    /// Samples allowed for the second pulse of a zero.
    pub zero_polls: u32,
    /// Samples allowed for a low pulse to end.
    pub pulse_polls: u32,
}

impl SwiTiming {
    pub const fn from_cpu_hz(cpu_hz: u32) -> Self {
        let bit_ns = 1_000_000_000 / SWI_BAUD;
        let poll_ns = match cycles_to_ns(POLL_LOOP_CYCLES, cpu_hz) {
            0 => 1,
            ns => ns,
        };
        Self {
            bit_ns,
            poll_ns,
            response_polls: polls(SWI_RECEIVE_TIMEOUT_US * 1_000, poll_ns),
            bit_polls: polls(SWI_BIT_TIMEOUT_US * 1_000, poll_ns),
            zero_polls: polls(SWI_ZERO_PULSE_WINDOW_NS, poll_ns),
            pulse_polls: polls(2 * bit_ns, poll_ns),
        }
    }
}

const fn polls(window_ns: u32, poll_ns: u32) -> u32 {
    stretch(window_ns).div_ceil(poll_ns)
}

/// One selected line together with the delay source.
pub struct SwiWire<'a, L, T> {
    line: &'a mut L,
    timer: &'a mut T,
    timing: SwiTiming,
}

impl<'a, L: SwiLine, T: TimingProvider> SwiWire<'a, L, T> {
    pub fn new(line: &'a mut L, timer: &'a mut T, timing: SwiTiming) -> Self {
        Self { line, timer, timing }
    }

    pub fn send_bit(&mut self, one: bool) {
        let bit = self.timing.bit_ns;

        self.line.drive_low();
        self.timer.delay_ns(bit);
        self.line.release();
        if one {
            self.timer.delay_ns(bit * (SWI_BIT_FRAME - 1));
        } else {
            self.timer.delay_ns(bit);
            self.line.drive_low();
            self.timer.delay_ns(bit);
            self.line.release();
            self.timer.delay_ns(bit * (SWI_BIT_FRAME - 3));
        }
    }

    pub fn send_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.send_bit(byte & (1 << i) != 0);
        }
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.send_byte(byte);
        }
    }

    fn wait_level(&mut self, high: bool, polls: u32) -> Result<(), Error> {
        for _ in 0..polls {
            if self.line.is_high() == high {
                return Ok(());
            }
            self.timer.delay_ns(self.timing.poll_ns);
        }
        if self.line.is_high() == high {
            Ok(())
        } else {
            Err(Error::Timeout)
        }
    }

    /// Receives one bit, allowing `start_polls` samples for its start pulse.
    pub fn receive_bit(&mut self, start_polls: u32) -> Result<bool, Error> {
        self.wait_level(false, start_polls)?;
        self.wait_level(true, self.timing.pulse_polls)?;

        // A zero pulls the line low a second time right after the start pulse.
        match self.wait_level(false, self.timing.zero_polls) {
            Ok(()) => {
                self.wait_level(true, self.timing.pulse_polls)?;
                Ok(false)
            }
            Err(_) => Ok(true),
        }
    }

    pub fn receive_byte(&mut self, start_polls: u32) -> Result<u8, Error> {
        let mut byte = 0;
        for i in 0..8 {
            let polls = if i == 0 { start_polls } else { self.timing.bit_polls };
            if self.receive_bit(polls)? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Receives a count-prefixed response. A response that stops after its
    /// first byte is reported as `RxFail`.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let first = self.receive_byte(self.timing.response_polls)?;
        let count = check_count(first, buf.len())?;
        buf[0] = first;
        for slot in buf[1..count].iter_mut() {
            *slot = self.receive_byte(self.timing.bit_polls).map_err(|_| Error::RxFail)?;
        }
        Ok(count)
    }

    pub fn generate_wake_pulse(&mut self) {
        self.line.drive_low();
        self.timer.delay_us(WAKE_PULSE_US);
        self.line.release();
        self.timer.delay_us(WAKE_DELAY_US);
    }
}

pub struct SwiPhy<L, T, const N: usize> {
    lines: [L; N],
    selected: usize,
    timer: T,
    timing: SwiTiming,
}

impl<L: SwiLine, T: TimingProvider, const N: usize> SwiPhy<L, T, N> {
    pub fn new(mut lines: [L; N], timer: T, timing: SwiTiming) -> Self {
        for line in lines.iter_mut() {
            line.release();
        }
        Self {
            lines,
            selected: 0,
            timer,
            timing,
        }
    }

    pub fn wire(&mut self) -> SwiWire<'_, L, T> {
        SwiWire::new(&mut self.lines[self.selected], &mut self.timer, self.timing)
    }

    pub fn line(&mut self, index: usize) -> Option<&mut L> {
        self.lines.get_mut(index)
    }

    /// Sends a flag and the bytes following it with interrupts masked.
    fn send_flagged(&mut self, flag: u8, bytes: &[u8]) {
        self.timer.delay_us(SWI_TURNAROUND_US);
        critical_section::with(|_| {
            let mut wire = self.wire();
            wire.send_byte(flag);
            wire.send_bytes(bytes);
        });
    }
}

impl<L: SwiLine, T: TimingProvider, const N: usize> Phy for SwiPhy<L, T, N> {
    type Timer = T;

    fn timer(&mut self) -> &mut T {
        &mut self.timer
    }

    fn select(&mut self, device: DeviceId) -> Result<(), Error> {
        let index = device.0 as usize;
        if index >= N {
            return Err(Error::BadParameter);
        }
        self.selected = index;
        Ok(())
    }

    fn wake(&mut self) -> Result<(), Error> {
        self.wire().generate_wake_pulse();
        Ok(())
    }

    fn send_command(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.send_flagged(SWI_FLAG_CMD, frame);
        Ok(())
    }

    fn receive_response(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.timer.delay_us(SWI_TURNAROUND_US);
        critical_section::with(|_| {
            let mut wire = self.wire();
            wire.send_byte(SWI_FLAG_TX);
            wire.receive(buf)
        })
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
        // The device restarts its receiver on every flag.
        Ok(())
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        self.lines[self.selected].release();
        self.timer.delay_us(SWI_SYNC_TIMEOUT_US);
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
