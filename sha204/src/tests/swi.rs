// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::clock::Clock;
use crate::phy::{DeviceId, Phy};
use crate::swi::{SwiLine, SwiPhy, SwiTiming, SwiWire};
use crate::Error;
use consts::{RSP_SIZE_MAX, WAKE_RESPONSE};
use std::vec::Vec;

const CPU_HZ: u32 = 64_000_000;
const TIMING: SwiTiming = SwiTiming::from_cpu_hz(CPU_HZ);
const BIT: u64 = 4_340;
const FRAME: u64 = 9 * BIT;
/// Turn-around delay plus one flag byte.
const FLAG_NS: u64 = 15_000 + 8 * FRAME;

/// Open-drain line: the host's drive plus a scripted device waveform.
struct ScriptedLine {
    clock: Clock,
    host_low: bool,
    /// Host edges as (time, driven low).
    edges: Vec<(u64, bool)>,
    /// Intervals in which the device pulls the line low.
    device_low: Vec<(u64, u64)>,
}

impl ScriptedLine {
    fn new(clock: Clock) -> Self {
        Self {
            clock,
            host_low: false,
            edges: Vec::new(),
            device_low: Vec::new(),
        }
    }

    /// The device sends `bytes` starting at `start`.
    fn script(&mut self, start: u64, bytes: &[u8]) {
        let bits = bytes.iter().flat_map(|&byte| (0..8).map(move |i| byte & (1 << i) != 0));
        for (k, one) in bits.enumerate() {
            let t = start + k as u64 * FRAME;
            self.device_low.push((t, t + BIT));
            if !one {
                self.device_low.push((t + 2 * BIT, t + 3 * BIT));
            }
        }
    }

    fn low_pulses(&self) -> Vec<(u64, u64)> {
        self.edges
            .chunks(2)
            .map(|pair| match pair {
                [(start, true), (end, false)] => (*start, end - start),
                _ => panic!("unbalanced edges {pair:?}"),
            })
            .collect()
    }
}

impl SwiLine for ScriptedLine {
    fn drive_low(&mut self) {
        self.host_low = true;
        self.edges.push((self.clock.now(), true));
    }

    fn release(&mut self) {
        if self.host_low {
            self.host_low = false;
            self.edges.push((self.clock.now(), false));
        }
    }

    fn is_high(&mut self) -> bool {
        let now = self.clock.now();
        !self.host_low && !self.device_low.iter().any(|&(start, end)| start <= now && now < end)
    }
}

fn phy() -> (SwiPhy<ScriptedLine, Clock, 2>, Clock) {
    let clock = Clock::default();
    let lines = [ScriptedLine::new(clock.clone()), ScriptedLine::new(clock.clone())];
    (SwiPhy::new(lines, clock.clone(), TIMING), clock)
}

/// Timeouts are expressed as poll counts of the 16-cycle sampling loop.
#[test]
fn timing_from_cpu_clock() {
    assert_eq!(TIMING.bit_ns, 4_340);
    assert_eq!(TIMING.poll_ns, 250);
    assert_eq!(TIMING.response_polls, 619);
    assert_eq!(TIMING.bit_polls, 348);
    assert_eq!(TIMING.zero_polls, 36);
    assert_eq!(TIMING.pulse_polls, 36);
}

/// A one is a single low bit-time, a zero has a second pulse two bit-times later.
#[test]
fn bit_waveforms() {
    let mut clock = Clock::default();
    let mut line = ScriptedLine::new(clock.clone());
    SwiWire::new(&mut line, &mut clock, TIMING).send_byte(0xA5);

    assert_eq!(clock.now(), 8 * FRAME);
    let pulses = line.low_pulses();
    assert_eq!(pulses.len(), 12);
    assert!(pulses.iter().all(|&(_, width)| width == BIT));

    // 0xA5 goes out as 1, 0, 1, 0, 0, 1, 0, 1.
    assert_eq!(pulses[0].0, 0);
    assert_eq!(&pulses[1..3], &[(FRAME, BIT), (FRAME + 2 * BIT, BIT)]);
    assert_eq!(pulses[3].0, 2 * FRAME);
}

/// The wake pulse holds the line low for 60 µs, then waits before the first transfer.
#[test]
fn wake_pulse() {
    let (mut phy, clock) = phy();
    phy.select(DeviceId(1)).unwrap();
    phy.wake().unwrap();

    assert_eq!(phy.line(1).unwrap().low_pulses(), [(0, 60_000)]);
    assert!(phy.line(0).unwrap().edges.is_empty());
    assert_eq!(clock.now(), 60_000 + 3_000_000);
}

/// Only attached lines can be selected.
#[test]
fn select_line() {
    let (mut phy, _) = phy();
    assert_eq!(phy.select(DeviceId(1)), Ok(()));
    assert_eq!(phy.select(DeviceId(2)), Err(Error::BadParameter));
}

/// The wake response is read back after the transmit flag.
#[test]
fn receive_wake_response() {
    let (mut phy, clock) = phy();
    let start = clock.now() + FLAG_NS + 40_000;
    phy.line(0).unwrap().script(start, &WAKE_RESPONSE);

    let mut buf = [0u8; RSP_SIZE_MAX];
    let n = phy.receive_response(&mut buf).unwrap();
    assert_eq!(&buf[..n], &WAKE_RESPONSE);

    // Transmit flag 0x88 carries six zeros and two ones.
    let pulses = phy.line(0).unwrap().low_pulses();
    assert_eq!(pulses.len(), 8 + 6);
}

/// Silence after the transmit flag is a timeout, and probing finds no device.
#[test]
fn silent_line() {
    let (mut phy, clock) = phy();
    let mut buf = [0u8; RSP_SIZE_MAX];
    assert_eq!(phy.receive_response(&mut buf), Err(Error::Timeout));
    // Bounded by the response window, well under a millisecond.
    assert!(clock.now() < FLAG_NS + 200_000);

    assert_eq!(phy.probe(), Ok(false));
}

/// A response that stops after its count byte.
#[test]
fn response_cut_short() {
    let (mut phy, clock) = phy();
    let start = clock.now() + FLAG_NS + 20_000;
    phy.line(0).unwrap().script(start, &[0x07]);

    let mut buf = [0u8; RSP_SIZE_MAX];
    assert_eq!(phy.receive_response(&mut buf), Err(Error::RxFail));
}

/// A count byte larger than the buffer is refused before reading on.
#[test]
fn response_too_long() {
    let (mut phy, clock) = phy();
    let start = clock.now() + FLAG_NS + 20_000;
    phy.line(0).unwrap().script(start, &[0x23]);

    let mut buf = [0u8; 7];
    assert_eq!(phy.receive_response(&mut buf), Err(Error::SizeError));
}

/// Idle and sleep are single flags.
#[test]
fn flags() {
    let (mut phy, clock) = phy();
    phy.sleep().unwrap();
    // 0xCC: 0, 0, 1, 1, 0, 0, 1, 1.
    assert_eq!(phy.line(0).unwrap().low_pulses().len(), 12);
    assert_eq!(clock.now(), FLAG_NS);

    phy.idle().unwrap();
    // 0xBB: 1, 1, 0, 1, 1, 1, 0, 1.
    assert_eq!(phy.line(0).unwrap().low_pulses().len(), 12 + 10);
}
