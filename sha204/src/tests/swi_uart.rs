// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::clock::Clock;
use crate::phy::{DeviceId, Phy};
use crate::swi_uart::{decode_bit, encode_bit, SwiUart, SwiUartPhy};
use crate::Error;
use consts::{RSP_SIZE_MAX, SWI_BAUD, SWI_FLAG_CMD, SWI_FLAG_TX, SWI_UART_ONE, WAKE_RESPONSE};
use std::collections::VecDeque;
use std::vec::Vec;

/// Characters sampled from a device one, with and without a late edge.
const DEVICE_ONES: [u8; 2] = [0x7F, 0x7E];
/// Character sampled from a device zero.
const DEVICE_ZERO: u8 = 0x7B;

/// Records what goes out and answers the transmit flag with `response`.
#[derive(Default)]
struct MockUart {
    baud: u32,
    sent: Vec<(u32, u8)>,
    rx: VecDeque<u8>,
    response: Vec<u8>,
    flushed_tx: usize,
}

impl MockUart {
    fn answering(response: &[u8]) -> Self {
        Self {
            response: response.to_vec(),
            ..Default::default()
        }
    }

    fn chars(&self) -> Vec<u8> {
        self.sent.iter().map(|&(_, c)| c).collect()
    }

    /// Host characters are exact, so only `SWI_UART_ONE` is a one.
    fn last_byte_sent(&self) -> Option<u8> {
        let chars = self.chars();
        let tail = chars.get(chars.len().checked_sub(8)?..)?;
        Some(tail.iter().enumerate().fold(0, |byte, (i, &c)| byte | (u8::from(c == SWI_UART_ONE) << i)))
    }
}

impl SwiUart for MockUart {
    fn set_baud(&mut self, baud: u32) {
        self.baud = baud;
    }

    fn write(&mut self, byte: u8) {
        self.sent.push((self.baud, byte));
    }

    fn flush_tx(&mut self) {
        self.flushed_tx += 1;
    }

    fn read(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn flush_rx(&mut self) {
        self.rx.clear();
        if self.last_byte_sent() == Some(SWI_FLAG_TX) {
            let bits = self.response.iter().flat_map(|&byte| (0..8).map(move |i| byte & (1 << i) != 0));
            let chars: Vec<u8> = bits
                .enumerate()
                .map(|(k, one)| if one { DEVICE_ONES[k % 2] } else { DEVICE_ZERO })
                .collect();
            self.rx.extend(chars);
        }
    }
}

fn phy(response: &[u8]) -> (SwiUartPhy<MockUart, Clock>, Clock) {
    let clock = Clock::default();
    (SwiUartPhy::new(MockUart::answering(response), clock.clone()), clock)
}

#[test]
fn bit_characters() {
    assert_eq!(encode_bit(true), 0x7F);
    assert_eq!(encode_bit(false), 0x7D);

    for c in [0x7F, 0x7E] {
        assert!(decode_bit(c));
    }
    for c in [0x7B, 0x79, 0x73, 0x00] {
        assert!(!decode_bit(c));
    }
}

/// Sampling tolerance makes the host's own zero character read as a one.
#[test]
fn host_zero_reads_as_one() {
    assert!(decode_bit(encode_bit(false)));
}

/// The command flag goes out least significant bit first, one character per bit.
#[test]
fn command_flag() {
    let (mut phy, clock) = phy(&[]);
    phy.send_command(&[]).unwrap();

    assert_eq!(phy.uart().chars(), [0x7F, 0x7F, 0x7F, 0x7D, 0x7F, 0x7F, 0x7F, 0x7D]);
    assert_eq!(phy.uart().last_byte_sent(), Some(SWI_FLAG_CMD));
    assert_eq!(phy.uart().flushed_tx, 1);
    assert_eq!(clock.now(), 15_000);
}

/// The wake pulse is a zero character sent at half the bit rate.
#[test]
fn wake_at_half_baud() {
    let (mut phy, clock) = phy(&[]);
    phy.wake().unwrap();

    assert_eq!(phy.uart().sent, [(SWI_BAUD / 2, 0x00)]);
    assert_eq!(phy.uart().baud, SWI_BAUD);
    assert_eq!(clock.now(), 3_000_000);
}

#[test]
fn receive_wake_response() {
    let (mut phy, _) = phy(&WAKE_RESPONSE);
    let mut buf = [0u8; RSP_SIZE_MAX];
    let n = phy.receive_response(&mut buf).unwrap();
    assert_eq!(&buf[..n], &WAKE_RESPONSE);
    assert_eq!(phy.probe(), Ok(true));
}

/// One UART serves one device.
#[test]
fn select_single_device() {
    let (mut phy, _) = phy(&[]);
    assert_eq!(phy.select(DeviceId(0)), Ok(()));
    assert_eq!(phy.select(DeviceId(1)), Err(Error::BadParameter));
}

#[test]
fn silent_line() {
    let (mut phy, clock) = phy(&[]);
    let mut buf = [0u8; RSP_SIZE_MAX];
    assert_eq!(phy.receive_response(&mut buf), Err(Error::Timeout));
    assert!(clock.now() < 1_000_000);
    assert_eq!(phy.probe(), Ok(false));
}

#[test]
fn response_cut_short() {
    let (mut phy, _) = phy(&[0x07, 0x00]);
    let mut buf = [0u8; RSP_SIZE_MAX];
    assert_eq!(phy.receive_response(&mut buf), Err(Error::RxFail));
}

#[test]
fn count_out_of_range() {
    let (mut phy, _) = phy(&[0x02]);
    let mut buf = [0u8; RSP_SIZE_MAX];
    assert_eq!(phy.receive_response(&mut buf), Err(Error::SizeError));
}
