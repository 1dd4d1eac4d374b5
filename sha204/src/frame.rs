// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Count-prefixed, CRC-terminated frames shared by commands and responses.
//!
//! `[count][body...][crc_lo][crc_hi]`, where `count` covers the whole frame.

use crate::{Error, Status};
use consts::{CRC_SIZE, IDX_DATA, IDX_OPCODE, IDX_PARAM1, IDX_PARAM2, RSP_SIZE_MIN};
use crc::{Algorithm, Crc};

/// Polynomial 0x8005, zero seed, data bits fed least significant first into a
/// left-shifting register, no output reflection.
pub const CRC_16_ATSHA204: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x8005,
    init: 0x0000,
    refin: true,
    refout: false,
    xorout: 0x0000,
    check: 0xbcdd,
    residue: 0x0000,
};

static CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_ATSHA204);

/// CRC of `data` in wire order.
pub fn crc16(data: &[u8]) -> [u8; CRC_SIZE] {
    CRC.checksum(data).to_le_bytes()
}

/// Compares the trailing CRC of `frame` with the CRC of everything before it.
pub fn check_crc(frame: &[u8]) -> Result<(), Error> {
    if frame.len() < CRC_SIZE {
        return Err(Error::SizeError);
    }
    let (data, crc) = frame.split_at(frame.len() - CRC_SIZE);
    if crc16(data) == crc {
        Ok(())
    } else {
        Err(Error::ChecksumError)
    }
}

/// Writes a command frame into `buf` and returns its length.
/// `data` is a list of fields that are concatenated.
pub fn encode(opcode: u8, param1: u8, param2: u16, data: &[&[u8]], buf: &mut [u8]) -> Result<usize, Error> {
    let data_len: usize = data.iter().map(|field| field.len()).sum();
    let count = IDX_DATA + data_len + CRC_SIZE;
    if count > buf.len() || count > u8::MAX as usize {
        return Err(Error::SizeError);
    }

    buf[0] = count as u8;
    buf[IDX_OPCODE] = opcode;
    buf[IDX_PARAM1] = param1;
    buf[IDX_PARAM2..IDX_DATA].copy_from_slice(&param2.to_le_bytes());
    let mut at = IDX_DATA;
    for field in data {
        buf[at..at + field.len()].copy_from_slice(field);
        at += field.len();
    }
    let crc = crc16(&buf[..at]);
    buf[at..count].copy_from_slice(&crc);
    Ok(count)
}

/// Validates the frame at the start of `bytes`. The declared count must fit
/// in `bytes`, which is the capacity the caller received into.
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>, Error> {
    let count = *bytes.first().ok_or(Error::SizeError)? as usize;
    if count < RSP_SIZE_MIN || count > bytes.len() {
        return Err(Error::SizeError);
    }
    let bytes = &bytes[..count];
    check_crc(bytes)?;
    Ok(Frame { bytes })
}

/// A frame that passed the size and CRC checks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn count(&self) -> usize {
        self.bytes.len()
    }

    /// Everything between the count byte and the CRC.
    pub fn body(&self) -> &'a [u8] {
        &self.bytes[1..self.bytes.len() - CRC_SIZE]
    }

    /// The status byte of a 4-byte response.
    pub fn status(&self) -> Option<Status> {
        match self.body() {
            [status] => Some(Status::from(*status)),
            _ => None,
        }
    }

    pub fn opcode(&self) -> Option<u8> {
        self.body().first().copied()
    }

    pub fn param1(&self) -> Option<u8> {
        self.body().get(IDX_PARAM1 - 1).copied()
    }

    pub fn param2(&self) -> Option<u16> {
        match self.body().get(IDX_PARAM2 - 1..IDX_DATA - 1) {
            Some(&[lo, hi]) => Some(u16::from_le_bytes([lo, hi])),
            _ => None,
        }
    }

    /// Command data after the parameters.
    pub fn data(&self) -> &'a [u8] {
        self.body().get(IDX_DATA - 1..).unwrap_or(&[])
    }
}
