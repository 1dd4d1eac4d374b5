// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host to bridge communication protocol.
//! A host drives the ATSHA204 devices on the bridge MCU over a COBS-framed UART.
//! Defines message types and structures for communication between the two.

#![no_std]
use serde::{Deserialize, Serialize};

/// Maximum supported message size to be serialized or deserialized by `postcard`.
/// Messages larger than this will be rejected.
pub const COBS_MAX_MSG_SIZE: usize = 256;

/// Size of the host-chosen input to an authentication run.
pub const AUTH_NUM_IN_SIZE: usize = consts::NONCE_NUMIN_SIZE;

/// Device a request is addressed to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Device holding the keys the client is checked against
    Host,
    /// Device being authenticated
    Client,
}

/// One command for a device. Fields carry the raw mode and zone bytes; the
/// bridge validates them before anything reaches the bus.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum Command<'a> {
    /// Wake the device and leave it awake
    Wake,
    /// Idle the device, keeping TempKey
    Idle,
    /// Put the device to sleep
    Sleep,
    CheckMac {
        mode: u8,
        key_id: u16,
        client_challenge: &'a [u8],
        client_response: &'a [u8],
        other_data: &'a [u8],
    },
    DeriveKey {
        random_source: bool,
        target_key: u16,
        mac: Option<&'a [u8]>,
    },
    DevRev,
    GenDig {
        zone: u8,
        key_id: u16,
        other_data: Option<&'a [u8]>,
    },
    Hmac {
        mode: u8,
        key_id: u16,
    },
    Lock {
        /// Data and OTP zones instead of the configuration zone
        data_zone: bool,
        /// Expected zone CRC, or `None` to skip the check
        summary: Option<u16>,
    },
    Mac {
        mode: u8,
        key_id: u16,
        challenge: Option<&'a [u8]>,
    },
    Nonce {
        mode: u8,
        num_in: &'a [u8],
    },
    Random {
        seed_update: bool,
    },
    Read {
        zone: u8,
        /// 32 bytes instead of 4
        block: bool,
        address: u16,
    },
    Write {
        zone: u8,
        address: u16,
        value: &'a [u8],
        mac: Option<&'a [u8]>,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct Request<'a> {
    pub device: Role,
    #[serde(borrow)]
    pub command: Command<'a>,
}

/// Why a request never produced a device answer
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommErrorKind {
    Timeout,
    RxFail,
    Checksum,
    Size,
    ResyncFailed,
    BadParameter,
}

/// Outcome of an authentication run
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthStatus {
    /// The host device accepted the client's MAC
    Accepted,
    /// The host device refused the client's MAC
    Refused,
    /// A device answered with a failure status
    DeviceStatus(u8),
    /// The run broke off on a communication failure
    CommError(CommErrorKind),
}

/// Top-level message types for host-bridge communication
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum HostProtocolMessage<'a> {
    /// Run one command on one device
    Sha204(#[serde(borrow)] Request<'a>),
    /// Device answer: the status byte of a status frame (0 otherwise) and
    /// the response payload without count and CRC
    Sha204Response { status: u8, data: &'a [u8] },
    /// The request failed before the device could answer
    CommError(CommErrorKind),
    /// Authenticate the client against the host device's key
    Authenticate { key_id: u16, num_in: [u8; AUTH_NUM_IN_SIZE] },
    /// Result of an authentication run
    AuthResult(AuthStatus),
    /// Request bridge firmware version
    GetFirmwareVersion,
    /// Response with firmware version string
    AckFirmwareVersion { version: &'a str },
    /// Request bridge reset
    Reset,
    /// The received frame did not decode
    PostcardError,
}
