// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::{STATUS_CHECKMAC_FAIL, STATUS_CRC_ERROR, STATUS_EXEC_ERROR, STATUS_PARSE_ERROR, STATUS_SUCCESS, STATUS_WAKEUP};
use core::fmt;

/// Status byte returned by the device in a 4-byte response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Success,
    /// CheckMac was given a response that does not match.
    CheckMacMiscompare,
    /// Bad opcode, parameter or length.
    ParseError,
    /// The command could not run in the device's current state.
    ExecutionError,
    /// First response after a wake.
    WakeReceived,
    /// The device received a corrupted command.
    CommError,
    Other(u8),
}

impl From<u8> for Status {
    fn from(byte: u8) -> Self {
        match byte {
            STATUS_SUCCESS => Status::Success,
            STATUS_CHECKMAC_FAIL => Status::CheckMacMiscompare,
            STATUS_PARSE_ERROR => Status::ParseError,
            STATUS_EXEC_ERROR => Status::ExecutionError,
            STATUS_WAKEUP => Status::WakeReceived,
            STATUS_CRC_ERROR => Status::CommError,
            other => Status::Other(other),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => STATUS_SUCCESS,
            Status::CheckMacMiscompare => STATUS_CHECKMAC_FAIL,
            Status::ParseError => STATUS_PARSE_ERROR,
            Status::ExecutionError => STATUS_EXEC_ERROR,
            Status::WakeReceived => STATUS_WAKEUP,
            Status::CommError => STATUS_CRC_ERROR,
            Status::Other(byte) => byte,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::CheckMacMiscompare => write!(f, "CheckMac miscompare"),
            Status::ParseError => write!(f, "parse error"),
            Status::ExecutionError => write!(f, "execution error"),
            Status::WakeReceived => write!(f, "wake received"),
            Status::CommError => write!(f, "communication error"),
            Status::Other(byte) => write!(f, "status {byte:#04x}"),
        }
    }
}

/// Errors of the communication stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No edge, acknowledge or response within the allowed window.
    Timeout,
    /// A response started and stopped before it was complete.
    RxFail,
    /// CRC mismatch.
    ChecksumError,
    /// Frame length outside the protocol bounds or the receive buffer.
    SizeError,
    /// All three resynchronization steps failed.
    ResyncFailed,
    /// The device answered with a failure status.
    DeviceStatus(Status),
    /// Invalid command argument.
    BadParameter,
}

impl Error {
    /// Transport-level failures are retried by the command marshaler.
    /// A device status is a correct answer and is not, except for the
    /// device reporting that the command itself arrived corrupted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout | Error::RxFail | Error::ChecksumError | Error::SizeError | Error::DeviceStatus(Status::CommError)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Timeout => write!(f, "timeout"),
            Error::RxFail => write!(f, "response interrupted"),
            Error::ChecksumError => write!(f, "checksum error"),
            Error::SizeError => write!(f, "frame size out of bounds"),
            Error::ResyncFailed => write!(f, "resynchronization failed"),
            Error::DeviceStatus(status) => write!(f, "device status: {status}"),
            Error::BadParameter => write!(f, "bad parameter"),
        }
    }
}
