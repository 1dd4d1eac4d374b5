// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command builders and the send / wait / receive cycle.

use crate::frame;
use crate::phy::{DeviceId, Phy};
use crate::session::Bus;
use crate::timing::{stretch, TimingProvider};
use crate::{Error, Status};
use bitflags::bitflags;
use consts::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    CheckMac,
    DeriveKey,
    DevRev,
    GenDig,
    Hmac,
    Lock,
    Mac,
    Nonce,
    Random,
    Read,
    Write,
}

impl Opcode {
    pub const fn code(self) -> u8 {
        match self {
            Opcode::CheckMac => OP_CHECKMAC,
            Opcode::DeriveKey => OP_DERIVE_KEY,
            Opcode::DevRev => OP_DEVREV,
            Opcode::GenDig => OP_GENDIG,
            Opcode::Hmac => OP_HMAC,
            Opcode::Lock => OP_LOCK,
            Opcode::Mac => OP_MAC,
            Opcode::Nonce => OP_NONCE,
            Opcode::Random => OP_RANDOM,
            Opcode::Read => OP_READ,
            Opcode::Write => OP_WRITE,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            OP_CHECKMAC => Opcode::CheckMac,
            OP_DERIVE_KEY => Opcode::DeriveKey,
            OP_DEVREV => Opcode::DevRev,
            OP_GENDIG => Opcode::GenDig,
            OP_HMAC => Opcode::Hmac,
            OP_LOCK => Opcode::Lock,
            OP_MAC => Opcode::Mac,
            OP_NONCE => Opcode::Nonce,
            OP_RANDOM => Opcode::Random,
            OP_READ => Opcode::Read,
            OP_WRITE => Opcode::Write,
            _ => return None,
        })
    }

    /// Data-sheet typical execution time.
    pub const fn exec_typ_us(self) -> u32 {
        match self {
            Opcode::CheckMac => CHECKMAC_EXEC_TYP_US,
            Opcode::DeriveKey => DERIVE_KEY_EXEC_TYP_US,
            Opcode::DevRev => DEVREV_EXEC_TYP_US,
            Opcode::GenDig => GENDIG_EXEC_TYP_US,
            Opcode::Hmac => HMAC_EXEC_TYP_US,
            Opcode::Lock => LOCK_EXEC_TYP_US,
            Opcode::Mac => MAC_EXEC_TYP_US,
            Opcode::Nonce => NONCE_EXEC_TYP_US,
            Opcode::Random => RANDOM_EXEC_TYP_US,
            Opcode::Read => READ_EXEC_TYP_US,
            Opcode::Write => WRITE_EXEC_TYP_US,
        }
    }

    /// Data-sheet maximum execution time.
    pub const fn exec_max_us(self) -> u32 {
        match self {
            Opcode::CheckMac => CHECKMAC_EXEC_MAX_US,
            Opcode::DeriveKey => DERIVE_KEY_EXEC_MAX_US,
            Opcode::DevRev => DEVREV_EXEC_MAX_US,
            Opcode::GenDig => GENDIG_EXEC_MAX_US,
            Opcode::Hmac => HMAC_EXEC_MAX_US,
            Opcode::Lock => LOCK_EXEC_MAX_US,
            Opcode::Mac => MAC_EXEC_MAX_US,
            Opcode::Nonce => NONCE_EXEC_MAX_US,
            Opcode::Random => RANDOM_EXEC_MAX_US,
            Opcode::Read => READ_EXEC_MAX_US,
            Opcode::Write => WRITE_EXEC_MAX_US,
        }
    }

    /// Time to wait before polling for the response, clock tolerance included.
    pub const fn delay_us(self) -> u32 {
        stretch(self.exec_max_us())
    }
}

bitflags! {
    /// Mode byte of MAC, CheckMac and HMAC.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct MacMode: u8 {
        /// Second 32-byte block is TempKey instead of the challenge.
        const BLOCK2_TEMPKEY = 0x01;
        /// First 32-byte block is TempKey instead of the slot key.
        const BLOCK1_TEMPKEY = 0x02;
        /// Must equal TempKey's source flag (set: pass-through Nonce).
        const SOURCE_FLAG_MATCH = 0x04;
        const INCLUDE_OTP_88 = 0x10;
        const INCLUDE_OTP_64 = 0x20;
        const INCLUDE_SN = 0x40;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NonceMode {
    /// Random Nonce that also updates the EEPROM seed.
    SeedUpdate = 0,
    NoSeedUpdate = 1,
    /// NumIn is loaded into TempKey unchanged.
    Passthrough = 3,
}

impl NonceMode {
    pub fn from_mode(mode: u8) -> Result<Self, Error> {
        match mode {
            0 => Ok(NonceMode::SeedUpdate),
            1 => Ok(NonceMode::NoSeedUpdate),
            3 => Ok(NonceMode::Passthrough),
            _ => Err(Error::BadParameter),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Zone {
    Config = ZONE_CONFIG as isize,
    Otp = ZONE_OTP as isize,
    Data = ZONE_DATA as isize,
}

impl Zone {
    pub fn from_bits(bits: u8) -> Result<Self, Error> {
        match bits {
            ZONE_CONFIG => Ok(Zone::Config),
            ZONE_OTP => Ok(Zone::Otp),
            ZONE_DATA => Ok(Zone::Data),
            _ => Err(Error::BadParameter),
        }
    }

    pub const fn size(self) -> usize {
        match self {
            Zone::Config => CONFIG_ZONE_SIZE,
            Zone::Otp => OTP_ZONE_SIZE,
            Zone::Data => DATA_ZONE_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockZone {
    Config = 0,
    /// Data and OTP zones together.
    Data = 1,
}

/// A validated command ready to be framed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Command<'a> {
    opcode: Opcode,
    param1: u8,
    param2: u16,
    data: [&'a [u8]; 3],
    response_size: usize,
}

fn check_key_id(key_id: u16) -> Result<(), Error> {
    if key_id > KEY_ID_MAX {
        return Err(Error::BadParameter);
    }
    Ok(())
}

fn check_mode(mode: u8, mask: u8) -> Result<(), Error> {
    if mode & !mask != 0 {
        return Err(Error::BadParameter);
    }
    Ok(())
}

/// Word address of a Read or Write, checked against the zone size.
fn check_address(zone: Zone, address: u16, len: usize) -> Result<(), Error> {
    let offset = address as usize * ZONE_ACCESS_4;
    if offset + len > zone.size() {
        return Err(Error::BadParameter);
    }
    Ok(())
}

impl<'a> Command<'a> {
    fn new(opcode: Opcode, param1: u8, param2: u16, data: [&'a [u8]; 3], response_size: usize) -> Self {
        Self {
            opcode,
            param1,
            param2,
            data,
            response_size,
        }
    }

    pub fn nonce(mode: NonceMode, num_in: &'a [u8]) -> Result<Self, Error> {
        let (expected, response_size) = match mode {
            NonceMode::SeedUpdate | NonceMode::NoSeedUpdate => (NONCE_NUMIN_SIZE, NONCE_RSP_SIZE_LONG),
            NonceMode::Passthrough => (NONCE_NUMIN_SIZE_PASSTHROUGH, NONCE_RSP_SIZE_SHORT),
        };
        if num_in.len() != expected {
            return Err(Error::BadParameter);
        }
        Ok(Self::new(Opcode::Nonce, mode as u8, 0, [num_in, &[], &[]], response_size))
    }

    /// `challenge` is required unless the second block is TempKey.
    pub fn mac(mode: MacMode, key_id: u16, challenge: Option<&'a [u8; MAC_CHALLENGE_SIZE]>) -> Result<Self, Error> {
        check_mode(mode.bits(), MAC_MODE_MASK)?;
        check_key_id(key_id)?;
        let challenge: &[u8] = match (mode.contains(MacMode::BLOCK2_TEMPKEY), challenge) {
            (false, Some(challenge)) => challenge,
            (true, None) => &[],
            _ => return Err(Error::BadParameter),
        };
        Ok(Self::new(Opcode::Mac, mode.bits(), key_id, [challenge, &[], &[]], MAC_RSP_SIZE))
    }

    pub fn check_mac(
        mode: MacMode,
        key_id: u16,
        client_challenge: &'a [u8; CHECKMAC_CLIENT_CHALLENGE_SIZE],
        client_response: &'a [u8; CHECKMAC_CLIENT_RESPONSE_SIZE],
        other_data: &'a [u8; CHECKMAC_OTHER_DATA_SIZE],
    ) -> Result<Self, Error> {
        check_mode(mode.bits(), CHECKMAC_MODE_MASK)?;
        check_key_id(key_id)?;
        Ok(Self::new(
            Opcode::CheckMac,
            mode.bits(),
            key_id,
            [client_challenge, client_response, other_data],
            RSP_SIZE_MIN,
        ))
    }

    pub fn gen_dig(zone: Zone, key_id: u16, other_data: Option<&'a [u8; GENDIG_OTHER_DATA_SIZE]>) -> Result<Self, Error> {
        check_key_id(key_id)?;
        let other: &[u8] = match other_data {
            Some(other) => other,
            None => &[],
        };
        Ok(Self::new(Opcode::GenDig, zone as u8, key_id, [other, &[], &[]], RSP_SIZE_MIN))
    }

    /// `random_source` must match TempKey's source flag.
    pub fn derive_key(random_source: bool, target_key: u16, mac: Option<&'a [u8; DERIVE_KEY_MAC_SIZE]>) -> Result<Self, Error> {
        check_key_id(target_key)?;
        let mode = if random_source { 0 } else { DERIVE_KEY_MODE_MASK };
        let mac: &[u8] = match mac {
            Some(mac) => mac,
            None => &[],
        };
        Ok(Self::new(Opcode::DeriveKey, mode, target_key, [mac, &[], &[]], RSP_SIZE_MIN))
    }

    /// Reads 4 bytes, or 32 when `block` is set, at word `address`.
    pub fn read(zone: Zone, block: bool, address: u16) -> Result<Self, Error> {
        let (flag, len, response_size) = if block {
            (ZONE_COUNT_FLAG, ZONE_ACCESS_32, RSP_SIZE_MAX)
        } else {
            (0, ZONE_ACCESS_4, RSP_SIZE_VAL)
        };
        check_address(zone, address, len)?;
        Ok(Self::new(Opcode::Read, zone as u8 | flag, address, [&[], &[], &[]], response_size))
    }

    /// Writes 4 or 32 bytes at word `address`, optionally authenticated by `mac`.
    pub fn write(zone: Zone, address: u16, value: &'a [u8], mac: Option<&'a [u8; WRITE_MAC_SIZE]>) -> Result<Self, Error> {
        let flag = match value.len() {
            ZONE_ACCESS_4 => 0,
            ZONE_ACCESS_32 => ZONE_COUNT_FLAG,
            _ => return Err(Error::BadParameter),
        };
        check_address(zone, address, value.len())?;
        let (flag, mac): (u8, &[u8]) = match mac {
            Some(mac) => (flag | WRITE_ZONE_WITH_MAC, mac),
            None => (flag, &[]),
        };
        check_mode(zone as u8 | flag, WRITE_ZONE_MASK)?;
        Ok(Self::new(Opcode::Write, zone as u8 | flag, address, [value, mac, &[]], RSP_SIZE_MIN))
    }

    /// Locks `zone`. Without `summary` the device skips the zone CRC check.
    pub fn lock(zone: LockZone, summary: Option<u16>) -> Result<Self, Error> {
        let (mode, summary) = match summary {
            Some(crc) => (zone as u8, crc),
            None => (zone as u8 | LOCK_ZONE_NO_CRC, 0),
        };
        check_mode(mode, LOCK_ZONE_MASK)?;
        Ok(Self::new(Opcode::Lock, mode, summary, [&[], &[], &[]], RSP_SIZE_MIN))
    }

    pub fn random(seed_update: bool) -> Result<Self, Error> {
        let mode = if seed_update { 0 } else { 1 };
        Ok(Self::new(Opcode::Random, mode, 0, [&[], &[], &[]], RSP_SIZE_MAX))
    }

    pub fn hmac(mode: MacMode, key_id: u16) -> Result<Self, Error> {
        check_mode(mode.bits(), HMAC_MODE_MASK)?;
        check_key_id(key_id)?;
        Ok(Self::new(Opcode::Hmac, mode.bits(), key_id, [&[], &[], &[]], RSP_SIZE_MAX))
    }

    pub fn dev_rev() -> Self {
        Self::new(Opcode::DevRev, 0, 0, [&[], &[], &[]], RSP_SIZE_VAL)
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn param1(&self) -> u8 {
        self.param1
    }

    pub fn param2(&self) -> u16 {
        self.param2
    }

    /// Size of a successful response, count and CRC included.
    pub fn response_size(&self) -> usize {
        self.response_size
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        frame::encode(self.opcode.code(), self.param1, self.param2, &self.data, buf)
    }
}

/// A successful response frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Response<'a> {
    bytes: &'a [u8],
}

impl<'a> Response<'a> {
    /// The whole frame, count and CRC included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The bytes between the count and the CRC.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[IDX_RSP_DATA..self.bytes.len() - CRC_SIZE]
    }

    /// 32-byte payload of a MAC, HMAC, Random, Nonce or block Read.
    pub fn digest(&self) -> Option<[u8; KEY_SIZE]> {
        self.payload().try_into().ok()
    }
}

/// Sends `command` to `id` and returns its response in `rx`.
///
/// Wakes the device first if it is not awake. Transport failures, in the wake
/// response as well as in the command's own response, are retried after a
/// resync, up to `RETRY_COUNT` times; a failure status from the device is
/// returned at once. The device is left awake.
pub fn execute<'r, P: Phy>(bus: &mut Bus<P>, id: DeviceId, command: &Command<'_>, rx: &'r mut [u8]) -> Result<Response<'r>, Error> {
    let mut tx = [0u8; CMD_SIZE_MAX];
    let len = command.encode(&mut tx)?;
    if rx.len() < command.response_size() {
        return Err(Error::BadParameter);
    }

    let mut attempt = 0;
    let count = loop {
        match exchange(bus, id, command, &tx[..len], rx) {
            Ok(count) => break count,
            Err(e) if e.is_retryable() && attempt < RETRY_COUNT => {
                attempt += 1;
                info!("opcode {} failed ({}), retry {}", command.opcode().code(), e, attempt);
                bus.resync(id)?;
            }
            Err(e) => return Err(e),
        }
    };

    Ok(Response { bytes: &rx[..count] })
}

fn exchange<P: Phy>(bus: &mut Bus<P>, id: DeviceId, command: &Command<'_>, tx: &[u8], rx: &mut [u8]) -> Result<usize, Error> {
    bus.ensure_awake(id)?;
    bus.select(id)?;
    bus.phy().send_command(tx)?;
    bus.begin_command(id, command.opcode());

    bus.phy().timer().delay_us(command.opcode().delay_us());

    let count = bus.phy().receive_response(rx)?;
    let frame = frame::decode(&rx[..count])?;
    bus.end_command(id);

    let expected = command.response_size();
    if count == expected && count != RSP_SIZE_MIN {
        return Ok(count);
    }
    match frame.status() {
        Some(Status::Success) if expected == RSP_SIZE_MIN => Ok(count),
        Some(Status::Success) | None => Err(Error::SizeError),
        Some(status) => {
            warn!("opcode {} returned {}", command.opcode().code(), status);
            Err(Error::DeviceStatus(status))
        }
    }
}
