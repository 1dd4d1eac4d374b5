// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host-side copy of the device's digest computations.
//!
//! Every function hashes exactly the bytes the device hashes, in the same
//! order, so the host can predict TempKey and MAC values. No I/O happens here.

use crate::command::{MacMode, NonceMode, Zone};
use crate::Error;
use consts::{
    CHECKMAC_OTHER_DATA_SIZE, KEY_SIZE, NONCE_NUMIN_SIZE, OP_DERIVE_KEY, OP_GENDIG,
    OP_HMAC, OP_MAC, OP_NONCE, OTP_DIGEST_SIZE, SN_01, SN_8, SN_SIZE,
};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

pub type Digest32 = [u8; KEY_SIZE];

/// Zero padding in GenDig and DeriveKey.
const RESERVED_25: [u8; 25] = [0; 25];

/// The nine serial number bytes SN[0..9].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SerialNumber(pub [u8; SN_SIZE]);

impl SerialNumber {
    /// Serial number with only the manufacturer-fixed bytes set.
    pub const fn fixed() -> Self {
        let mut sn = [0u8; SN_SIZE];
        sn[0] = SN_01[0];
        sn[1] = SN_01[1];
        sn[8] = SN_8;
        Self(sn)
    }

    fn sn01(&self) -> &[u8] {
        &self.0[0..2]
    }

    fn sn23(&self) -> &[u8] {
        &self.0[2..4]
    }

    fn sn47(&self) -> &[u8] {
        &self.0[4..8]
    }

    fn sn8(&self) -> u8 {
        self.0[8]
    }
}

/// OTP bytes 0 to 10.
pub type Otp = [u8; OTP_DIGEST_SIZE];

/// Where TempKey came from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// A random Nonce.
    #[default]
    Random,
    /// A pass-through Nonce.
    Input,
}

impl Source {
    fn matches(self, mode: MacMode) -> bool {
        mode.contains(MacMode::SOURCE_FLAG_MATCH) == (self == Source::Input)
    }
}

/// TempKey register with its provenance flags.
#[derive(Clone, Default)]
pub struct TempKey {
    value: Digest32,
    valid: bool,
    source: Source,
    /// Set by GenDig.
    gen_data: bool,
    /// Slot folded in by the last GenDig.
    key_id: u16,
    /// Set by a CheckMac whose response matched.
    check_flag: bool,
}

impl TempKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &Digest32 {
        &self.value
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn gen_data(&self) -> bool {
        self.gen_data
    }

    pub fn key_id(&self) -> u16 {
        self.key_id
    }

    pub fn check_flag(&self) -> bool {
        self.check_flag
    }

    /// What sleep, a power cycle or a consuming command does.
    pub fn invalidate(&mut self) {
        self.valid = false;
        self.gen_data = false;
    }

    fn load(&mut self, value: Digest32, source: Source) {
        self.value = value;
        self.valid = true;
        self.source = source;
        self.gen_data = false;
        self.key_id = 0;
        self.check_flag = false;
    }

    /// Checks that TempKey may be consumed by a command with `mode`.
    fn usable(&self, mode: MacMode) -> Result<(), Error> {
        if !self.valid || !self.source.matches(mode) {
            return Err(Error::BadParameter);
        }
        Ok(())
    }

    /// Applies a Nonce. `rand_out` is the device's random output and is
    /// required for the random modes.
    pub fn nonce(&mut self, mode: NonceMode, num_in: &[u8], rand_out: Option<&Digest32>) -> Result<&Digest32, Error> {
        let value = compute_temp_key(mode, num_in, rand_out)?;
        let source = match mode {
            NonceMode::Passthrough => Source::Input,
            _ => Source::Random,
        };
        self.load(value, source);
        Ok(&self.value)
    }

    /// Applies a GenDig over `stored`, the content of slot `key_id` in `zone`.
    pub fn gen_dig(&mut self, zone: Zone, key_id: u16, stored: &Digest32, sn: &SerialNumber) -> Result<&Digest32, Error> {
        if !self.valid {
            return Err(Error::BadParameter);
        }
        let mut hasher = Sha256::new();
        hasher.update(stored);
        hasher.update([OP_GENDIG, zone as u8]);
        hasher.update(key_id.to_le_bytes());
        hasher.update([sn.sn8()]);
        hasher.update(sn.sn01());
        hasher.update(RESERVED_25);
        hasher.update(self.value);
        self.value = hasher.finalize().into();
        self.gen_data = true;
        self.key_id = key_id;
        Ok(&self.value)
    }

    pub fn mac(&mut self, inputs: &MacInputs<'_>) -> Result<Digest32, Error> {
        compute_mac(self, inputs)
    }

    /// Runs the CheckMac comparison against `client_response` and records
    /// the outcome in the CheckFlag.
    pub fn check_mac(&mut self, inputs: &CheckMacInputs<'_>, client_response: &Digest32) -> Result<bool, Error> {
        let expected = compute_check_mac(self, inputs)?;
        let matched = constant_time_eq(&expected, client_response);
        self.check_flag = matched;
        Ok(matched)
    }

    pub fn derive_key(&mut self, random_source: bool, target_key: u16, parent_key: &Digest32, sn: &SerialNumber) -> Result<Digest32, Error> {
        compute_derived_key(self, random_source, target_key, parent_key, sn)
    }

    pub fn hmac(&mut self, mode: MacMode, key_id: u16, key: &Digest32, otp: Option<&Otp>, sn: &SerialNumber) -> Result<Digest32, Error> {
        compute_hmac(self, mode, key_id, key, otp, sn)
    }
}

/// TempKey after a Nonce: the hash of the random output and NumIn for the
/// random modes, NumIn itself for pass-through.
pub fn compute_temp_key(mode: NonceMode, num_in: &[u8], rand_out: Option<&Digest32>) -> Result<Digest32, Error> {
    match mode {
        NonceMode::Passthrough => num_in.try_into().map_err(|_| Error::BadParameter),
        NonceMode::SeedUpdate | NonceMode::NoSeedUpdate => {
            let rand_out = rand_out.ok_or(Error::BadParameter)?;
            if num_in.len() != NONCE_NUMIN_SIZE {
                return Err(Error::BadParameter);
            }
            let mut hasher = Sha256::new();
            hasher.update(rand_out);
            hasher.update(num_in);
            hasher.update([OP_NONCE, mode as u8, 0x00]);
            Ok(hasher.finalize().into())
        }
    }
}

/// Inputs of a MAC beside TempKey.
pub struct MacInputs<'a> {
    pub mode: MacMode,
    pub key_id: u16,
    /// Slot key, needed unless the first block is TempKey.
    pub key: Option<&'a Digest32>,
    /// Needed unless the second block is TempKey.
    pub challenge: Option<&'a Digest32>,
    /// Needed when the mode includes OTP bytes.
    pub otp: Option<&'a Otp>,
    pub sn: &'a SerialNumber,
}

/// Picks the first two 32-byte blocks of a MAC-style digest.
fn blocks<'a>(
    mode: MacMode,
    temp_key: &'a TempKey,
    key: Option<&'a Digest32>,
    challenge: Option<&'a Digest32>,
) -> Result<(&'a Digest32, &'a Digest32), Error> {
    if mode.intersects(MacMode::BLOCK1_TEMPKEY | MacMode::BLOCK2_TEMPKEY) {
        temp_key.usable(mode)?;
    }
    let first = if mode.contains(MacMode::BLOCK1_TEMPKEY) {
        &temp_key.value
    } else {
        key.ok_or(Error::BadParameter)?
    };
    let second = if mode.contains(MacMode::BLOCK2_TEMPKEY) {
        &temp_key.value
    } else {
        challenge.ok_or(Error::BadParameter)?
    };
    Ok((first, second))
}

/// Feeds the 24 bytes that follow the two blocks in MAC and HMAC.
fn update_tail(mut put: impl FnMut(&[u8]), opcode: u8, mode: MacMode, key_id: u16, otp: Option<&Otp>, sn: &SerialNumber) -> Result<(), Error> {
    if mode.intersects(MacMode::INCLUDE_OTP_64 | MacMode::INCLUDE_OTP_88) && otp.is_none() {
        return Err(Error::BadParameter);
    }
    put(&[opcode, mode.bits()]);
    put(&key_id.to_le_bytes());
    match otp {
        Some(otp) if mode.contains(MacMode::INCLUDE_OTP_64) => put(&otp[0..8]),
        _ => put(&[0; 8]),
    }
    match otp {
        Some(otp) if mode.contains(MacMode::INCLUDE_OTP_88) => put(&otp[8..11]),
        _ => put(&[0; 3]),
    }
    put(&[sn.sn8()]);
    if mode.contains(MacMode::INCLUDE_SN) {
        put(sn.sn47());
    } else {
        put(&[0; 4]);
    }
    put(sn.sn01());
    if mode.contains(MacMode::INCLUDE_SN) {
        put(sn.sn23());
    } else {
        put(&[0; 2]);
    }
    Ok(())
}

/// MAC response the device produces. A TempKey that took part is invalidated.
pub fn compute_mac(temp_key: &mut TempKey, inputs: &MacInputs<'_>) -> Result<Digest32, Error> {
    let (first, second) = blocks(inputs.mode, temp_key, inputs.key, inputs.challenge)?;

    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    update_tail(|data| hasher.update(data), OP_MAC, inputs.mode, inputs.key_id, inputs.otp, inputs.sn)?;
    let mac = hasher.finalize().into();

    if inputs.mode.intersects(MacMode::BLOCK1_TEMPKEY | MacMode::BLOCK2_TEMPKEY) {
        temp_key.invalidate();
    }
    Ok(mac)
}

/// Inputs of a CheckMac beside TempKey.
pub struct CheckMacInputs<'a> {
    pub mode: MacMode,
    pub key_id: u16,
    pub key: Option<&'a Digest32>,
    pub client_challenge: Option<&'a Digest32>,
    pub other_data: &'a [u8; CHECKMAC_OTHER_DATA_SIZE],
    pub otp: Option<&'a Otp>,
    pub sn: &'a SerialNumber,
}

/// Client response CheckMac expects. TempKey is invalidated when it took part.
pub fn compute_check_mac(temp_key: &mut TempKey, inputs: &CheckMacInputs<'_>) -> Result<Digest32, Error> {
    let (first, second) = blocks(inputs.mode, temp_key, inputs.key, inputs.client_challenge)?;
    let other = inputs.other_data;

    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.update(&other[0..4]);
    match (inputs.mode.contains(MacMode::INCLUDE_OTP_64), inputs.otp) {
        (true, Some(otp)) => hasher.update(&otp[0..8]),
        (true, None) => return Err(Error::BadParameter),
        (false, _) => hasher.update([0; 8]),
    }
    hasher.update(&other[4..7]);
    hasher.update([inputs.sn.sn8()]);
    hasher.update(&other[7..11]);
    hasher.update(inputs.sn.sn01());
    hasher.update(&other[11..13]);
    let expected = hasher.finalize().into();

    if inputs.mode.intersects(MacMode::BLOCK1_TEMPKEY | MacMode::BLOCK2_TEMPKEY) {
        temp_key.invalidate();
    }
    Ok(expected)
}

/// OtherData for a CheckMac that verifies a MAC sent with these parameters.
pub fn check_mac_other_data(mac_mode: MacMode, key_id: u16) -> [u8; CHECKMAC_OTHER_DATA_SIZE] {
    let mut other = [0u8; CHECKMAC_OTHER_DATA_SIZE];
    other[0] = OP_MAC;
    other[1] = mac_mode.bits();
    other[2..4].copy_from_slice(&key_id.to_le_bytes());
    other
}

/// Key a DeriveKey writes into `target_key`. `parent_key` is the target's
/// current value for a roll and its write key for a create.
pub fn compute_derived_key(
    temp_key: &mut TempKey,
    random_source: bool,
    target_key: u16,
    parent_key: &Digest32,
    sn: &SerialNumber,
) -> Result<Digest32, Error> {
    let mode = if random_source { MacMode::empty() } else { MacMode::SOURCE_FLAG_MATCH };
    temp_key.usable(mode)?;

    let mut hasher = Sha256::new();
    hasher.update(parent_key);
    hasher.update([OP_DERIVE_KEY, mode.bits()]);
    hasher.update(target_key.to_le_bytes());
    hasher.update([sn.sn8()]);
    hasher.update(sn.sn01());
    hasher.update(RESERVED_25);
    hasher.update(temp_key.value);
    let key = hasher.finalize().into();

    temp_key.invalidate();
    Ok(key)
}

/// Response of an HMAC command. TempKey is always consumed.
pub fn compute_hmac(
    temp_key: &mut TempKey,
    mode: MacMode,
    key_id: u16,
    key: &Digest32,
    otp: Option<&Otp>,
    sn: &SerialNumber,
) -> Result<Digest32, Error> {
    temp_key.usable(mode)?;

    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|_| Error::BadParameter)?;
    mac.update(&[0; KEY_SIZE]);
    mac.update(&temp_key.value);
    update_tail(|data| mac.update(data), OP_HMAC, mode, key_id, otp, sn)?;
    let result = mac.finalize().into_bytes().into();

    temp_key.invalidate();
    Ok(result)
}

/// Compares two digests without an early exit.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

