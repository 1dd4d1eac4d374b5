// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Authentication sequences across one or two devices on a bus.
//!
//! Each sequence runs to its first error and puts every device to sleep
//! before returning, whatever the outcome.

use crate::command::{execute, Command, MacMode, NonceMode, Zone};
use crate::mirror::{check_mac_other_data, compute_mac, constant_time_eq, Digest32, MacInputs, SerialNumber, TempKey};
use crate::phy::{DeviceId, Phy};
use crate::session::{Bus, Park};
use crate::Error;
use consts::{KEY_SIZE, NONCE_NUMIN_SIZE, RSP_SIZE_MAX, RSP_SIZE_MIN};

/// The two devices of a CheckMac authentication.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Roles {
    /// Holds the secret and verifies the client.
    pub host: DeviceId,
    /// Proves it holds the same key.
    pub client: DeviceId,
}

/// A challenge and the response the client must give for it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChallengeResponsePair {
    pub challenge: Digest32,
    pub response: Digest32,
    pub key_id: u16,
}

/// MAC mode the client uses in `check_mac`: challenge from the pass-through TempKey.
const CLIENT_MAC_MODE: MacMode = MacMode::BLOCK2_TEMPKEY.union(MacMode::SOURCE_FLAG_MATCH);
/// CheckMac mode the host uses: its own random TempKey stands in for the challenge.
const HOST_CHECKMAC_MODE: MacMode = MacMode::BLOCK2_TEMPKEY;

/// Runs `steps`, then sleeps every device. The first error wins.
fn sequence<P: Phy, T>(bus: &mut Bus<P>, name: &str, steps: impl FnOnce(&mut Bus<P>) -> Result<T, Error>) -> Result<T, Error> {
    let result = steps(bus);
    let slept = bus.sleep_all();
    match result {
        Ok(value) => slept.map(|_| value),
        Err(e) => {
            error!("{} failed: {}", name, e);
            Err(e)
        }
    }
}

/// Authenticates `roles.client` against `roles.host`, both holding the key in `key_id`.
///
/// The host generates a random TempKey, the client receives it as a
/// pass-through Nonce and MACs it, and the host checks that MAC. A wrong
/// client answers `Error::DeviceStatus(Status::CheckMacMiscompare)`.
pub fn check_mac<P: Phy>(bus: &mut Bus<P>, roles: Roles, key_id: u16, num_in: &[u8; NONCE_NUMIN_SIZE]) -> Result<(), Error> {
    sequence(bus, "check_mac", |bus| {
        let mut rx = [0u8; RSP_SIZE_MAX];

        bus.wake(roles.host, Park::Sleep)?;
        let nonce = Command::nonce(NonceMode::NoSeedUpdate, num_in)?;
        let rand_out = execute(bus, roles.host, &nonce, &mut rx)?.digest().ok_or(Error::SizeError)?;
        bus.idle(roles.host)?;

        let mut temp_key = TempKey::new();
        let challenge = *temp_key.nonce(NonceMode::NoSeedUpdate, num_in, Some(&rand_out))?;

        bus.wake(roles.client, Park::Idle)?;
        let passthrough = Command::nonce(NonceMode::Passthrough, &challenge)?;
        execute(bus, roles.client, &passthrough, &mut rx)?;
        let mac = Command::mac(CLIENT_MAC_MODE, key_id, None)?;
        let response = execute(bus, roles.client, &mac, &mut rx)?.digest().ok_or(Error::SizeError)?;
        bus.sleep(roles.client)?;
        debug!("client MAC received");

        let other_data = check_mac_other_data(CLIENT_MAC_MODE, key_id);
        bus.wake(roles.host, Park::Sleep)?;
        let check = Command::check_mac(HOST_CHECKMAC_MODE, key_id, &challenge, &response, &other_data)?;
        let mut status = [0u8; RSP_SIZE_MIN];
        execute(bus, roles.host, &check, &mut status)?;
        bus.sleep(roles.host)?;
        info!("client authenticated with key {}", key_id);
        Ok(())
    })
}

/// Sends one of the stored challenges and compares the client's MAC with
/// the stored response. Returns whether they match.
pub fn fixed_challenge<P: Phy>(bus: &mut Bus<P>, client: DeviceId, pairs: &[ChallengeResponsePair], pick: usize) -> Result<bool, Error> {
    let pair = pairs.get(pick).ok_or(Error::BadParameter)?;
    sequence(bus, "fixed_challenge", |bus| {
        let mut rx = [0u8; RSP_SIZE_MAX];
        bus.wake(client, Park::Sleep)?;
        let mac = Command::mac(MacMode::empty(), pair.key_id, Some(&pair.challenge))?;
        let response = execute(bus, client, &mac, &mut rx)?.digest().ok_or(Error::SizeError)?;
        bus.sleep(client)?;
        Ok(constant_time_eq(&response, &pair.response))
    })
}

/// Runs `rounds` MACs where each response is the next challenge, checking
/// every response against `key`. Stops at the first mismatch.
pub fn chained_challenge<P: Phy>(
    bus: &mut Bus<P>,
    client: DeviceId,
    key_id: u16,
    key: &Digest32,
    seed: &Digest32,
    rounds: usize,
) -> Result<bool, Error> {
    sequence(bus, "chained_challenge", |bus| {
        let sn = SerialNumber::fixed();
        let mut unused = TempKey::new();
        let mut challenge = *seed;
        let mut rx = [0u8; RSP_SIZE_MAX];

        bus.wake(client, Park::Sleep)?;
        for round in 0..rounds {
            let mac = Command::mac(MacMode::empty(), key_id, Some(&challenge))?;
            let response = execute(bus, client, &mac, &mut rx)?.digest().ok_or(Error::SizeError)?;
            // Keeps the watchdog from expiring between rounds.
            bus.idle(client)?;

            let inputs = MacInputs {
                mode: MacMode::empty(),
                key_id,
                key: Some(key),
                challenge: Some(&challenge),
                otp: None,
                sn: &sn,
            };
            let expected = compute_mac(&mut unused, &inputs)?;
            if !constant_time_eq(&expected, &response) {
                warn!("chained challenge mismatch in round {}", round);
                return Ok(false);
            }
            challenge = response;
        }
        Ok(true)
    })
}

/// Builds a TempKey from a random Nonce and the data slot `key_id`, lets
/// the client MAC it, and compares with the same computation on the host.
/// `key` is the content of the data slot.
pub fn nonce_gendig_mac<P: Phy>(
    bus: &mut Bus<P>,
    client: DeviceId,
    key_id: u16,
    key: &Digest32,
    num_in: &[u8; NONCE_NUMIN_SIZE],
) -> Result<bool, Error> {
    sequence(bus, "nonce_gendig_mac", |bus| {
        let sn = SerialNumber::fixed();
        let mut temp_key = TempKey::new();
        let mut rx = [0u8; RSP_SIZE_MAX];

        bus.wake(client, Park::Sleep)?;
        let nonce = Command::nonce(NonceMode::NoSeedUpdate, num_in)?;
        let rand_out = execute(bus, client, &nonce, &mut rx)?.digest().ok_or(Error::SizeError)?;
        bus.idle(client)?;
        temp_key.nonce(NonceMode::NoSeedUpdate, num_in, Some(&rand_out))?;

        let gen_dig = Command::gen_dig(Zone::Data, key_id, None)?;
        execute(bus, client, &gen_dig, &mut rx)?;
        bus.idle(client)?;
        temp_key.gen_dig(Zone::Data, key_id, key, &sn)?;

        let mode = MacMode::BLOCK1_TEMPKEY | MacMode::BLOCK2_TEMPKEY;
        let mac = Command::mac(mode, key_id, None)?;
        let response = execute(bus, client, &mac, &mut rx)?.digest().ok_or(Error::SizeError)?;
        bus.sleep(client)?;

        let inputs = MacInputs {
            mode,
            key_id,
            key: None,
            challenge: None,
            otp: None,
            sn: &sn,
        };
        let expected: [u8; KEY_SIZE] = temp_key.mac(&inputs)?;
        Ok(constant_time_eq(&expected, &response))
    })
}
