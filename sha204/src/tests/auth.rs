// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::sim::{device, sim_bus, SimPower, CLIENT, HOST};
use super::vectors::{CLIENT_CHALLENGE, CLIENT_MAC_RESPONSE, FACTORY_KEY_0};
use crate::auth::{chained_challenge, check_mac, fixed_challenge, nonce_gendig_mac, ChallengeResponsePair, Roles};
use crate::session::{Bus, PowerState};
use crate::{Error, Status};
use consts::{OP_CHECKMAC, OP_MAC, OP_NONCE};

const ROLES: Roles = Roles { host: HOST, client: CLIENT };
const NUM_IN: [u8; 20] = [
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x30, 0x31, 0x32, 0x33,
];

fn all_asleep<P: crate::phy::Phy>(bus: &Bus<P>) -> bool {
    bus.devices().iter().all(|d| d.state == PowerState::Sleeping)
}

/// The client holding the host's key passes, and both devices end up asleep.
#[test]
fn check_mac_success() {
    let (mut bus, _) = sim_bus(&[HOST, CLIENT]);
    assert_eq!(check_mac(&mut bus, ROLES, 0, &NUM_IN), Ok(()));

    assert!(all_asleep(&bus));
    assert_eq!(device(&mut bus, HOST).power(), SimPower::Asleep);
    assert_eq!(device(&mut bus, CLIENT).power(), SimPower::Asleep);

    let host = device(&mut bus, HOST);
    assert_eq!(host.count_executed(OP_NONCE), 1);
    assert_eq!(host.count_executed(OP_CHECKMAC), 1);
    let client = device(&mut bus, CLIENT);
    assert_eq!(client.count_executed(OP_NONCE), 1);
    assert_eq!(client.count_executed(OP_MAC), 1);
}

/// One corrupted byte in the client's MAC makes the host refuse it.
#[test]
fn check_mac_corrupted_response() {
    let (mut bus, _) = sim_bus(&[HOST, CLIENT]);
    device(&mut bus, CLIENT).faults.corrupt_mac = true;

    assert_eq!(
        check_mac(&mut bus, ROLES, 0, &NUM_IN),
        Err(Error::DeviceStatus(Status::CheckMacMiscompare))
    );
    assert!(all_asleep(&bus));
    assert_eq!(device(&mut bus, HOST).power(), SimPower::Asleep);
    assert_eq!(device(&mut bus, CLIENT).power(), SimPower::Asleep);
}

/// A client with a different key fails the same way.
#[test]
fn check_mac_wrong_key() {
    let (mut bus, _) = sim_bus(&[HOST, CLIENT]);
    device(&mut bus, CLIENT).slots[4] = [0xEE; 32];

    assert_eq!(
        check_mac(&mut bus, ROLES, 4, &NUM_IN),
        Err(Error::DeviceStatus(Status::CheckMacMiscompare))
    );
    assert!(all_asleep(&bus));
}

/// A client that stops answering aborts the sequence before CheckMac.
#[test]
fn check_mac_dead_client() {
    let (mut bus, _) = sim_bus(&[HOST, CLIENT]);
    device(&mut bus, CLIENT).faults.dead = true;

    assert!(check_mac(&mut bus, ROLES, 0, &NUM_IN).is_err());
    assert!(all_asleep(&bus));
    assert_eq!(device(&mut bus, HOST).power(), SimPower::Asleep);
    assert_eq!(device(&mut bus, HOST).count_executed(OP_CHECKMAC), 0);
}

fn pairs() -> [ChallengeResponsePair; 2] {
    let mut response = [0u8; 32];
    response.copy_from_slice(&CLIENT_MAC_RESPONSE[1..33]);
    [
        ChallengeResponsePair {
            challenge: [0x01; 32],
            response: [0x02; 32],
            key_id: 0,
        },
        ChallengeResponsePair {
            challenge: *CLIENT_CHALLENGE,
            response,
            key_id: 0,
        },
    ]
}

/// The stored response for the picked challenge is accepted, a wrong one is not.
#[test]
fn fixed_challenge_pairs() {
    let (mut bus, _) = sim_bus(&[CLIENT]);
    let pairs = pairs();

    assert_eq!(fixed_challenge(&mut bus, CLIENT, &pairs, 1), Ok(true));
    assert!(all_asleep(&bus));
    assert_eq!(fixed_challenge(&mut bus, CLIENT, &pairs, 0), Ok(false));
    assert!(all_asleep(&bus));
    assert_eq!(fixed_challenge(&mut bus, CLIENT, &pairs, 2), Err(Error::BadParameter));
}

/// Every response becomes the next challenge.
#[test]
fn chained_challenge_rounds() {
    let (mut bus, _) = sim_bus(&[CLIENT]);

    assert_eq!(chained_challenge(&mut bus, CLIENT, 0, &FACTORY_KEY_0, CLIENT_CHALLENGE, 5), Ok(true));
    assert_eq!(device(&mut bus, CLIENT).count_executed(OP_MAC), 5);
    assert!(all_asleep(&bus));

    assert_eq!(chained_challenge(&mut bus, CLIENT, 0, &[0x00; 32], CLIENT_CHALLENGE, 5), Ok(false));
    assert_eq!(device(&mut bus, CLIENT).count_executed(OP_MAC), 6);
    assert!(all_asleep(&bus));
}

/// The client's MAC over a GenDig'ed TempKey matches the mirror.
#[test]
fn nonce_gendig_mac_sequence() {
    let (mut bus, _) = sim_bus(&[CLIENT]);
    let stored = device(&mut bus, CLIENT).slots[7];

    assert_eq!(nonce_gendig_mac(&mut bus, CLIENT, 7, &stored, &NUM_IN), Ok(true));
    assert!(all_asleep(&bus));
    assert_eq!(device(&mut bus, CLIENT).power(), SimPower::Asleep);

    assert_eq!(nonce_gendig_mac(&mut bus, CLIENT, 7, &[0x00; 32], &NUM_IN), Ok(false));
}
