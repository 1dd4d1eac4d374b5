// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::sim::{device, sim_bus, SimPower, CLIENT, HOST};
use crate::command::{execute, Command, NonceMode, Opcode};
use crate::frame;
use crate::i2c::TwiBus;
use crate::phy::{DeviceId, Phy};
use crate::session::{Park, PowerState, Resync};
use crate::timing::TimingProvider;
use crate::Error;
use consts::{I2C_WORD_COMMAND, OP_DEVREV, OP_NONCE, RSP_SIZE_MAX, RSP_SIZE_VAL};

/// Devices can be attached once each, up to the bus capacity.
#[test]
fn attach() {
    let (mut bus, _) = sim_bus(&[HOST]);
    assert_eq!(bus.attach(HOST), Err(Error::BadParameter));
    assert_eq!(bus.state(HOST), Some(PowerState::Sleeping));
    assert_eq!(bus.state(CLIENT), None);

    for address in [0xCA, 0xCC, 0xCE] {
        bus.attach(DeviceId(address)).unwrap();
    }
    assert_eq!(bus.attach(DeviceId(0xD0)), Err(Error::BadParameter));
    assert_eq!(bus.devices().len(), 4);
}

/// A wake reaches every device; the others are parked right away.
#[test]
fn wake_parks_other_devices() {
    let (mut bus, _) = sim_bus(&[HOST, CLIENT]);

    bus.wake(HOST, Park::Sleep).unwrap();
    assert_eq!(bus.state(HOST), Some(PowerState::Awake));
    assert_eq!(bus.state(CLIENT), Some(PowerState::Sleeping));
    assert_eq!(device(&mut bus, HOST).power(), SimPower::Awake);
    assert_eq!(device(&mut bus, CLIENT).power(), SimPower::Asleep);

    bus.wake(CLIENT, Park::Idle).unwrap();
    assert_eq!(bus.state(CLIENT), Some(PowerState::Awake));
    assert_eq!(bus.state(HOST), Some(PowerState::Idle));
    assert_eq!(device(&mut bus, HOST).power(), SimPower::Idle);
}

/// Idle keeps TempKey, sleep loses it.
#[test]
fn idle_keeps_temp_key() {
    let (mut bus, _) = sim_bus(&[HOST]);
    let mut rx = [0u8; RSP_SIZE_MAX];
    let nonce = Command::nonce(NonceMode::NoSeedUpdate, &[0x01; 20]).unwrap();
    execute(&mut bus, HOST, &nonce, &mut rx).unwrap();
    assert!(device(&mut bus, HOST).temp_key.is_valid());

    bus.idle(HOST).unwrap();
    assert_eq!(bus.state(HOST), Some(PowerState::Idle));
    bus.ensure_awake(HOST).unwrap();
    assert!(device(&mut bus, HOST).temp_key.is_valid());

    bus.sleep(HOST).unwrap();
    assert_eq!(bus.state(HOST), Some(PowerState::Sleeping));
    assert!(!device(&mut bus, HOST).temp_key.is_valid());
}

/// Waking one device puts every other device back where it was.
#[test]
fn ensure_awake_restores_others() {
    let (mut bus, _) = sim_bus(&[HOST, CLIENT]);
    bus.wake(HOST, Park::Sleep).unwrap();
    bus.idle(HOST).unwrap();

    bus.ensure_awake(CLIENT).unwrap();
    assert_eq!(bus.state(CLIENT), Some(PowerState::Awake));
    assert_eq!(bus.state(HOST), Some(PowerState::Idle));
    assert_eq!(device(&mut bus, HOST).power(), SimPower::Idle);

    bus.sleep(CLIENT).unwrap();
    bus.ensure_awake(HOST).unwrap();
    assert_eq!(bus.state(CLIENT), Some(PowerState::Sleeping));
    assert_eq!(device(&mut bus, CLIENT).power(), SimPower::Asleep);
}

/// A device the watchdog put to sleep no longer answers the sleep flag.
#[test]
fn sleep_after_watchdog() {
    let (mut bus, clock) = sim_bus(&[HOST]);
    bus.wake(HOST, Park::Sleep).unwrap();
    clock.advance_ms(2_000);
    assert_eq!(bus.sleep(HOST), Ok(()));
    assert_eq!(bus.state(HOST), Some(PowerState::Sleeping));
}

/// A sleeping device is recovered by the wake step.
#[test]
fn resync_sleeping_device() {
    let (mut bus, clock) = sim_bus(&[HOST]);
    bus.wake(HOST, Park::Sleep).unwrap();
    clock.advance_ms(2_000);

    assert_eq!(bus.resync(HOST), Ok(Resync::Woken));
    assert_eq!(bus.state(HOST), Some(PowerState::Awake));
    assert_eq!(device(&mut bus, HOST).power(), SimPower::Awake);
}

/// A device still executing is recovered after the longest execution time.
#[test]
fn resync_busy_device() {
    let (mut bus, clock) = sim_bus(&[HOST]);
    bus.wake(HOST, Park::Sleep).unwrap();

    let mut tx = [0u8; 40];
    let n = Command::nonce(NonceMode::NoSeedUpdate, &[0x02; 20]).unwrap().encode(&mut tx).unwrap();
    bus.phy().send_command(&tx[..n]).unwrap();
    assert!(device(&mut bus, HOST).is_busy(clock.now()));

    let start = clock.now();
    assert_eq!(bus.resync(HOST), Ok(Resync::AfterBusy));
    assert!(clock.now() - start >= 69_000_000);
    assert_eq!(bus.state(HOST), Some(PowerState::Awake));
    assert_eq!(device(&mut bus, HOST).count_executed(OP_NONCE), 1);
}

/// The wait for a busy device is bounded by the command it is executing.
#[test]
fn resync_waits_for_outstanding_command() {
    let (mut bus, clock) = sim_bus(&[HOST]);
    bus.wake(HOST, Park::Sleep).unwrap();

    let mut tx = [0u8; 40];
    let n = Command::nonce(NonceMode::NoSeedUpdate, &[0x03; 20]).unwrap().encode(&mut tx).unwrap();
    bus.phy().send_command(&tx[..n]).unwrap();
    bus.begin_command(HOST, Opcode::Nonce);
    assert_eq!(bus.devices()[0].last_opcode, Some(Opcode::Nonce));

    let start = clock.now();
    assert_eq!(bus.resync(HOST), Ok(Resync::AfterBusy));
    let elapsed = clock.now() - start;
    assert!(elapsed >= u64::from(Opcode::Nonce.delay_us()) * 1_000);
    assert!(elapsed < u64::from(Opcode::Hmac.delay_us()) * 1_000);
    assert_eq!(bus.devices()[0].last_opcode, None);
    assert_eq!(bus.state(HOST), Some(PowerState::Awake));
}

/// A write abandoned half way is cleared by the bus recovery pattern.
#[test]
fn resync_unterminated_write() {
    let (mut bus, _) = sim_bus(&[HOST]);
    bus.wake(HOST, Park::Sleep).unwrap();

    let twi = bus.phy().bus();
    twi.start().unwrap();
    assert!(twi.write_byte(HOST.0).unwrap());
    twi.write_byte(I2C_WORD_COMMAND).unwrap();
    twi.write_byte(0x07).unwrap();
    twi.write_byte(OP_DEVREV).unwrap();

    assert_eq!(bus.resync(HOST), Ok(Resync::BusReset));

    let mut rx = [0u8; RSP_SIZE_VAL];
    let response = execute(&mut bus, HOST, &Command::dev_rev(), &mut rx).unwrap();
    assert_eq!(response.payload(), &[0x00, 0x00, 0x00, 0x04]);
    assert_eq!(device(&mut bus, HOST).count_executed(OP_DEVREV), 1);
}

/// A command frame cut short is dropped from the device's input buffer.
#[test]
fn resync_partial_frame() {
    let (mut bus, _) = sim_bus(&[HOST]);
    bus.wake(HOST, Park::Sleep).unwrap();

    let mut tx = [0u8; 8];
    let n = Command::dev_rev().encode(&mut tx).unwrap();
    bus.phy().send_command(&tx[..3]).unwrap();

    assert_eq!(bus.resync(HOST), Ok(Resync::BusReset));

    bus.phy().send_command(&tx[..n]).unwrap();
    bus.phy().timer().delay_us(2_000);
    let mut rx = [0u8; RSP_SIZE_VAL];
    let count = bus.phy().receive_response(&mut rx).unwrap();
    let response = frame::decode(&rx[..count]).unwrap();
    assert_eq!(response.body(), &[0x00, 0x00, 0x00, 0x04]);
}

/// A device that never answers exhausts all three steps and ends up Sleeping.
#[test]
fn resync_dead_device() {
    let (mut bus, clock) = sim_bus(&[HOST]);
    bus.wake(HOST, Park::Sleep).unwrap();
    device(&mut bus, HOST).faults.dead = true;
    clock.advance_ms(2_000);

    assert_eq!(bus.resync(HOST), Err(Error::ResyncFailed));
    assert_eq!(bus.state(HOST), Some(PowerState::Sleeping));
}

/// A device that never finishes its command cannot be recovered either.
#[test]
fn resync_stuck_device() {
    let (mut bus, _) = sim_bus(&[HOST]);
    bus.wake(HOST, Park::Sleep).unwrap();
    device(&mut bus, HOST).faults.stuck_busy = true;

    let mut tx = [0u8; 8];
    let n = Command::dev_rev().encode(&mut tx).unwrap();
    bus.phy().send_command(&tx[..n]).unwrap();

    assert_eq!(bus.resync(HOST), Err(Error::ResyncFailed));
    assert_eq!(bus.state(HOST), Some(PowerState::Sleeping));
}

/// Every device ends up asleep.
#[test]
fn sleep_all() {
    let (mut bus, _) = sim_bus(&[HOST, CLIENT]);
    bus.wake(HOST, Park::Idle).unwrap();
    bus.sleep_all().unwrap();
    assert!(bus.devices().iter().all(|d| d.state == PowerState::Sleeping));
    assert_eq!(device(&mut bus, HOST).power(), SimPower::Asleep);
    assert_eq!(device(&mut bus, CLIENT).power(), SimPower::Asleep);
}
