// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Power state of every device sharing one physical bus.
//!
//! A wake pulse reaches all devices on the bus, so every wake is followed by
//! parking the other devices again before the target is used.

use crate::command::Opcode;
use crate::frame;
use crate::phy::{DeviceId, Phy};
use crate::timing::{stretch, TimingProvider};
use crate::{Error, Status};
use consts::{COMMAND_EXEC_MAX_US, MAX_DEVICES, RSP_SIZE_MIN, WAKE_RESPONSE};
use heapless::Vec;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    Sleeping,
    /// Saw a wake pulse; its wake response has not been read yet.
    Waking,
    /// Low power with TempKey retained.
    Idle,
    Awake,
    /// Executing a command whose response has not been read yet.
    Busy,
}

/// Where the other devices go after a wake.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Park {
    Sleep,
    Idle,
}

/// Which resync step brought the device back.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resync {
    /// The bus recovery pattern was enough.
    BusReset,
    /// The device was asleep and had to be woken; its TempKey is gone.
    Woken,
    /// The device was still executing a command.
    AfterBusy,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub state: PowerState,
    /// Command awaiting its response, which bounds how long the device may stay busy.
    pub last_opcode: Option<Opcode>,
}

pub struct Bus<P> {
    phy: P,
    devices: Vec<Device, MAX_DEVICES>,
}

impl<P: Phy> Bus<P> {
    pub fn new(phy: P) -> Self {
        Self { phy, devices: Vec::new() }
    }

    /// Registers a device. Devices start out Sleeping.
    pub fn attach(&mut self, id: DeviceId) -> Result<(), Error> {
        if self.devices.iter().any(|d| d.id == id) {
            return Err(Error::BadParameter);
        }
        self.devices
            .push(Device {
                id,
                state: PowerState::Sleeping,
                last_opcode: None,
            })
            .map_err(|_| Error::BadParameter)
    }

    pub fn state(&self, id: DeviceId) -> Option<PowerState> {
        self.devices.iter().find(|d| d.id == id).map(|d| d.state)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn phy(&mut self) -> &mut P {
        &mut self.phy
    }

    pub fn release(self) -> P {
        self.phy
    }

    fn device_mut(&mut self, id: DeviceId) -> Result<&mut Device, Error> {
        self.devices.iter_mut().find(|d| d.id == id).ok_or(Error::BadParameter)
    }

    fn set_state(&mut self, id: DeviceId, state: PowerState) {
        if let Ok(device) = self.device_mut(id) {
            trace!("device {} {:?} -> {:?}", id.0, device.state, state);
            device.state = state;
        }
    }

    pub(crate) fn select(&mut self, id: DeviceId) -> Result<(), Error> {
        self.device_mut(id)?;
        self.phy.select(id)
    }

    /// Wakes `id` and parks every other awake device as `park` says.
    pub fn wake(&mut self, id: DeviceId, park: Park) -> Result<(), Error> {
        self.wake_with(id, |_| park)
    }

    /// Wakes `id` unless it is already awake, then returns every other
    /// device to the state it had before the pulse. A device left Busy is
    /// resynchronized instead.
    pub fn ensure_awake(&mut self, id: DeviceId) -> Result<(), Error> {
        match self.device_mut(id)?.state {
            PowerState::Awake => Ok(()),
            // A response was never collected.
            PowerState::Busy => self.resync(id).map(|_| ()),
            _ => self.wake_with(id, restore),
        }
    }

    fn wake_with(&mut self, id: DeviceId, park_for: impl Fn(PowerState) -> Park) -> Result<(), Error> {
        self.device_mut(id)?;
        debug!("wake device {}", id.0);

        let prior: Vec<(DeviceId, PowerState), MAX_DEVICES> = self.devices.iter().map(|d| (d.id, d.state)).collect();

        self.phy.select(id)?;
        self.phy.wake()?;
        for device in self.devices.iter_mut() {
            if matches!(device.state, PowerState::Sleeping | PowerState::Idle) {
                device.state = PowerState::Waking;
            }
        }

        let woke = self.read_wake_response();
        match woke {
            Ok(()) => self.set_state(id, PowerState::Awake),
            Err(e) => warn!("device {} did not wake: {}", id.0, e),
        }

        for &(other, state) in prior.iter().filter(|(other, _)| *other != id) {
            if !matches!(self.state(other), Some(PowerState::Waking | PowerState::Awake)) {
                continue;
            }
            self.park(other, park_for(state))?;
        }
        self.phy.select(id)?;
        woke
    }

    fn read_wake_response(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; RSP_SIZE_MIN];
        let n = self.phy.receive_response(&mut buf)?;
        let frame = frame::decode(&buf[..n])?;
        match frame.status() {
            Some(Status::WakeReceived) if frame.as_bytes() == WAKE_RESPONSE => Ok(()),
            Some(status) => Err(Error::DeviceStatus(status)),
            None => Err(Error::SizeError),
        }
    }

    fn park(&mut self, id: DeviceId, park: Park) -> Result<(), Error> {
        match park {
            Park::Sleep => self.sleep(id),
            Park::Idle => self.idle(id),
        }
    }

    /// Puts `id` into Idle, keeping its TempKey.
    pub fn idle(&mut self, id: DeviceId) -> Result<(), Error> {
        self.select(id)?;
        self.phy.idle()?;
        self.set_state(id, PowerState::Idle);
        Ok(())
    }

    /// Puts `id` to sleep. A device that no longer acknowledges has already
    /// been put to sleep by its watchdog.
    pub fn sleep(&mut self, id: DeviceId) -> Result<(), Error> {
        match self.state(id) {
            Some(PowerState::Sleeping) => return Ok(()),
            // An idle device only listens for a wake.
            Some(PowerState::Idle) => self.wake_with(id, restore)?,
            _ => {}
        }
        self.select(id)?;
        match self.phy.sleep() {
            Ok(()) => {}
            Err(Error::Timeout) => debug!("device {} already asleep", id.0),
            Err(e) => return Err(e),
        }
        self.set_state(id, PowerState::Sleeping);
        Ok(())
    }

    /// Puts every device to sleep, continuing past failures.
    /// Returns the first failure.
    pub fn sleep_all(&mut self) -> Result<(), Error> {
        let ids: Vec<DeviceId, MAX_DEVICES> = self.devices.iter().map(|d| d.id).collect();
        let mut result = Ok(());
        for id in ids {
            if let Err(e) = self.sleep(id) {
                warn!("sleep of device {} failed: {}", id.0, e);
                self.set_state(id, PowerState::Sleeping);
                result = result.and(Err(e));
            }
        }
        result
    }

    /// Re-establishes communication with `id` in three escalating steps.
    pub fn resync(&mut self, id: DeviceId) -> Result<Resync, Error> {
        self.select(id)?;
        warn!("resync device {}", id.0);

        // 1: recovery pattern, then look for an acknowledge
        if self.phy.recover_bus().is_ok() && self.answers() {
            self.end_command(id);
            return Ok(Resync::BusReset);
        }

        // 2: assume it fell asleep
        if self.wake_with(id, restore).is_ok() {
            self.end_command(id);
            warn!("device {} was asleep, TempKey lost", id.0);
            return Ok(Resync::Woken);
        }

        // 3: assume it is still executing
        let wait = self
            .device_mut(id)?
            .last_opcode
            .map_or(stretch(COMMAND_EXEC_MAX_US), Opcode::delay_us);
        self.phy.timer().delay_us(wait);
        if self.phy.select(id).is_ok() && self.answers() {
            self.end_command(id);
            return Ok(Resync::AfterBusy);
        }

        error!("resync of device {} failed", id.0);
        let _ = self.phy.sleep();
        self.settle(id, PowerState::Sleeping);
        Err(Error::ResyncFailed)
    }

    fn answers(&mut self) -> bool {
        matches!(self.phy.probe(), Ok(true)) && self.phy.reset_io().is_ok()
    }

    pub(crate) fn begin_command(&mut self, id: DeviceId, opcode: Opcode) {
        if let Ok(device) = self.device_mut(id) {
            device.last_opcode = Some(opcode);
        }
        self.set_state(id, PowerState::Busy);
    }

    pub(crate) fn end_command(&mut self, id: DeviceId) {
        self.settle(id, PowerState::Awake);
    }

    /// Leaves `id` in `state` with no command outstanding.
    fn settle(&mut self, id: DeviceId, state: PowerState) {
        if let Ok(device) = self.device_mut(id) {
            device.last_opcode = None;
        }
        self.set_state(id, state);
    }
}

/// Idle devices keep their session; everything else goes back to sleep.
fn restore(prior: PowerState) -> Park {
    match prior {
        PowerState::Idle | PowerState::Awake => Park::Idle,
        _ => Park::Sleep,
    }
}
