// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::board::{CycleDelay, OpenDrainLine};
use consts::{RSP_SIZE_MAX, STATUS_SUCCESS, STATUS_WAKEUP};
use defmt::{info, warn};
use embassy_nrf::peripherals::{TIMER0, UARTE0};
use embassy_nrf::uarte::{UarteRxWithIdle, UarteTx};
use host_protocol::{AuthStatus, CommErrorKind, HostProtocolMessage, Request, Role, COBS_MAX_MSG_SIZE};
use postcard::accumulator::{CobsAccumulator, FeedResult};
use postcard::to_slice_cobs;
use sha204::auth::{self, Roles};
use sha204::command::{execute, Command, LockZone, MacMode, NonceMode, Zone};
use sha204::phy::DeviceId;
use sha204::session::{Bus, Park};
use sha204::swi::SwiPhy;
use sha204::{Error, Status};

pub type SwiBus = Bus<SwiPhy<OpenDrainLine<'static>, CycleDelay, 2>>;

/// SWI line of each device.
pub const HOST: DeviceId = DeviceId(0);
pub const CLIENT: DeviceId = DeviceId(1);

const ROLES: Roles = Roles { host: HOST, client: CLIENT };

fn device(role: Role) -> DeviceId {
    match role {
        Role::Host => HOST,
        Role::Client => CLIENT,
    }
}

fn array<'a, const N: usize>(bytes: &'a [u8]) -> Result<&'a [u8; N], Error> {
    bytes.try_into().map_err(|_| Error::BadParameter)
}

fn mac_mode(mode: u8) -> Result<MacMode, Error> {
    MacMode::from_bits(mode).ok_or(Error::BadParameter)
}

/// Builds a validated device command from its wire form.
fn command<'a>(command: &host_protocol::Command<'a>) -> Result<Command<'a>, Error> {
    use host_protocol::Command as Wire;

    match *command {
        Wire::CheckMac {
            mode,
            key_id,
            client_challenge,
            client_response,
            other_data,
        } => Command::check_mac(
            mac_mode(mode)?,
            key_id,
            array(client_challenge)?,
            array(client_response)?,
            array(other_data)?,
        ),
        Wire::DeriveKey {
            random_source,
            target_key,
            mac,
        } => Command::derive_key(random_source, target_key, mac.map(array).transpose()?),
        Wire::DevRev => Ok(Command::dev_rev()),
        Wire::GenDig { zone, key_id, other_data } => {
            Command::gen_dig(Zone::from_bits(zone)?, key_id, other_data.map(array).transpose()?)
        }
        Wire::Hmac { mode, key_id } => Command::hmac(mac_mode(mode)?, key_id),
        Wire::Lock { data_zone, summary } => {
            let zone = if data_zone { LockZone::Data } else { LockZone::Config };
            Command::lock(zone, summary)
        }
        Wire::Mac { mode, key_id, challenge } => Command::mac(mac_mode(mode)?, key_id, challenge.map(array).transpose()?),
        Wire::Nonce { mode, num_in } => Command::nonce(NonceMode::from_mode(mode)?, num_in),
        Wire::Random { seed_update } => Command::random(seed_update),
        Wire::Read { zone, block, address } => Command::read(Zone::from_bits(zone)?, block, address),
        Wire::Write { zone, address, value, mac } => {
            Command::write(Zone::from_bits(zone)?, address, value, mac.map(array).transpose()?)
        }
        Wire::Wake | Wire::Idle | Wire::Sleep => Err(Error::BadParameter),
    }
}

/// A device status, or the reason the device never answered.
fn failure(e: Error) -> Result<u8, CommErrorKind> {
    match e {
        Error::DeviceStatus(status) => Ok(status.into()),
        Error::Timeout => Err(CommErrorKind::Timeout),
        Error::RxFail => Err(CommErrorKind::RxFail),
        Error::ChecksumError => Err(CommErrorKind::Checksum),
        Error::SizeError => Err(CommErrorKind::Size),
        Error::ResyncFailed => Err(CommErrorKind::ResyncFailed),
        Error::BadParameter => Err(CommErrorKind::BadParameter),
    }
}

fn status_reply(status: u8) -> HostProtocolMessage<'static> {
    HostProtocolMessage::Sha204Response { status, data: &[] }
}

fn request<'r>(bus: &mut SwiBus, request: &Request<'_>, rx: &'r mut [u8]) -> HostProtocolMessage<'r> {
    use host_protocol::Command as Wire;

    let id = device(request.device);
    let result = match request.command {
        Wire::Wake => bus.wake(id, Park::Sleep).map(|_| status_reply(STATUS_WAKEUP)),
        Wire::Idle => bus.idle(id).map(|_| status_reply(STATUS_SUCCESS)),
        Wire::Sleep => bus.sleep(id).map(|_| status_reply(STATUS_SUCCESS)),
        ref wire => command(wire).and_then(move |command| execute(bus, id, &command, rx)).map(|response| {
            HostProtocolMessage::Sha204Response {
                status: STATUS_SUCCESS,
                data: response.payload(),
            }
        }),
    };

    match result {
        Ok(reply) => reply,
        Err(e) => {
            warn!("request to device {} failed: {}", id, e);
            match failure(e) {
                Ok(status) => status_reply(status),
                Err(kind) => HostProtocolMessage::CommError(kind),
            }
        }
    }
}

fn authenticate(bus: &mut SwiBus, key_id: u16, num_in: &[u8; host_protocol::AUTH_NUM_IN_SIZE]) -> AuthStatus {
    match auth::check_mac(bus, ROLES, key_id, num_in) {
        Ok(()) => AuthStatus::Accepted,
        Err(Error::DeviceStatus(Status::CheckMacMiscompare)) => AuthStatus::Refused,
        Err(e) => match failure(e) {
            Ok(status) => AuthStatus::DeviceStatus(status),
            Err(kind) => AuthStatus::CommError(kind),
        },
    }
}

/// Handles one message. Returns the reply, if the message calls for one.
fn handle<'r>(bus: &mut SwiBus, msg: HostProtocolMessage<'_>, rx: &'r mut [u8]) -> Option<HostProtocolMessage<'r>> {
    match msg {
        HostProtocolMessage::Sha204(req) => Some(request(bus, &req, rx)),
        HostProtocolMessage::Authenticate { key_id, num_in } => {
            info!("authenticate with key {}", key_id);
            Some(HostProtocolMessage::AuthResult(authenticate(bus, key_id, &num_in)))
        }
        HostProtocolMessage::GetFirmwareVersion => Some(HostProtocolMessage::AckFirmwareVersion {
            version: env!("CARGO_PKG_VERSION"),
        }),
        HostProtocolMessage::Reset => {
            let _ = bus.sleep_all();
            cortex_m::peripheral::SCB::sys_reset();
        }
        // Replies travel the other way only.
        HostProtocolMessage::Sha204Response { .. }
        | HostProtocolMessage::CommError(_)
        | HostProtocolMessage::AuthResult(_)
        | HostProtocolMessage::AckFirmwareVersion { .. }
        | HostProtocolMessage::PostcardError => None,
    }
}

async fn send_cobs(tx: &mut UarteTx<'_, UARTE0>, msg: &HostProtocolMessage<'_>) {
    let mut send_buf = [0u8; COBS_MAX_MSG_SIZE];

    match to_slice_cobs(msg, &mut send_buf) {
        Ok(cobs_tx) => {
            if let Err(e) = tx.write(cobs_tx).await {
                warn!("UART write failed: {}", e);
            }
        }
        Err(_) => warn!("reply does not fit a frame"),
    }
}

/// Decodes COBS-framed requests from the UART and answers each one.
pub async fn run(mut tx: UarteTx<'static, UARTE0>, mut rx: UarteRxWithIdle<'static, UARTE0, TIMER0>, mut bus: SwiBus) -> ! {
    let mut raw_buf = [0u8; 64];
    let mut cobs_buf: CobsAccumulator<COBS_MAX_MSG_SIZE> = CobsAccumulator::new();

    loop {
        let n = match rx.read_until_idle(&mut raw_buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("UART read failed: {}", e);
                continue;
            }
        };

        let mut window: &[u8] = &raw_buf[..n];
        'cobs: while !window.is_empty() {
            window = match cobs_buf.feed_ref::<HostProtocolMessage>(window) {
                FeedResult::Consumed => break 'cobs,
                FeedResult::OverFull(new_wind) => {
                    info!("overfull");
                    send_cobs(&mut tx, &HostProtocolMessage::PostcardError).await;
                    new_wind
                }
                FeedResult::DeserError(new_wind) => {
                    info!("DeserError");
                    send_cobs(&mut tx, &HostProtocolMessage::PostcardError).await;
                    new_wind
                }
                FeedResult::Success { data, remaining } => {
                    let mut rsp = [0u8; RSP_SIZE_MAX];
                    if let Some(reply) = handle(&mut bus, data, &mut rsp) {
                        send_cobs(&mut tx, &reply).await;
                    }
                    remaining
                }
            };
        }
    }
}
