#![no_std]

// Opcodes

/// CheckMac: verifies a MAC computed by another CryptoAuthentication device.
pub const OP_CHECKMAC: u8 = 0x28;
/// DeriveKey: derives a new key from TempKey and a parent key.
pub const OP_DERIVE_KEY: u8 = 0x1C;
/// DevRev: returns the device revision.
pub const OP_DEVREV: u8 = 0x30;
/// GenDig: folds a stored value into TempKey.
pub const OP_GENDIG: u8 = 0x15;
/// HMAC: computes an HMAC/SHA-256 over TempKey and a stored key.
pub const OP_HMAC: u8 = 0x11;
/// Lock: locks the configuration or data/OTP zone.
pub const OP_LOCK: u8 = 0x17;
/// MAC: computes a SHA-256 digest over a key and a challenge.
pub const OP_MAC: u8 = 0x08;
/// Nonce: seeds or directly sets TempKey.
pub const OP_NONCE: u8 = 0x16;
pub const OP_PAUSE: u8 = 0x01;
/// Random: returns 32 random bytes.
pub const OP_RANDOM: u8 = 0x1B;
pub const OP_READ: u8 = 0x02;
pub const OP_UPDATE_EXTRA: u8 = 0x20;
pub const OP_WRITE: u8 = 0x12;

// Packet layout

/// Offset of the count byte.
pub const IDX_COUNT: usize = 0;
pub const IDX_OPCODE: usize = 1;
pub const IDX_PARAM1: usize = 2;
/// Offset of the 16-bit little-endian second parameter.
pub const IDX_PARAM2: usize = 3;
/// Offset of the first data byte of a command.
pub const IDX_DATA: usize = 5;
/// Offset of the first data (or status) byte of a response.
pub const IDX_RSP_DATA: usize = 1;

/// Size of the CRC trailer.
pub const CRC_SIZE: usize = 2;
/// Smallest command: count, opcode, param1, param2 and CRC.
pub const CMD_SIZE_MIN: usize = 7;
/// Largest command (CheckMac).
pub const CMD_SIZE_MAX: usize = 84;
/// Smallest response: count, one status byte and CRC.
pub const RSP_SIZE_MIN: usize = 4;
/// Response carrying a 4-byte value (Read of a word, DevRev).
pub const RSP_SIZE_VAL: usize = 7;
/// Largest response: count, 32 bytes and CRC.
pub const RSP_SIZE_MAX: usize = 35;

/// Size of a key slot and of TempKey.
pub const KEY_SIZE: usize = 32;
/// Highest key slot.
pub const KEY_ID_MAX: u16 = 15;

// Command sizes

/// NumIn for the random Nonce modes.
pub const NONCE_NUMIN_SIZE: usize = 20;
/// NumIn for the pass-through Nonce mode.
pub const NONCE_NUMIN_SIZE_PASSTHROUGH: usize = 32;
pub const NONCE_RSP_SIZE_SHORT: usize = RSP_SIZE_MIN;
pub const NONCE_RSP_SIZE_LONG: usize = RSP_SIZE_MAX;

pub const MAC_CHALLENGE_SIZE: usize = 32;
pub const MAC_RSP_SIZE: usize = RSP_SIZE_MAX;

pub const CHECKMAC_CLIENT_CHALLENGE_SIZE: usize = 32;
pub const CHECKMAC_CLIENT_RESPONSE_SIZE: usize = 32;
/// Client opcode, mode and key id followed by zeros.
pub const CHECKMAC_OTHER_DATA_SIZE: usize = 13;
pub const CHECKMAC_COUNT: usize = 84;

pub const GENDIG_OTHER_DATA_SIZE: usize = 4;
pub const DERIVE_KEY_MAC_SIZE: usize = 32;
pub const WRITE_MAC_SIZE: usize = 32;

/// Word size of the Read and Write commands.
pub const ZONE_ACCESS_4: usize = 4;
/// Block size of the Read and Write commands.
pub const ZONE_ACCESS_32: usize = 32;
/// Set in the zone parameter to access 32 bytes instead of 4.
pub const ZONE_COUNT_FLAG: u8 = 0x80;

pub const ZONE_CONFIG: u8 = 0x00;
pub const ZONE_OTP: u8 = 0x01;
pub const ZONE_DATA: u8 = 0x02;

/// Sizes of the configuration, OTP and data zones in bytes.
pub const CONFIG_ZONE_SIZE: usize = 88;
pub const OTP_ZONE_SIZE: usize = 64;
pub const DATA_ZONE_SIZE: usize = 512;

/// Configuration zone offset of the LockValue byte.
pub const CONFIG_LOCK_VALUE: usize = 86;
/// Configuration zone offset of the LockConfig byte.
pub const CONFIG_LOCK_CONFIG: usize = 87;

// Parameter masks

pub const MAC_MODE_MASK: u8 = 0x77;
pub const CHECKMAC_MODE_MASK: u8 = 0x27;
pub const NONCE_MODE_MASK: u8 = 0x03;
pub const READ_ZONE_MASK: u8 = 0x83;
pub const WRITE_ZONE_MASK: u8 = 0xC3;
pub const LOCK_ZONE_MASK: u8 = 0x81;
pub const HMAC_MODE_MASK: u8 = 0x74;
pub const DERIVE_KEY_MODE_MASK: u8 = 0x04;
/// Write is encrypted with the slot's write key and authenticated by a MAC.
pub const WRITE_ZONE_WITH_MAC: u8 = 0x40;
/// Lock without checking the zone summary CRC.
pub const LOCK_ZONE_NO_CRC: u8 = 0x80;

// Status codes

pub const STATUS_SUCCESS: u8 = 0x00;
/// CheckMac compared a wrong response.
pub const STATUS_CHECKMAC_FAIL: u8 = 0x01;
pub const STATUS_PARSE_ERROR: u8 = 0x03;
pub const STATUS_EXEC_ERROR: u8 = 0x0F;
/// The device has just woken up.
pub const STATUS_WAKEUP: u8 = 0x11;
/// The device received a command with a bad CRC.
pub const STATUS_CRC_ERROR: u8 = 0xFF;

/// Response to a wake pulse, CRC included.
pub const WAKE_RESPONSE: [u8; RSP_SIZE_MIN] = [0x04, STATUS_WAKEUP, 0x33, 0x43];

// Execution times in microseconds, unscaled data-sheet values.

pub const CHECKMAC_EXEC_TYP_US: u32 = 12_000;
pub const CHECKMAC_EXEC_MAX_US: u32 = 38_000;
pub const DERIVE_KEY_EXEC_TYP_US: u32 = 14_000;
pub const DERIVE_KEY_EXEC_MAX_US: u32 = 62_000;
pub const DEVREV_EXEC_TYP_US: u32 = 400;
pub const DEVREV_EXEC_MAX_US: u32 = 2_000;
pub const GENDIG_EXEC_TYP_US: u32 = 11_000;
pub const GENDIG_EXEC_MAX_US: u32 = 43_000;
pub const HMAC_EXEC_TYP_US: u32 = 27_000;
pub const HMAC_EXEC_MAX_US: u32 = 69_000;
pub const LOCK_EXEC_TYP_US: u32 = 5_000;
pub const LOCK_EXEC_MAX_US: u32 = 24_000;
pub const MAC_EXEC_TYP_US: u32 = 12_000;
pub const MAC_EXEC_MAX_US: u32 = 35_000;
pub const NONCE_EXEC_TYP_US: u32 = 22_000;
pub const NONCE_EXEC_MAX_US: u32 = 60_000;
pub const PAUSE_EXEC_TYP_US: u32 = 400;
pub const PAUSE_EXEC_MAX_US: u32 = 2_000;
pub const RANDOM_EXEC_TYP_US: u32 = 11_000;
pub const RANDOM_EXEC_MAX_US: u32 = 50_000;
pub const READ_EXEC_TYP_US: u32 = 400;
pub const READ_EXEC_MAX_US: u32 = 4_000;
pub const UPDATE_EXTRA_EXEC_TYP_US: u32 = 4_000;
pub const UPDATE_EXTRA_EXEC_MAX_US: u32 = 6_000;
pub const WRITE_EXEC_TYP_US: u32 = 4_000;
pub const WRITE_EXEC_MAX_US: u32 = 42_000;

/// Longest execution time of any command (HMAC).
pub const COMMAND_EXEC_MAX_US: u32 = HMAC_EXEC_MAX_US;

/// Host clock tolerance applied to every delay, in percent.
/// Maximum delays are stretched by it, typical delays shrunk by it.
pub const CPU_CLOCK_DEVIATION_PERCENT: u32 = 1;

// Session

/// Retries after the first attempt of a command.
pub const RETRY_COUNT: u8 = 1;

/// Minimum low time of the wake pulse.
pub const WAKE_PULSE_US: u32 = 60;
/// Delay between the end of the wake pulse and the first transfer.
pub const WAKE_DELAY_US: u32 = 3_000;

/// The watchdog puts an awake device back to sleep after this time.
/// The data sheet gives 0.7 s to 1.7 s; this is the nominal value.
pub const WATCHDOG_TIMEOUT_US: u32 = 1_300_000;
pub const WATCHDOG_TIMEOUT_MIN_US: u32 = 700_000;

// Single-wire interface

/// SWI flags sent ahead of every transfer.
pub const SWI_FLAG_CMD: u8 = 0x77;
pub const SWI_FLAG_TX: u8 = 0x88;
pub const SWI_FLAG_IDLE: u8 = 0xBB;
pub const SWI_FLAG_SLEEP: u8 = 0xCC;

/// SWI bit rate. Every SWI bit is one 7-bit UART frame at this rate.
pub const SWI_BAUD: u32 = 230_400;
/// UART bit-times occupied by one SWI bit (start, seven data, stop).
pub const SWI_BIT_FRAME: u32 = 9;
/// UART character that encodes a SWI one.
pub const SWI_UART_ONE: u8 = 0x7F;
/// UART character that encodes a SWI zero.
pub const SWI_UART_ZERO: u8 = 0x7D;
/// Bits of a received character that are all set for a SWI one.
pub const SWI_UART_ONE_MASK: u8 = 0x7C;

/// Time allowed for the device to start a response after the transmit flag.
pub const SWI_RECEIVE_TIMEOUT_US: u32 = 153;
/// Time allowed between the start pulses of two received bits.
pub const SWI_BIT_TIMEOUT_US: u32 = 86;
/// Window after a start pulse in which the second pulse of a zero arrives.
/// Two UART bit-times, in nanoseconds.
pub const SWI_ZERO_PULSE_WINDOW_NS: u32 = 8_680;
/// Turn-around delay after a transmit flag before the bus is released to the device.
pub const SWI_TURNAROUND_US: u32 = 15;
/// Bus silence that resets the device's I/O state machine.
pub const SWI_SYNC_TIMEOUT_US: u32 = 85_000;

// I2C

/// Factory default I2C address (8-bit form, write direction).
pub const I2C_DEFAULT_ADDRESS: u8 = 0xC8;
pub const I2C_READ_FLAG: u8 = 0x01;

/// Word address: reset the I/O buffer.
pub const I2C_WORD_RESET: u8 = 0x00;
pub const I2C_WORD_SLEEP: u8 = 0x01;
pub const I2C_WORD_IDLE: u8 = 0x02;
/// Word address: a command follows.
pub const I2C_WORD_COMMAND: u8 = 0x03;
/// Sent during resync so SCL clocks nine times with SDA high.
pub const I2C_RESYNC_BYTE: u8 = 0xFF;

/// Devices sharing one bus.
pub const MAX_DEVICES: usize = 4;

// Serial number

/// Serial number bytes 0 and 1, fixed by the manufacturer.
pub const SN_01: [u8; 2] = [0x01, 0x23];
/// Serial number byte 8, fixed by the manufacturer.
pub const SN_8: u8 = 0xEE;
pub const SN_SIZE: usize = 9;
/// OTP bytes a digest can include.
pub const OTP_DIGEST_SIZE: usize = 11;
