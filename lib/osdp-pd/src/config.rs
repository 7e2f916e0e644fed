// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Init-time configuration: PD address/baud, identity, capability table and
//! the installed secure channel base key.

/// Supported baud rates for the serial transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BaudRate {
    B9600,
    B38400,
    B115200,
}

impl BaudRate {
    pub const fn bps(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B38400 => 38400,
            BaudRate::B115200 => 115200,
        }
    }
}

/// Static identity the PD reports in response to `CMD_ID`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub struct Identity {
    /// IEEE-assigned OUI vendor code (24 bits significant).
    pub vendor_code: u32,
    pub model: u8,
    pub version: u8,
    pub serial_number: u32,
    /// 24-bit (major, minor, build) firmware version, MSB-first on the wire.
    pub firmware_version: u32,
}

/// Capability function codes, dense-indexed in the PD's capability table.
///
/// The enum is closed: any function code the CP might ask about that isn't
/// named here simply has no slot and is skipped when building `PDCAP`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum CapabilityFunction {
    ContactStatusMonitoring = 1,
    OutputControl = 2,
    CardDataFormat = 3,
    ReaderLedControl = 4,
    ReaderAudibleOutput = 5,
    ReaderTextOutput = 6,
    TimeKeeping = 7,
    CheckCharacterSupport = 8,
    CommunicationSecurity = 9,
    ReceiveBufferSize = 10,
    LargestCombinedMessageSize = 11,
    SmartCardSupport = 12,
    Readers = 13,
    Biometrics = 14,
}

/// Number of slots in the dense capability table, including the unused
/// index 0.
pub const CAP_TABLE_LEN: usize = 15;

// `CapabilityTable::set`/`get` index `slots` by a bare `as usize` cast on
// the enum discriminant with no further bounds check; this is the thing
// that actually keeps that indexing in bounds if a future protocol
// revision adds another capability function.
static_assertions::const_assert!(CAP_TABLE_LEN > CapabilityFunction::Biometrics as usize);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capability {
    pub function: CapabilityFunction,
    pub compliance_level: u8,
    pub num_items: u8,
}

/// Dense, enum-indexed capability table. An absent capability reads as all
/// zeros and is skipped when `PDCAP` is built.
#[derive(Clone, Copy)]
pub struct CapabilityTable {
    slots: [Option<(u8, u8)>; CAP_TABLE_LEN],
}

impl CapabilityTable {
    pub const fn empty() -> Self {
        Self {
            slots: [None; CAP_TABLE_LEN],
        }
    }

    pub fn from_slice(caps: &[Capability]) -> Self {
        let mut table = Self::empty();
        for cap in caps {
            table.set(cap.function, cap.compliance_level, cap.num_items);
        }
        table
    }

    pub fn set(
        &mut self,
        function: CapabilityFunction,
        compliance_level: u8,
        num_items: u8,
    ) {
        self.slots[function as usize] = Some((compliance_level, num_items));
    }

    pub fn get(&self, function: CapabilityFunction) -> Option<(u8, u8)> {
        self.slots[function as usize]
    }

    /// Whether communication security (AES-128 secure channel) is advertised
    /// with a non-zero compliance level.
    pub fn secure_channel_supported(&self) -> bool {
        matches!(
            self.get(CapabilityFunction::CommunicationSecurity),
            Some((level, _)) if level != 0
        )
    }

    /// Iterate over the populated slots in function-code order, as
    /// `(function_code, compliance_level, num_items)`.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8, u8)> + '_ {
        self.slots.iter().enumerate().filter_map(|(fc, slot)| {
            slot.map(|(level, items)| (fc as u8, level, items))
        })
    }
}

/// The installed secure channel base key, or an instruction to run in
/// install mode with the well-known default key.
#[derive(Clone, Copy)]
pub enum ScbkConfig {
    Installed([u8; 16]),
    InstallMode,
}

/// One-time setup configuration for a [`crate::Pd`].
pub struct Config {
    pub address: u8,
    pub baud_rate: BaudRate,
    pub id: Identity,
    pub capabilities: CapabilityTable,
    pub scbk: ScbkConfig,
    /// This PD's fixed 8-byte client identifier, reported in the `CCRYPT`
    /// reply during the secure channel handshake. Not specified by the
    /// surviving reference source (see `DESIGN.md`); defaults to all-zero
    /// if the deploying application has no meaningful value to supply.
    pub client_uid: [u8; 8],
}

/// Broadcast address: accepted on receive, never owned by a PD.
pub const BROADCAST_ADDRESS: u8 = 0x7F;

/// The well-known default Secure Channel Base Key used while `SC_USE_SCBKD`
/// is set (install mode).
pub const SCBK_DEFAULT: [u8; 16] = [
    0x30, 0x30, 0x30, 0x30, 0x30, 0x30, 0x30, 0x30, 0x30, 0x30, 0x30, 0x30,
    0x30, 0x30, 0x30, 0x30,
];
