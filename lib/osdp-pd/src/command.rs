// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command codes and the decoded application-command records handed to the
//! host through the [`crate::queue::CommandQueue`].

/// Wire command codes (`buf[0]` of the decoded payload).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum CommandCode {
    Poll = 0x60,
    Id = 0x61,
    Cap = 0x62,
    LStat = 0x64,
    IStat = 0x65,
    OStat = 0x66,
    RStat = 0x67,
    Out = 0x68,
    Led = 0x69,
    Buz = 0x6A,
    Text = 0x6B,
    ComSet = 0x6E,
    KeySet = 0x75,
    Chlng = 0x76,
    Scrypt = 0x77,
}

impl CommandCode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x60 => Self::Poll,
            0x61 => Self::Id,
            0x62 => Self::Cap,
            0x64 => Self::LStat,
            0x65 => Self::IStat,
            0x66 => Self::OStat,
            0x67 => Self::RStat,
            0x68 => Self::Out,
            0x69 => Self::Led,
            0x6A => Self::Buz,
            0x6B => Self::Text,
            0x6E => Self::ComSet,
            0x75 => Self::KeySet,
            0x76 => Self::Chlng,
            0x77 => Self::Scrypt,
            _ => return None,
        })
    }
}

/// One LED control record (`CMD_LED` carries a temporary and a permanent
/// setting for a single LED).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub struct LedSetting {
    pub control_code: u8,
    pub on_count: u8,
    pub off_count: u8,
    pub on_color: u8,
    pub off_color: u8,
    pub timer: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OutputCommand {
    pub output_no: u8,
    pub control_code: u8,
    pub timer_count: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LedCommand {
    pub reader: u8,
    pub led_number: u8,
    pub temporary: LedSetting,
    pub permanent: LedSetting,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BuzzerCommand {
    pub reader: u8,
    pub tone_code: u8,
    pub on_count: u8,
    pub off_count: u8,
    pub rep_count: u8,
}

pub const TEXT_MAX_LEN: usize = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TextCommand {
    pub reader: u8,
    pub cmd: u8,
    pub temp_time: u8,
    pub offset_row: u8,
    pub offset_col: u8,
    pub length: u8,
    pub data: [u8; TEXT_MAX_LEN],
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ComSetCommand {
    pub address: u8,
    pub baud: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeySetCommand {
    pub key_type: u8,
    pub len: u8,
    pub data: [u8; 16],
}

/// A fully-decoded application command, queued for the host to drain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AppCommand {
    Output(OutputCommand),
    Led(LedCommand),
    Buzzer(BuzzerCommand),
    Text(TextCommand),
    ComSet(ComSetCommand),
    KeySet(KeySetCommand),
}
