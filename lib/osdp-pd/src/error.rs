// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-visible NAK reason codes and the outcomes of decode-time recovery.

/// Reason byte carried in a `NAK` reply.
///
/// Values are assigned densely starting at `RECORD`; gaps are left between
/// the documented codes and the reserved ones so that a future protocol
/// revision can slot additional reasons in without renumbering.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum NakReason {
    /// Bad command payload length or unknown command code.
    Record = 0x01,
    /// Command length did not match what the command code requires.
    CmdLen = 0x02,
    /// PD is not able to process this command right now.
    CmdUnable = 0x03,
    /// Unexpected sequence number.
    SeqNum = 0x04,
    /// Secure channel is required for this command but is not active.
    ScCond = 0x06,
    /// No secure channel capability, or a malformed secure message block.
    ScUnsup = 0x07,
}

impl NakReason {
    pub const fn code(self) -> u8 {
        self as u8
    }
}
