// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reply codes and the payload serialisers the dispatcher uses to build
//! them. Each `build_*` function appends its reply code followed by the
//! body to an already-cleared [`crate::phy::PacketBuf`].

use crate::config::{CapabilityTable, Identity};
use crate::endian::{push_u16_le, push_u24_be, push_u24_le, push_u32_le};
use crate::error::NakReason;
use crate::phy::PacketBuf;

/// Wire reply codes (first byte of the reply payload).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ReplyCode {
    Ack = 0x40,
    Nak = 0x41,
    PdId = 0x45,
    PdCap = 0x46,
    LStatR = 0x48,
    IStatR = 0x49,
    OStatR = 0x4A,
    RStatR = 0x4B,
    Com = 0x54,
    Ccrypt = 0x76,
    RmacI = 0x78,
}

pub fn build_ack(out: &mut PacketBuf) {
    out.push(ReplyCode::Ack as u8).ok();
}

pub fn build_nak(out: &mut PacketBuf, reason: NakReason) {
    out.push(ReplyCode::Nak as u8).ok();
    out.push(reason.code()).ok();
}

/// Vendor code and serial number are little-endian on the wire; firmware
/// version is big-endian. Mixing the two within one reply is the main
/// historical source of confusion this field-level naming is meant to head
/// off (see `endian.rs`).
pub fn build_pdid(out: &mut PacketBuf, id: &Identity) {
    out.push(ReplyCode::PdId as u8).ok();
    push_u24_le(out, id.vendor_code);
    out.push(id.model).ok();
    out.push(id.version).ok();
    push_u32_le(out, id.serial_number);
    push_u24_be(out, id.firmware_version);
}

pub fn build_pdcap(out: &mut PacketBuf, capabilities: &CapabilityTable) {
    out.push(ReplyCode::PdCap as u8).ok();
    for (function_code, compliance_level, num_items) in capabilities.iter() {
        out.push(function_code).ok();
        out.push(compliance_level).ok();
        out.push(num_items).ok();
    }
}

pub fn build_lstatr(out: &mut PacketBuf, tamper: bool, power: bool) {
    out.push(ReplyCode::LStatR as u8).ok();
    out.push(tamper as u8).ok();
    out.push(power as u8).ok();
}

/// `ISTATR`/`OSTATR` per-point status bytes are not carried anywhere in this
/// engine's data model (monitoring live input/output state is application
/// layer, a Non-goal); one zero byte is reported per configured item so the
/// reply is wire-valid. See `DESIGN.md`.
pub fn build_istatr(out: &mut PacketBuf, num_items: u8) {
    out.push(ReplyCode::IStatR as u8).ok();
    for _ in 0..num_items.max(1) {
        out.push(0).ok();
    }
}

pub fn build_ostatr(out: &mut PacketBuf, num_items: u8) {
    out.push(ReplyCode::OStatR as u8).ok();
    for _ in 0..num_items.max(1) {
        out.push(0).ok();
    }
}

pub fn build_rstatr(out: &mut PacketBuf, tamper: bool) {
    out.push(ReplyCode::RStatR as u8).ok();
    out.push(tamper as u8).ok();
}

pub fn build_com(out: &mut PacketBuf, address: u8, baud: u32) {
    out.push(ReplyCode::Com as u8).ok();
    out.push(address).ok();
    push_u32_le(out, baud);
}

pub fn build_ccrypt(
    out: &mut PacketBuf,
    pd_client_uid: &[u8; 8],
    pd_random: &[u8; 8],
    pd_cryptogram: &[u8; 16],
) {
    out.push(ReplyCode::Ccrypt as u8).ok();
    out.extend_from_slice(pd_client_uid).ok();
    out.extend_from_slice(pd_random).ok();
    out.extend_from_slice(pd_cryptogram).ok();
}

pub fn build_rmac_i(out: &mut PacketBuf, r_mac: &[u8; 16]) {
    out.push(ReplyCode::RmacI as u8).ok();
    out.extend_from_slice(r_mac).ok();
}
