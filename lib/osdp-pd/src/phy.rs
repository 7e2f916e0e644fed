// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame codec: turns a stream of bytes from the [`crate::channel::Channel`]
//! into a decoded command payload, and a reply payload back into bytes.
//!
//! One packet is handled at a time; there is no fragmentation support beyond
//! a single maximum-size packet (non-goal). Anything left in the receive
//! buffer once a complete packet has been consumed is discarded, matching
//! the half-duplex assumption that the CP never pipelines a second poll
//! before the PD has answered the first.

use heapless::Vec;

use crate::crc::{checksum8, checksum8_valid, crc16};
use crate::securechannel::SecureChannel;

/// Start-of-message marker.
pub const SOM: u8 = 0x53;

/// Largest frame this engine will decode or build.
pub const MAX_PACKET_SIZE: usize = 256;

pub type PacketBuf = Vec<u8, MAX_PACKET_SIZE>;

/// Secure message block type codes. Odd values are CP-originated, even
/// values are the matching PD-originated reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ScsType {
    Chlng = 0x11,
    Ccrypt = 0x12,
    Scrypt = 0x13,
    RmacI = 0x14,
    PlainCmd = 0x15,
    PlainReply = 0x16,
    SecureCmd = 0x17,
    SecureReply = 0x18,
}

impl ScsType {
    fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x11 => Self::Chlng,
            0x12 => Self::Ccrypt,
            0x13 => Self::Scrypt,
            0x14 => Self::RmacI,
            0x15 => Self::PlainCmd,
            0x16 => Self::PlainReply,
            0x17 => Self::SecureCmd,
            0x18 => Self::SecureReply,
            _ => return None,
        })
    }

    /// Whether frames of this type carry an 8-byte MAC trailer.
    fn carries_mac(self) -> bool {
        matches!(self, Self::PlainCmd | Self::PlainReply | Self::SecureCmd | Self::SecureReply)
    }

    fn is_encrypted(self) -> bool {
        matches!(self, Self::SecureCmd | Self::SecureReply)
    }
}

/// Outcome of [`decode`], mirroring the four failure classes the original
/// phy layer distinguishes by return code: fatal, incomplete, soft (corrupt,
/// discard and resync), and no-SOM.
#[derive(Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// Not enough bytes buffered yet; keep reading.
    Incomplete,
    /// No SOM byte anywhere in the buffer; all of it was noise.
    NoSom,
    /// A frame was found but failed a correctness check (length, trailer,
    /// sequence, or secure message block); discard and wait for the next
    /// poll.
    SoftFail,
    /// The frame is addressed to a different PD on the bus.
    NotForUs,
}

/// How this frame's sequence number relates to the last one accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeqStatus {
    /// First frame of a new exchange (`seq == 0`, always accepted).
    Resync,
    /// Next expected sequence number; accept and process normally.
    Accept,
    /// Same as the last accepted frame: the CP missed the reply and is
    /// retrying. The caller should resend its cached reply rather than
    /// re-run the command.
    Retransmit,
}

/// A successfully decoded command frame.
pub struct DecodedCommand {
    pub seq: u8,
    pub seq_status: SeqStatus,
    /// Command code plus body, with any secure message framing stripped.
    pub payload: PacketBuf,
}

/// Bytes consumed from `rx` so far; callers reset the buffer after each call
/// to `decode` regardless of outcome, since at most one frame is ever in
/// flight on a half-duplex line.
pub struct Phy {
    last_seq: i8,
}

impl Phy {
    pub const fn new() -> Self {
        Self { last_seq: -1 }
    }

    /// Force the next frame to be treated as a resync regardless of its
    /// sequence number (used when the phase machine times out waiting for a
    /// reply and gives up on the in-flight exchange).
    pub fn reset_sequence(&mut self) {
        self.last_seq = -1;
    }

    /// Attempt to decode one frame out of `rx[..len]`.
    ///
    /// On any outcome other than `Incomplete`, the caller is expected to
    /// discard the buffered bytes (there is no partial-frame retention
    /// across a failed decode).
    pub fn decode(
        &mut self,
        rx: &[u8],
        len: usize,
        our_address: u8,
        sc: &mut SecureChannel,
        sc_active: bool,
    ) -> Result<DecodedCommand, DecodeError> {
        let som_pos = rx[..len].iter().position(|&b| b == SOM);
        let som_pos = match som_pos {
            Some(p) => p,
            None => return Err(DecodeError::NoSom),
        };
        let buf = &rx[som_pos..len];
        let avail = len - som_pos;

        if avail < 5 {
            return Err(DecodeError::Incomplete);
        }

        let addr_byte = buf[1];
        let total_len = u16::from_le_bytes([buf[2], buf[3]]) as usize;
        let msgctl = buf[4];

        if total_len < 6 || total_len > MAX_PACKET_SIZE {
            return Err(DecodeError::SoftFail);
        }
        if avail < total_len {
            return Err(DecodeError::Incomplete);
        }
        let buf = &buf[..total_len];

        let crc_present = msgctl & 0x04 != 0;
        let scb_present = msgctl & 0x08 != 0;
        let seq = msgctl & 0x03;

        let trailer_len = if crc_present { 2 } else { 1 };
        if crc_present {
            let received = u16::from_le_bytes([buf[total_len - 2], buf[total_len - 1]]);
            if crc16(&buf[..total_len - 2]) != received {
                return Err(DecodeError::SoftFail);
            }
        } else if !checksum8_valid(buf) {
            return Err(DecodeError::SoftFail);
        }

        // Direction bit must be clear: a reply-direction frame arriving at
        // the PD is either noise or a bus conflict, not a command.
        if addr_byte & 0x80 != 0 {
            return Err(DecodeError::SoftFail);
        }
        let addr = addr_byte & 0x7F;
        if addr != our_address && addr != crate::config::BROADCAST_ADDRESS {
            return Err(DecodeError::NotForUs);
        }

        let seq_status = if seq == 0 {
            SeqStatus::Resync
        } else if self.last_seq < 0 {
            return Err(DecodeError::SoftFail);
        } else if seq as i8 == self.last_seq {
            SeqStatus::Retransmit
        } else if seq as i8 == (self.last_seq + 1) % 4 {
            SeqStatus::Accept
        } else {
            return Err(DecodeError::SoftFail);
        };

        let mut cursor = 5;
        let mut scb: Option<(u8, ScsType)> = None;
        if scb_present {
            if cursor + 2 > total_len {
                return Err(DecodeError::SoftFail);
            }
            let scb_len = buf[cursor] as usize;
            let scb_type = match ScsType::from_u8(buf[cursor + 1]) {
                Some(t) => t,
                None => return Err(DecodeError::SoftFail),
            };
            if scb_len < 2 || cursor + scb_len > total_len {
                return Err(DecodeError::SoftFail);
            }
            scb = Some((scb_len as u8, scb_type));
            cursor += scb_len;
        }

        let mac_len = match scb {
            Some((_, t)) if t.carries_mac() => {
                if !sc_active {
                    return Err(DecodeError::SoftFail);
                }
                8
            }
            _ => 0,
        };
        let payload_end = total_len - trailer_len - mac_len;
        if payload_end < cursor {
            return Err(DecodeError::SoftFail);
        }

        let mut payload: PacketBuf = Vec::new();
        if mac_len > 0 {
            let (scb_len, scb_type) = scb.unwrap_lite_or_soft_fail()?;
            let scb_bytes = &buf[cursor - scb_len as usize..cursor];
            let trailer = &buf[payload_end..payload_end + mac_len];
            if !sc.verify_command_mac(scb_bytes, &buf[cursor..payload_end], trailer) {
                return Err(DecodeError::SoftFail);
            }
            payload.extend_from_slice(&buf[cursor..payload_end]).ok();
            if scb_type.is_encrypted() {
                let mut scratch = [0u8; MAX_PACKET_SIZE];
                let n = payload.len();
                scratch[..n].copy_from_slice(&payload);
                let unpadded = sc
                    .decrypt_command_payload(&mut scratch[..n])
                    .ok_or(DecodeError::SoftFail)?;
                payload.clear();
                payload.extend_from_slice(&scratch[..unpadded]).ok();
            }
        } else {
            payload.extend_from_slice(&buf[cursor..payload_end]).ok();
        }

        Ok(DecodedCommand {
            seq,
            seq_status,
            payload,
        })
    }

    pub fn accept(&mut self, seq: u8) {
        self.last_seq = seq as i8;
    }
}

impl Default for Phy {
    fn default() -> Self {
        Self::new()
    }
}

/// Small helper so the `scb.unwrap()` in `decode` reads as a recoverable
/// soft failure rather than a panic path; the `None` case is unreachable
/// because `mac_len > 0` only when `scb` was set above, but the engine
/// never panics on wire input regardless.
trait ScbOrSoftFail {
    fn unwrap_lite_or_soft_fail(self) -> Result<(u8, ScsType), DecodeError>;
}

impl ScbOrSoftFail for Option<(u8, ScsType)> {
    fn unwrap_lite_or_soft_fail(self) -> Result<(u8, ScsType), DecodeError> {
        self.ok_or(DecodeError::SoftFail)
    }
}

/// Build the outer frame around an already-assembled reply payload
/// (secure message block, if any, plus reply code and body, plus MAC
/// trailer if any) and append the CRC-16 or checksum trailer.
///
/// `crc` selects which trailer to use, echoing the bit the CP set on the
/// command this is answering.
pub fn encode_frame(
    out: &mut PacketBuf,
    address: u8,
    seq: u8,
    crc: bool,
    scb_present: bool,
    payload: &[u8],
) -> Result<(), ()> {
    out.clear();
    let trailer_len = if crc { 2 } else { 1 };
    let total_len = 5 + payload.len() + trailer_len;
    if total_len > MAX_PACKET_SIZE {
        return Err(());
    }

    let mut msgctl = seq & 0x03;
    if crc {
        msgctl |= 0x04;
    }
    if scb_present {
        msgctl |= 0x08;
    }

    out.push(SOM).map_err(|_| ())?;
    out.push(address | 0x80).map_err(|_| ())?;
    out.extend_from_slice(&(total_len as u16).to_le_bytes())
        .map_err(|_| ())?;
    out.push(msgctl).map_err(|_| ())?;
    out.extend_from_slice(payload).map_err(|_| ())?;

    if crc {
        let c = crc16(out);
        out.extend_from_slice(&c.to_le_bytes()).map_err(|_| ())?;
    } else {
        let c = checksum8(out);
        out.push(c).map_err(|_| ())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BROADCAST_ADDRESS;

    fn build_plain_poll(address: u8, seq: u8, crc: bool) -> PacketBuf {
        let mut out = PacketBuf::new();
        encode_frame(&mut out, address, seq, crc, false, &[0x60]).unwrap();
        out
    }

    #[test]
    fn decodes_a_plain_poll() {
        let frame = build_plain_poll(0x01, 0, true);
        let mut sc = SecureChannel::new();
        let mut phy = Phy::new();
        let cmd = phy
            .decode(&frame, frame.len(), 0x01, &mut sc, false)
            .unwrap();
        assert_eq!(cmd.seq, 0);
        assert_eq!(cmd.seq_status, SeqStatus::Resync);
        assert_eq!(&cmd.payload[..], &[0x60]);
    }

    #[test]
    fn rejects_bad_crc() {
        let mut frame = build_plain_poll(0x01, 0, true);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        let mut sc = SecureChannel::new();
        let mut phy = Phy::new();
        let err = phy.decode(&frame, frame.len(), 0x01, &mut sc, false);
        assert_eq!(err.err(), Some(DecodeError::SoftFail));
    }

    #[test]
    fn address_mismatch_is_ignored_not_failed() {
        let frame = build_plain_poll(0x02, 0, true);
        let mut sc = SecureChannel::new();
        let mut phy = Phy::new();
        let err = phy.decode(&frame, frame.len(), 0x01, &mut sc, false);
        assert_eq!(err.err(), Some(DecodeError::NotForUs));
    }

    #[test]
    fn broadcast_address_is_accepted() {
        let frame = build_plain_poll(BROADCAST_ADDRESS, 0, true);
        let mut sc = SecureChannel::new();
        let mut phy = Phy::new();
        let cmd = phy
            .decode(&frame, frame.len(), 0x01, &mut sc, false)
            .unwrap();
        assert_eq!(&cmd.payload[..], &[0x60]);
    }

    #[test]
    fn sequence_zero_always_resyncs() {
        let mut phy = Phy::new();
        phy.accept(2);
        let frame = build_plain_poll(0x01, 0, true);
        let mut sc = SecureChannel::new();
        let cmd = phy
            .decode(&frame, frame.len(), 0x01, &mut sc, false)
            .unwrap();
        assert_eq!(cmd.seq_status, SeqStatus::Resync);
    }

    #[test]
    fn duplicate_sequence_is_a_retransmit() {
        let mut phy = Phy::new();
        phy.accept(1);
        let frame = build_plain_poll(0x01, 1, true);
        let mut sc = SecureChannel::new();
        let cmd = phy
            .decode(&frame, frame.len(), 0x01, &mut sc, false)
            .unwrap();
        assert_eq!(cmd.seq_status, SeqStatus::Retransmit);
    }

    #[test]
    fn out_of_order_sequence_is_a_soft_fail() {
        let mut phy = Phy::new();
        phy.accept(1);
        let frame = build_plain_poll(0x01, 3, true);
        let mut sc = SecureChannel::new();
        let err = phy.decode(&frame, frame.len(), 0x01, &mut sc, false);
        assert_eq!(err.err(), Some(DecodeError::SoftFail));
    }

    #[test]
    fn incomplete_frame_asks_for_more_bytes() {
        let frame = build_plain_poll(0x01, 0, true);
        let mut sc = SecureChannel::new();
        let mut phy = Phy::new();
        let err = phy.decode(&frame, frame.len() - 1, 0x01, &mut sc, false);
        assert_eq!(err.err(), Some(DecodeError::Incomplete));
    }

    #[test]
    fn no_som_in_buffer() {
        let junk = [0x01u8, 0x02, 0x03];
        let mut sc = SecureChannel::new();
        let mut phy = Phy::new();
        let err = phy.decode(&junk, junk.len(), 0x01, &mut sc, false);
        assert_eq!(err.err(), Some(DecodeError::NoSom));
    }

    #[test]
    fn secure_frame_without_active_channel_is_soft_failed() {
        let mut out = PacketBuf::new();
        let scb = [2u8, ScsType::PlainCmd as u8];
        let mut payload = heapless::Vec::<u8, 32>::new();
        payload.extend_from_slice(&scb).ok();
        payload.extend_from_slice(&[0x60]).ok();
        payload.extend_from_slice(&[0u8; 8]).ok(); // bogus MAC trailer
        encode_frame(&mut out, 0x01, 0, true, true, &payload).unwrap();

        let mut sc = SecureChannel::new();
        let mut phy = Phy::new();
        let err = phy.decode(&out, out.len(), 0x01, &mut sc, false);
        assert_eq!(err.err(), Some(DecodeError::SoftFail));
    }
}
