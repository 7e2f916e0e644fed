// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Peripheral Device (PD) side of an OSDP-style access-control serial
//! protocol engine.
//!
//! This crate is the protocol engine only: given a [`Channel`] (the byte
//! transport) and a random source, it decodes commands from a Control
//! Panel, maintains the secure-channel session, and builds replies. It
//! does not own a serial port, a scheduler, or the meaning of the
//! application commands it decodes (LED patterns, door strikes, etc.) —
//! those are supplied by a host that drains [`Pd::pd_get_cmd`] and calls
//! [`Pd::refresh`] on a timer.
//!
//! See `SPEC_FULL.md` for the protocol this implements and `DESIGN.md` for
//! how each piece is grounded.

#![no_std]

pub mod channel;
pub mod command;
pub mod config;
pub mod crc;
pub mod crypto;
mod dispatch;
pub mod endian;
pub mod error;
pub mod flags;
mod phase;
pub mod phy;
mod queue;
mod reply;
pub mod securechannel;
pub mod timestamp;

use heapless::Vec;
use rand_core::RngCore;
use ringbuf::ringbuf_entry;

pub use channel::Channel;
pub use command::AppCommand;
pub use config::Config;
pub use phase::Phase;
pub use queue::CommandQueue;
pub use timestamp::Millis;

use config::ScbkConfig;
use dispatch::ScbOverride;
use error::NakReason;
use flags::Flags;
use phy::{PacketBuf, Phy, ScsType, SeqStatus, MAX_PACKET_SIZE};
use securechannel::SecureChannel;

/// The PD must see a complete, decodable frame within this many
/// milliseconds of entering `IDLE`, or it gives up on the exchange.
pub const RESP_TIMEOUT_MS: u32 = 400;

/// Outer recovery wait used by deployments that retry a wedged link; not
/// enforced by the phase machine itself; it bounds how long a host should
/// wait before recreating the engine after repeated `ERR` phases.
pub const OSDP_PD_ERR_RETRY_SEC: u32 = 300;

/// Tick period the host's scheduler is expected to call
/// [`Pd::refresh`] at.
pub const REFRESH_PERIOD_MS: u32 = 50;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Nak(u8),
    ScActive,
    ScDropped,
    QueueFull,
    RespTimeout,
    SendFailed,
    Resync,
}
ringbuf::ringbuf!(Trace, 32, Trace::None);

/// The PD protocol engine. One instance owns exactly one address on the
/// bus, per `Non-goals` (no multi-drop arbitration inside a single
/// engine).
pub struct Pd<C: Channel, R: RngCore> {
    channel: C,
    rng: R,

    address: u8,
    id: config::Identity,
    capabilities: config::CapabilityTable,
    client_uid: [u8; 8],
    scbk_config: ScbkConfig,

    flags: Flags,
    sc: SecureChannel,
    phy: Phy,
    phase: Phase,
    tstamp: Millis,

    rx_buf: PacketBuf,
    last_reply: PacketBuf,

    queue: CommandQueue,
}

impl<C: Channel, R: RngCore> Pd<C, R> {
    /// One-time setup: wires a channel and a random source to a fresh
    /// engine. Config's `scbk` selects install mode (no SCBK configured
    /// yet) or a previously-provisioned key.
    ///
    /// The reference implementation's `osdp_setup` can fail (it parses a
    /// hex-string SCBK). That parse step doesn't exist here — `Config`
    /// already carries a typed 16-byte key or an explicit install-mode
    /// marker — so this constructor is infallible.
    pub fn setup(channel: C, rng: R, config: Config) -> Self {
        let install_mode = matches!(config.scbk, ScbkConfig::InstallMode);
        let mut flags = Flags::PD_MODE;
        if install_mode {
            flags.insert(Flags::INSTALL_MODE | Flags::SC_USE_SCBKD);
        }
        Self {
            channel,
            rng,
            address: config.address & 0x7F,
            id: config.id,
            capabilities: config.capabilities,
            client_uid: config.client_uid,
            scbk_config: config.scbk,
            flags,
            sc: SecureChannel::new(),
            phy: Phy::new(),
            phase: Phase::Idle,
            tstamp: Millis::new(0),
            rx_buf: Vec::new(),
            last_reply: Vec::new(),
            queue: CommandQueue::new(),
        }
    }

    /// Drain the oldest fully-decoded application command, or `None` if the
    /// queue is empty. Never blocks.
    pub fn pd_get_cmd(&mut self) -> Option<AppCommand> {
        self.queue.pop()
    }

    /// Whether the secure channel is currently active (handshake complete,
    /// no framing/MAC failure since).
    pub fn sc_active(&self) -> bool {
        self.flags.contains(Flags::SC_ACTIVE)
    }

    /// The scheduler's per-tick entry point. `now` is the current reading
    /// of whatever monotonic clock the host owns; the engine never reads a
    /// clock itself.
    pub fn refresh(&mut self, now: Millis) {
        match self.phase {
            Phase::Idle => {
                if now.elapsed_since(self.tstamp) > RESP_TIMEOUT_MS {
                    ringbuf_entry!(Trace::RespTimeout);
                    self.phase = Phase::Err;
                    return;
                }
                match self.poll_idle() {
                    IdleOutcome::Waiting => {}
                    IdleOutcome::ReplyReady => self.send_reply(now),
                }
            }
            Phase::SendReply => self.send_reply(now),
            Phase::Err => {
                ringbuf_entry!(Trace::ScDropped);
                self.flags.remove(Flags::SC_ACTIVE);
                self.phy.reset_sequence();
                self.rx_buf.clear();
                self.channel.flush();
                self.phase = Phase::Idle;
                self.tstamp = now;
            }
        }
    }

    fn send_reply(&mut self, now: Millis) {
        let sent = self.channel.send(&self.last_reply);
        if sent == self.last_reply.len() {
            self.phase = Phase::Idle;
            self.tstamp = now;
        } else {
            ringbuf_entry!(Trace::SendFailed);
            self.phase = Phase::Err;
        }
    }

    fn poll_idle(&mut self) -> IdleOutcome {
        let mut scratch = [0u8; MAX_PACKET_SIZE];
        let room = MAX_PACKET_SIZE - self.rx_buf.len();
        if room == 0 {
            // A full buffer with no decodable frame in it is noise; give up
            // on it rather than deadlock waiting for more room.
            self.rx_buf.clear();
            self.channel.flush();
            return IdleOutcome::Waiting;
        }
        let n = self.channel.recv(&mut scratch[..room]);
        if n == 0 {
            return IdleOutcome::Waiting;
        }
        self.rx_buf.extend_from_slice(&scratch[..n]).ok();

        let sc_active = self.flags.contains(Flags::SC_ACTIVE);
        let len = self.rx_buf.len();

        match self
            .phy
            .decode(&self.rx_buf, len, self.address, &mut self.sc, sc_active)
        {
            Ok(decoded) => {
                self.rx_buf.clear();
                if decoded.seq_status == SeqStatus::Retransmit {
                    // Same reply, byte-for-byte, no new dispatch.
                    IdleOutcome::ReplyReady
                } else {
                    if decoded.seq_status == SeqStatus::Resync {
                        ringbuf_entry!(Trace::Resync);
                    }
                    self.dispatch_and_assemble(&decoded.payload, decoded.seq);
                    self.phy.accept(decoded.seq);
                    IdleOutcome::ReplyReady
                }
            }
            Err(phy::DecodeError::Incomplete) => IdleOutcome::Waiting,
            Err(phy::DecodeError::NotForUs) => {
                self.rx_buf.clear();
                IdleOutcome::Waiting
            }
            Err(phy::DecodeError::NoSom) | Err(phy::DecodeError::SoftFail) => {
                self.rx_buf.clear();
                self.channel.flush();
                IdleOutcome::Waiting
            }
        }
    }

    fn dispatch_and_assemble(&mut self, payload: &[u8], seq: u8) {
        let mut outcome = dispatch::dispatch(
            payload,
            &self.id,
            &self.capabilities,
            &mut self.flags,
            &mut self.sc,
            &self.scbk_config,
            self.client_uid,
            &mut self.rng,
        );

        if let Some(cmd) = outcome.app_cmd.take() {
            if self.queue.push(cmd).is_err() {
                ringbuf_entry!(Trace::QueueFull);
                outcome.reply_payload.clear();
                reply::build_nak(&mut outcome.reply_payload, NakReason::Record);
                outcome.scb_override = None;
            }
        }

        self.last_reply = self.assemble_frame(outcome, seq);
    }

    /// Apply secure-channel framing (if any) and encode the final on-wire
    /// reply frame. `seq` is the sequence number of the command being
    /// answered; OSDP replies echo it back in `MSGCTL`.
    fn assemble_frame(&mut self, outcome: dispatch::Outcome, seq: u8) -> PacketBuf {
        let dispatch::Outcome {
            reply_payload,
            scb_override,
            ..
        } = outcome;

        let mut body: PacketBuf = Vec::new();
        let scb_present;

        match scb_override {
            Some(ScbOverride { len, scs_type, status }) => {
                ringbuf_entry!(Trace::ScActive);
                body.push(len).ok();
                body.push(scs_type as u8).ok();
                body.push(status).ok();
                body.extend_from_slice(&reply_payload).ok();
                scb_present = true;
            }
            None if self.flags.contains(Flags::SC_ACTIVE) => {
                let scs_type = if reply_payload.len() > 1 {
                    ScsType::SecureReply
                } else {
                    ScsType::PlainReply
                };
                let mut plain_or_cipher = reply_payload;
                if scs_type == ScsType::SecureReply {
                    let mut scratch = [0u8; MAX_PACKET_SIZE];
                    let n = plain_or_cipher.len();
                    scratch[..n].copy_from_slice(&plain_or_cipher);
                    let padded = self.sc.encrypt_reply_payload(&mut scratch, n);
                    plain_or_cipher.clear();
                    plain_or_cipher.extend_from_slice(&scratch[..padded]).ok();
                }
                let scb = [2u8, scs_type as u8];
                let mac = self.sc.mac_reply(&scb, &plain_or_cipher);
                body.extend_from_slice(&scb).ok();
                body.extend_from_slice(&plain_or_cipher).ok();
                body.extend_from_slice(&mac).ok();
                scb_present = true;
            }
            None => {
                body = reply_payload;
                scb_present = false;
            }
        }

        let mut framed = PacketBuf::new();
        phy::encode_frame(&mut framed, self.address, seq, true, scb_present, &body).ok();
        framed
    }
}

enum IdleOutcome {
    Waiting,
    ReplyReady,
}
