// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Secure channel session: key derivation, cryptograms, and the running
//! MAC chains (C-MAC for commands, R-MAC for replies) that authenticate
//! every secure message once the handshake has completed.
//!
//! Key derivation selectors and the R-MAC-I seeding order are not pinned
//! down by the surviving reference source; see `DESIGN.md` for the choices
//! made here (Open Question c).

use aes::Aes128;
use cmac::{Cmac, Mac};
use unwrap_lite::UnwrapLite;

use crate::crypto::{cbc_decrypt, cbc_encrypt, ecb_encrypt_block, iso7816_pad, iso7816_unpad};

/// KDF input selector for the session encryption key (S-ENC).
const SEL_ENC: u8 = 0x82;
/// KDF input selector for the command-direction MAC key (S-MAC1).
const SEL_MAC1: u8 = 0x01;
/// KDF input selector for the reply-direction MAC key (S-MAC2).
const SEL_MAC2: u8 = 0x02;

fn derive_key(scbk: &[u8; 16], selector: u8, cp_random: &[u8; 8]) -> [u8; 16] {
    let mut input = [0u8; 16];
    input[0] = 0x01;
    input[1] = selector;
    input[8..16].copy_from_slice(cp_random);
    ecb_encrypt_block(scbk, &mut input);
    input
}

fn cryptogram(key: &[u8; 16], a: &[u8; 8], b: &[u8; 8]) -> [u8; 16] {
    let mut input = [0u8; 16];
    input[..8].copy_from_slice(a);
    input[8..].copy_from_slice(b);
    ecb_encrypt_block(key, &mut input);
    input
}

fn cmac8(key: &[u8; 16], chain: &[u8; 16], parts: &[&[u8]]) -> ([u8; 16], [u8; 8]) {
    // A 16-byte key is always valid for Cmac<Aes128>.
    let mut mac = Cmac::<Aes128>::new_from_slice(key).unwrap_lite();
    mac.update(chain);
    for part in parts {
        mac.update(part);
    }
    let tag = mac.finalize().into_bytes();
    let mut full = [0u8; 16];
    full.copy_from_slice(&tag);
    let mut trunc = [0u8; 8];
    trunc.copy_from_slice(&tag[..8]);
    (full, trunc)
}

#[derive(Clone, Copy, Default)]
pub struct SecureChannel {
    pub scbk: [u8; 16],
    pub s_enc: [u8; 16],
    pub s_mac1: [u8; 16],
    pub s_mac2: [u8; 16],
    pub cp_random: [u8; 8],
    pub pd_random: [u8; 8],
    pub pd_client_uid: [u8; 8],
    pub cp_cryptogram: [u8; 16],
    pub pd_cryptogram: [u8; 16],
    pub r_mac: [u8; 16],
    pub c_mac: [u8; 16],
}

impl SecureChannel {
    pub const fn new() -> Self {
        Self {
            scbk: [0; 16],
            s_enc: [0; 16],
            s_mac1: [0; 16],
            s_mac2: [0; 16],
            cp_random: [0; 8],
            pd_random: [0; 8],
            pd_client_uid: [0; 8],
            cp_cryptogram: [0; 16],
            pd_cryptogram: [0; 16],
            r_mac: [0; 16],
            c_mac: [0; 16],
        }
    }

    /// `osdp_sc_init`: derive session keys from the base key and the CP's
    /// challenge. Called on `CMD_CHLNG` receipt; does not itself activate
    /// the secure channel.
    pub fn init(&mut self, scbk: &[u8; 16], cp_random: [u8; 8]) {
        self.scbk = *scbk;
        self.cp_random = cp_random;
        self.s_enc = derive_key(scbk, SEL_ENC, &cp_random);
        self.s_mac1 = derive_key(scbk, SEL_MAC1, &cp_random);
        self.s_mac2 = derive_key(scbk, SEL_MAC2, &cp_random);
        self.r_mac = [0; 16];
        self.c_mac = [0; 16];
    }

    /// Generate a PD nonce and compute this PD's cryptogram for the CCRYPT
    /// reply.
    pub fn compute_pd_cryptogram(&mut self, pd_random: [u8; 8], pd_client_uid: [u8; 8]) {
        self.pd_random = pd_random;
        self.pd_client_uid = pd_client_uid;
        self.pd_cryptogram = cryptogram(&self.s_enc, &self.cp_random, &self.pd_random);
    }

    /// Verify the CP's cryptogram carried in SCRYPT. Does not mutate state
    /// on mismatch; the caller decides whether to fail closed.
    pub fn verify_cp_cryptogram(&mut self, cp_cryptogram: [u8; 16]) -> bool {
        self.cp_cryptogram = cp_cryptogram;
        let expected = cryptogram(&self.s_enc, &self.pd_random, &self.cp_random);
        expected == cp_cryptogram
    }

    /// Seed both MAC chains from the completed cryptogram exchange and
    /// compute R-MAC-I, the value reported in the RMAC_I reply.
    pub fn compute_rmac_i(&mut self) {
        let (seed, _) = cmac8(
            &self.s_mac1,
            &[0; 16],
            &[&self.cp_cryptogram, &self.pd_cryptogram],
        );
        self.r_mac = seed;
        self.c_mac = seed;
    }

    /// Encrypt a reply payload in place (CBC, IV = current R-MAC chain
    /// value) and return the padded length. Only called when the payload
    /// is going out as SCS_18 (more than one byte).
    pub fn encrypt_reply_payload(&self, buf: &mut [u8], len: usize) -> usize {
        let padded_len = iso7816_pad(buf, len);
        cbc_encrypt(&self.s_enc, &self.r_mac, &mut buf[..padded_len]);
        padded_len
    }

    /// Compute the 8-byte C-MAC trailer for an outgoing reply over `scb`
    /// (the secure message block header bytes) and `payload` (plaintext or
    /// ciphertext, as sent on the wire), and advance the R-MAC chain.
    pub fn mac_reply(&mut self, scb: &[u8], payload: &[u8]) -> [u8; 8] {
        let (chain, trunc) = cmac8(&self.s_mac2, &self.r_mac, &[scb, payload]);
        self.r_mac = chain;
        trunc
    }

    /// Decrypt an incoming command payload in place (CBC, IV = current
    /// C-MAC chain value) and return the unpadded length, or `None` if the
    /// padding is malformed.
    pub fn decrypt_command_payload(&self, buf: &mut [u8]) -> Option<usize> {
        cbc_decrypt(&self.s_enc, &self.c_mac, buf);
        iso7816_unpad(buf)
    }

    /// Verify the 8-byte C-MAC trailer of an incoming secure command and, if
    /// it matches, advance the C-MAC chain.
    pub fn verify_command_mac(&mut self, scb: &[u8], payload: &[u8], trailer: &[u8]) -> bool {
        let (chain, trunc) = cmac8(&self.s_mac1, &self.c_mac, &[scb, payload]);
        let ok = trunc == trailer;
        if ok {
            self.c_mac = chain;
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCBK_DEFAULT;

    fn handshake() -> (SecureChannel, SecureChannel) {
        let cp_random = [0, 1, 2, 3, 4, 5, 6, 7];
        let pd_random = [8, 9, 10, 11, 12, 13, 14, 15];
        let pd_client_uid = [0xAA; 8];

        let mut cp = SecureChannel::new();
        cp.init(&SCBK_DEFAULT, cp_random);
        let mut pd = SecureChannel::new();
        pd.init(&SCBK_DEFAULT, cp_random);

        pd.compute_pd_cryptogram(pd_random, pd_client_uid);
        // CP independently derives the same cryptogram to validate the PD.
        cp.pd_random = pd_random;
        let cp_sees_pd = cryptogram(&cp.s_enc, &cp.cp_random, &cp.pd_random);
        assert_eq!(cp_sees_pd, pd.pd_cryptogram);

        // CP computes its own cryptogram (args swapped) and PD verifies it.
        let cp_cryptogram = cryptogram(&cp.s_enc, &cp.pd_random, &cp.cp_random);
        assert!(pd.verify_cp_cryptogram(cp_cryptogram));

        cp.cp_cryptogram = cp_cryptogram;
        cp.pd_cryptogram = pd.pd_cryptogram;
        cp.compute_rmac_i();
        pd.compute_rmac_i();
        assert_eq!(cp.r_mac, pd.r_mac);

        (cp, pd)
    }

    #[test]
    fn handshake_derives_matching_session_keys() {
        let (cp, pd) = handshake();
        assert_eq!(cp.s_enc, pd.s_enc);
        assert_eq!(cp.s_mac1, pd.s_mac1);
        assert_eq!(cp.s_mac2, pd.s_mac2);
    }

    #[test]
    fn wrong_scbk_fails_cryptogram_verification() {
        let cp_random = [0u8; 8];
        let pd_random = [1u8; 8];

        let mut pd = SecureChannel::new();
        pd.init(&SCBK_DEFAULT, cp_random);
        pd.compute_pd_cryptogram(pd_random, [0; 8]);

        let mut wrong_cp = SecureChannel::new();
        wrong_cp.init(&[0x99; 16], cp_random);
        wrong_cp.pd_random = pd_random;
        let bogus = cryptogram(&wrong_cp.s_enc, &wrong_cp.pd_random, &wrong_cp.cp_random);

        assert!(!pd.verify_cp_cryptogram(bogus));
    }

    #[test]
    fn reply_mac_advances_chain_deterministically() {
        let (_cp, mut pd) = handshake();
        let scb = [2u8, 0x16];
        let payload = [0x40u8];
        let chain_before = pd.r_mac;

        let (expected_chain, expected_trunc) =
            cmac8(&pd.s_mac2, &chain_before, &[&scb[..], &payload[..]]);
        let trailer = pd.mac_reply(&scb, &payload);

        assert_eq!(trailer, expected_trunc);
        assert_eq!(pd.r_mac, expected_chain);
        assert_ne!(pd.r_mac, chain_before);
    }

    #[test]
    fn command_mac_verify_detects_tamper() {
        let (_cp, mut pd) = handshake();
        let scb = [2u8, 0x15];
        let payload = [0x60u8];
        let (chain, trunc) = cmac8(&pd.s_mac1, &pd.c_mac, &[&scb[..], &payload[..]]);
        assert!(pd.verify_command_mac(&scb, &payload, &trunc));
        assert_eq!(pd.c_mac, chain);

        let mut bad_trailer = trunc;
        bad_trailer[0] ^= 1;
        assert!(!pd.verify_command_mac(&scb, &payload, &bad_trailer));
    }

    #[test]
    fn encrypted_payload_round_trips() {
        let (_cp, pd) = handshake();
        let mut buf = [0u8; 32];
        buf[..5].copy_from_slice(b"hello");
        let padded_len = pd.encrypt_reply_payload(&mut buf, 5);
        assert_ne!(&buf[..5], b"hello");

        let mut dec = buf;
        cbc_decrypt(&pd.s_enc, &pd.r_mac, &mut dec[..padded_len]);
        assert_eq!(iso7816_unpad(&dec[..padded_len]), Some(5));
        assert_eq!(&dec[..5], b"hello");
    }
}
