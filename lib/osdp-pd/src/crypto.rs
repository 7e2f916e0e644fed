// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AES-128 primitives used by the secure channel: bare ECB block operations
//! (for key derivation and cryptograms) and CBC with ISO/IEC 7816-4 padding
//! (for encrypted secure messages).

use aes::Aes128;
use cipher::{
    generic_array::GenericArray, BlockDecrypt, BlockDecryptMut, BlockEncrypt,
    BlockEncryptMut, KeyInit, KeyIvInit,
};

pub const BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Encrypt a single 16-byte block in place with AES-128-ECB.
pub fn ecb_encrypt_block(key: &[u8; 16], block: &mut [u8; 16]) {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut ga = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut ga);
    block.copy_from_slice(&ga);
}

/// Decrypt a single 16-byte block in place with AES-128-ECB.
pub fn ecb_decrypt_block(key: &[u8; 16], block: &mut [u8; 16]) {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut ga = GenericArray::clone_from_slice(block);
    cipher.decrypt_block(&mut ga);
    block.copy_from_slice(&ga);
}

/// Encrypt `len` bytes of `buf` (a multiple of [`BLOCK_SIZE`]) in place with
/// AES-128-CBC under the given key and IV.
pub fn cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], buf: &mut [u8]) {
    debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
    let mut enc = Aes128CbcEnc::new(
        GenericArray::from_slice(key),
        GenericArray::from_slice(iv),
    );
    for chunk in buf.chunks_mut(BLOCK_SIZE) {
        let block = GenericArray::from_mut_slice(chunk);
        enc.encrypt_block_mut(block);
    }
}

/// Decrypt `len` bytes of `buf` (a multiple of [`BLOCK_SIZE`]) in place with
/// AES-128-CBC under the given key and IV.
pub fn cbc_decrypt(key: &[u8; 16], iv: &[u8; 16], buf: &mut [u8]) {
    debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
    let mut dec = Aes128CbcDec::new(
        GenericArray::from_slice(key),
        GenericArray::from_slice(iv),
    );
    for chunk in buf.chunks_mut(BLOCK_SIZE) {
        let block = GenericArray::from_mut_slice(chunk);
        dec.decrypt_block_mut(block);
    }
}

/// Pad `buf[..len]` in place to the next block boundary using ISO/IEC
/// 7816-4 padding (`0x80` followed by zeros) and return the padded length.
///
/// `buf` must have room for at least one extra block past `len`.
pub fn iso7816_pad(buf: &mut [u8], len: usize) -> usize {
    let padded_len = ((len / BLOCK_SIZE) + 1) * BLOCK_SIZE;
    buf[len] = 0x80;
    for b in &mut buf[len + 1..padded_len] {
        *b = 0;
    }
    padded_len
}

/// Find the unpadded length of an ISO/IEC 7816-4 padded buffer by scanning
/// back from the end for the `0x80` marker. Returns `None` if the padding is
/// malformed.
pub fn iso7816_unpad(buf: &[u8]) -> Option<usize> {
    let mut i = buf.len();
    while i > 0 {
        i -= 1;
        match buf[i] {
            0x00 => continue,
            0x80 => return Some(i),
            _ => return None,
        }
    }
    None
}
