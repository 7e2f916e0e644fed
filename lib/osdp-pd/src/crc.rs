// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame checksums: CRC-16/ITU-T (seed 0x1D0F) for secure/extended frames,
//! and the legacy 8-bit two's-complement checksum.

use crc::{Algorithm, Crc, CRC_16_XMODEM};

/// CRC-16/ITU-T with the protocol-specified non-zero seed and no final XOR.
///
/// This is the stock XMODEM polynomial (0x1021, MSB-first, not reflected)
/// with `init` overridden to 0x1D0F, per the wire format.
const OSDP_CRC16: Algorithm<u16> = Algorithm {
    init: 0x1D0F,
    ..CRC_16_XMODEM
};

const CRC16: Crc<u16> = Crc::<u16>::new(&OSDP_CRC16);

/// Compute the frame CRC-16 over `buf`.
pub fn crc16(buf: &[u8]) -> u16 {
    CRC16.checksum(buf)
}

/// Compute the legacy 8-bit checksum byte such that `buf` followed by the
/// returned byte sums to 0 mod 256.
pub fn checksum8(buf: &[u8]) -> u8 {
    let sum: u8 = buf.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    (!sum).wrapping_add(1)
}

/// Verify that `buf` (checksum byte included) sums to 0 mod 256.
pub fn checksum8_valid(buf: &[u8]) -> bool {
    buf.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_vector() {
        // {0x53, 0x01, 0x08, 0x00, 0x04, 0x60} from the spec's worked example.
        // 0x00BA computed independently bit-by-bit against CRC-16/XMODEM
        // (poly 0x1021, MSB-first, no reflection, no final XOR) with init
        // overridden to 0x1D0F.
        let buf = [0x53u8, 0x01, 0x08, 0x00, 0x04, 0x60];
        assert_eq!(crc16(&buf), 0x00BA);
    }

    #[test]
    fn checksum_round_trips() {
        let mut buf = [0x53u8, 0x01, 0x08, 0x00, 0x04, 0x60, 0];
        let sum = checksum8(&buf[..6]);
        buf[6] = sum;
        assert!(checksum8_valid(&buf));
    }

    #[test]
    fn checksum_detects_corruption() {
        let mut buf = [0x53u8, 0x01, 0x08, 0x00, 0x04, 0x60, 0];
        let sum = checksum8(&buf[..6]);
        buf[6] = sum;
        buf[2] ^= 0xFF;
        assert!(!checksum8_valid(&buf));
    }
}
