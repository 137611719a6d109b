// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! SMBus PEC (CRC-8) and NVMe-MI MIC (CRC-32C) primitives.
//!
//! Both functions are pure and allocation-free; the byte range each is
//! computed over is entirely the caller's responsibility (the framer, in
//! practice). The CRC-32C instance reuses the Castagnoli/iSCSI polynomial
//! table, the same algorithm identifier the teacher crate reaches for when
//! it needs a reflected CRC-32 with the NVMe-MI seed/xorout.

use crc::{Algorithm, Crc};

/// SMBus Packet Error Code: CRC-8, polynomial 0x07, no reflection, init 0,
/// no final XOR ("CRC-8/SMBUS").
const PEC_ALGORITHM: Algorithm<u8> = crc::CRC_8_SMBUS;

/// NVMe-MI Message Integrity Check: CRC-32C (Castagnoli), reflected,
/// init/final XOR 0xFFFFFFFF.
const MIC_ALGORITHM: Algorithm<u32> = crc::CRC_32_ISCSI;

/// Compute the trailing SMBus PEC byte over `bytes`.
#[must_use]
pub fn pec(bytes: &[u8]) -> u8 {
    Crc::<u8>::new(&PEC_ALGORITHM).checksum(bytes)
}

/// Compute the NVMe-MI MIC over `bytes` (message-type byte followed by
/// the payload). The caller emits the result little-endian on the wire.
#[must_use]
pub fn mic(bytes: &[u8]) -> u32 {
    Crc::<u32>::new(&MIC_ALGORITHM).checksum(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pec_of_empty_is_zero() {
        assert_eq!(pec(&[]), 0);
    }

    #[test]
    fn pec_health_status_poll_reference() {
        // Canonical 13-byte pre-PEC region from the Health Status Poll
        // scenario: dest src ver eids flags msgtype then the 4-byte
        // NVMe-MI MI-command header (NMIMT/ROR=0x01 opcode=0x01 00 00).
        let pre_pec: [u8; 13] = [
            0x3A, 0x0F, 0x09, 0x21, 0x01, 0x00, 0x00, 0xC8, 0x04, 0x01, 0x01, 0x00, 0x00,
        ];
        assert_eq!(pec(&pre_pec), 0x92);
    }

    #[test]
    fn mic_of_canonical_mi_payload() {
        let payload = [0x04u8, 0x01, 0x01, 0x00, 0x00];
        assert_eq!(mic(&payload), 0xdd33_f043);
        // Flipping any bit must change the MIC.
        let v1 = mic(&payload);
        for bit in 0..payload.len() * 8 {
            let mut flipped = payload;
            flipped[bit / 8] ^= 1 << (bit % 8);
            assert_ne!(mic(&flipped), v1, "bit {bit} did not change the MIC");
        }
    }

    #[test]
    fn mic_all_zero_vs_all_ff() {
        assert_ne!(mic(&[0u8; 8]), mic(&[0xffu8; 8]));
    }
}
