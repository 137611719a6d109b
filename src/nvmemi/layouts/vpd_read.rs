// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! VPD Read (MI opcode 0x05, `spec.md` §6, §4.8).
//!
//! The response is the requested chunk of VPD bytes. There is no
//! end-of-data bit in the NVMe-MI wire format itself; the profiler sweep
//! (§4.8) instead terminates when a read returns fewer bytes than it
//! asked for (or an empty chunk), so this decoder surfaces the chunk
//! length alongside the bytes and lets the caller apply that rule.

use crate::error::Result;
use crate::nvmemi::fields::FieldValue;
use crate::nvmemi::response::DecodedResponse;

pub fn decode(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    response.fields.insert(
        "VPD Chunk",
        FieldValue::bytes(hex::encode(body), body.to_vec()),
    );
    response.fields.insert(
        "VPD Chunk Length",
        FieldValue::numeric(format!("{}", body.len()), body.len() as i128, Vec::new()),
    );
    Ok(())
}

/// True when a VPD Read response signals the end of the VPD area: a short
/// (or empty) chunk relative to what was requested.
pub fn is_end_of_data(requested_len: usize, chunk_len: usize) -> bool {
    chunk_len < requested_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_chunk_signals_end_of_data() {
        assert!(is_end_of_data(32, 10));
        assert!(!is_end_of_data(32, 32));
    }

    #[test]
    fn decode_exposes_chunk_bytes() {
        let mut response =
            crate::nvmemi::response::decode(&[0x01, 0x05, 0x00, 0x00, 0x00], 0x05, None).unwrap();
        decode(&[0xaa, 0xbb], &mut response).unwrap();
        assert_eq!(response.fields.get("VPD Chunk").unwrap().display, "aabb");
    }
}
