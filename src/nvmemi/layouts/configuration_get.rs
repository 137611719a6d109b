// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Configuration Get (MI opcode 0x04, `spec.md` §6, expanded by
//! `SPEC_FULL.md` §4.3).
//!
//! Every standard configuration identifier's response value is a 4-byte
//! little-endian dword (mirroring the teacher's
//! `GetSmbusI2cFrequencyResponse`/`GetMctpTransmissionUnitSizeResponse`
//! shape); which identifier was requested isn't echoed in the response, so
//! (like [`super::read_data_structure`]) this decoder just exposes the raw
//! dword under a generic name and leaves identifier-specific labeling to
//! the caller, which already knows which identifier it asked for.

use crate::error::{DecodeError, Error, Result};
use crate::nvmemi::fields::FieldValue;
use crate::nvmemi::response::DecodedResponse;

pub fn decode(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if body.len() < 4 {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: body.len(),
            needed: 4,
        }));
    }
    let value = u32::from_le_bytes(body[0..4].try_into().unwrap());
    response.fields.insert(
        "Configuration Value",
        FieldValue::numeric(format!("{value:#010x}"), value as i128, body[0..4].to_vec()),
    );
    Ok(())
}
