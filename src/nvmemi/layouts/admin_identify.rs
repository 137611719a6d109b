// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Identify Controller (Admin opcode 0x06, CNS 0x01, `spec.md` §6).
//!
//! Only the handful of fields `spec.md` calls out are decoded: vendor id,
//! subsystem vendor id (the 4 bytes preceding SN), serial number (20B at
//! offset 4), model number (40B at offset 24) and firmware revision (8B
//! at offset 64) — the same offsets the teacher's
//! `AdminIdentifyControllerResponse` derives them at. ASCII fields are
//! trimmed of trailing spaces per `spec.md` §4.3.

use crate::error::{DecodeError, Error, Result};
use crate::nvmemi::fields::FieldValue;
use crate::nvmemi::response::DecodedResponse;

const SN_OFFSET: usize = 4;
const SN_LEN: usize = 20;
const MN_OFFSET: usize = 24;
const MN_LEN: usize = 40;
const FR_OFFSET: usize = 64;
const FR_LEN: usize = 8;
const MIN_LEN: usize = FR_OFFSET + FR_LEN;

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

pub fn decode(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if body.len() < MIN_LEN {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: body.len(),
            needed: MIN_LEN,
        }));
    }

    let vid = u16::from_le_bytes([body[0], body[1]]);
    let ssvid = u16::from_le_bytes([body[2], body[3]]);
    let sn = &body[SN_OFFSET..SN_OFFSET + SN_LEN];
    let mn = &body[MN_OFFSET..MN_OFFSET + MN_LEN];
    let fr = &body[FR_OFFSET..FR_OFFSET + FR_LEN];

    response.fields.insert(
        "Vendor ID",
        FieldValue::numeric(format!("{vid:#06x}"), vid as i128, body[0..2].to_vec()),
    );
    response.fields.insert(
        "Subsystem Vendor ID",
        FieldValue::numeric(format!("{ssvid:#06x}"), ssvid as i128, body[2..4].to_vec()),
    );
    response.fields.insert(
        "Serial Number",
        FieldValue::text(ascii_field(sn), sn.to_vec()),
    );
    response.fields.insert(
        "Model Number",
        FieldValue::text(ascii_field(mn), mn.to_vec()),
    );
    response.fields.insert(
        "Firmware Revision",
        FieldValue::text(ascii_field(fr), fr.to_vec()),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identify_body() -> Vec<u8> {
        let mut body = vec![0u8; MIN_LEN];
        body[0..2].copy_from_slice(&0x144du16.to_le_bytes());
        body[SN_OFFSET..SN_OFFSET + 7].copy_from_slice(b"SN1234 ");
        body[MN_OFFSET..MN_OFFSET + 9].copy_from_slice(b"MODEL-99 ");
        body[FR_OFFSET..FR_OFFSET + 5].copy_from_slice(b"1.0.0");
        body
    }

    #[test]
    fn decodes_ascii_identity_fields() {
        let mut response =
            crate::nvmemi::response::decode(&[0x04, 0x06, 0x00, 0x00, 0x00], 0x06, None).unwrap();
        decode(&identify_body(), &mut response).unwrap();
        assert_eq!(response.fields.get("Serial Number").unwrap().display, "SN1234");
        assert_eq!(response.fields.get("Model Number").unwrap().display, "MODEL-99");
        assert_eq!(response.fields.get("Firmware Revision").unwrap().display, "1.0.0");
    }

    #[test]
    fn truncated_identify_is_an_error() {
        let mut response =
            crate::nvmemi::response::decode(&[0x04, 0x06, 0x00, 0x00, 0x00], 0x06, None).unwrap();
        assert!(decode(&[0u8; 10], &mut response).is_err());
    }
}
