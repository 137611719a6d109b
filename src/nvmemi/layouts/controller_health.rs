// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Controller Health Status Poll (MI opcode 0x02, `spec.md` §6).
//!
//! The response body is a list of per-controller health records, 16 bytes
//! each for NVMe-MI 1.2 or 32 bytes for 2.x: controller id (LE u16),
//! reserved byte, composite controller status byte, composite temperature
//! (LE u16 Kelvin), percentage drive life used, available spare, then
//! reserved out to the record size.

use crate::error::{DecodeError, Error, Result};
use crate::nvmemi::fields::FieldValue;
use crate::nvmemi::response::DecodedResponse;

const RECORD_LEN_12: usize = 16;
const RECORD_LEN_2X: usize = 32;

pub fn decode(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if body.is_empty() {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: 0,
            needed: RECORD_LEN_12,
        }));
    }

    // `len % 32` cannot tell a single 2.x record from two 1.2 records: 32
    // divides evenly into both. 1.2 is the baseline format, so a body that
    // divides evenly into 16-byte records is read as 1.2; only a length
    // that 16 cannot cover exactly falls back to the 32-byte 2.x layout.
    let record_len = if body.len() % RECORD_LEN_12 == 0 {
        RECORD_LEN_12
    } else {
        RECORD_LEN_2X
    };

    if body.len() < record_len {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: body.len(),
            needed: record_len,
        }));
    }

    for (i, record) in body.chunks(record_len).enumerate() {
        if record.len() < record_len {
            response.partial = true;
            break;
        }
        let ctlid = u16::from_le_bytes([record[0], record[1]]);
        let ccs = record[3];
        let ctemp_k = u16::from_le_bytes([record[4], record[5]]);
        let pdlu = record[6];
        let spare = record[7];
        let ctemp_c = ctemp_k as i32 - 273;

        response.fields.insert(
            format!("Controller {i} ID"),
            FieldValue::numeric(format!("{ctlid}"), ctlid as i128, record[0..2].to_vec()),
        );
        response.fields.insert(
            format!("Controller {i} Status"),
            FieldValue::numeric(format!("{ccs:#04x}"), ccs as i128, [ccs]),
        );
        response.fields.insert(
            format!("Controller {i} Temperature"),
            FieldValue::numeric(format!("{ctemp_c}\u{b0}C"), ctemp_c as i128, ctemp_k.to_le_bytes()),
        );
        response.fields.insert(
            format!("Controller {i} Drive Life Used"),
            FieldValue::numeric(format!("{pdlu}%"), pdlu as i128, [pdlu]),
        );
        response.fields.insert(
            format!("Controller {i} Available Spare"),
            FieldValue::numeric(format!("{spare}%"), spare as i128, [spare]),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_response() -> DecodedResponse {
        crate::nvmemi::response::decode(&[0x01, 0x02, 0x00, 0x00, 0x00], 0x02, None).unwrap()
    }

    #[test]
    fn single_controller_record_1_2() {
        let mut record = vec![0u8; RECORD_LEN_12];
        record[0..2].copy_from_slice(&1u16.to_le_bytes());
        record[3] = 0x01; // RDY
        record[4..6].copy_from_slice(&308u16.to_le_bytes()); // 35C
        record[6] = 10;
        record[7] = 95;

        let mut response = blank_response();
        decode(&record, &mut response).unwrap();

        assert_eq!(response.fields.get("Controller 0 ID").unwrap().display, "1");
        assert_eq!(
            response.fields.get("Controller 0 Temperature").unwrap().display,
            "35\u{b0}C"
        );
    }

    #[test]
    fn multiple_controllers_are_all_decoded() {
        let body = vec![0u8; RECORD_LEN_12 * 2];
        let mut response = blank_response();
        decode(&body, &mut response).unwrap();
        assert!(response.fields.get("Controller 0 ID").is_some());
        assert!(response.fields.get("Controller 1 ID").is_some());
    }
}
