// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Read NVMe-MI Data Structure (MI opcode 0x00, `spec.md` §6).
//!
//! The response layout is type-specific (NVM Subsystem Information, Port
//! Information, Controller List, ...) but `decode()`'s public signature
//! (`spec.md` §4.3) carries only `(frame_payload, opcode, vendor_id)` —
//! the requested data-structure type never reaches the decoder. This
//! module resolves that ambiguity the same way profiler callers already
//! have to: Controller List is self-describing (a `numids` count whose
//! value exactly accounts for the remaining bytes), so it is tried first;
//! anything else is decoded as NVM Subsystem Information, the only other
//! subtype `spec.md` §6 gives a byte-level layout for. Port Information
//! records (and anything else) fall through to the raw byte list.

use crate::error::Result;
use crate::nvmemi::fields::FieldValue;
use crate::nvmemi::response::DecodedResponse;

pub fn decode(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if looks_like_controller_list(body) {
        decode_controller_list(body, response);
        return Ok(());
    }
    decode_subsystem_information(body, response)
}

fn looks_like_controller_list(body: &[u8]) -> bool {
    if body.len() < 2 {
        return false;
    }
    let numids = u16::from_le_bytes([body[0], body[1]]) as usize;
    body.len() == 2 + numids * 2
}

fn decode_controller_list(body: &[u8], response: &mut DecodedResponse) {
    let numids = u16::from_le_bytes([body[0], body[1]]);
    response.fields.insert(
        "Controller List Count",
        FieldValue::numeric(format!("{numids}"), numids as i128, body[0..2].to_vec()),
    );
    for (i, id) in body[2..].chunks_exact(2).enumerate() {
        let ctlid = u16::from_le_bytes([id[0], id[1]]);
        response.fields.insert(
            format!("Controller List[{i}]"),
            FieldValue::numeric(format!("{ctlid}"), ctlid as i128, id.to_vec()),
        );
    }
}

fn decode_subsystem_information(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if body.len() < 4 {
        response.fields.insert(
            "Raw Data",
            FieldValue::bytes(hex::encode(body), body.to_vec()),
        );
        response.partial = true;
        return Ok(());
    }
    let nump = body[0];
    let mjr = body[1];
    let mnr = body[2];
    let nnsc = body[3];

    response.fields.insert(
        "Number of Ports",
        FieldValue::numeric(format!("{nump}"), nump as i128, [nump]),
    );
    response.fields.insert(
        "NVMe-MI Version",
        FieldValue::text(format!("{mjr}.{mnr}"), vec![mjr, mnr]),
    );
    response.fields.insert(
        "Number of NVM Subsystems",
        FieldValue::numeric(format!("{nnsc}"), nnsc as i128, [nnsc]),
    );
    if body.len() > 4 {
        response.fields.insert(
            "Remaining Data",
            FieldValue::bytes(hex::encode(&body[4..]), body[4..].to_vec()),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_response() -> DecodedResponse {
        crate::nvmemi::response::decode(&[0x01, 0x00, 0x00, 0x00, 0x00], 0x00, None).unwrap()
    }

    #[test]
    fn controller_list_self_describes() {
        let mut body = 2u16.to_le_bytes().to_vec();
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes());

        let mut response = blank_response();
        decode(&body, &mut response).unwrap();
        assert_eq!(
            response.fields.get("Controller List Count").unwrap().display,
            "2"
        );
        assert_eq!(response.fields.get("Controller List[1]").unwrap().display, "2");
    }

    #[test]
    fn subsystem_information_decodes_version() {
        let body = [2u8, 2, 0, 1]; // nump=2, mjr=2, mnr=0, nnsc=1
        let mut response = blank_response();
        decode(&body, &mut response).unwrap();
        assert_eq!(
            response.fields.get("NVMe-MI Version").unwrap().display,
            "2.0"
        );
    }
}
