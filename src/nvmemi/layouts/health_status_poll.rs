// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! NVM Subsystem Health Status Poll (MI opcode 0x01, `spec.md` §6).
//!
//! Layout after the status byte: subsystem status (1B), SMART warnings
//! bitmap (1B), composite temperature in Kelvin (LE u16), percentage
//! drive life used (1B), available spare (1B), then reserved bytes out to
//! 20 total (MI 1.2) or 32 total (MI 2.x, with endurance group warning,
//! reserved, and vendor-specific trailing u32s).

use crate::error::{DecodeError, Error, Result};
use crate::nvmemi::fields::FieldValue;
use crate::nvmemi::response::DecodedResponse;
use crate::nvmemi::warnings;

const MIN_BODY_LEN: usize = 6;

pub fn decode(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if body.len() < MIN_BODY_LEN {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: body.len(),
            needed: MIN_BODY_LEN,
        }));
    }

    let subsystem_status = body[0];
    let smart_warnings = body[1];
    let ctemp_k = u16::from_le_bytes([body[2], body[3]]);
    let drive_life_used = body[4];
    let available_spare = body[5];
    let ctemp_c = ctemp_k as i32 - 273;

    response.fields.insert(
        "Subsystem Status",
        FieldValue::numeric(
            format!("{subsystem_status:#04x}"),
            subsystem_status as i128,
            [subsystem_status],
        ),
    );
    response.fields.insert(
        "SMART Warnings",
        FieldValue::numeric(
            warning_display(smart_warnings, &warnings::describe(smart_warnings)),
            smart_warnings as i128,
            [smart_warnings],
        ),
    );
    response.fields.insert(
        "Composite Temperature",
        FieldValue::numeric(format!("{ctemp_c}\u{b0}C"), ctemp_c as i128, ctemp_k.to_le_bytes()),
    );
    response.fields.insert(
        "Percentage Drive Life Used",
        FieldValue::numeric(
            format!("{drive_life_used}%"),
            drive_life_used as i128,
            [drive_life_used],
        ),
    );
    response.fields.insert(
        "Available Spare",
        FieldValue::numeric(
            format!("{available_spare}%"),
            available_spare as i128,
            [available_spare],
        ),
    );

    // The 32-byte-total MI 2.x structure is 31 bytes here since `body`
    // already has the status byte stripped (`response.rs`); its trailing
    // 12 bytes are endurance group warning (u32), reserved (u32), and a
    // vendor-specific u32, so the warning sits at body[19..23]. A 1.2
    // response (19 bytes here) never reaches this branch.
    if body.len() >= 31 {
        let endurance_group_warning = u32::from_le_bytes(body[19..23].try_into().unwrap());
        let names = warnings::describe_endurance_group(endurance_group_warning as u8);
        response.fields.insert(
            "Endurance Group Critical Warning Summary",
            FieldValue::numeric(
                warning_display(endurance_group_warning as u8, &names),
                endurance_group_warning as i128,
                body[19..23].to_vec(),
            ),
        );
    }

    Ok(())
}

/// `{hex} (Name, Name)`, or just `{hex}` when nothing is set.
fn warning_display(raw: u8, names: &[&str]) -> String {
    if names.is_empty() {
        format!("{raw:#04x}")
    } else {
        format!("{raw:#04x} ({})", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_temperature_and_spare_fields() {
        let mut body = vec![0u8; MIN_BODY_LEN];
        body[0] = 0x00; // subsystem status
        body[1] = 0x00; // SMART warnings
        body[2..4].copy_from_slice(&318u16.to_le_bytes()); // 45C
        body[4] = 3; // drive life used
        body[5] = 97; // available spare

        let mut response = crate::nvmemi::response::decode(
            &[0x01, 0x01, 0x00, 0x00, 0x00],
            0x01,
            None,
        )
        .unwrap();
        decode(&body, &mut response).unwrap();

        assert_eq!(
            response.fields.get("Composite Temperature").unwrap().display,
            "45\u{b0}C"
        );
        assert_eq!(
            response.fields.get("Available Spare").unwrap().display,
            "97%"
        );
    }

    #[test]
    fn truncated_body_is_reported() {
        let mut response =
            crate::nvmemi::response::decode(&[0x01, 0x01, 0x00, 0x00, 0x00], 0x01, None).unwrap();
        let err = decode(&[0x00, 0x00], &mut response).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::TruncatedResponse { len: 2, needed: 6 })
        ));
    }
}
