// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Get Log Page (Admin opcode 0x02, `spec.md` §6), tunnelled through C3.
//!
//! The requested log page identifier (LID) lives in the *request's*
//! CDW10, not in the response, and the registry keys decoders on opcode
//! alone (`spec.md` §4.7) — so only one decoder can be registered for
//! this opcode. The profiler's curated sweep (§4.8) only ever asks for
//! LID 0x02 (SMART Health Information), so that's what the registered
//! `decode` dispatches to; Error Information Log and Firmware Slot Info
//! have their own byte layouts implemented in [`error_information`] and
//! [`firmware_slot_info`] for direct use by callers who already know
//! their own LID.

use crate::error::{DecodeError, Error, Result};
use crate::nvmemi::fields::FieldValue;
use crate::nvmemi::response::DecodedResponse;
use crate::nvmemi::warnings;

const SMART_LOG_LEN: usize = 512;
const ERROR_LOG_ENTRY_LEN: usize = 64;
const FIRMWARE_SLOT_LOG_LEN: usize = 512;

/// Registered for Get Log Page; decodes as SMART Health Information.
pub fn decode(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    smart_health(body, response)
}

fn u128_le(bytes: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&bytes[0..16]);
    u128::from_le_bytes(buf)
}

/// SMART / Health Information Log (LID 0x02): 512 bytes.
pub fn smart_health(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if body.len() < SMART_LOG_LEN {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: body.len(),
            needed: SMART_LOG_LEN,
        }));
    }

    let critical_warning = body[0];
    let ctemp_k = u16::from_le_bytes([body[1], body[2]]);
    let avail_spare = body[3];
    let spare_threshold = body[4];
    let percentage_used = body[5];
    let endurance_group_warning = body[6];
    let data_units_read = u128_le(&body[32..48]);
    let data_units_written = u128_le(&body[48..64]);
    let host_read_commands = u128_le(&body[64..80]);
    let host_write_commands = u128_le(&body[80..96]);
    let controller_busy_time = u128_le(&body[96..112]);
    let power_cycles = u128_le(&body[112..128]);
    let power_on_hours = u128_le(&body[128..144]);
    let unsafe_shutdowns = u128_le(&body[144..160]);
    let media_errors = u128_le(&body[160..176]);
    let num_err_log_entries = u128_le(&body[176..192]);
    let ctemp_c = ctemp_k as i32 - 273;

    let warning_names = warnings::describe(critical_warning);
    let warning_display = if warning_names.is_empty() {
        format!("{critical_warning:#04x}")
    } else {
        format!("{critical_warning:#04x} ({})", warning_names.join(", "))
    };
    response.fields.insert(
        "Critical Warning",
        FieldValue::numeric(warning_display, critical_warning as i128, [critical_warning]),
    );
    response.fields.insert(
        "Composite Temperature",
        FieldValue::numeric(format!("{ctemp_c}\u{b0}C"), ctemp_c as i128, ctemp_k.to_le_bytes()),
    );
    response.fields.insert(
        "Available Spare",
        FieldValue::numeric(format!("{avail_spare}%"), avail_spare as i128, [avail_spare]),
    );
    response.fields.insert(
        "Available Spare Threshold",
        FieldValue::numeric(format!("{spare_threshold}%"), spare_threshold as i128, [spare_threshold]),
    );
    response.fields.insert(
        "Percentage Used",
        FieldValue::numeric(format!("{percentage_used}%"), percentage_used as i128, [percentage_used]),
    );
    response.fields.insert(
        "Endurance Group Critical Warning Summary",
        FieldValue::numeric(
            format!("{endurance_group_warning:#04x}"),
            endurance_group_warning as i128,
            [endurance_group_warning],
        ),
    );
    response.fields.insert(
        "Data Units Read",
        FieldValue::numeric(format!("{data_units_read}"), data_units_read as i128, body[32..48].to_vec()),
    );
    response.fields.insert(
        "Data Units Written",
        FieldValue::numeric(format!("{data_units_written}"), data_units_written as i128, body[48..64].to_vec()),
    );
    response.fields.insert(
        "Host Read Commands",
        FieldValue::numeric(format!("{host_read_commands}"), host_read_commands as i128, body[64..80].to_vec()),
    );
    response.fields.insert(
        "Host Write Commands",
        FieldValue::numeric(format!("{host_write_commands}"), host_write_commands as i128, body[80..96].to_vec()),
    );
    response.fields.insert(
        "Controller Busy Time",
        FieldValue::numeric(format!("{controller_busy_time}"), controller_busy_time as i128, body[96..112].to_vec()),
    );
    response.fields.insert(
        "Power Cycles",
        FieldValue::numeric(format!("{power_cycles}"), power_cycles as i128, body[112..128].to_vec()),
    );
    response.fields.insert(
        "Power On Hours",
        FieldValue::numeric(format!("{power_on_hours}"), power_on_hours as i128, body[128..144].to_vec()),
    );
    response.fields.insert(
        "Unsafe Shutdowns",
        FieldValue::numeric(format!("{unsafe_shutdowns}"), unsafe_shutdowns as i128, body[144..160].to_vec()),
    );
    response.fields.insert(
        "Media and Data Integrity Errors",
        FieldValue::numeric(format!("{media_errors}"), media_errors as i128, body[160..176].to_vec()),
    );
    response.fields.insert(
        "Number of Error Information Log Entries",
        FieldValue::numeric(format!("{num_err_log_entries}"), num_err_log_entries as i128, body[176..192].to_vec()),
    );

    Ok(())
}

/// Error Information Log (LID 0x01): a list of 64-byte entries.
pub fn error_information(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if body.len() < ERROR_LOG_ENTRY_LEN {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: body.len(),
            needed: ERROR_LOG_ENTRY_LEN,
        }));
    }

    for (i, entry) in body.chunks(ERROR_LOG_ENTRY_LEN).enumerate() {
        if entry.len() < ERROR_LOG_ENTRY_LEN {
            response.partial = true;
            break;
        }
        let error_count = u64::from_le_bytes(entry[0..8].try_into().unwrap());
        let sqid = u16::from_le_bytes([entry[8], entry[9]]);
        let cid = u16::from_le_bytes([entry[10], entry[11]]);
        let status_field = u16::from_le_bytes([entry[12], entry[13]]);
        let param_error_location = u16::from_le_bytes([entry[14], entry[15]]);
        let lba = u64::from_le_bytes(entry[16..24].try_into().unwrap());
        let nsid = u32::from_le_bytes(entry[24..28].try_into().unwrap());
        let transport_type = entry[29];
        let lpid = u16::from_le_bytes([entry[38], entry[39]]);

        if error_count == 0 {
            continue;
        }

        response.fields.insert(
            format!("Error {i} Count"),
            FieldValue::numeric(format!("{error_count}"), error_count as i128, entry[0..8].to_vec()),
        );
        response.fields.insert(
            format!("Error {i} Submission Queue ID"),
            FieldValue::numeric(format!("{sqid}"), sqid as i128, entry[8..10].to_vec()),
        );
        response.fields.insert(
            format!("Error {i} Command ID"),
            FieldValue::numeric(format!("{cid:#06x}"), cid as i128, entry[10..12].to_vec()),
        );
        response.fields.insert(
            format!("Error {i} Status Field"),
            FieldValue::numeric(format!("{status_field:#06x}"), status_field as i128, entry[12..14].to_vec()),
        );
        response.fields.insert(
            format!("Error {i} Parameter Error Location"),
            FieldValue::numeric(format!("{param_error_location:#06x}"), param_error_location as i128, entry[14..16].to_vec()),
        );
        response.fields.insert(
            format!("Error {i} LBA"),
            FieldValue::numeric(format!("{lba}"), lba as i128, entry[16..24].to_vec()),
        );
        response.fields.insert(
            format!("Error {i} Namespace ID"),
            FieldValue::numeric(format!("{nsid}"), nsid as i128, entry[24..28].to_vec()),
        );
        response.fields.insert(
            format!("Error {i} Transport Type"),
            FieldValue::numeric(format!("{transport_type:#04x}"), transport_type as i128, [transport_type]),
        );
        response.fields.insert(
            format!("Error {i} Log Page Identifier"),
            FieldValue::numeric(format!("{lpid:#06x}"), lpid as i128, entry[38..40].to_vec()),
        );
    }

    Ok(())
}

/// Firmware Slot Information (LID 0x03): 512 bytes, active firmware info
/// byte at offset 0, seven firmware revision strings (8 bytes each) at
/// offsets 8, 16, ..., 56.
pub fn firmware_slot_info(body: &[u8], response: &mut DecodedResponse) -> Result<()> {
    if body.len() < FIRMWARE_SLOT_LOG_LEN {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: body.len(),
            needed: FIRMWARE_SLOT_LOG_LEN,
        }));
    }

    let afi = body[0];
    let active_slot = afi & 0x7;
    response.fields.insert(
        "Active Firmware Info",
        FieldValue::numeric(format!("slot {active_slot}"), active_slot as i128, [afi]),
    );

    for slot in 1..=7u8 {
        let offset = 8 * slot as usize;
        let fr = &body[offset..offset + 8];
        let text = String::from_utf8_lossy(fr).trim_end().to_string();
        if text.is_empty() {
            continue;
        }
        response.fields.insert(
            format!("Firmware Slot {slot}"),
            FieldValue::text(text, fr.to_vec()),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_response() -> DecodedResponse {
        crate::nvmemi::response::decode(&[0x04, 0x02, 0x00, 0x00, 0x00], 0x02, None).unwrap()
    }

    #[test]
    fn smart_health_decodes_temperature_and_counters() {
        let mut body = vec![0u8; SMART_LOG_LEN];
        body[1..3].copy_from_slice(&308u16.to_le_bytes()); // 35C
        body[32..48].copy_from_slice(&100u128.to_le_bytes());

        let mut response = blank_response();
        smart_health(&body, &mut response).unwrap();
        assert_eq!(
            response.fields.get("Composite Temperature").unwrap().display,
            "35\u{b0}C"
        );
        assert_eq!(response.fields.get("Data Units Read").unwrap().display, "100");
    }

    #[test]
    fn error_information_skips_zero_count_entries() {
        let body = vec![0u8; ERROR_LOG_ENTRY_LEN * 2];
        let mut response = blank_response();
        error_information(&body, &mut response).unwrap();
        assert!(response.fields.iter().all(|(name, _)| !name.starts_with("Error ")));
    }

    #[test]
    fn firmware_slot_info_reads_active_slot_strings() {
        let mut body = vec![0u8; FIRMWARE_SLOT_LOG_LEN];
        body[0] = 0x01; // active slot 1
        body[8..14].copy_from_slice(b"1.0.0 ");
        let mut response = blank_response();
        firmware_slot_info(&body, &mut response).unwrap();
        assert_eq!(
            response.fields.get("Firmware Slot 1").unwrap().display,
            "1.0.0"
        );
    }
}
