// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Fallback decoder used when no opcode-specific decoder is registered and
//! the caller did not request strict mode (`spec.md` §4.3).

use crate::error::Result;
use crate::nvmemi::fields::FieldValue;
use crate::nvmemi::response::DecodedResponse;

pub fn decode(data: &[u8], response: &mut DecodedResponse) -> Result<()> {
    response.fields.insert(
        "Raw Data",
        FieldValue::bytes(hex::encode(data), data.to_vec()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn unregistered_opcode_falls_back_to_hex_dump() {
        // opcode 0xFE has no built-in decoder, so decode() dispatches here.
        let frame = [0x01, 0xfe, 0x00, 0x00, /*status*/ 0x00, 0xde, 0xad, 0xbe, 0xef];
        let response = crate::nvmemi::response::decode(&frame, 0xfe, None).unwrap();
        assert_eq!(
            response.fields.get("Raw Data").unwrap().display,
            "deadbeef"
        );
    }
}
