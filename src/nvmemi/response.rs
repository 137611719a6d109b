// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! NVMe-MI response decoding (C3, decode half).

use crate::error::{DecodeError, Error, Result};
use crate::nvmemi::fields::FieldTable;
use crate::nvmemi::Nmimt;
use crate::registry;

/// A decoded NVMe-MI or tunnelled Admin response.
#[derive(Debug, Clone)]
pub struct DecodedResponse {
    pub success: bool,
    pub status_code: u8,
    pub opcode: u8,
    pub fields: FieldTable,
    pub raw_bytes: Vec<u8>,
    /// Set when decoding stopped early (truncated input, decoder bailed
    /// partway through) but a subset of fields was still populated.
    pub partial: bool,
}

impl DecodedResponse {
    fn new(opcode: u8, raw_bytes: &[u8]) -> Self {
        Self {
            success: true,
            status_code: 0,
            opcode,
            fields: FieldTable::new(),
            raw_bytes: raw_bytes.to_vec(),
            partial: false,
        }
    }
}

/// A decoder maps the data segment of a response (everything after the
/// 4-byte NVMe-MI message header) into named fields on a
/// [`DecodedResponse`] that already carries the status byte.
pub trait Decoder: Send + Sync {
    fn decode(&self, data: &[u8], response: &mut DecodedResponse) -> Result<()>;
}

impl<F> Decoder for F
where
    F: Fn(&[u8], &mut DecodedResponse) -> Result<()> + Send + Sync,
{
    fn decode(&self, data: &[u8], response: &mut DecodedResponse) -> Result<()> {
        self(data, response)
    }
}

/// Decode a frame payload (the bytes after MCTP framing, i.e. what
/// [`crate::mctp::parse`] returns as `payload`) for a known opcode,
/// consulting the decoder registry (C7) and falling back to a generic hex
/// dump when nothing is registered and `strict` is false.
pub fn decode(frame_payload: &[u8], opcode: u8, vendor_id: Option<u16>) -> Result<DecodedResponse> {
    decode_with(frame_payload, opcode, vendor_id, false)
}

/// As [`decode`], but returns [`Error::Decode`]'s `UnknownOpcode` variant
/// instead of falling back to the generic decoder when `strict` is set.
pub fn decode_with(
    frame_payload: &[u8],
    opcode: u8,
    vendor_id: Option<u16>,
    strict: bool,
) -> Result<DecodedResponse> {
    crate::nvmemi::layouts::register_builtin();

    if frame_payload.len() < 4 {
        return Err(Error::Decode(DecodeError::TruncatedResponse {
            len: frame_payload.len(),
            needed: 4,
        }));
    }

    // The registry keys decoders on the command class (MI vs. Admin) as
    // well as the opcode, since the two opcode spaces overlap (see
    // `nvmemi::Nmimt`); the class comes from the header byte already
    // present in `frame_payload`, not from a separate CLI/caller flag.
    let nmimt = Nmimt::try_from(frame_payload[0]).unwrap_or(Nmimt::MiCommand);

    let mut response = DecodedResponse::new(opcode, frame_payload);

    let data = &frame_payload[4..];
    if data.is_empty() {
        response.status_code = 0;
    } else {
        response.status_code = data[0];
    }
    response.success = response.status_code == 0;
    let status_code = response.status_code;
    let status_display = match crate::nvmemi::status::ResponseStatus::name(status_code) {
        Some(name) => format!("{status_code:#04x} ({name})"),
        None => format!("{status_code:#04x}"),
    };
    response.fields.insert(
        "Status",
        crate::nvmemi::fields::FieldValue::numeric(
            status_display,
            status_code as i128,
            [status_code],
        ),
    );

    if !response.success {
        return Ok(response);
    }

    // Decoders operate on the bytes after the status byte; the status
    // itself is already captured above.
    let body = if data.is_empty() { data } else { &data[1..] };

    match registry::resolve(nmimt, opcode, vendor_id) {
        Some(decoder) => match decoder.decode(body, &mut response) {
            Ok(()) => Ok(response),
            Err(Error::Decode(DecodeError::TruncatedResponse { len, needed })) => {
                response.partial = true;
                response.success = false;
                response.fields.insert(
                    "Decode Error",
                    crate::nvmemi::fields::FieldValue::text(
                        format!("truncated response: got {len} bytes, needed {needed}"),
                        Vec::new(),
                    ),
                );
                Ok(response)
            }
            Err(other) => Err(other),
        },
        None => {
            if strict {
                Err(Error::Decode(DecodeError::UnknownOpcode { opcode, vendor: vendor_id }))
            } else {
                crate::nvmemi::layouts::generic::decode(body, &mut response)?;
                Ok(response)
            }
        }
    }
}
