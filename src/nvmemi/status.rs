// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Response status codes (`spec.md` §3, §7), mirroring the teacher's own
//! `ResponseStatus` enumeration (minus the wire derive macros it no longer
//! needs here, since [`super::response::decode_with`] already extracts the
//! status byte before this module ever sees it).

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Status byte carried in every NVMe-MI/Admin response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum ResponseStatus {
    Success = 0x00,
    InternalError = 0x02,
    InvalidCommandOpcode = 0x03,
    InvalidParameter = 0x04,
    InvalidCommandSize = 0x05,
    InvalidCommandInputDataSize = 0x06,
}

impl ResponseStatus {
    /// A short human-readable name for `code`, or `None` for a status
    /// value this crate doesn't recognize (vendor-defined or reserved).
    pub fn name(code: u8) -> Option<&'static str> {
        Self::from_u8(code).map(|status| match status {
            Self::Success => "Success",
            Self::InternalError => "Internal Error",
            Self::InvalidCommandOpcode => "Invalid Command Opcode",
            Self::InvalidParameter => "Invalid Parameter",
            Self::InvalidCommandSize => "Invalid Command Size",
            Self::InvalidCommandInputDataSize => "Invalid Command Input Data Size",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_names() {
        assert_eq!(ResponseStatus::name(0x00), Some("Success"));
        assert_eq!(ResponseStatus::name(0x04), Some("Invalid Parameter"));
    }

    #[test]
    fn unknown_codes_have_no_name() {
        assert_eq!(ResponseStatus::name(0x7f), None);
    }
}
