// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Decoder registry (C7): a process-wide map from `(opcode, vendor_id)` to
//! a [`Decoder`](crate::nvmemi::response::Decoder).
//!
//! This is the one process-wide mutable structure in the crate
//! (`spec.md` §5, §7); everything else is owned by a single session. The
//! source this spec is drawn from used dynamic-dispatch decorators for
//! registration; per `spec.md` §9 this is re-expressed as an explicit
//! registration function returning a handle, with resolution-order
//! conflicts surfaced as a log warning rather than an abort.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::nvmemi::response::Decoder;
use crate::nvmemi::Nmimt;

type Key = (Nmimt, u8, Option<u16>);

#[derive(Default)]
struct Registry {
    decoders: HashMap<Key, Arc<dyn Decoder>>,
    next_id: u64,
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::default()))
}

/// An opaque handle to a registration, returned by [`register`]. Dropping
/// it does not unregister the decoder; the registry has process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderHandle(u64);

/// Register a decoder for `(nmimt, opcode)`, optionally scoped to
/// `vendor_id`.
///
/// If a decoder is already registered for the same key, the new one wins
/// and a warning is logged — registration conflicts are never fatal
/// (`spec.md` §4.7).
pub fn register(
    nmimt: Nmimt,
    opcode: u8,
    vendor_id: Option<u16>,
    decoder: Arc<dyn Decoder>,
) -> DecoderHandle {
    let mut guard = registry().lock().expect("decoder registry poisoned");
    let key = (nmimt, opcode, vendor_id);
    if guard.decoders.contains_key(&key) {
        log::warn!(
            "overriding existing decoder for {nmimt:?} opcode {opcode:#04x} vendor {vendor_id:?}"
        );
    }
    guard.decoders.insert(key, decoder);
    guard.next_id += 1;
    DecoderHandle(guard.next_id)
}

/// Resolve a decoder for `(nmimt, opcode, vendor_id)`. Resolution order:
/// an exact vendor match, then a vendor-agnostic registration for the
/// same `(nmimt, opcode)`, then `None` (the caller falls back to the
/// generic decoder).
pub fn resolve(nmimt: Nmimt, opcode: u8, vendor_id: Option<u16>) -> Option<Arc<dyn Decoder>> {
    let guard = registry().lock().expect("decoder registry poisoned");
    if let Some(vendor_id) = vendor_id {
        if let Some(d) = guard.decoders.get(&(nmimt, opcode, Some(vendor_id))) {
            return Some(d.clone());
        }
    }
    guard.decoders.get(&(nmimt, opcode, None)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::nvmemi::response::DecodedResponse;

    fn noop_decoder() -> Arc<dyn Decoder> {
        Arc::new(|_data: &[u8], _resp: &mut DecodedResponse| -> Result<()> { Ok(()) })
    }

    #[test]
    fn vendor_specific_preferred_over_generic() {
        let opcode = 0xE1;
        register(Nmimt::MiCommand, opcode, None, noop_decoder());
        register(Nmimt::MiCommand, opcode, Some(0xABCD), noop_decoder());

        assert!(resolve(Nmimt::MiCommand, opcode, Some(0xABCD)).is_some());
        assert!(resolve(Nmimt::MiCommand, opcode, Some(0x1234)).is_some()); // falls back to generic
        assert!(resolve(Nmimt::MiCommand, opcode, None).is_some());
    }

    #[test]
    fn unregistered_opcode_resolves_to_none() {
        assert!(resolve(Nmimt::MiCommand, 0xFE, None).is_none());
    }

    #[test]
    fn mi_and_admin_opcode_spaces_do_not_collide() {
        // MI Controller Health Status Poll (0x02) and Admin Get Log Page
        // (0x02) share the same numeric opcode but must resolve to
        // distinct decoders.
        register(Nmimt::MiCommand, 0xD2, None, noop_decoder());
        assert!(resolve(Nmimt::MiCommand, 0xD2, None).is_some());
        assert!(resolve(Nmimt::AdminCommand, 0xD2, None).is_none());
    }
}
