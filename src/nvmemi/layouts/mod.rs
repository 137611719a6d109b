// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Opcode-specific response layouts (C3 decode side), registered into the
//! decoder registry (C7) on first use via [`register_builtin`].
//!
//! Each submodule implements the byte layout for one NVMe-MI or
//! Admin-tunnelled response, mirroring the teacher's `nvme.rs`/`nvme/mi.rs`
//! structures field-for-field but producing a [`super::response::DecodedResponse`]
//! instead of a `deku`-derived struct.

pub mod admin_identify;
pub mod admin_log_page;
pub mod configuration_get;
pub mod controller_health;
pub mod generic;
pub mod health_status_poll;
pub mod read_data_structure;
pub mod vpd_read;

use std::sync::{Arc, Once};

use super::{admin_opcode, mi_opcode, Nmimt};
use crate::registry;

/// Register every built-in decoder this crate ships. Idempotent: safe to
/// call from multiple call sites (the CLI binaries and test setup both do)
/// since the actual registration runs exactly once per process.
pub fn register_builtin() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        registry::register(
            Nmimt::MiCommand,
            mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL,
            None,
            Arc::new(health_status_poll::decode),
        );
        registry::register(
            Nmimt::MiCommand,
            mi_opcode::CONTROLLER_HEALTH_STATUS_POLL,
            None,
            Arc::new(controller_health::decode),
        );
        registry::register(
            Nmimt::MiCommand,
            mi_opcode::READ_NVME_MI_DATA_STRUCTURE,
            None,
            Arc::new(read_data_structure::decode),
        );
        registry::register(
            Nmimt::MiCommand,
            mi_opcode::CONFIGURATION_GET,
            None,
            Arc::new(configuration_get::decode),
        );
        registry::register(
            Nmimt::MiCommand,
            mi_opcode::VPD_READ,
            None,
            Arc::new(vpd_read::decode),
        );
        registry::register(
            Nmimt::AdminCommand,
            admin_opcode::IDENTIFY,
            None,
            Arc::new(admin_identify::decode),
        );
        registry::register(
            Nmimt::AdminCommand,
            admin_opcode::GET_LOG_PAGE,
            None,
            Arc::new(admin_log_page::decode),
        );
    });
}
