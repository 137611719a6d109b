// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Mock NVMe-MI device (C6): a single-threaded state machine that answers
//! the same wire bytes a real device would, used by tests, the profiler's
//! `--mock-test` mode, and [`crate::transport::MockTransport`].
//!
//! Grounded in the teacher's `nvme/mi/dev.rs` request-dispatch shape
//! (match NMIMT, then match opcode) but synchronous and response-bytes-out
//! rather than `async fn handle(...)` over an `AsyncRespChannel`, per this
//! crate's host-initiator/blocking architecture (`spec.md` §5).

use std::collections::HashMap;

use crate::error::{DecodeError, Error, Result};
use crate::fragment::{build_fragmented, MAX_TX_FRAGMENT_PAYLOAD};
use crate::mctp::{self, DEFAULT_DEST_ADDR, DEFAULT_SRC_ADDR};
use crate::nvmemi::{admin_opcode, mi_opcode, Nmimt};

/// Per-controller health fields synthesized by Controller Health Status
/// Poll (`spec.md` §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerHealth {
    pub composite_status: u8,
    pub composite_temperature_k: u16,
    pub percentage_drive_life_used: u8,
    pub available_spare: u8,
}

/// NVMe-MI version the mock advertises from Read Data Structure/NVM
/// Subsystem Information.
#[derive(Debug, Clone, Copy)]
pub struct NvmeMiVersion {
    pub major: u8,
    pub minor: u8,
}

impl Default for NvmeMiVersion {
    fn default() -> Self {
        Self { major: 2, minor: 0 }
    }
}

/// A mock NVMe-MI subsystem. Owns its state exclusively; concurrent access
/// is undefined (`spec.md` §5).
pub struct MockDevice {
    pub composite_temperature_k: u16,
    pub available_spare: u8,
    pub spare_threshold: u8,
    pub percentage_used: u8,
    pub warnings: u8,
    pub controller_ids: Vec<u16>,
    pub controller_health: HashMap<u16, ControllerHealth>,
    pub version: NvmeMiVersion,
    pub vpd: Vec<u8>,
    /// Captured-profile replay table: fingerprint -> raw response payload
    /// bytes (`spec.md` §4.6).
    pub response_table: Option<HashMap<String, Vec<u8>>>,
    dest_eid: u8,
    src_eid: u8,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            composite_temperature_k: 293, // 20C
            available_spare: 100,
            spare_threshold: 10,
            percentage_used: 0,
            warnings: 0,
            controller_ids: vec![1],
            controller_health: HashMap::from([(1, ControllerHealth::default())]),
            version: NvmeMiVersion::default(),
            vpd: Vec::new(),
            response_table: None,
            dest_eid: 0,
            src_eid: 0,
        }
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_temperature(&mut self, celsius: i32) {
        self.composite_temperature_k = (celsius + 273).max(0) as u16;
    }

    pub fn set_available_spare(&mut self, pct: u8) {
        self.available_spare = pct;
    }

    pub fn set_spare_threshold(&mut self, pct: u8) {
        self.spare_threshold = pct;
    }

    pub fn set_percentage_used(&mut self, pct: u8) {
        self.percentage_used = pct;
    }

    pub fn set_warnings(&mut self, bitmap: u8) {
        self.warnings = bitmap;
    }

    pub fn set_controllers(&mut self, ids: Vec<u16>) {
        for &id in &ids {
            self.controller_health.entry(id).or_default();
        }
        self.controller_ids = ids;
    }

    pub fn set_controller_health(&mut self, id: u16, health: ControllerHealth) {
        self.controller_health.insert(id, health);
    }

    pub fn set_vpd(&mut self, bytes: Vec<u8>) {
        self.vpd = bytes;
    }

    pub fn load_response_table(&mut self, table: HashMap<String, Vec<u8>>) {
        self.response_table = Some(table);
    }

    /// Handle one inbound wire packet (SMBus envelope + MCTP header +
    /// NVMe-MI payload) and return the wire packet(s) of the response: one
    /// packet if the response fits in 120 bytes, several if it must be
    /// fragmented (`spec.md` §4.6).
    pub fn handle_packet(&mut self, packet: &[u8]) -> Result<Vec<Vec<u8>>> {
        let parsed = mctp::parse(packet)?;
        self.dest_eid = parsed.src_eid;
        self.src_eid = parsed.dest_eid;

        if parsed.payload.len() < 4 {
            return Err(Error::Decode(DecodeError::TruncatedResponse {
                len: parsed.payload.len(),
                needed: 4,
            }));
        }
        let nmimt = Nmimt::try_from(parsed.payload[0]).unwrap_or(Nmimt::MiCommand);
        let opcode = parsed.payload[1];
        let request_data = &parsed.payload[4..];

        let fingerprint = format!("{opcode:02x}:{}", hex::encode(request_data));
        let response_payload = if let Some(bytes) = self
            .response_table
            .as_ref()
            .and_then(|t| t.get(&fingerprint))
        {
            bytes.clone()
        } else {
            self.synthesize(nmimt, opcode, request_data)
        };

        Ok(self.frame_response(nmimt, parsed.tag(), response_payload))
    }

    fn synthesize(&self, nmimt: Nmimt, opcode: u8, request_data: &[u8]) -> Vec<u8> {
        match nmimt {
            Nmimt::MiCommand => self.synthesize_mi(opcode, request_data),
            Nmimt::AdminCommand => self.synthesize_admin(opcode, request_data),
            Nmimt::Control => vec![0x00],
        }
    }

    fn synthesize_mi(&self, opcode: u8, request_data: &[u8]) -> Vec<u8> {
        match opcode {
            mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL => {
                let mut body = vec![0x00]; // status
                body.push(0x00); // subsystem status
                body.push(self.warnings);
                body.extend_from_slice(&self.composite_temperature_k.to_le_bytes());
                body.push(self.percentage_used);
                body.push(self.available_spare);
                body
            }
            mi_opcode::CONTROLLER_HEALTH_STATUS_POLL => {
                let mut body = vec![0x00];
                for id in &self.controller_ids {
                    let health = self.controller_health.get(id).copied().unwrap_or_default();
                    body.extend_from_slice(&id.to_le_bytes());
                    body.push(0x00); // reserved
                    body.push(health.composite_status);
                    body.extend_from_slice(&health.composite_temperature_k.to_le_bytes());
                    body.push(health.percentage_drive_life_used);
                    body.push(health.available_spare);
                    body.extend_from_slice(&[0u8; 8]); // pad to 16-byte record
                }
                body
            }
            mi_opcode::READ_NVME_MI_DATA_STRUCTURE => {
                let dtyp = request_data.get(3).copied().unwrap_or(0);
                let mut body = vec![0x00];
                match dtyp {
                    crate::nvmemi::data_structure_type::CONTROLLER_LIST => {
                        body.extend_from_slice(&(self.controller_ids.len() as u16).to_le_bytes());
                        for id in &self.controller_ids {
                            body.extend_from_slice(&id.to_le_bytes());
                        }
                    }
                    _ => {
                        body.push(1); // nump
                        body.push(self.version.major);
                        body.push(self.version.minor);
                        body.push(self.controller_ids.len() as u8); // nnsc
                    }
                }
                body
            }
            mi_opcode::CONFIGURATION_GET => {
                let mut body = vec![0x00];
                body.extend_from_slice(&400_000u32.to_le_bytes()); // SMBus freq placeholder
                body
            }
            mi_opcode::VPD_READ => {
                let offset = request_data
                    .get(0..2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
                    .unwrap_or(0);
                let len = request_data.get(2).copied().unwrap_or(32) as usize;
                let mut body = vec![0x00];
                let end = (offset + len).min(self.vpd.len());
                if offset < self.vpd.len() {
                    body.extend_from_slice(&self.vpd[offset..end]);
                }
                body
            }
            _ => vec![0x03], // InvalidCommandOpcode
        }
    }

    fn synthesize_admin(&self, opcode: u8, request_data: &[u8]) -> Vec<u8> {
        match opcode {
            admin_opcode::IDENTIFY => {
                let mut body = vec![0x00; 4097];
                body[0] = 0x00; // status
                let vid: u16 = 0xabcd;
                body[1..3].copy_from_slice(&vid.to_le_bytes());
                let sn = b"MOCKSERIAL0000000001";
                body[5..5 + sn.len()].copy_from_slice(sn);
                let mn = b"sphinx-mi mock device                   ";
                body[25..25 + mn.len().min(40)].copy_from_slice(&mn[..mn.len().min(40)]);
                let fr = b"1.0.0   ";
                body[65..65 + fr.len()].copy_from_slice(fr);
                body
            }
            admin_opcode::GET_LOG_PAGE => {
                // NSID (4 bytes) + CDW2..CDW9 (8 dwords) precede CDW10,
                // whose low byte is LID (`request::get_log_page`).
                let lid = request_data.get(4 + 8 * 4).copied().unwrap_or(0) & 0xff;
                if lid == crate::nvmemi::log_page_id::SMART_HEALTH_INFORMATION {
                    let mut body = vec![0u8; 513];
                    body[0] = 0x00; // status
                    body[1] = self.warnings;
                    body[2..4].copy_from_slice(&self.composite_temperature_k.to_le_bytes());
                    body[4] = self.available_spare;
                    body[5] = self.spare_threshold;
                    body[6] = self.percentage_used;
                    body
                } else {
                    vec![0x00; 513]
                }
            }
            _ => vec![0x03],
        }
    }

    fn frame_response(&self, nmimt: Nmimt, tag: u8, payload: Vec<u8>) -> Vec<Vec<u8>> {
        if payload.len() <= MAX_TX_FRAGMENT_PAYLOAD {
            vec![mctp::build_single(
                DEFAULT_SRC_ADDR,
                DEFAULT_DEST_ADDR,
                self.dest_eid,
                self.src_eid,
                tag,
                0x04,
                &ror_payload(nmimt, &payload),
                false,
            )]
        } else {
            build_fragmented(
                DEFAULT_SRC_ADDR,
                DEFAULT_DEST_ADDR,
                self.dest_eid,
                self.src_eid,
                tag,
                0x04,
                &ror_payload(nmimt, &payload),
                true,
            )
            .fragments
            .into_iter()
            .map(|f| f.packet)
            .collect()
        }
    }
}

/// `payload` here is the NVMe-MI *data segment* (status + fields); the
/// request/response header's ROR bit still needs to be set and the
/// original NMIMT echoed back, since decoders resolve against the
/// response header's class (MI vs. tunnelled Admin), not the opcode
/// alone.
fn ror_payload(nmimt: Nmimt, data_segment: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x80 | nmimt as u8, 0x00, 0x00, 0x00];
    payload.extend_from_slice(data_segment);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mctp::{build_single, DEFAULT_DEST_ADDR, DEFAULT_SRC_ADDR};
    use crate::nvmemi::request::{get_log_page, mi_request};

    #[test]
    fn admin_get_log_page_smart_reflects_device_state() {
        let mut device = MockDevice::new();
        device.set_warnings(0x01);
        device.set_available_spare(42);

        let request = build_single(
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_ADDR,
            0,
            0,
            0,
            0x04,
            &get_log_page(crate::nvmemi::log_page_id::SMART_HEALTH_INFORMATION, 127, 0, 0, false),
            false,
        );
        let responses = device.handle_packet(&request).unwrap();
        let parsed = mctp::parse(&responses[0]).unwrap();
        let decoded = crate::nvmemi::response::decode(
            &parsed.payload,
            crate::nvmemi::admin_opcode::GET_LOG_PAGE,
            None,
        )
        .unwrap();
        assert_eq!(
            decoded.fields.get("Available Spare").unwrap().display,
            "42%"
        );
    }

    #[test]
    fn admin_response_header_echoes_admin_command_class() {
        let request = build_single(
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_ADDR,
            0,
            0,
            0,
            0x04,
            &get_log_page(crate::nvmemi::log_page_id::SMART_HEALTH_INFORMATION, 127, 0, 0, false),
            false,
        );
        let responses = MockDevice::new().handle_packet(&request).unwrap();
        let parsed = mctp::parse(&responses[0]).unwrap();
        assert_eq!(parsed.payload[0] & 0x0f, Nmimt::AdminCommand as u8);
    }

    #[test]
    fn health_status_poll_reflects_set_temperature() {
        let mut device = MockDevice::new();
        device.set_temperature(45);

        let request = build_single(
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_ADDR,
            0,
            0,
            0,
            0x04,
            &mi_request(mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL, &[]),
            false,
        );
        let responses = device.handle_packet(&request).unwrap();
        assert_eq!(responses.len(), 1);

        let parsed = mctp::parse(&responses[0]).unwrap();
        let decoded = crate::nvmemi::response::decode(
            &parsed.payload,
            mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL,
            None,
        )
        .unwrap();
        assert_eq!(
            decoded.fields.get("Composite Temperature").unwrap().display,
            "45\u{b0}C"
        );
    }

    #[test]
    fn controller_list_reflects_set_controllers() {
        let mut device = MockDevice::new();
        device.set_controllers(vec![1, 2, 3]);

        let mut request_data = vec![0u16.to_le_bytes()[0], 0, 0]; // ctrlid(2) + portid(1)
        request_data.push(crate::nvmemi::data_structure_type::CONTROLLER_LIST);
        request_data.extend_from_slice(&[0, 0, 0]);

        let request = build_single(
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_ADDR,
            0,
            0,
            1,
            0x04,
            &mi_request(mi_opcode::READ_NVME_MI_DATA_STRUCTURE, &request_data),
            false,
        );
        let responses = device.handle_packet(&request).unwrap();
        let parsed = mctp::parse(&responses[0]).unwrap();
        let decoded = crate::nvmemi::response::decode(
            &parsed.payload,
            mi_opcode::READ_NVME_MI_DATA_STRUCTURE,
            None,
        )
        .unwrap();
        assert_eq!(
            decoded.fields.get("Controller List Count").unwrap().display,
            "3"
        );
    }

    #[test]
    fn profile_replay_table_takes_precedence() {
        let mut device = MockDevice::new();
        let mut table = HashMap::new();
        // fingerprint for NVM Subsystem Health Status Poll with no params.
        // Data segment: status, subsystem status, SMART warnings, temp
        // (LE u16), drive life used, available spare.
        table.insert("01:".to_string(), vec![0x00, 0x00, 0x00, 0x00, 0x00, 0u8, 99u8]);
        device.load_response_table(table);

        let request = build_single(
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_ADDR,
            0,
            0,
            0,
            0x04,
            &mi_request(mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL, &[]),
            false,
        );
        let responses = device.handle_packet(&request).unwrap();
        let parsed = mctp::parse(&responses[0]).unwrap();
        let decoded = crate::nvmemi::response::decode(
            &parsed.payload,
            mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL,
            None,
        )
        .unwrap();
        assert_eq!(
            decoded.fields.get("Available Spare").unwrap().display,
            "99%"
        );
    }
}
