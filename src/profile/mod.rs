// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Profiler (C8): orchestrate a curated, read-only probe sweep against a
//! [`Transport`] and persist it through a pluggable [`Sink`] — by default
//! a JSON file, matching the schema `spec.md` §6 defines. A captured
//! profile can later seed a [`crate::mock::MockDevice`]'s
//! `response_table` for deterministic replay.
//!
//! There's no teacher precedent for this layer (the donor crate is an
//! embedded device-side responder, not a host-side capture tool), so its
//! JSON persistence follows the `serde`/`serde_json` save/load idiom used
//! elsewhere in the retrieved pack, and its CLI-facing option struct
//! mirrors `spec.md` §6's flag list.

use std::collections::BTreeMap;
use std::fs::File;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fragment::Reassembler;
use crate::mctp::{self, DEFAULT_DEST_ADDR, DEFAULT_SRC_ADDR};
use crate::nvmemi::{admin_opcode, data_structure_type, mi_opcode, request};
use crate::transport::Transport;

/// Standard Configuration Get/Set identifiers the sweep probes.
const CONFIG_IDENTIFIERS: [(u8, &str); 3] = [
    (0x01, "SMBus/I2C Frequency"),
    (0x02, "Health Status Change"),
    (0x03, "MCTP Transmission Unit Size"),
];

/// Bytes read per VPD chunk during the sweep (`spec.md` §4.8).
const VPD_CHUNK_LEN: u8 = 32;

/// One probe the sweep issued and its captured request/response bytes
/// (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedCommand {
    pub opcode: u8,
    /// Human-readable request parameters, sorted by key for stable
    /// diffing between captures.
    pub params: BTreeMap<String, String>,
    pub request_hex: String,
    /// Full NVMe-MI response payload (4-byte header plus status and
    /// data), hex-encoded.
    pub response_hex: String,
    pub latency_ms: f64,
    pub timestamp: String,
}

/// `profile_version=1.0` metadata block (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub serial: String,
    pub model: String,
    pub firmware: String,
    pub nvme_mi_major_version: u8,
    pub nvme_mi_minor_version: u8,
    pub capture_date: String,
    pub total_commands: usize,
    pub avg_latency_ms: f64,
}

/// A complete captured device profile (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub profile_name: String,
    pub profile_version: String,
    pub metadata: ProfileMetadata,
    pub health_commands: Vec<CapturedCommand>,
    pub data_structure_commands: Vec<CapturedCommand>,
    pub configuration_commands: Vec<CapturedCommand>,
    pub vpd_commands: Vec<CapturedCommand>,
    /// Fingerprint (`spec.md` §6: `"{opcode:02x}:{params}"`) to response
    /// *data segment* (status + fields, no 4-byte header), hex-encoded —
    /// the same shape [`crate::mock::MockDevice::load_response_table`]
    /// consumes.
    pub response_table: BTreeMap<String, String>,
}

impl DeviceProfile {
    /// All captured commands across every category, in capture order
    /// within each category.
    pub fn all_commands(&self) -> impl Iterator<Item = &CapturedCommand> {
        self.health_commands
            .iter()
            .chain(&self.data_structure_commands)
            .chain(&self.configuration_commands)
            .chain(&self.vpd_commands)
    }

    /// Decode [`Self::response_table`] back into the raw-bytes form
    /// [`crate::mock::MockDevice::load_response_table`] expects.
    pub fn response_table_bytes(&self) -> Result<std::collections::HashMap<String, Vec<u8>>> {
        self.response_table
            .iter()
            .map(|(fp, hex_bytes)| {
                hex::decode(hex_bytes)
                    .map(|bytes| (fp.clone(), bytes))
                    .map_err(|e| Error::Usage(format!("bad response_table entry {fp}: {e}")))
            })
            .collect()
    }
}

/// Where a captured profile is persisted. The default is [`JsonFileSink`];
/// callers may implement their own for e.g. an in-memory test double.
pub trait Sink {
    fn write(&mut self, profile: &DeviceProfile) -> Result<()>;
}

/// Writes a profile as pretty-printed JSON to a file (`spec.md` §6).
pub struct JsonFileSink {
    path: std::path::PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for JsonFileSink {
    fn write(&mut self, profile: &DeviceProfile) -> Result<()> {
        let file = File::create(&self.path)
            .map_err(|e| Error::Usage(format!("create {}: {e}", self.path.display())))?;
        serde_json::to_writer_pretty(file, profile)
            .map_err(|e| Error::Usage(format!("write {}: {e}", self.path.display())))
    }
}

/// Read a previously captured profile back from JSON.
pub fn load(path: impl AsRef<std::path::Path>) -> Result<DeviceProfile> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::Usage(format!("open {}: {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| Error::Usage(format!("parse {}: {e}", path.display())))
}

/// Sweep behavior, set from CLI flags (`spec.md` §6).
#[derive(Debug, Clone)]
pub struct ProfileOptions {
    pub skip_vpd: bool,
    pub skip_admin: bool,
    pub timeout: Duration,
    pub delay: Duration,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            skip_vpd: false,
            skip_admin: false,
            timeout: Duration::from_millis(500),
            delay: Duration::from_millis(0),
        }
    }
}

/// The fingerprint a [`CapturedCommand`]'s request maps to — opcode plus
/// the hex encoding of the request's parameter bytes. This is a stable,
/// unambiguous serialization of "opcode + parameter tuple"
/// (`spec.md` §6's `sprintf("%02x:%s", opcode, sorted_param_kv)`) and is
/// exactly what [`crate::mock::MockDevice::handle_packet`] already
/// computes internally, so a captured profile can seed a mock's
/// `response_table` and replay byte-for-byte.
pub fn fingerprint(opcode: u8, request_params: &[u8]) -> String {
    format!("{opcode:02x}:{}", hex::encode(request_params))
}

/// Run the sweep against `transport` and assemble a [`DeviceProfile`].
/// `profile_name` is stored verbatim; everything else (serial, model,
/// firmware, NVMe-MI version) is read back from the device during the
/// sweep itself.
pub fn capture(
    profile_name: &str,
    transport: &mut dyn Transport,
    opts: &ProfileOptions,
) -> Result<DeviceProfile> {
    let mut health_commands = Vec::new();
    let mut data_structure_commands = Vec::new();
    let mut configuration_commands = Vec::new();
    let mut vpd_commands = Vec::new();
    let mut response_table = BTreeMap::new();

    let mut serial = "unknown".to_string();
    let mut model = "unknown".to_string();
    let mut firmware = "unknown".to_string();
    let mut mi_major = 0u8;
    let mut mi_minor = 0u8;

    // NVM Subsystem Health Status Poll.
    let (captured, decoded) = probe(
        transport,
        mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL,
        request::mi_request(mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL, &[]),
        BTreeMap::new(),
        opts,
    )?;
    record(&captured, &decoded, &mut response_table);
    health_commands.push(captured);

    // Read Data Structure: subsystem information.
    let subsystem_request = read_data_structure_request(data_structure_type::NVM_SUBSYSTEM_INFORMATION, 0, 0);
    let (captured, decoded) = probe(
        transport,
        mi_opcode::READ_NVME_MI_DATA_STRUCTURE,
        subsystem_request,
        BTreeMap::from([("dtyp".to_string(), "subsystem_info".to_string())]),
        opts,
    )?;
    if let Some(field) = decoded.fields.get("NVMe-MI Version") {
        if let crate::nvmemi::Typed::Text(ref version) = field.typed {
            if let Some((major, minor)) = version.split_once('.') {
                mi_major = major.parse().unwrap_or(0);
                mi_minor = minor.parse().unwrap_or(0);
            }
        }
    }
    record(&captured, &decoded, &mut response_table);
    data_structure_commands.push(captured);

    // Read Data Structure: port information.
    let port_request = read_data_structure_request(data_structure_type::PORT_INFORMATION, 0, 0);
    let (captured, decoded) = probe(
        transport,
        mi_opcode::READ_NVME_MI_DATA_STRUCTURE,
        port_request,
        BTreeMap::from([("dtyp".to_string(), "port_info".to_string())]),
        opts,
    )?;
    record(&captured, &decoded, &mut response_table);
    data_structure_commands.push(captured);

    // Read Data Structure: controller list, which drives the per-
    // controller health polls below.
    let controller_list_request = read_data_structure_request(data_structure_type::CONTROLLER_LIST, 0, 0);
    let (captured, decoded) = probe(
        transport,
        mi_opcode::READ_NVME_MI_DATA_STRUCTURE,
        controller_list_request,
        BTreeMap::from([("dtyp".to_string(), "controller_list".to_string())]),
        opts,
    )?;
    let controller_ids = controller_ids_from(&decoded);
    record(&captured, &decoded, &mut response_table);
    data_structure_commands.push(captured);

    // Controller Health Status Poll, one per controller id discovered
    // above.
    for &ctlid in &controller_ids {
        let request_data = controller_health_request(ctlid);
        let (captured, decoded) = probe(
            transport,
            mi_opcode::CONTROLLER_HEALTH_STATUS_POLL,
            request::mi_request(mi_opcode::CONTROLLER_HEALTH_STATUS_POLL, &request_data),
            BTreeMap::from([("ctlid".to_string(), ctlid.to_string())]),
            opts,
        )?;
        record(&captured, &decoded, &mut response_table);
        health_commands.push(captured);
    }

    // Configuration Get, for every standard identifier.
    for &(identifier, name) in &CONFIG_IDENTIFIERS {
        let request_data = [identifier, 0x00, 0x00, 0x00];
        let (captured, decoded) = probe(
            transport,
            mi_opcode::CONFIGURATION_GET,
            request::mi_request(mi_opcode::CONFIGURATION_GET, &request_data),
            BTreeMap::from([
                ("identifier".to_string(), format!("{identifier:#04x}")),
                ("name".to_string(), name.to_string()),
            ]),
            opts,
        )?;
        record(&captured, &decoded, &mut response_table);
        configuration_commands.push(captured);
    }

    if !opts.skip_vpd {
        let mut offset: u16 = 0;
        loop {
            let request_data = vpd_read_request(offset, VPD_CHUNK_LEN);
            let (captured, decoded) = probe(
                transport,
                mi_opcode::VPD_READ,
                request::mi_request(mi_opcode::VPD_READ, &request_data),
                BTreeMap::from([
                    ("offset".to_string(), offset.to_string()),
                    ("len".to_string(), VPD_CHUNK_LEN.to_string()),
                ]),
                opts,
            )?;
            let chunk_len = decoded
                .fields
                .get("VPD Chunk Length")
                .map(|f| match f.typed {
                    crate::nvmemi::Typed::Numeric(n) => n as usize,
                    _ => 0,
                })
                .unwrap_or(0);
            record(&captured, &decoded, &mut response_table);
            vpd_commands.push(captured);

            if crate::nvmemi::layouts::vpd_read::is_end_of_data(VPD_CHUNK_LEN as usize, chunk_len) {
                break;
            }
            offset += VPD_CHUNK_LEN as u16;
        }
    }

    if !opts.skip_admin {
        // Identify Controller, read into the data-structure bucket (it
        // describes the device the way Read Data Structure does).
        let (captured, decoded) = probe(
            transport,
            admin_opcode::IDENTIFY,
            request::identify_controller(0),
            BTreeMap::from([("cns".to_string(), "controller".to_string())]),
            opts,
        )?;
        if let Some(field) = decoded.fields.get("Serial Number") {
            serial = field.display.clone();
        }
        if let Some(field) = decoded.fields.get("Model Number") {
            model = field.display.clone();
        }
        if let Some(field) = decoded.fields.get("Firmware Revision") {
            firmware = field.display.clone();
        }
        record(&captured, &decoded, &mut response_table);
        data_structure_commands.push(captured);

        // Get Log Page, SMART/Health Information — read into the health
        // bucket alongside the MI-native health polls.
        let (captured, decoded) = probe(
            transport,
            admin_opcode::GET_LOG_PAGE,
            request::get_log_page(crate::nvmemi::log_page_id::SMART_HEALTH_INFORMATION, 127, 0, 0, false),
            BTreeMap::from([("lid".to_string(), "smart_health".to_string())]),
            opts,
        )?;
        record(&captured, &decoded, &mut response_table);
        health_commands.push(captured);
    }

    let total_commands = health_commands.len()
        + data_structure_commands.len()
        + configuration_commands.len()
        + vpd_commands.len();
    let avg_latency_ms = if total_commands == 0 {
        0.0
    } else {
        let sum: f64 = health_commands
            .iter()
            .chain(&data_structure_commands)
            .chain(&configuration_commands)
            .chain(&vpd_commands)
            .map(|c| c.latency_ms)
            .sum();
        sum / total_commands as f64
    };

    Ok(DeviceProfile {
        profile_name: profile_name.to_string(),
        profile_version: "1.0".to_string(),
        metadata: ProfileMetadata {
            serial,
            model,
            firmware,
            nvme_mi_major_version: mi_major,
            nvme_mi_minor_version: mi_minor,
            capture_date: Utc::now().to_rfc3339(),
            total_commands,
            avg_latency_ms,
        },
        health_commands,
        data_structure_commands,
        configuration_commands,
        vpd_commands,
        response_table,
    })
}

fn record(
    captured: &CapturedCommand,
    decoded: &crate::nvmemi::DecodedResponse,
    response_table: &mut BTreeMap<String, String>,
) {
    if !decoded.success {
        return;
    }
    let Ok(request_bytes) = hex::decode(&captured.request_hex) else {
        return;
    };
    let Ok(response_bytes) = hex::decode(&captured.response_hex) else {
        return;
    };
    if request_bytes.len() < 4 || response_bytes.len() < 4 {
        return;
    }
    let fp = fingerprint(captured.opcode, &request_bytes[4..]);
    response_table.insert(fp, hex::encode(&response_bytes[4..]));
}

fn read_data_structure_request(dtyp: u8, ctrlid: u16, portid: u8) -> Vec<u8> {
    let mut data = ctrlid.to_le_bytes().to_vec();
    data.push(portid);
    data.push(dtyp);
    data.extend_from_slice(&[0x00, 0x00, 0x00]);
    data
}

fn controller_health_request(ctlid: u16) -> Vec<u8> {
    let mut data = ctlid.to_le_bytes().to_vec();
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    data
}

fn vpd_read_request(offset: u16, len: u8) -> Vec<u8> {
    let mut data = offset.to_le_bytes().to_vec();
    data.push(len);
    data
}

fn controller_ids_from(decoded: &crate::nvmemi::DecodedResponse) -> Vec<u16> {
    let count = match decoded.fields.get("Controller List Count") {
        Some(field) => match field.typed {
            crate::nvmemi::Typed::Numeric(n) => n as usize,
            _ => 0,
        },
        None => 0,
    };
    (0..count)
        .filter_map(|i| decoded.fields.get(&format!("Controller List[{i}]")))
        .filter_map(|field| match field.typed {
            crate::nvmemi::Typed::Numeric(n) => Some(n as u16),
            _ => None,
        })
        .collect()
}

/// Send one request, wait for its (possibly fragmented) response, and
/// decode it, returning both the captured bytes/timing and the decoded
/// fields.
fn probe(
    transport: &mut dyn Transport,
    opcode: u8,
    request_payload: Vec<u8>,
    params: BTreeMap<String, String>,
    opts: &ProfileOptions,
) -> Result<(CapturedCommand, crate::nvmemi::DecodedResponse)> {
    if !opts.delay.is_zero() {
        std::thread::sleep(opts.delay);
    }

    let tag = transport.tags().next();
    let request_packet = mctp::build_single(
        DEFAULT_DEST_ADDR,
        DEFAULT_SRC_ADDR,
        0,
        0,
        tag,
        0x04,
        &request_payload,
        false,
    );

    let started = Instant::now();
    transport.send_packet(&request_packet)?;

    let mut reassembler = Reassembler::new();
    let response_payload = loop {
        let packet = transport.receive_packet(opts.timeout)?;
        let parsed = mctp::parse(&packet)?;
        if let Some(payload) = reassembler.feed(parsed.src_eid, &parsed)? {
            break payload;
        }
    };
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    let decoded = crate::nvmemi::response::decode(&response_payload, opcode, None)?;

    let captured = CapturedCommand {
        opcode,
        params,
        request_hex: hex::encode(&request_payload),
        response_hex: hex::encode(&response_payload),
        latency_ms,
        timestamp: Utc::now().to_rfc3339(),
    };
    Ok((captured, decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDevice;
    use crate::transport::MockTransport;

    #[test]
    fn sweep_captures_every_category_against_a_mock_device() {
        let mut device = MockDevice::new();
        device.set_controllers(vec![1, 2]);
        device.set_vpd(vec![0xAB; 10]);
        let mut transport = MockTransport::new(device);

        let opts = ProfileOptions::default();
        let profile = capture("bench", &mut transport, &opts).unwrap();

        assert!(!profile.health_commands.is_empty());
        assert!(!profile.data_structure_commands.is_empty());
        assert_eq!(profile.configuration_commands.len(), CONFIG_IDENTIFIERS.len());
        assert!(!profile.vpd_commands.is_empty());
        assert!(profile.metadata.total_commands > 0);
        assert!(!profile.response_table.is_empty());
    }

    #[test]
    fn skip_vpd_and_admin_options_are_honored() {
        let mut transport = MockTransport::new(MockDevice::new());
        let opts = ProfileOptions {
            skip_vpd: true,
            skip_admin: true,
            ..ProfileOptions::default()
        };
        let profile = capture("bench", &mut transport, &opts).unwrap();
        assert!(profile.vpd_commands.is_empty());
        // Without admin, the data structure bucket holds only the three
        // Read Data Structure probes.
        assert_eq!(profile.data_structure_commands.len(), 3);
    }

    #[test]
    fn captured_profile_replays_through_a_fresh_mock_device() {
        let mut source_device = MockDevice::new();
        source_device.set_temperature(33);
        let mut transport = MockTransport::new(source_device);
        let profile = capture("bench", &mut transport, &ProfileOptions::default()).unwrap();

        let mut replay_device = MockDevice::new();
        replay_device.load_response_table(profile.response_table_bytes().unwrap());
        let mut replay_transport = MockTransport::new(replay_device);

        let tag = replay_transport.tags().next();
        let request = mctp::build_single(
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_ADDR,
            0,
            0,
            tag,
            0x04,
            &request::mi_request(mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL, &[]),
            false,
        );
        replay_transport.send_packet(&request).unwrap();
        let response = replay_transport
            .receive_packet(Duration::from_millis(10))
            .unwrap();
        let parsed = mctp::parse(&response).unwrap();
        let decoded = crate::nvmemi::response::decode(
            &parsed.payload,
            mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL,
            None,
        )
        .unwrap();
        assert_eq!(
            decoded.fields.get("Composite Temperature").unwrap().display,
            "33\u{b0}C"
        );
    }
}
