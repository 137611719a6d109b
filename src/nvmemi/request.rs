// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! NVMe-MI request encoding (C3, encode half).
//!
//! Produces the NVMe-MI message payload that sits after the MCTP
//! message-type byte: a 4-byte NMIMT/ROR + opcode + reserved header,
//! followed by opcode-specific request data. Framing (C2) and
//! fragmentation (C4) happen downstream of these functions.

use super::Nmimt;

fn message_header(nmimt: Nmimt, opcode: u8, ror: bool) -> [u8; 4] {
    let byte0 = ((ror as u8) << 7) | (nmimt as u8);
    [byte0, opcode, 0x00, 0x00]
}

/// Build an NVMe-MI MI-command request payload.
#[must_use]
pub fn mi_request(opcode: u8, request_data: &[u8]) -> Vec<u8> {
    let mut payload = message_header(Nmimt::MiCommand, opcode, false).to_vec();
    payload.extend_from_slice(request_data);
    payload
}

/// Build a tunnelled NVMe Admin command request payload: NSID followed by
/// CDW2..CDW15 (14 little-endian dwords).
#[must_use]
pub fn admin_request(admin_opcode: u8, nsid: u32, cdw2_15: &[u32; 14]) -> Vec<u8> {
    let mut payload = message_header(Nmimt::AdminCommand, admin_opcode, false).to_vec();
    payload.extend_from_slice(&nsid.to_le_bytes());
    for cdw in cdw2_15 {
        payload.extend_from_slice(&cdw.to_le_bytes());
    }
    payload
}

fn cdws(cdw10: u32, cdw11: u32) -> [u32; 14] {
    // cdw2..cdw9 are reserved for these commands; cdw10/cdw11 carry the
    // opcode-specific selectors.
    let mut cdw = [0u32; 14];
    cdw[8] = cdw10; // cdw2 is index 0, so cdw10 is index 8
    cdw[9] = cdw11;
    cdw
}

/// Admin opcode: Identify (0x06).
pub const ADMIN_OPCODE_IDENTIFY: u8 = 0x06;
/// Admin opcode: Get Log Page (0x02).
pub const ADMIN_OPCODE_GET_LOG_PAGE: u8 = 0x02;
/// Admin opcode: Get Features (0x0A).
pub const ADMIN_OPCODE_GET_FEATURES: u8 = 0x0A;
/// Admin opcode: Set Features (0x09).
pub const ADMIN_OPCODE_SET_FEATURES: u8 = 0x09;

/// Identify Controller (CNS=0x01).
#[must_use]
pub fn identify_controller(cid: u16) -> Vec<u8> {
    let cdw10 = 0x01u32 | ((cid as u32) << 16);
    admin_request(ADMIN_OPCODE_IDENTIFY, 0, &cdws(cdw10, 0))
}

/// Identify Namespace (CNS=0x00).
#[must_use]
pub fn identify_namespace(nsid: u32) -> Vec<u8> {
    admin_request(ADMIN_OPCODE_IDENTIFY, nsid, &cdws(0x00, 0))
}

/// Get Log Page. `num_dwords` is the zero's-based NUMD value split across
/// CDW10 (NUMDL) and CDW11 (NUMDU) per the NVMe base spec.
#[must_use]
pub fn get_log_page(lid: u8, num_dwords: u32, offset: u64, nsid: u32, rae: bool) -> Vec<u8> {
    let numdl = (num_dwords & 0xffff) as u32;
    let numdu = (num_dwords >> 16) & 0xffff;
    let cdw10 = (lid as u32) | (numdl << 16) | ((rae as u32) << 15);
    let cdw11 = numdu;
    let mut cdw = cdws(cdw10, cdw11);
    // CDW12/CDW13 carry the 64-bit log page offset (cdw2..15 indices: cdw12 is index 10).
    cdw[10] = (offset & 0xffff_ffff) as u32;
    cdw[11] = (offset >> 32) as u32;
    admin_request(ADMIN_OPCODE_GET_LOG_PAGE, nsid, &cdw)
}

/// Get Features.
#[must_use]
pub fn get_features(fid: u8, sel: u8, cdw11: u32) -> Vec<u8> {
    let cdw10 = (fid as u32) | ((sel as u32 & 0x7) << 8);
    admin_request(ADMIN_OPCODE_GET_FEATURES, 0, &cdws(cdw10, cdw11))
}

/// Set Features.
#[must_use]
pub fn set_features(fid: u8, cdw11: u32, cdw12: u32) -> Vec<u8> {
    let cdw10 = fid as u32;
    let mut cdw = cdws(cdw10, cdw11);
    cdw[10] = cdw12;
    admin_request(ADMIN_OPCODE_SET_FEATURES, 0, &cdw)
}
