// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Sphinx error taxonomy.
//!
//! Every fallible operation in this crate returns [`Error`]. The variants
//! mirror the kinds a caller needs to branch on (integrity failure vs.
//! framing vs. sequencing vs. timeout, ...); each carries enough context
//! (an offset, a field name, or the raw status byte) to report something
//! more useful than the kind alone.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A single NVMe-MI/MCTP error, tagged by the kind of failure that
/// produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("sequencing error: {0}")]
    Sequencing(#[from] SequencingError),

    #[error("timeout: {0}")]
    Timeout(#[from] TimeoutKind),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("usage error: {0}")]
    Usage(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("PEC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    BadPec { expected: u8, actual: u8 },
    #[error("MIC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    BadMic { expected: u32, actual: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("packet of {len} bytes is shorter than the minimum frame size ({min})")]
    ShortPacket { len: usize, min: usize },
    #[error("unsupported MCTP transport header version {0:#x}")]
    BadVersion(u8),
    #[error("wrong SMBus command code {0:#04x}, expected 0x0f")]
    WrongCommandCode(u8),
    #[error("reserved bits set in byte offset {offset}")]
    ReservedBitsSet { offset: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencingError {
    #[error("start-of-message fragment arrived mid-message (tag {tag})")]
    UnexpectedSom { tag: u8 },
    #[error("sequence gap: expected {expected}, got {actual}")]
    SequenceGap { expected: u8, actual: u8 },
    #[error("reassembly timed out waiting for end-of-message (tag {tag})")]
    MissingEom { tag: u8 },
    #[error("fragment tag {actual} does not match in-progress reassembly tag {expected}")]
    TagMismatch { expected: u8, actual: u8 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    #[error("no response within the per-command timeout")]
    Command,
    #[error("reassembly did not complete within 100ms of the first fragment")]
    Reassembly,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("response of {len} bytes is shorter than the {needed}-byte layout for this opcode")]
    TruncatedResponse { len: usize, needed: usize },
    #[error("no decoder registered for opcode {opcode:#04x} (vendor {vendor:?})")]
    UnknownOpcode { opcode: u8, vendor: Option<u16> },
}
