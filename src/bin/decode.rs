// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! `sphinx-decode`: decode one captured NVMe-MI response frame from the
//! command line (`spec.md` §6).
//!
//! Exit codes: 0 success, 2 decode error (bad hex, truncated response,
//! unregistered strict opcode), 3 checksum failure (bad PEC/MIC).

use clap::Parser;
use serde::Serialize;

use sphinx_mi::{mctp, nvmemi, Error};

#[derive(Parser)]
#[command(author, version, about = "Decode a captured NVMe-MI response frame")]
struct Args {
    /// NVMe-MI or Admin-tunnelled opcode the frame is a response to.
    #[arg(long)]
    opcode: u8,

    /// Vendor id for vendor-specific decoders, if any is registered.
    #[arg(long = "vendor-id")]
    vendor_id: Option<u16>,

    /// Emit the decoded fields as JSON instead of plain text.
    #[arg(long)]
    json: bool,

    /// Fail instead of falling back to the generic hex-dump decoder when
    /// the opcode has no registered decoder.
    #[arg(long)]
    strict: bool,

    /// Hex-encoded wire frame: SMBus envelope + MCTP header + NVMe-MI
    /// payload + optional MIC + PEC.
    hex_bytes: String,
}

#[derive(Serialize)]
struct DecodedOutput<'a> {
    success: bool,
    status_code: u8,
    opcode: u8,
    partial: bool,
    fields: &'a nvmemi::FieldTable,
}

fn main() {
    let _ = simplelog::TermLogger::init(
        simplelog::LevelFilter::Warn,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );

    let args = Args::parse();

    let bytes = match hex::decode(args.hex_bytes.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("invalid hex input: {e}");
            std::process::exit(2);
        }
    };

    let parsed = match mctp::parse(&bytes) {
        Ok(parsed) => parsed,
        Err(Error::Integrity(e)) => {
            eprintln!("checksum failure: {e}");
            std::process::exit(3);
        }
        Err(e) => {
            eprintln!("framing error: {e}");
            std::process::exit(2);
        }
    };

    let decoded = match nvmemi::decode_with(&parsed.payload, args.opcode, args.vendor_id, args.strict) {
        Ok(decoded) => decoded,
        Err(e) => {
            eprintln!("decode error: {e}");
            std::process::exit(2);
        }
    };

    if args.json {
        let output = DecodedOutput {
            success: decoded.success,
            status_code: decoded.status_code,
            opcode: decoded.opcode,
            partial: decoded.partial,
            fields: &decoded.fields,
        };
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
    } else {
        for (name, field) in decoded.fields.iter() {
            println!("{name}: {}", field.display);
        }
    }
}
