// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! `sphinx-profile`: capture or inspect an NVMe-MI device profile
//! (`spec.md` §6).
//!
//! Exit codes: 0 ok, 1 usage, 2 device error, 3 integrity error.

use std::time::Duration;

use clap::Parser;

use sphinx_mi::mock::MockDevice;
use sphinx_mi::profile::{self, JsonFileSink, ProfileOptions, Sink};
use sphinx_mi::transport::{HardwareTransport, MockTransport};
use sphinx_mi::Error;

#[derive(Parser)]
#[command(author, version, about = "Capture or inspect an NVMe-MI device profile")]
struct Args {
    /// Serial port the device is attached to. Required unless `--load` or
    /// `--mock-test` is given.
    #[arg(long)]
    port: Option<String>,

    /// Mux slot, 1..=8.
    #[arg(long, default_value_t = 1)]
    slot: u8,

    /// Where to write the captured profile.
    #[arg(long)]
    output: Option<String>,

    #[arg(long)]
    skip_vpd: bool,

    #[arg(long)]
    skip_admin: bool,

    /// Per-command timeout, in seconds.
    #[arg(long, default_value_t = 1)]
    timeout: u64,

    /// Delay before each command, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay: u64,

    /// Load a previously captured profile instead of capturing a new one.
    #[arg(long)]
    load: Option<String>,

    /// With `--load`: print a human-readable summary.
    #[arg(long)]
    summary: bool,

    /// With `--load`: re-decode every captured response and report any
    /// failures.
    #[arg(long)]
    verify: bool,

    /// With `--load`: diff this profile's captured commands against
    /// another profile's.
    #[arg(long)]
    compare: Option<String>,

    /// Capture against an in-process mock device instead of real
    /// hardware (useful in CI and for exercising this tool itself).
    #[arg(long)]
    mock_test: bool,
}

fn main() {
    let _ = simplelog::TermLogger::init(
        simplelog::LevelFilter::Warn,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );

    let args = Args::parse();
    std::process::exit(run(args));
}

fn run(args: Args) -> i32 {
    if let Some(path) = &args.load {
        return run_load(&args, path);
    }

    if !args.mock_test && args.port.is_none() {
        eprintln!("--port is required unless --load or --mock-test is given");
        return 1;
    }

    let Some(output) = &args.output else {
        eprintln!("--output is required when capturing a profile");
        return 1;
    };

    let opts = ProfileOptions {
        skip_vpd: args.skip_vpd,
        skip_admin: args.skip_admin,
        timeout: Duration::from_secs(args.timeout),
        delay: Duration::from_millis(args.delay),
    };

    let captured = if args.mock_test {
        let mut transport = MockTransport::new(MockDevice::new());
        profile::capture("mock", &mut transport, &opts)
    } else {
        match open_hardware(&args) {
            Ok(mut transport) => profile::capture(&args.port.clone().unwrap_or_default(), &mut transport, &opts),
            Err(code) => return code,
        }
    };

    let profile = match captured {
        Ok(profile) => profile,
        Err(Error::Integrity(e)) => {
            eprintln!("integrity error during capture: {e}");
            return 3;
        }
        Err(e) => {
            eprintln!("device error during capture: {e}");
            return 2;
        }
    };

    let mut sink = JsonFileSink::new(output);
    if let Err(e) = sink.write(&profile) {
        eprintln!("failed to write profile: {e}");
        return 1;
    }

    println!(
        "captured {} commands, avg latency {:.2}ms",
        profile.metadata.total_commands, profile.metadata.avg_latency_ms
    );
    0
}

fn open_hardware(args: &Args) -> Result<HardwareTransport, i32> {
    let port_name = args.port.as_ref().expect("checked by caller");
    let port = match serialport::new(port_name, 115_200).open() {
        Ok(port) => port,
        Err(e) => {
            eprintln!("failed to open {port_name}: {e}");
            return Err(2);
        }
    };
    HardwareTransport::new(port, args.slot).map_err(|e| {
        eprintln!("{e}");
        1
    })
}

fn run_load(args: &Args, path: &str) -> i32 {
    let profile = match profile::load(path) {
        Ok(profile) => profile,
        Err(e) => {
            eprintln!("failed to load {path}: {e}");
            return 1;
        }
    };

    if args.summary {
        print_summary(&profile);
    }

    if args.verify {
        if let Err(code) = verify(&profile) {
            return code;
        }
    }

    if let Some(other_path) = &args.compare {
        let other = match profile::load(other_path) {
            Ok(other) => other,
            Err(e) => {
                eprintln!("failed to load {other_path}: {e}");
                return 1;
            }
        };
        compare(&profile, &other);
    }

    if args.mock_test {
        let mut device = MockDevice::new();
        let table = match profile.response_table_bytes() {
            Ok(table) => table,
            Err(e) => {
                eprintln!("bad response table: {e}");
                return 3;
            }
        };
        device.load_response_table(table);
        println!("loaded {} response_table entries into a mock device", profile.response_table.len());
    }

    0
}

fn print_summary(profile: &sphinx_mi::profile::DeviceProfile) {
    println!("profile: {} (v{})", profile.profile_name, profile.profile_version);
    println!(
        "  {} {} fw {}",
        profile.metadata.serial, profile.metadata.model, profile.metadata.firmware
    );
    println!(
        "  NVMe-MI {}.{}, {} commands, avg latency {:.2}ms",
        profile.metadata.nvme_mi_major_version,
        profile.metadata.nvme_mi_minor_version,
        profile.metadata.total_commands,
        profile.metadata.avg_latency_ms
    );
}

fn verify(profile: &sphinx_mi::profile::DeviceProfile) -> Result<(), i32> {
    let mut failures = 0;
    for command in profile.all_commands() {
        let Ok(response_bytes) = hex::decode(&command.response_hex) else {
            eprintln!("{}: bad response_hex", command.opcode);
            failures += 1;
            continue;
        };
        if let Err(e) = sphinx_mi::nvmemi::decode(&response_bytes, command.opcode, None) {
            eprintln!("opcode {:#04x}: {e}", command.opcode);
            failures += 1;
        }
    }
    if failures > 0 {
        eprintln!("{failures} captured command(s) failed to re-decode");
        return Err(2);
    }
    println!("all {} captured commands re-decode cleanly", profile.metadata.total_commands);
    Ok(())
}

fn compare(a: &sphinx_mi::profile::DeviceProfile, b: &sphinx_mi::profile::DeviceProfile) {
    println!("{}: {} commands", a.profile_name, a.metadata.total_commands);
    println!("{}: {} commands", b.profile_name, b.metadata.total_commands);
    println!(
        "avg latency: {:.2}ms vs {:.2}ms",
        a.metadata.avg_latency_ms, b.metadata.avg_latency_ms
    );
}
