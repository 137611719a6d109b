// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Critical warning bitmaps (`spec.md` §6, NVMe Base 5.1.12.1.3 Figure
//! 206), mirroring the teacher's `CriticalWarning`/
//! `EnduranceGroupCriticalWarningSummary` `flagset::flags!` enums.

use flagset::{flags, FlagSet};

flags! {
    pub enum CriticalWarning: u8 {
        /// Available spare has fallen below the threshold.
        AvailableSpareBelowThreshold,
        /// Composite temperature is outside the critical range.
        TemperatureAboveOrBelowThreshold,
        /// NVM subsystem reliability has been degraded.
        ReliabilityDegraded,
        /// Media has been placed in read-only mode.
        ReadOnly,
        /// Volatile memory backup device has failed.
        VolatileMemoryBackupFailed,
        /// Persistent memory region has become read-only.
        PmrReadOnly,
    }

    pub enum EnduranceGroupCriticalWarningSummary: u8 {
        AvailableSpareBelowThreshold = 1 << 0,
        ReliabilityDegraded = 1 << 2,
        ReadOnly = 1 << 3,
    }
}

/// Names of every bit set in `bitmap`, in declaration order; empty when
/// `bitmap` is zero or carries only reserved/unrecognized bits.
pub fn describe(bitmap: u8) -> Vec<&'static str> {
    let set = FlagSet::<CriticalWarning>::new_truncated(bitmap);
    set.into_iter().map(flag_name).collect()
}

fn flag_name(flag: CriticalWarning) -> &'static str {
    match flag {
        CriticalWarning::AvailableSpareBelowThreshold => "Available Spare Below Threshold",
        CriticalWarning::TemperatureAboveOrBelowThreshold => "Temperature Above Or Below Threshold",
        CriticalWarning::ReliabilityDegraded => "Reliability Degraded",
        CriticalWarning::ReadOnly => "Read Only",
        CriticalWarning::VolatileMemoryBackupFailed => "Volatile Memory Backup Failed",
        CriticalWarning::PmrReadOnly => "PMR Read Only",
    }
}

/// Names of every bit set in an endurance group's critical warning
/// summary byte.
pub fn describe_endurance_group(bitmap: u8) -> Vec<&'static str> {
    let set = FlagSet::<EnduranceGroupCriticalWarningSummary>::new_truncated(bitmap);
    set.into_iter()
        .map(|flag| match flag {
            EnduranceGroupCriticalWarningSummary::AvailableSpareBelowThreshold => {
                "Available Spare Below Threshold"
            }
            EnduranceGroupCriticalWarningSummary::ReliabilityDegraded => "Reliability Degraded",
            EnduranceGroupCriticalWarningSummary::ReadOnly => "Read Only",
        })
        .collect()
}
