// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! Fragmentation and reassembly (C4).
//!
//! Fixed hardware constraints: outbound packets top out at 128 bytes on
//! the wire (120 bytes of payload per fragment once the SMBus envelope,
//! MCTP header, message-type byte and PEC are subtracted), inbound
//! packets at 256 bytes, and reassembly must complete within 100ms of the
//! first SOM fragment.

use std::time::{Duration, Instant};

use crate::error::{Error, Result, SequencingError};
use crate::mctp::{self, FrameFlags};

/// Maximum payload bytes the other constraints in `spec.md` §4.4 leave for
/// a single outbound fragment (128 − 1 src-addr − 4 MCTP header − 1
/// msg-type − 1 PEC − 1 spare byte of SMBus envelope slack = 120).
pub const MAX_TX_FRAGMENT_PAYLOAD: usize = 120;
/// Largest packet this core will accept on the receive side.
pub const MAX_RX_PACKET: usize = 256;
/// Target spacing between fragments of one outbound message; a property
/// of the transport (`spec.md` §9), not the fragmenter.
pub const INTER_FRAGMENT_DELAY: Duration = Duration::from_millis(5);
/// Deadline for a reassembly to complete after its first SOM fragment.
pub const REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(100);

/// One fragment of an outbound or inbound message.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub index: usize,
    pub seq: u8,
    pub som: bool,
    pub eom: bool,
    pub packet: Vec<u8>,
}

/// The complete set of wire packets produced by [`build_fragmented`] for
/// one outbound message.
#[derive(Debug, Clone)]
pub struct FragmentedMessage {
    pub fragments: Vec<Fragment>,
    pub total_len: usize,
}

/// Split `payload` into ≤120-byte chunks and frame each one. The final
/// fragment carries the MIC, if `ic` is set, since the MIC in this
/// implementation covers the *reassembled* message (`spec.md` §9, Open
/// Question resolved in favor of the DMTF/NVMe-MI intent).
#[must_use]
pub fn build_fragmented(
    dest_addr: u8,
    src_addr: u8,
    dest_eid: u8,
    src_eid: u8,
    tag: u8,
    msg_type: u8,
    payload: &[u8],
    ic: bool,
) -> FragmentedMessage {
    let chunks: Vec<&[u8]> = if payload.is_empty() {
        vec![&payload[..]]
    } else {
        payload.chunks(MAX_TX_FRAGMENT_PAYLOAD).collect()
    };
    let n = chunks.len();

    let mut fragments = Vec::with_capacity(n);
    let mut seq = 0u8;
    for (index, chunk) in chunks.into_iter().enumerate() {
        let som = index == 0;
        let eom = index == n - 1;
        let flags = FrameFlags {
            som,
            eom,
            seq,
            to: true,
            tag: tag & 0x07,
        };
        let is_final = eom;
        let packet = mctp::build_fragment(
            dest_addr,
            src_addr,
            dest_eid,
            src_eid,
            flags,
            msg_type,
            chunk,
            ic && is_final,
        );
        fragments.push(Fragment {
            index,
            seq,
            som,
            eom,
            packet,
        });
        seq = (seq + 1) % 4;
    }

    FragmentedMessage {
        fragments,
        total_len: payload.len(),
    }
}

/// Reassembles inbound fragments keyed by (source EID, tag, TO), arming a
/// 100ms deadline on the first SOM fragment.
#[derive(Debug)]
pub struct Reassembler {
    state: Option<InProgress>,
}

#[derive(Debug)]
struct InProgress {
    src_eid: u8,
    tag: u8,
    to: bool,
    expected_seq: u8,
    buffer: Vec<u8>,
    deadline: Instant,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// True if a reassembly is in progress and its deadline has passed.
    pub fn timed_out(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| Instant::now() >= s.deadline)
    }

    /// Check the deadline without a new fragment in hand — for a caller
    /// whose own transport-level receive has timed out while a
    /// reassembly was in progress.
    pub fn poll_timeout(&mut self) -> Result<()> {
        let expired = self.state.as_ref().is_some_and(|s| Instant::now() >= s.deadline);
        if expired {
            let tag = self.state.take().unwrap().tag;
            return Err(Error::Sequencing(SequencingError::MissingEom { tag }));
        }
        Ok(())
    }

    /// Feed one inbound parsed frame into the reassembler. Returns
    /// `Ok(Some(payload))` once the EOM fragment completes the message,
    /// `Ok(None)` if more fragments are expected, or an error on a
    /// sequencing violation or timeout.
    pub fn feed(&mut self, src_eid: u8, frame: &mctp::ParsedFrame) -> Result<Option<Vec<u8>>> {
        if let Some(ref s) = self.state {
            if Instant::now() >= s.deadline {
                self.state = None;
                return Err(Error::Sequencing(SequencingError::MissingEom { tag: s.tag }));
            }
        }

        if frame.som() {
            // A SOM fragment for a context that's already mid-reassembly
            // is a protocol violation, not a legitimate restart.
            if let Some(existing) = &self.state {
                if existing.src_eid == src_eid
                    && existing.tag == frame.tag()
                    && existing.to == frame.to()
                {
                    let tag = existing.tag;
                    self.state = None;
                    return Err(Error::Sequencing(SequencingError::UnexpectedSom { tag }));
                }
            }
            // Otherwise this SOM starts a fresh message, resetting any
            // stale buffer for a different (src, tag, to) context.
            self.state = Some(InProgress {
                src_eid,
                tag: frame.tag(),
                to: frame.to(),
                expected_seq: 1 % 4,
                buffer: frame.payload.clone(),
                deadline: Instant::now() + REASSEMBLY_TIMEOUT,
            });
            if frame.eom() {
                let payload = self.state.take().unwrap().buffer;
                return Ok(Some(payload));
            }
            return Ok(None);
        }

        let Some(s) = self.state.as_mut() else {
            // A middle/end fragment with no SOM ever seen: the
            // reassembler implicitly expected a start (seq 0).
            return Err(Error::Sequencing(SequencingError::SequenceGap {
                expected: 0,
                actual: frame.seq(),
            }));
        };

        if s.src_eid != src_eid || s.tag != frame.tag() || s.to != frame.to() {
            let expected = s.tag;
            self.state = None;
            return Err(Error::Sequencing(SequencingError::TagMismatch {
                expected,
                actual: frame.tag(),
            }));
        }

        if frame.seq() != s.expected_seq {
            let expected = s.expected_seq;
            let actual = frame.seq();
            self.state = None;
            return Err(Error::Sequencing(SequencingError::SequenceGap {
                expected,
                actual,
            }));
        }

        s.buffer.extend_from_slice(&frame.payload);
        s.expected_seq = (s.expected_seq + 1) % 4;

        if frame.eom() {
            let payload = self.state.take().unwrap().buffer;
            Ok(Some(payload))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mctp as wire;

    #[test]
    fn fragments_300_bytes_into_three_chunks() {
        let payload = vec![0xAAu8; 300];
        let msg = build_fragmented(0x3A, 0x21, 1, 2, 0, 0x04, &payload, false);
        assert_eq!(msg.fragments.len(), 3);
        assert_eq!(msg.total_len, 300);

        let lens: Vec<usize> = msg
            .fragments
            .iter()
            .map(|f| {
                let parsed = wire::parse(&f.packet).unwrap();
                parsed.payload.len()
            })
            .collect();
        assert_eq!(lens, vec![120, 120, 60]);

        assert!(msg.fragments[0].som && !msg.fragments[0].eom);
        assert!(!msg.fragments[1].som && !msg.fragments[1].eom);
        assert!(!msg.fragments[2].som && msg.fragments[2].eom);
        assert_eq!(
            msg.fragments.iter().map(|f| f.seq).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn reassembles_fragmented_message() {
        let payload: Vec<u8> = (0..300u32).map(|i| (i % 256) as u8).collect();
        let msg = build_fragmented(0x3A, 0x21, 9, 4, 2, 0x04, &payload, true);

        let mut reassembler = Reassembler::new();
        let mut result = None;
        for frag in &msg.fragments {
            let parsed = wire::parse(&frag.packet).unwrap();
            result = reassembler.feed(9, &parsed).unwrap();
        }
        assert_eq!(result, Some(payload));
    }

    #[test]
    fn single_fragment_message_round_trips() {
        let payload = b"short".to_vec();
        let msg = build_fragmented(0x3A, 0x21, 0, 0, 0, 0x04, &payload, false);
        assert_eq!(msg.fragments.len(), 1);
        assert!(msg.fragments[0].som && msg.fragments[0].eom);

        let mut reassembler = Reassembler::new();
        let parsed = wire::parse(&msg.fragments[0].packet).unwrap();
        let result = reassembler.feed(0, &parsed).unwrap();
        assert_eq!(result, Some(payload));
    }

    #[test]
    fn sequence_gap_is_rejected() {
        let payload = vec![0u8; 300];
        let msg = build_fragmented(0x3A, 0x21, 0, 0, 0, 0x04, &payload, false);
        let mut reassembler = Reassembler::new();

        let first = wire::parse(&msg.fragments[0].packet).unwrap();
        reassembler.feed(0, &first).unwrap();

        let third = wire::parse(&msg.fragments[2].packet).unwrap();
        let err = reassembler.feed(0, &third).unwrap_err();
        assert!(matches!(
            err,
            Error::Sequencing(SequencingError::SequenceGap { .. })
        ));
    }

    #[test]
    fn unexpected_som_mid_message() {
        // A second SOM for the same (src, tag, to) context while a
        // reassembly is still in progress is a protocol violation.
        let payload = vec![0u8; 300];
        let msg = build_fragmented(0x3A, 0x21, 0, 0, 4, 0x04, &payload, false);
        let mut reassembler = Reassembler::new();

        let first = wire::parse(&msg.fragments[0].packet).unwrap();
        reassembler.feed(0, &first).unwrap();

        let duplicate_som = wire::parse(&msg.fragments[0].packet).unwrap();
        let err = reassembler.feed(0, &duplicate_som).unwrap_err();
        assert!(matches!(
            err,
            Error::Sequencing(SequencingError::UnexpectedSom { .. })
        ));
    }

    #[test]
    fn non_som_fragment_with_no_prior_context_is_a_sequence_gap() {
        let payload = vec![0u8; 300];
        let msg = build_fragmented(0x3A, 0x21, 0, 0, 0, 0x04, &payload, false);
        let mut reassembler = Reassembler::new();
        let middle = wire::parse(&msg.fragments[1].packet).unwrap();
        let err = reassembler.feed(0, &middle).unwrap_err();
        assert!(matches!(
            err,
            Error::Sequencing(SequencingError::SequenceGap { .. })
        ));
    }

    #[test]
    fn tag_mismatch_between_fragments() {
        let payload = vec![0u8; 300];
        let msg_a = build_fragmented(0x3A, 0x21, 0, 0, 1, 0x04, &payload, false);
        let msg_b = build_fragmented(0x3A, 0x21, 0, 0, 2, 0x04, &payload, false);
        let mut reassembler = Reassembler::new();

        let first = wire::parse(&msg_a.fragments[0].packet).unwrap();
        reassembler.feed(0, &first).unwrap();

        let other_tag = wire::parse(&msg_b.fragments[1].packet).unwrap();
        let err = reassembler.feed(0, &other_tag).unwrap_err();
        assert!(matches!(
            err,
            Error::Sequencing(SequencingError::TagMismatch { .. })
        ));
    }
}
