// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2026 Serial Cables
 */

//! In-process [`Transport`] backed by a [`crate::mock::MockDevice`], used
//! by the profiler's `--mock-test` mode and by integration tests that
//! want to drive the full request/response path without real hardware.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{Error, Result, TimeoutKind};
use crate::mctp::TagAllocator;
use crate::mock::MockDevice;

use super::Transport;

/// A transport whose "wire" is an in-process [`MockDevice`]: each
/// `send_packet` is handed straight to the device, and its response
/// packet(s) are queued up for the matching `receive_packet` calls.
pub struct MockTransport {
    device: MockDevice,
    tags: TagAllocator,
    pending: VecDeque<Vec<u8>>,
}

impl MockTransport {
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            tags: TagAllocator::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn device(&self) -> &MockDevice {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut MockDevice {
        &mut self.device
    }
}

impl Transport for MockTransport {
    fn send_packet(&mut self, bytes: &[u8]) -> Result<()> {
        let responses = self.device.handle_packet(bytes)?;
        self.pending.extend(responses);
        Ok(())
    }

    fn receive_packet(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        self.pending
            .pop_front()
            .ok_or(Error::Timeout(TimeoutKind::Command))
    }

    fn tags(&mut self) -> &mut TagAllocator {
        &mut self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mctp::{self, DEFAULT_DEST_ADDR, DEFAULT_SRC_ADDR};
    use crate::nvmemi::{mi_opcode, request::mi_request};

    #[test]
    fn round_trips_a_single_fragment_request() {
        let mut transport = MockTransport::new(MockDevice::new());
        let tag = transport.tags().next();
        let request = mctp::build_single(
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_ADDR,
            0,
            0,
            tag,
            0x04,
            &mi_request(mi_opcode::NVM_SUBSYSTEM_HEALTH_STATUS_POLL, &[]),
            false,
        );

        transport.send_packet(&request).unwrap();
        let response = transport.receive_packet(Duration::from_millis(10)).unwrap();
        let parsed = mctp::parse(&response).unwrap();
        assert!(parsed.som() && parsed.eom());
    }

    #[test]
    fn receive_without_a_pending_response_times_out() {
        let mut transport = MockTransport::new(MockDevice::new());
        let err = transport
            .receive_packet(Duration::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(TimeoutKind::Command)));
    }

    #[test]
    fn large_response_is_queued_as_multiple_fragments() {
        let mut transport = MockTransport::new(MockDevice::new());
        transport.device_mut().set_vpd(vec![0xAB; 400]);
        let tag = transport.tags().next();
        let request = mctp::build_single(
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_ADDR,
            0,
            0,
            tag,
            0x04,
            &mi_request(mi_opcode::VPD_READ, &[0, 0, 200]),
            false,
        );

        transport.send_packet(&request).unwrap();
        let first = transport.receive_packet(Duration::from_millis(10)).unwrap();
        let second = transport.receive_packet(Duration::from_millis(10)).unwrap();
        assert!(mctp::parse(&first).unwrap().som());
        assert!(mctp::parse(&second).unwrap().eom());
    }
}
