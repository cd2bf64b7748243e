//! # Framed Wire Protocol
//!
//! The host and device exchange single-frame-per-direction messages over
//! a byte-oriented duplex channel: no escaping, no CRC, no sequence
//! numbers (§9's "open question" on framing variants: this is the
//! minimal length-header framing the spec calls authoritative).
//!
//! A host→device frame is one header byte followed by 0–127 payload
//! bytes:
//!
//! ```text
//! [ header ] [ payload (N bytes) ]
//! header = (N as u7) | (execute_flag << 7)
//! ```
//!
//! A device→host frame is a length byte, an event id byte, and that many
//! data bytes:
//!
//! ```text
//! [ length ] [ event id ] [ data (length bytes) ]
//! ```
//!
//! Reserved event ids (`0xFF` boot, `0xFE` VM error) are not special to
//! this module — they're interpreted one layer up, by the driver, which
//! is where "surfaced to the caller, never fatal" (§7 class 4) actually
//! means something.

use crate::device::config::MAX_FRAME_PAYLOAD;
use crate::error::ProtocolError;

/// Bit set in the header byte when the payload should execute immediately
/// rather than being appended to the device dictionary.
const EXECUTE_FLAG: u8 = 0x80;

/// A host→device frame, ready to write to the transport as
/// `header ++ payload`.
pub struct HostFrame {
    pub execute: bool,
    pub payload: Vec<u8>,
}

impl HostFrame {
    pub fn define(payload: Vec<u8>) -> Result<Self, ProtocolError> {
        Self::new(false, payload)
    }

    pub fn execute(payload: Vec<u8>) -> Result<Self, ProtocolError> {
        Self::new(true, payload)
    }

    fn new(execute: bool, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::LengthTooLarge(payload.len() as u8));
        }
        Ok(HostFrame { execute, payload })
    }

    /// Serialize to the bytes that go on the wire: header then payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        let header = (self.payload.len() as u8) | if self.execute { EXECUTE_FLAG } else { 0 };
        out.push(header);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse a header byte the device side would have read, recovering
    /// `(execute_flag, declared_payload_len)`. Used by the device
    /// simulator and by tests that want to drive frames without going
    /// through [`HostFrame::to_bytes`].
    pub fn parse_header(header: u8) -> (bool, usize) {
        (header & EXECUTE_FLAG != 0, (header & !EXECUTE_FLAG) as usize)
    }
}

/// A device→host frame as decoded off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFrame {
    pub event_id: u8,
    pub data: Vec<u8>,
}

/// Decode one device→host frame from `bytes`, starting at offset 0.
/// Returns the frame and the number of bytes consumed, so a caller
/// reading a live stream can advance past it and keep looking for the
/// next frame start.
///
/// A length byte with no following event-id byte, or a declared length
/// that runs past the end of `bytes`, is a [`ProtocolError`] — these are
/// local framing errors, not device-reported VM errors.
pub fn decode_device_frame(bytes: &[u8]) -> Result<(DeviceFrame, usize), ProtocolError> {
    let &length = bytes.first().ok_or(ProtocolError::Truncated { declared: 1, got: 0 })?;
    let length = length as usize;
    let event_id = *bytes
        .get(1)
        .ok_or(ProtocolError::Truncated { declared: 1, got: 0 })?;
    let data_start = 2;
    let data_end = data_start + length;
    if bytes.len() < data_end {
        return Err(ProtocolError::Truncated {
            declared: length,
            got: bytes.len() - data_start,
        });
    }
    let data = bytes[data_start..data_end].to_vec();
    Ok((DeviceFrame { event_id, data }, data_end))
}

/// Encode a device→host frame the simulator would emit: used by
/// [`crate::transport::LoopbackTransport`] so the in-process device and
/// the driver exercise the exact same wire format real hardware would.
pub fn encode_device_frame(event_id: u8, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + data.len());
    out.push(data.len() as u8);
    out.push(event_id);
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_frame_header_encodes_length_and_execute_flag() {
        let frame = HostFrame::execute(vec![1, 2, 3]).unwrap();
        let bytes = frame.to_bytes();
        assert_eq!(bytes[0], 0x80 | 3);
        assert_eq!(&bytes[1..], &[1, 2, 3]);

        let frame = HostFrame::define(vec![9]).unwrap();
        assert_eq!(frame.to_bytes(), vec![1, 9]);
    }

    #[test]
    fn oversized_payload_is_rejected_before_framing() {
        let payload = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        assert!(HostFrame::execute(payload).is_err());
    }

    #[test]
    fn device_frame_round_trips_through_encode_decode() {
        let bytes = encode_device_frame(0x10, &[1, 2, 3]);
        let (frame, consumed) = decode_device_frame(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(frame, DeviceFrame { event_id: 0x10, data: vec![1, 2, 3] });
    }

    #[test]
    fn truncated_device_frame_is_a_protocol_error() {
        let bytes = vec![5, 0xFE, 1, 2]; // declares 5 bytes, only has 2
        assert!(decode_device_frame(&bytes).is_err());
    }

    #[test]
    fn empty_stream_is_a_protocol_error_not_a_panic() {
        assert!(decode_device_frame(&[]).is_err());
    }
}
