//! # Transport — the Byte-Oriented Duplex Channel
//!
//! Two implementations of [`Transport`]:
//!
//! - [`SerialTransport`] opens a real serial port via `serialport` and
//!   runs a background thread (the "event reader" of §5) that decodes
//!   device→host frames off the wire and hands them to the main thread
//!   over a channel. It never touches compiler state — only the line
//!   processor (the driver) does that.
//! - [`LoopbackTransport`] pairs the driver directly with an in-process
//!   [`DeviceVm`], for tests that want to exercise the full host↔device
//!   round trip without hardware. Frames are executed synchronously, so
//!   no background thread is needed — `poll_events` just drains what the
//!   simulated device produced.
//!
//! Both report framing/read/write failures as [`TransportError`] /
//! [`ProtocolError`]; per §7 these are surfaced to the driver and never
//! propagate out of the event reader into the line processor's control
//! flow.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

use crate::device::DeviceVm;
use crate::error::{ProtocolError, ToolError, TransportError};
use crate::protocol::{decode_device_frame, encode_device_frame, DeviceFrame};

/// How long a background read blocks before checking the stop flag again.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// The byte-oriented duplex channel a connected driver writes frames to
/// and reads device events from.
pub trait Transport: Send {
    /// Write one fully-serialized frame (header + payload).
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Drain whatever device frames have arrived since the last poll.
    /// Never blocks.
    fn poll_events(&mut self) -> Result<Vec<DeviceFrame>, ToolError>;

    /// Tear down the connection (stop any background reader, close the port).
    fn close(&mut self);
}

/// A real serial connection, opened by the `connect` directive.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    stop: Arc<AtomicBool>,
    events: Receiver<Result<DeviceFrame, ProtocolError>>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    /// Open `port_name` at a fixed baud rate and start the background
    /// event reader. The reader gets its own cloned handle to the port;
    /// the returned `SerialTransport` keeps the original for writes.
    pub fn open(port_name: &str) -> Result<Self, TransportError> {
        const BAUD_RATE: u32 = 115_200;

        let port = serialport::new(port_name, BAUD_RATE)
            .timeout(POLL_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                port: port_name.to_string(),
                source,
            })?;
        let reader_port = port
            .try_clone()
            .map_err(|source| TransportError::Open {
                port: port_name.to_string(),
                source,
            })?;

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let reader_stop = Arc::clone(&stop);
        let handle = std::thread::spawn(move || event_reader_loop(reader_port, reader_stop, tx));

        Ok(SerialTransport {
            port,
            stop,
            events: rx,
            reader: Some(handle),
        })
    }
}

impl Transport for SerialTransport {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes).map_err(TransportError::Write)?;
        self.port.flush().map_err(TransportError::Write)
    }

    fn poll_events(&mut self) -> Result<Vec<DeviceFrame>, ToolError> {
        let mut out = Vec::new();
        for item in self.events.try_iter() {
            out.push(item?);
        }
        Ok(out)
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Body of the background event reader thread: read bytes off the port,
/// accumulate them, and decode as many complete frames as the buffer
/// holds. A length byte that promises more data than has arrived yet
/// just waits for the next read; there is no other framing error this
/// minimal protocol can detect mid-stream (§9's framing open question).
fn event_reader_loop(
    mut port: Box<dyn serialport::SerialPort>,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<Result<DeviceFrame, ProtocolError>>,
) {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !stop.load(Ordering::SeqCst) {
        match port.read(&mut byte) {
            Ok(0) => continue,
            Ok(_) => buf.push(byte[0]),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                continue
            }
            Err(_) => break,
        }
        loop {
            match decode_device_frame(&buf) {
                Ok((frame, consumed)) => {
                    buf.drain(..consumed);
                    if tx.send(Ok(frame)).is_err() {
                        return;
                    }
                }
                Err(ProtocolError::Truncated { .. }) => break,
                Err(other) => {
                    warn!("re-synchronizing after a framing error: {other}");
                    buf.clear();
                    let _ = tx.send(Err(other));
                    break;
                }
            }
        }
    }
}

/// Pairs the driver with an in-process [`DeviceVm`]: every written frame
/// runs synchronously against the simulated device, and its emitted
/// events are immediately available to [`LoopbackTransport::poll_events`].
pub struct LoopbackTransport {
    device: DeviceVm,
    inbox: Vec<u8>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        let mut device = DeviceVm::new();
        let inbox = drain_to_bytes(&mut device);
        LoopbackTransport { device, inbox }
    }

    /// Direct access to the simulated device, for tests that want to
    /// assert on its state beyond what arrives as wire events.
    pub fn device(&self) -> &DeviceVm {
        &self.device
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn drain_to_bytes(device: &mut DeviceVm) -> Vec<u8> {
    let mut bytes = Vec::new();
    for event in device.drain_events() {
        bytes.extend(encode_device_frame(event.id, &event.data));
    }
    bytes
}

impl Transport for LoopbackTransport {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let &header = bytes.first().ok_or(TransportError::NotConnected)?;
        let (execute, len) = crate::protocol::HostFrame::parse_header(header);
        let payload = bytes
            .get(1..1 + len)
            .ok_or(TransportError::UnexpectedEof(len))?;
        if execute {
            self.device.execute(payload);
        } else {
            self.device.commit(payload);
        }
        self.inbox.extend(drain_to_bytes(&mut self.device));
        Ok(())
    }

    fn poll_events(&mut self) -> Result<Vec<DeviceFrame>, ToolError> {
        let mut out = Vec::new();
        loop {
            match decode_device_frame(&self.inbox) {
                Ok((frame, consumed)) => {
                    self.inbox.drain(..consumed);
                    out.push(frame);
                }
                Err(_) => break,
            }
        }
        Ok(out)
    }

    fn close(&mut self) {}
}
