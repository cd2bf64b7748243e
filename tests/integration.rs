//! End-to-end scenarios from the spec's §8 worked examples, driving the
//! real [`Driver`] against a [`LoopbackTransport`] (an in-process
//! [`stitchforth::device::DeviceVm`] standing in for hardware) and a thin
//! recording wrapper that captures exactly the frame bytes the driver
//! would have put on the wire.

use std::sync::{Arc, Mutex};

use stitchforth::driver::Driver;
use stitchforth::error::ToolError;
use stitchforth::opcodes as op;
use stitchforth::protocol::DeviceFrame;
use stitchforth::transport::{LoopbackTransport, Transport};

/// Wraps a [`LoopbackTransport`] and records every frame handed to
/// `write_frame`, so tests can assert on exact wire bytes without the
/// driver exposing its transport.
struct RecordingTransport {
    inner: LoopbackTransport,
    log: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Transport for RecordingTransport {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), stitchforth::error::TransportError> {
        self.log.lock().unwrap().push(bytes.to_vec());
        self.inner.write_frame(bytes)
    }

    fn poll_events(&mut self) -> Result<Vec<DeviceFrame>, ToolError> {
        self.inner.poll_events()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

fn wired_driver() -> (Driver, Arc<Mutex<Vec<Vec<u8>>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let transport = RecordingTransport {
        inner: LoopbackTransport::new(),
        log: Arc::clone(&log),
    };
    let mut driver = Driver::new();
    driver.connect_transport("loopback", Box::new(transport));
    (driver, log)
}

/// Payload of the most recent recorded frame, minus its header byte.
fn last_payload(log: &Arc<Mutex<Vec<Vec<u8>>>>) -> Vec<u8> {
    let frames = log.lock().unwrap();
    let frame = frames.last().expect("at least one frame was sent");
    frame[1..].to_vec()
}

#[test]
fn scenario_1_pin_mode_literals() {
    let (mut driver, log) = wired_driver();
    driver.process_line("11 output pinMode").unwrap();
    // output = 1, pinMode is the primitive slot. No definitions are
    // involved, so exactly one (execute) frame goes out, with no
    // trailing return — a line's residual is sent exactly as assembled.
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(
        last_payload(&log),
        vec![op::LIT8, 11, op::LIT8, 1, op::PIN_MODE]
    );
}

#[test]
fn scenario_2_tiny_definition_inlines_and_never_sends_a_define_frame() {
    let (mut driver, log) = wired_driver();
    driver.process_line("[dup *] 'square def").unwrap();
    // `define` is pure compile-time bookkeeping; nothing is sent yet.
    assert!(log.lock().unwrap().is_empty());

    driver.process_line("square").unwrap();
    // `dup *` is 2 bytes — inlines. Only the execute frame goes out,
    // carrying the inlined body verbatim.
    let frames = log.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0][1..], [op::DUP, op::MUL]);
}

#[test]
fn scenario_3_large_definition_commits_once_then_calls_by_address() {
    let (mut driver, log) = wired_driver();
    driver
        .process_line("[high 11 digitalWrite] 'ledOn def")
        .unwrap();
    assert!(log.lock().unwrap().is_empty());

    driver.process_line("ledOn").unwrap();
    {
        let frames = log.lock().unwrap();
        // First execution: a define frame (the 5-byte body plus the
        // trailing return `shrink` appends when it commits) then an
        // execute frame (the bare 2-byte call).
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0][1..],
            [op::LIT8, 0xFF, op::LIT8, 11, op::DIGITAL_WRITE, op::RETURN]
        );
        assert_eq!(frames[1].len() - 1, 2);
        assert_eq!(frames[1][1] & 0x80, 0x80); // high bit marks a call
    }

    driver.process_line("ledOn").unwrap();
    let frames = log.lock().unwrap();
    // Second execution: only the execute frame — the dictionary entry
    // is not re-committed.
    assert_eq!(frames.len(), 3);
}

#[test]
fn scenario_4_reset_directive_sends_the_reset_frame() {
    let (mut driver, log) = wired_driver();
    driver.process_line("reset").unwrap();
    assert_eq!(last_payload(&log), vec![op::RESET, op::RETURN]);
}

#[test]
fn scenario_5_multi_instruction_quotation_emits_quote_and_set_loop_consumes_its_address() {
    let (mut driver, _log) = wired_driver();
    driver
        .process_line("[ 42 event{ 20 analogRead data 21 analogRead data }event ] setLoop")
        .unwrap();
}

#[test]
fn scenario_6_comment_line_sends_zero_frames() {
    let (mut driver, log) = wired_driver();
    driver.process_line("\\ anything here").unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn dictionary_shadowing_affects_the_next_compilation_only() {
    let (mut driver, log) = wired_driver();
    driver.process_line("[ 1 ] 'foo def").unwrap();
    driver.process_line("[ 2 ] 'foo def").unwrap();
    driver.process_line("foo").unwrap();
    let frames = log.lock().unwrap();
    let last = frames.last().unwrap();
    // `foo` now resolves to `[ 2 ]`, a single number: lit8 2.
    assert_eq!(last[1..], [op::LIT8, 2]);
}

#[test]
fn device_vm_error_events_are_surfaced_without_aborting_the_repl() {
    let (mut driver, _log) = wired_driver();
    // `drop` on an empty stack underflows the simulated device; the
    // driver must still accept the next line normally.
    driver.process_line("drop").unwrap();
    driver.process_line("1 drop").unwrap();
}

#[test]
fn unconnected_driver_reports_a_transport_error_for_executable_lines() {
    let mut driver = Driver::new();
    let err = driver.process_line("1 drop").unwrap_err();
    assert!(matches!(
        err,
        ToolError::Transport(stitchforth::error::TransportError::NotConnected)
    ));
}

#[test]
fn load_directive_replays_a_file_line_by_line() {
    let (mut driver, log) = wired_driver();
    let dir = std::env::temp_dir().join(format!("stitchforth-test-{}", std::process::id()));
    std::fs::write(&dir, "1 drop\n2 drop\n").unwrap();
    driver
        .process_line(&format!("'{} load", dir.display()))
        .unwrap();
    std::fs::remove_file(&dir).ok();
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn memory_and_prompt_directives_do_not_touch_the_wire() {
    let (mut driver, log) = wired_driver();
    log.lock().unwrap().clear();
    driver.process_line("memory").unwrap();
    driver.process_line("prompt").unwrap();
    driver.process_line("trace").unwrap();
    assert!(log.lock().unwrap().is_empty());
}
