//! # Device-Side Virtual Machine
//!
//! An in-process model of the microcontroller's 16-bit stack VM. It exists
//! to pin down what generated byte code *means* and to give the rest of
//! the crate something to validate against without real hardware: the
//! loopback [`crate::transport::LoopbackTransport`] pairs a [`DeviceVm`]
//! with the host driver in integration tests.
//!
//! ## Execution model
//! - `data`/`ret` are the two fixed-depth i16 stacks. `ret` is shared by
//!   subroutine call/return *and* by the explicit aux operators
//!   (`>r`/`r>`/`r@`) — the classic Forth double duty that is why the
//!   spec calls out a single "return stack" rather than two.
//! - `mem` is the dictionary memory; `here` is the next free byte and
//!   `last` the start address of the most recently *committed*
//!   definition.
//! - `p` is the program counter; most ops advance it by the width of
//!   their own encoding, branches and calls set it directly.
//! - A `Quote(n)` instruction pushes the address of its own body (the
//!   bytes immediately following the header) and skips over the body —
//!   this is what lets a quotation "evaluate" to its start address.
//!
//! Peripheral slots (`pinMode`, `digitalRead`, ...) are out of scope per
//! the spec beyond their opcode slots: this model gives each one a
//! plausible stack effect (so programs that use them still balance) but
//! no hardware behavior.

use crate::error::DeviceErrorCode;
use crate::device::config::{MEM_SIZE, NO_LOOP, STACK_DEPTH};
use crate::opcodes as op;

/// One device→host notification, as it would arrive framed over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: u8,
    pub data: Vec<u8>,
}

impl Event {
    fn boot() -> Self {
        Event { id: crate::device::config::EVENT_BOOT, data: Vec::new() }
    }

    fn vm_error(code: DeviceErrorCode) -> Self {
        let byte = match code {
            DeviceErrorCode::ReturnStackUnderflow => 0,
            DeviceErrorCode::ReturnStackOverflow => 1,
            DeviceErrorCode::DataStackUnderflow => 2,
            DeviceErrorCode::DataStackOverflow => 3,
            DeviceErrorCode::OutOfMemory => 4,
            DeviceErrorCode::Unknown(b) => b,
        };
        Event { id: crate::device::config::EVENT_VM_ERROR, data: vec![byte] }
    }
}

/// State being accumulated by an in-progress `event{ ... }event` pack.
struct PackInProgress {
    id: u8,
    buf: Vec<u8>,
}

pub struct DeviceVm {
    mem: Vec<u8>,
    data: Vec<i16>,
    ret: Vec<i16>,
    here: usize,
    last: usize,
    p: usize,
    loop_addr: i16,
    loop_ticks: u16,
    pack: Option<PackInProgress>,
    events: Vec<Event>,
}

impl DeviceVm {
    /// A freshly booted device: empty dictionary, empty stacks, one
    /// queued boot event.
    pub fn new() -> Self {
        let mut vm = DeviceVm {
            mem: vec![0u8; MEM_SIZE],
            data: Vec::new(),
            ret: Vec::new(),
            here: 0,
            last: 0,
            p: 0,
            loop_addr: NO_LOOP,
            loop_ticks: 0,
            pack: None,
            events: Vec::new(),
        };
        vm.events.push(Event::boot());
        vm
    }

    /// Drain the events accumulated since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Handle a device-reset frame: wipe dictionary memory and stacks
    /// and requeue a boot event, matching what a hardware reset does.
    pub fn reset(&mut self) {
        *self = DeviceVm::new();
    }

    /// Handle a definition frame: append `bytes` to the dictionary at
    /// `here`, set `last` to the start of this definition.
    pub fn commit(&mut self, bytes: &[u8]) {
        if self.here + bytes.len() > self.mem.len() {
            self.events.push(Event::vm_error(DeviceErrorCode::OutOfMemory));
            return;
        }
        self.last = self.here;
        self.mem[self.here..self.here + bytes.len()].copy_from_slice(bytes);
        self.here += bytes.len();
    }

    /// Handle an execute frame: write `bytes` (appending a trailing
    /// `return` if the host didn't) as scratch past the dictionary's
    /// current boundary, run it to completion, then give the scratch
    /// space back.
    ///
    /// The spec's "the device then restores here = last" is read here as
    /// "restores `here` to what it was before this frame's scratch
    /// write" — restoring the literal `last` pointer would erase a
    /// definition committed by the frame immediately before this one
    /// (see DESIGN.md), which contradicts the worked example where a
    /// define frame's bytes survive the execute frame that follows it.
    pub fn execute(&mut self, bytes: &[u8]) {
        let mut payload = bytes.to_vec();
        if payload.last() != Some(&op::RETURN) {
            payload.push(op::RETURN);
        }
        let saved_here = self.here;
        if saved_here + payload.len() > self.mem.len() {
            self.events.push(Event::vm_error(DeviceErrorCode::OutOfMemory));
            return;
        }
        self.mem[saved_here..saved_here + payload.len()].copy_from_slice(&payload);
        self.p = saved_here;
        self.run_until_return();
        self.here = saved_here;
    }

    /// Run from the current `p` until the top-level call returns (a
    /// `return` with an empty return stack) or a byte past the loaded
    /// program is reached.
    fn run_until_return(&mut self) {
        loop {
            match self.step() {
                StepOutcome::Continue => continue,
                StepOutcome::Halted => return,
                StepOutcome::Error(code) => {
                    self.events.push(Event::vm_error(code));
                    return;
                }
            }
        }
    }

    fn pop_data(&mut self) -> Result<i16, DeviceErrorCode> {
        self.data.pop().ok_or(DeviceErrorCode::DataStackUnderflow)
    }

    fn push_data(&mut self, v: i16) -> Result<(), DeviceErrorCode> {
        if self.data.len() >= STACK_DEPTH {
            return Err(DeviceErrorCode::DataStackOverflow);
        }
        self.data.push(v);
        Ok(())
    }

    fn pop_ret(&mut self) -> Result<i16, DeviceErrorCode> {
        self.ret.pop().ok_or(DeviceErrorCode::ReturnStackUnderflow)
    }

    fn push_ret(&mut self, v: i16) -> Result<(), DeviceErrorCode> {
        if self.ret.len() >= STACK_DEPTH {
            return Err(DeviceErrorCode::ReturnStackOverflow);
        }
        self.ret.push(v);
        Ok(())
    }

    fn fetch_byte(&mut self) -> u8 {
        let b = self.mem[self.p];
        self.p += 1;
        b
    }

    /// Execute one instruction at `p`, returning whether the run loop
    /// should keep going.
    fn step(&mut self) -> StepOutcome {
        if self.p >= self.mem.len() {
            return StepOutcome::Halted;
        }
        let opcode = self.fetch_byte();
        if opcode & op::CALL_FLAG != 0 {
            let lo = self.fetch_byte();
            let addr = ((((opcode & !op::CALL_FLAG) as u16) << 8) | lo as u16) as i16;
            return self.call(addr);
        }
        let result = self.dispatch(opcode);
        match result {
            Ok(true) => StepOutcome::Continue,
            Ok(false) => StepOutcome::Halted,
            Err(code) => StepOutcome::Error(code),
        }
    }

    fn call(&mut self, addr: i16) -> StepOutcome {
        if let Err(code) = self.push_ret(self.p as i16) {
            return StepOutcome::Error(code);
        }
        self.p = addr as usize;
        StepOutcome::Continue
    }

    /// Dispatch a single zero-or-operand-bearing opcode. Returns `Ok(true)`
    /// to keep running, `Ok(false)` when the top-level call has returned.
    fn dispatch(&mut self, opcode: u8) -> Result<bool, DeviceErrorCode> {
        match opcode {
            op::RETURN => {
                return match self.ret.pop() {
                    Some(addr) => {
                        self.p = addr as usize;
                        Ok(true)
                    }
                    None => Ok(false),
                };
            }
            op::LIT8 => {
                let b = self.fetch_byte() as i8 as i16;
                self.push_data(b)?;
            }
            op::LIT16 => {
                let hi = self.fetch_byte();
                let lo = self.fetch_byte();
                self.push_data(((hi as i16) << 8) | lo as i16)?;
            }
            op::QUOTE => {
                let n = self.fetch_byte() as usize;
                self.push_data(self.p as i16)?;
                self.p += n;
            }
            op::BRANCH => {
                let off = self.fetch_byte() as i8;
                self.p = (self.p as i64 + off as i64) as usize;
            }
            op::ZBRANCH => {
                let off = self.fetch_byte() as i8;
                let pred = self.pop_data()?;
                if pred == 0 {
                    self.p = (self.p as i64 + off as i64) as usize;
                }
            }
            op::EVENT_PACK_START => {
                let id = self.pop_data()? as u8;
                self.pack = Some(PackInProgress { id, buf: Vec::new() });
            }
            op::EVENT_BODY_8 => {
                let v = self.pop_data()?;
                if let Some(pack) = self.pack.as_mut() {
                    pack.buf.push(v as u8);
                }
            }
            op::EVENT_BODY_16 => {
                let v = self.pop_data()?;
                if let Some(pack) = self.pack.as_mut() {
                    pack.buf.push((v >> 8) as u8);
                    pack.buf.push(v as u8);
                }
            }
            op::EVENT_PACK_FINISH => {
                if let Some(pack) = self.pack.take() {
                    self.events.push(Event { id: pack.id, data: pack.buf });
                }
            }
            op::EVENT_SCALAR => {
                let id = self.pop_data()? as u8;
                let v = self.pop_data()?;
                self.events.push(Event { id, data: scalar_payload(v) });
            }
            op::FETCH8 => {
                let addr = self.pop_data()? as usize;
                self.push_data(self.mem_at(addr)? as i16)?;
            }
            op::STORE8 => {
                let addr = self.pop_data()? as usize;
                let v = self.pop_data()?;
                self.set_mem_at(addr, v as u8)?;
            }
            op::FETCH16 => {
                let addr = self.pop_data()? as usize;
                let hi = self.mem_at(addr)?;
                let lo = self.mem_at(addr + 1)?;
                self.push_data(((hi as i16) << 8) | lo as i16)?;
            }
            op::STORE16 => {
                let addr = self.pop_data()? as usize;
                let v = self.pop_data()?;
                self.set_mem_at(addr, (v >> 8) as u8)?;
                self.set_mem_at(addr + 1, v as u8)?;
            }
            op::ADD => self.binop(|a, b| a.wrapping_add(b))?,
            op::SUB => self.binop(|a, b| a.wrapping_sub(b))?,
            op::MUL => self.binop(|a, b| a.wrapping_mul(b))?,
            op::DIV => self.binop(|a, b| if b == 0 { 0 } else { a.wrapping_div(b) })?,
            op::MOD => self.binop(|a, b| if b == 0 { 0 } else { a.wrapping_rem(b) })?,
            op::AND => self.binop(|a, b| a & b)?,
            op::OR => self.binop(|a, b| a | b)?,
            op::XOR => self.binop(|a, b| a ^ b)?,
            op::SHIFT => {
                let amount = self.pop_data()?;
                let v = self.pop_data()?;
                let shifted = if amount >= 0 {
                    v.wrapping_shr(amount as u32)
                } else {
                    v.wrapping_shl((-amount) as u32)
                };
                self.push_data(shifted)?;
            }
            op::EQ => self.binop(|a, b| truth(a == b))?,
            op::NE => self.binop(|a, b| truth(a != b))?,
            op::GT => self.binop(|a, b| truth(a > b))?,
            op::GE => self.binop(|a, b| truth(a >= b))?,
            op::LT => self.binop(|a, b| truth(a < b))?,
            op::LE => self.binop(|a, b| truth(a <= b))?,
            op::NOT => {
                let a = self.pop_data()?;
                self.push_data(!a)?;
            }
            op::NEG => {
                let a = self.pop_data()?;
                self.push_data(a.wrapping_neg())?;
            }
            op::INC => {
                let a = self.pop_data()?;
                self.push_data(a.wrapping_add(1))?;
            }
            op::DEC => {
                let a = self.pop_data()?;
                self.push_data(a.wrapping_sub(1))?;
            }
            op::DROP => {
                self.pop_data()?;
            }
            op::DUP => {
                let a = *self.data.last().ok_or(DeviceErrorCode::DataStackUnderflow)?;
                self.push_data(a)?;
            }
            op::SWAP => {
                let b = self.pop_data()?;
                let a = self.pop_data()?;
                self.push_data(b)?;
                self.push_data(a)?;
            }
            op::PICK => {
                let n = self.pop_data()? as usize;
                let idx = self
                    .data
                    .len()
                    .checked_sub(1 + n)
                    .ok_or(DeviceErrorCode::DataStackUnderflow)?;
                let v = self.data[idx];
                self.push_data(v)?;
            }
            op::ROLL => {
                let n = self.pop_data()? as usize;
                let idx = self
                    .data
                    .len()
                    .checked_sub(1 + n)
                    .ok_or(DeviceErrorCode::DataStackUnderflow)?;
                let v = self.data.remove(idx);
                self.push_data(v)?;
            }
            op::CLEAR => self.data.clear(),
            op::PUSH_AUX => {
                let v = self.pop_data()?;
                self.push_ret(v)?;
            }
            op::POP_AUX => {
                let v = self.pop_ret()?;
                self.push_data(v)?;
            }
            op::PEEK_AUX => {
                let v = *self.ret.last().ok_or(DeviceErrorCode::ReturnStackUnderflow)?;
                self.push_data(v)?;
            }
            op::FORGET => {
                let addr = self.pop_data()? as usize;
                self.here = addr.min(self.mem.len());
                if self.last > self.here {
                    self.last = self.here;
                }
            }
            op::CALL_FROM_STACK => {
                let addr = self.pop_data()?;
                self.push_ret(self.p as i16)?;
                self.p = addr as usize;
            }
            op::CHOICE => {
                let flag = self.pop_data()?;
                let when_true = self.pop_data()?;
                let when_false = self.pop_data()?;
                self.push_data(if flag != 0 { when_true } else { when_false })?;
            }
            op::IF => {
                let addr = self.pop_data()?;
                let flag = self.pop_data()?;
                if flag != 0 {
                    self.push_ret(self.p as i16)?;
                    self.p = addr as usize;
                }
            }
            op::LOOP_TICKS => {
                self.push_data(self.loop_ticks as i16)?;
                self.loop_ticks = self.loop_ticks.wrapping_add(1) & 0x7FFF;
            }
            op::SET_LOOP => {
                let addr = self.pop_data()?;
                self.loop_addr = addr;
            }
            op::STOP_LOOP => self.loop_addr = NO_LOOP,
            op::RESET => {
                self.reset();
                return Ok(false);
            }
            // Peripheral slots: out of scope beyond a plausible stack
            // effect (see module docs). Pin/mode/value operands are
            // consumed; reads push a placeholder zero.
            op::PIN_MODE | op::DIGITAL_WRITE | op::ANALOG_WRITE => {
                self.pop_data()?;
                self.pop_data()?;
            }
            op::DIGITAL_READ | op::ANALOG_READ => {
                self.pop_data()?;
                self.push_data(0)?;
            }
            op::ATTACH_ISR => {
                self.pop_data()?;
                self.pop_data()?;
                self.pop_data()?;
            }
            op::DETACH_ISR => {
                self.pop_data()?;
            }
            op::MILLISECONDS => self.push_data(0)?,
            op::PULSE_IN => {
                self.pop_data()?;
                self.pop_data()?;
                self.push_data(0)?;
            }
            op::I2C_SLOT | op::SERVO_SLOT => {}
            other => {
                // Unknown byte: the host's `User` extensions live here.
                // The simulator has no behavior to run for them, so it
                // treats them as a no-op rather than faulting the whole
                // run (the assembler has already validated structure).
                let _ = other;
            }
        }
        Ok(true)
    }

    fn binop(&mut self, f: impl Fn(i16, i16) -> i16) -> Result<(), DeviceErrorCode> {
        let b = self.pop_data()?;
        let a = self.pop_data()?;
        self.push_data(f(a, b))
    }

    fn mem_at(&self, addr: usize) -> Result<u8, DeviceErrorCode> {
        self.mem.get(addr).copied().ok_or(DeviceErrorCode::OutOfMemory)
    }

    fn set_mem_at(&mut self, addr: usize, v: u8) -> Result<(), DeviceErrorCode> {
        *self.mem.get_mut(addr).ok_or(DeviceErrorCode::OutOfMemory)? = v;
        Ok(())
    }
}

impl Default for DeviceVm {
    fn default() -> Self {
        Self::new()
    }
}

enum StepOutcome {
    Continue,
    Halted,
    Error(DeviceErrorCode),
}

fn truth(cond: bool) -> i16 {
    if cond {
        -1
    } else {
        0
    }
}

/// Scalar event payload sizing: 0 bytes if zero, 1 byte if it fits in
/// `i8`, 2 bytes (big-endian) otherwise.
pub fn scalar_payload(v: i16) -> Vec<u8> {
    if v == 0 {
        Vec::new()
    } else if (-128..=127).contains(&v) {
        vec![v as u8]
    } else {
        vec![(v >> 8) as u8, v as u8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_queues_a_boot_event() {
        let mut vm = DeviceVm::new();
        let events = vm.drain_events();
        assert_eq!(events, vec![Event { id: crate::device::config::EVENT_BOOT, data: vec![] }]);
    }

    #[test]
    fn commit_then_execute_a_call_does_not_disturb_the_committed_bytes() {
        let mut vm = DeviceVm::new();
        vm.drain_events();
        // Commit a tiny definition: dup(0x23) mul(0x11) return.
        vm.commit(&[op::DUP, op::MUL, op::RETURN]);
        assert_eq!(vm.here, 3);
        assert_eq!(vm.last, 0);

        // Execute a call to address 0 (dup mul), squaring the pushed 5.
        vm.push_data(5).unwrap();
        vm.execute(&[op::CALL_FLAG, 0x00]);
        assert_eq!(vm.data, vec![25]);
        // here must be restored so the committed definition is intact.
        assert_eq!(vm.here, 3);
        assert_eq!(&vm.mem[0..3], &[op::DUP, op::MUL, op::RETURN]);
    }

    #[test]
    fn pick_zero_is_dup_and_one_is_over() {
        let mut vm = DeviceVm::new();
        vm.push_data(10).unwrap();
        vm.push_data(20).unwrap();
        vm.push_data(0).unwrap();
        vm.dispatch(op::PICK).unwrap();
        assert_eq!(vm.data, vec![10, 20, 20]);

        let mut vm = DeviceVm::new();
        vm.push_data(10).unwrap();
        vm.push_data(20).unwrap();
        vm.push_data(1).unwrap();
        vm.dispatch(op::PICK).unwrap();
        assert_eq!(vm.data, vec![10, 20, 10]);
    }

    #[test]
    fn scalar_payload_sizes_match_the_spec_table() {
        assert_eq!(scalar_payload(0), Vec::<u8>::new());
        assert_eq!(scalar_payload(127).len(), 1);
        assert_eq!(scalar_payload(-128).len(), 1);
        assert_eq!(scalar_payload(128).len(), 2);
        assert_eq!(scalar_payload(-129).len(), 2);
    }

    #[test]
    fn data_stack_overflow_reports_an_event_instead_of_panicking() {
        let mut vm = DeviceVm::new();
        vm.drain_events();
        for _ in 0..STACK_DEPTH {
            vm.push_data(1).unwrap();
        }
        assert_eq!(vm.push_data(1), Err(DeviceErrorCode::DataStackOverflow));
    }
}
