//! # Opcode Table — the Single Source of Truth
//!
//! Every one-byte primitive opcode the host and the (simulated) device
//! agree on lives here as a `const`. [`crate::instr`] uses this table to
//! encode/disassemble zero-operand instructions; [`crate::stdlib`] uses it
//! to bind each primitive alias's `brief` field; [`crate::device`] uses it
//! to decode and execute byte code.
//!
//! Per the design notes, the specific numbers are not part of any external
//! contract — only their existence and semantics are — but within one
//! build, host and device (and, here, host and the in-process device
//! simulator) must agree, so we assign them exactly once.
//!
//! All primitive opcodes have their high bit clear (`< 0x80`); a byte with
//! the high bit set is always the first byte of a two-byte call, never a
//! primitive. This is what lets disassembly tell calls and primitives
//! apart without consulting a dictionary.

pub const RETURN: u8 = 0x00;
pub const LIT8: u8 = 0x01;
pub const LIT16: u8 = 0x02;
pub const QUOTE: u8 = 0x03;
pub const BRANCH: u8 = 0x04;
pub const ZBRANCH: u8 = 0x05;

pub const EVENT_PACK_START: u8 = 0x06;
pub const EVENT_BODY_8: u8 = 0x07;
pub const EVENT_BODY_16: u8 = 0x08;
pub const EVENT_PACK_FINISH: u8 = 0x09;
pub const EVENT_SCALAR: u8 = 0x0A;

pub const FETCH8: u8 = 0x0B;
pub const STORE8: u8 = 0x0C;
pub const FETCH16: u8 = 0x0D;
pub const STORE16: u8 = 0x0E;

pub const ADD: u8 = 0x0F;
pub const SUB: u8 = 0x10;
pub const MUL: u8 = 0x11;
pub const DIV: u8 = 0x12;
pub const MOD: u8 = 0x13;
pub const AND: u8 = 0x14;
pub const OR: u8 = 0x15;
pub const XOR: u8 = 0x16;
pub const SHIFT: u8 = 0x17;
pub const EQ: u8 = 0x18;
pub const NE: u8 = 0x19;
pub const GT: u8 = 0x1A;
pub const GE: u8 = 0x1B;
pub const LT: u8 = 0x1C;
pub const LE: u8 = 0x1D;
pub const NOT: u8 = 0x1E;
pub const NEG: u8 = 0x1F;
pub const INC: u8 = 0x20;
pub const DEC: u8 = 0x21;

pub const DROP: u8 = 0x22;
pub const DUP: u8 = 0x23;
pub const SWAP: u8 = 0x24;
pub const PICK: u8 = 0x25;
pub const ROLL: u8 = 0x26;
pub const CLEAR: u8 = 0x27;
pub const PUSH_AUX: u8 = 0x28;
pub const POP_AUX: u8 = 0x29;
pub const PEEK_AUX: u8 = 0x2A;

pub const FORGET: u8 = 0x2B;
pub const CALL_FROM_STACK: u8 = 0x2C;
pub const CHOICE: u8 = 0x2D;
pub const IF: u8 = 0x2E;
pub const LOOP_TICKS: u8 = 0x2F;
pub const SET_LOOP: u8 = 0x30;
pub const STOP_LOOP: u8 = 0x31;
pub const RESET: u8 = 0x32;

pub const PIN_MODE: u8 = 0x33;
pub const DIGITAL_READ: u8 = 0x34;
pub const DIGITAL_WRITE: u8 = 0x35;
pub const ANALOG_READ: u8 = 0x36;
pub const ANALOG_WRITE: u8 = 0x37;
pub const ATTACH_ISR: u8 = 0x38;
pub const DETACH_ISR: u8 = 0x39;
pub const MILLISECONDS: u8 = 0x3A;
pub const PULSE_IN: u8 = 0x3B;
pub const I2C_SLOT: u8 = 0x3C;
pub const SERVO_SLOT: u8 = 0x3D;

/// Smallest opcode value available for `instruction`-bound `User` extensions.
/// Host code never asserts on this; it exists only to document the split.
pub const FIRST_FREE_USER_OPCODE: u8 = 0x3E;

/// High bit that marks the first byte of a two-byte call, never a primitive.
pub const CALL_FLAG: u8 = 0x80;
