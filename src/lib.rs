//! # Host Toolchain for a Concatenative Byte-Code Language
//!
//! This crate is the host side of a tiny Forth-like language that
//! targets a 16-bit stack VM on a microcontroller. It owns:
//!
//! - the compiler ([`instr`], [`dict`], [`lazy`], [`lexer`], [`parser`],
//!   [`assembler`], [`stdlib`], [`compiler`]) — lexing, parsing, and
//!   assembling source into byte code, with the lazy inline-vs-commit
//!   "shrinking" that decides whether a definition stays on the host or
//!   migrates to the device;
//! - the framed wire protocol ([`protocol`]) and transport
//!   ([`transport`]) between host and device;
//! - an in-process model of the device ([`device`]) precise enough to
//!   execute and validate generated byte code without hardware;
//! - the interactive driver ([`driver`]) that ties all of the above
//!   together into a line-oriented REPL.
//!
//! [`error::ToolError`] is the single error type every fallible operation
//! in this crate returns.

pub mod assembler;
pub mod compiler;
pub mod device;
pub mod dict;
pub mod driver;
pub mod error;
pub mod instr;
pub mod lazy;
pub mod lexer;
pub mod opcodes;
pub mod parser;
pub mod protocol;
pub mod stdlib;
pub mod transport;
