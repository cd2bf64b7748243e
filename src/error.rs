//! # Error Taxonomy for the Host Toolchain
//!
//! This module defines [`ToolError`], the single error type returned by
//! every fallible operation in the compiler, driver, and protocol layers.
//!
//! ## Design
//! The variants mirror the five error classes of the host's error handling
//! design:
//! 1. Lex/parse errors (`Lex`) — abandon the current line, REPL continues.
//! 2. Compile errors (`Compile`) — same handling as (1).
//! 3. Transport errors (`Transport`) — surfaced, connection may need a
//!    manual `disconnect`/`connect` cycle.
//! 4. Device-reported errors (`Device`) — decoded from event id `0xFE`,
//!    never fatal to the host.
//! 5. Internal invariant violations (`Internal`) — fatal to the *current
//!    operation* only; the process keeps running.
//!
//! `thiserror` generates `Display`/`Error` impls from the `#[error(...)]`
//! attributes below, so messages stay in one place next to the variant
//! that produces them.

use thiserror::Error;

/// Errors produced while lexing source text into tokens.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LexError {
    /// A lone `'` with nothing after it, or immediately before `[`/`]`.
    #[error("dangling ' with no following token")]
    DanglingTick,
}

/// Errors produced while parsing a token stream into a node tree.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("unmatched '[' with no closing ']'")]
    UnmatchedOpenBracket,
    #[error("unmatched ']' with no opening '['")]
    UnmatchedCloseBracket,
}

/// Errors produced while assembling a node tree into byte code.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CompileError {
    #[error("unknown word '{0}'")]
    UnknownWord(String),
    #[error("quotation body of {0} bytes does not fit in a u8 length prefix")]
    QuoteTooLarge(usize),
    #[error("call address {0} exceeds the 15-bit addressable range")]
    AddressOutOfRange(i32),
    #[error("cannot encode instruction {0:?}: no opcode is bound to it")]
    Unencodable(String),
    #[error("'{directive}' requires {expected}")]
    MalformedDirective {
        directive: &'static str,
        expected: &'static str,
    },
}

/// Errors produced by the byte-oriented transport (serial link or loopback).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no device connection is open")]
    NotConnected,
    #[error("connection to '{0}' is already open")]
    AlreadyConnected(String),
    #[error("failed to open port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("end of stream while expecting {0} more byte(s)")]
    UnexpectedEof(usize),
}

/// A VM error code reported by the device on event id `0xFE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorCode {
    ReturnStackUnderflow,
    ReturnStackOverflow,
    DataStackUnderflow,
    DataStackOverflow,
    OutOfMemory,
    /// A code the host doesn't recognize; carried verbatim for display.
    Unknown(u8),
}

impl DeviceErrorCode {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::ReturnStackUnderflow,
            1 => Self::ReturnStackOverflow,
            2 => Self::DataStackUnderflow,
            3 => Self::DataStackOverflow,
            4 => Self::OutOfMemory,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReturnStackUnderflow => write!(f, "return-stack underflow"),
            Self::ReturnStackOverflow => write!(f, "return-stack overflow"),
            Self::DataStackUnderflow => write!(f, "data-stack underflow"),
            Self::DataStackOverflow => write!(f, "data-stack overflow"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Unknown(b) => write!(f, "unknown device error code {b}"),
        }
    }
}

/// Errors in the framed wire protocol itself (malformed frames), distinct
/// from transport I/O failures and from device-reported VM errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame length byte {0} exceeds the 127-byte payload cap")]
    LengthTooLarge(u8),
    #[error("frame declared {declared} byte(s) of payload but stream ended after {got}")]
    Truncated { declared: usize, got: usize },
    #[error("device reported a VM error: {0}")]
    DeviceError(DeviceErrorCode),
}

/// The single error type returned by every fallible host-side operation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Class 5: an internal invariant was violated. Fatal to the current
    /// operation only — the REPL prints it and continues.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}
