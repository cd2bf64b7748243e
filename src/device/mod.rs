//! # Device-Side Model
//!
//! Everything needed to say, precisely, what byte code emitted by the
//! host compiler *does* once it reaches the microcontroller: the fixed
//! resource constants ([`config`]) and an in-process VM ([`vm`]) that
//! implements the opcode semantics well enough to execute and validate
//! generated code in tests, standing in for real hardware.

pub mod config;
pub mod vm;

pub use vm::{DeviceVm, Event};
