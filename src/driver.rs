//! # Interactive Driver
//!
//! The REPL: reads one line at a time, lexes and parses it into a flat
//! node list, scans left-to-right over a *residual stack* of nodes,
//! peeling off compile-time directives (`connect`, `define`, ...) as it
//! goes, and eager-assembles whatever nodes are left into an execute
//! frame. See `§4.6` for the directive table this module implements.
//!
//! Ordering invariant (§5): a pending definition frame is fully written
//! before the execute frame that may call into it — both writes go
//! through the same blocking [`Transport::write_frame`], so there is no
//! interleaving to get wrong.
//!
//! Errors from lexing, parsing, compiling, or the transport are surfaced
//! to the caller and the current line is abandoned; the REPL always
//! continues (§7). Only `exit` and an unrecoverable I/O error on stdin
//! itself end the loop.

use tracing::{error, info, warn};

use crate::assembler::{compile_definition, compile_variable, eager_assemble};
use crate::compiler::CompilerState;
use crate::device::config;
use crate::error::{CompileError, DeviceErrorCode, ToolError, TransportError};
use crate::instr::{disassemble, print_form, Instruction};
use crate::lazy::LazyCode;
use crate::lexer::lex;
use crate::opcodes as op;
use crate::parser::{parse, Node};
use crate::protocol::{DeviceFrame, HostFrame};
use crate::transport::{SerialTransport, Transport};

/// The interactive driver: owns the compiler state exclusively (the line
/// processor is the only writer — see §5) and, when connected, a handle
/// to the transport.
pub struct Driver {
    state: CompilerState,
    transport: Option<Box<dyn Transport>>,
    connected_port: Option<String>,
    trace: bool,
    pub should_exit: bool,
}

impl Driver {
    pub fn new() -> Self {
        Driver {
            state: CompilerState::new(),
            transport: None,
            connected_port: None,
            trace: false,
            should_exit: false,
        }
    }

    /// Replace the transport directly, bypassing `connect` — used by
    /// tests wiring up a [`crate::transport::LoopbackTransport`].
    pub fn connect_transport(&mut self, label: &str, transport: Box<dyn Transport>) {
        self.transport = Some(transport);
        self.connected_port = Some(label.to_string());
    }

    /// Process one line of source text. Never panics; every failure is
    /// returned so the REPL can print it and move on to the next line.
    pub fn process_line(&mut self, line: &str) -> Result<(), ToolError> {
        let tokens = lex(line)?;
        let nodes = parse(&tokens)?;
        let mut residual: Vec<Node> = Vec::new();

        for node in nodes {
            let directive = match &node {
                Node::Token(t) if is_directive(t) => Some(t.clone()),
                _ => None,
            };
            match directive {
                Some(name) if name == "\\" => break,
                Some(name) => self.run_directive(&name, &mut residual)?,
                None => residual.push(node),
            }
        }

        self.flush_residual(residual)?;
        self.drain_and_print_events()
    }

    /// Dispatch one recognized directive token, consuming its operands
    /// from the top of `residual`.
    fn run_directive(&mut self, name: &str, residual: &mut Vec<Node>) -> Result<(), ToolError> {
        match name {
            "connect" | "conn" => self.do_connect(residual),
            "disconnect" => self.do_disconnect(),
            "reset" => self.do_reset(),
            "define" | "def" => self.do_define(residual),
            "instruction" => self.do_instruction(residual),
            "variable" | "var" => self.do_variable(residual),
            "load" => self.do_load(residual),
            "." => {
                residual.push(Node::Number(0xF0));
                residual.push(Node::Token("event".to_string()));
                Ok(())
            }
            "trace" => {
                self.trace = !self.trace;
                info!(trace = self.trace, "trace toggled");
                Ok(())
            }
            "memory" | "mem" => {
                println!(
                    "address={} / {} bytes committed, {} dictionary entries",
                    self.state.alloc.address,
                    config::MEM_SIZE,
                    self.state.dict.iter_newest_first().count()
                );
                Ok(())
            }
            "prompt" => {
                match &self.connected_port {
                    Some(port) => println!("connected to {port}, address={}", self.state.alloc.address),
                    None => println!("disconnected"),
                }
                Ok(())
            }
            "exit" => {
                self.should_exit = true;
                self.do_disconnect().ok();
                Ok(())
            }
            other => unreachable!("is_directive admitted an unhandled directive '{other}'"),
        }
    }

    fn do_connect(&mut self, residual: &mut Vec<Node>) -> Result<(), ToolError> {
        if self.transport.is_some() {
            let port = self.connected_port.clone().unwrap_or_default();
            return Err(TransportError::AlreadyConnected(port).into());
        }
        let port_name = pop_single_token_quotation(residual, "connect")?;
        let transport = SerialTransport::open(&port_name)?;
        self.transport = Some(Box::new(transport));
        self.connected_port = Some(port_name.clone());
        info!(port = %port_name, "connected");
        // A freshly opened connection talks to a freshly booted device;
        // re-running reset keeps the host address counter and the
        // device dictionary in the lockstep §5 requires.
        self.do_reset()
    }

    fn do_disconnect(&mut self) -> Result<(), ToolError> {
        match self.transport.take() {
            Some(mut t) => {
                t.close();
                info!(port = ?self.connected_port, "disconnected");
                self.connected_port = None;
                Ok(())
            }
            None => Err(TransportError::NotConnected.into()),
        }
    }

    fn do_reset(&mut self) -> Result<(), ToolError> {
        self.state.reset();
        if let Some(transport) = self.transport.as_deref_mut() {
            let frame = HostFrame::execute(vec![op::RESET, op::RETURN])?;
            transport.write_frame(&frame.to_bytes())?;
        }
        Ok(())
    }

    fn do_define(&mut self, residual: &mut Vec<Node>) -> Result<(), ToolError> {
        let name = pop_single_token_quotation(residual, "define")?;
        let body = pop_quotation(residual, "define")?;
        self.state.dict.define(None, name, compile_definition(body));
        Ok(())
    }

    fn do_instruction(&mut self, residual: &mut Vec<Node>) -> Result<(), ToolError> {
        let name = pop_single_token_quotation(residual, "instruction")?;
        let opcode = match residual.pop() {
            Some(Node::Number(n)) => n as u8,
            _ => {
                return Err(CompileError::MalformedDirective {
                    directive: "instruction",
                    expected: "a one-byte opcode number beneath the name",
                }
                .into())
            }
        };
        self.state.dict.define(
            Some(Instruction::User(opcode)),
            name,
            LazyCode::ready(vec![opcode]),
        );
        Ok(())
    }

    fn do_variable(&mut self, residual: &mut Vec<Node>) -> Result<(), ToolError> {
        let name = pop_single_token_quotation(residual, "variable")?;
        self.state.dict.define(None, name, compile_variable());
        Ok(())
    }

    fn do_load(&mut self, residual: &mut Vec<Node>) -> Result<(), ToolError> {
        let path = pop_single_token_quotation(residual, "load")?;
        let contents = std::fs::read_to_string(&path).map_err(TransportError::Read)?;
        for line in contents.lines() {
            if let Err(e) = self.process_line(line) {
                warn!(path = %path, error = %e, "error while loading file, continuing");
            }
        }
        Ok(())
    }

    /// Eager-assemble whatever is left of the line's node list once every
    /// directive has been peeled off, then frame and send it (§4.6's
    /// final step). A blank residual sends nothing.
    fn flush_residual(&mut self, residual: Vec<Node>) -> Result<(), ToolError> {
        if residual.is_empty() {
            return Ok(());
        }
        let bytes = eager_assemble(&residual, &self.state.dict, &mut self.state.alloc)?;
        let pending = self.state.take_pending();

        if self.trace {
            print_trace("define", &pending, &self.state.dict);
            print_trace("execute", &bytes, &self.state.dict);
        }

        let transport = self
            .transport
            .as_deref_mut()
            .ok_or(TransportError::NotConnected)?;
        if !pending.is_empty() {
            let frame = HostFrame::define(pending)?;
            transport.write_frame(&frame.to_bytes())?;
        }
        let frame = HostFrame::execute(bytes)?;
        transport.write_frame(&frame.to_bytes())?;
        Ok(())
    }

    fn drain_and_print_events(&mut self) -> Result<(), ToolError> {
        if let Some(transport) = self.transport.as_deref_mut() {
            for frame in transport.poll_events()? {
                print_event(&frame);
            }
        }
        Ok(())
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

fn print_trace(label: &str, bytes: &[u8], dict: &crate::dict::Dictionary) {
    if bytes.is_empty() {
        return;
    }
    let forms: Vec<String> = disassemble(bytes, dict).iter().map(print_form).collect();
    println!("[trace] {label}: {}", forms.join(" "));
}

fn print_event(frame: &DeviceFrame) {
    match frame.event_id {
        id if id == config::EVENT_BOOT => info!("device: boot"),
        id if id == config::EVENT_VM_ERROR => {
            let code = DeviceErrorCode::from_byte(frame.data.first().copied().unwrap_or(0));
            error!(%code, "device reported a VM error");
        }
        id => info!(event = format!("{id:#04x}"), data = ?frame.data, "device event"),
    }
}

const DIRECTIVES: &[&str] = &[
    "connect",
    "conn",
    "disconnect",
    "reset",
    "define",
    "def",
    "instruction",
    "variable",
    "var",
    "load",
    "\\",
    ".",
    "trace",
    "memory",
    "mem",
    "prompt",
    "exit",
];

fn is_directive(token: &str) -> bool {
    DIRECTIVES.contains(&token)
}

/// Pop a `Node::Quotation` containing exactly one `Node::Token` off the
/// top of `residual`, returning the token text. Every directive that
/// takes a bare name (`connect`, `define`'s name, `instruction`'s name,
/// `variable`, `load`'s path) needs exactly this shape.
fn pop_single_token_quotation(
    residual: &mut Vec<Node>,
    directive: &'static str,
) -> Result<String, ToolError> {
    match residual.pop() {
        Some(Node::Quotation(inner)) if inner.len() == 1 => match &inner[0] {
            Node::Token(name) => Ok(name.clone()),
            _ => Err(malformed(directive, "a single-token quotation")),
        },
        _ => Err(malformed(directive, "a single-token quotation")),
    }
}

fn pop_quotation(residual: &mut Vec<Node>, directive: &'static str) -> Result<Vec<Node>, ToolError> {
    match residual.pop() {
        Some(Node::Quotation(body)) => Ok(body),
        _ => Err(malformed(directive, "a quotation beneath the name")),
    }
}

fn malformed(directive: &'static str, expected: &'static str) -> ToolError {
    CompileError::MalformedDirective { directive, expected }.into()
}
