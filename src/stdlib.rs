//! # Initial Dictionary
//!
//! Populates an empty [`Dictionary`] with the two layers `reset` always
//! restores:
//!
//! 1. **Primitive aliases** — one entry per opcode in [`crate::opcodes`],
//!    named and (for the zero-operand primitives) tagged with the
//!    matching [`Instruction`] so [`Instruction::encode`] can resolve it
//!    and disassembly can print it.
//! 2. **Secondary definitions** — a small standard library, expressed as
//!    source text compiled the same way a user's `define` would be,
//!    exercising the assembler at startup exactly as it will be
//!    exercised later.
//!
//! The source text for (2) is fixed at compile time; a lex/parse failure
//! there would be a bug in this module, not user error, so this is one
//! of the few places an `.expect()` is appropriate outside tests.

use crate::assembler::compile_definition;
use crate::dict::Dictionary;
use crate::instr::Instruction;
use crate::lazy::LazyCode;
use crate::lexer::lex;
use crate::opcodes as op;
use crate::parser::parse;

/// Populate `dict` with the primitive roster and the standard library.
/// Called by [`crate::compiler::CompilerState::reset`].
pub fn populate(dict: &mut Dictionary) {
    for (name, opcode, brief) in PRIMITIVES {
        dict.define(brief.clone(), (*name).to_string(), LazyCode::ready(vec![*opcode]));
    }
    for (name, source) in SECONDARY {
        define_secondary(dict, name, source);
    }
}

fn define_secondary(dict: &mut Dictionary, name: &str, source: &str) {
    let tokens = lex(source).expect("stdlib source is fixed and always lexes cleanly");
    let body = parse(&tokens).expect("stdlib source is fixed and always parses cleanly");
    dict.define(None, name.to_string(), compile_definition(body));
}

/// `(name, opcode, brief)`. Operand-bearing opcodes (`lit8`, `lit16`,
/// `quote`, `branch`, `zbranch`) are registered with `brief: None` —
/// `Instruction::encode` already handles them through explicit match
/// arms, never through the dictionary, so there is no single
/// `Instruction` value that represents "this opcode with any operand".
const PRIMITIVES: &[(&str, u8, Option<Instruction>)] = &[
    ("return", op::RETURN, Some(Instruction::Return)),
    ("lit8", op::LIT8, None),
    ("lit16", op::LIT16, None),
    ("quote", op::QUOTE, None),
    ("branch", op::BRANCH, None),
    ("zbranch", op::ZBRANCH, None),
    ("event{", op::EVENT_PACK_START, Some(Instruction::EventPackStart)),
    ("data8", op::EVENT_BODY_8, Some(Instruction::EventBody8)),
    ("data", op::EVENT_BODY_16, Some(Instruction::EventBody16)),
    ("}event", op::EVENT_PACK_FINISH, Some(Instruction::EventPackFinish)),
    ("event", op::EVENT_SCALAR, Some(Instruction::EventScalar)),
    ("c@", op::FETCH8, Some(Instruction::Fetch8)),
    ("c!", op::STORE8, Some(Instruction::Store8)),
    ("@", op::FETCH16, Some(Instruction::Fetch16)),
    ("!", op::STORE16, Some(Instruction::Store16)),
    ("+", op::ADD, Some(Instruction::Add)),
    ("-", op::SUB, Some(Instruction::Sub)),
    ("*", op::MUL, Some(Instruction::Mul)),
    ("/", op::DIV, Some(Instruction::Div)),
    ("mod", op::MOD, Some(Instruction::Mod)),
    ("and", op::AND, Some(Instruction::And)),
    ("or", op::OR, Some(Instruction::Or)),
    ("xor", op::XOR, Some(Instruction::Xor)),
    ("shift", op::SHIFT, Some(Instruction::Shift)),
    ("=", op::EQ, Some(Instruction::Eq)),
    ("<>", op::NE, Some(Instruction::Ne)),
    (">", op::GT, Some(Instruction::Gt)),
    (">=", op::GE, Some(Instruction::Ge)),
    ("<", op::LT, Some(Instruction::Lt)),
    ("<=", op::LE, Some(Instruction::Le)),
    ("not", op::NOT, Some(Instruction::Not)),
    ("neg", op::NEG, Some(Instruction::Neg)),
    ("1+", op::INC, Some(Instruction::Inc)),
    ("1-", op::DEC, Some(Instruction::Dec)),
    ("drop", op::DROP, Some(Instruction::Drop)),
    ("dup", op::DUP, Some(Instruction::Dup)),
    ("swap", op::SWAP, Some(Instruction::Swap)),
    ("pick", op::PICK, Some(Instruction::Pick)),
    ("roll", op::ROLL, Some(Instruction::Roll)),
    ("clear", op::CLEAR, Some(Instruction::Clear)),
    (">r", op::PUSH_AUX, Some(Instruction::PushAux)),
    ("r>", op::POP_AUX, Some(Instruction::PopAux)),
    ("r@", op::PEEK_AUX, Some(Instruction::PeekAux)),
    ("forget", op::FORGET, Some(Instruction::Forget)),
    ("call", op::CALL_FROM_STACK, Some(Instruction::CallFromStack)),
    ("choice", op::CHOICE, Some(Instruction::Choice)),
    ("if", op::IF, Some(Instruction::If)),
    ("loopTicks", op::LOOP_TICKS, Some(Instruction::LoopTicks)),
    ("setLoop", op::SET_LOOP, Some(Instruction::SetLoop)),
    ("stopLoop", op::STOP_LOOP, Some(Instruction::StopLoop)),
    ("reset", op::RESET, Some(Instruction::Reset)),
    ("pinMode", op::PIN_MODE, Some(Instruction::PinMode)),
    ("digitalRead", op::DIGITAL_READ, Some(Instruction::DigitalRead)),
    ("digitalWrite", op::DIGITAL_WRITE, Some(Instruction::DigitalWrite)),
    ("analogRead", op::ANALOG_READ, Some(Instruction::AnalogRead)),
    ("analogWrite", op::ANALOG_WRITE, Some(Instruction::AnalogWrite)),
    ("attachISR", op::ATTACH_ISR, Some(Instruction::AttachIsr)),
    ("detachISR", op::DETACH_ISR, Some(Instruction::DetachIsr)),
    ("milliseconds", op::MILLISECONDS, Some(Instruction::Milliseconds)),
    ("pulseIn", op::PULSE_IN, Some(Instruction::PulseIn)),
    ("i2cSlot", op::I2C_SLOT, Some(Instruction::I2cSlot)),
    ("servoSlot", op::SERVO_SLOT, Some(Instruction::ServoSlot)),
];

/// `(name, source)`. Compiled lazily the same way a user's `define`
/// body would be — nothing here is special-cased by the assembler.
const SECONDARY: &[(&str, &str)] = &[
    // Boolean / pin-mode / edge constants. Truth is -1 (all bits set).
    ("true", "-1"),
    ("false", "0"),
    ("high", "-1"),
    ("low", "0"),
    ("on", "-1"),
    ("off", "0"),
    ("input", "0"),
    ("output", "1"),
    ("change", "1"),
    ("falling", "2"),
    ("rising", "3"),
    // Arithmetic helpers.
    ("square", "dup *"),
    ("abs", "dup 0 < [ neg ] if"),
    ("sign", "dup 0 < [ drop -1 ] [ dup 0 > [ drop 1 ] [ drop 0 ] if ] if"),
    ("min", "2dup < [ drop ] [ nip ] if"),
    ("max", "2dup > [ drop ] [ nip ] if"),
    ("clamp", "rot min max"),
    ("+!", "dup >r @ + r> !"),
    ("-!", "dup >r @ swap - r> !"),
    ("sum", "+ +"),
    // Stack combinators (Forth-style shuffles plus Factor-style
    // quotation combinators, since `call` takes a quotation address
    // the way Factor's calling convention does).
    ("2dup", "over over"),
    ("over", "1 pick"),
    ("rot", "2 roll"),
    ("nip", "swap drop"),
    ("tuck", "swap over"),
    ("dip", "swap >r call r>"),
    ("keep", ">r dup r> call"),
    ("bi", "[ keep ] dip call"),
    ("tri", "[ [ keep ] dip keep ] dip call"),
    ("bi@", "dup bi"),
    ("both?", "bi and"),
    ("either?", "bi or"),
    // Timing, over the raw `milliseconds` primitive.
    ("elapsed", "milliseconds swap -"),
];
