//! # Dictionary
//!
//! An ordered sequence of named definitions. Lookups traverse the
//! sequence newest-first so a later `define` of an existing name shadows
//! the earlier one without removing it — definitions are appended, never
//! patched in place.
//!
//! Three lookups exist, matching the three things a caller ever needs to
//! resolve a definition by: [`Dictionary::find_by_name`] (compiling a
//! `Token`), [`Dictionary::find_by_brief`] (encoding a primitive
//! `Instruction`), and [`Dictionary::find_by_code`] (disassembling a call
//! site back to a name). A fourth, [`Dictionary::find_by_opcode`], is the
//! one-byte analogue of `find_by_code` used to disassemble primitives.

use crate::instr::Instruction;
use crate::lazy::LazyCode;

/// A single named entry: a word, optionally an alias for a primitive
/// opcode, and the lazily-produced bytes that stand in for it wherever
/// the word is referenced.
pub struct Definition {
    pub word: String,
    pub brief: Option<Instruction>,
    pub code: LazyCode,
}

impl Definition {
    /// If this definition's code has already been forced to exactly one
    /// byte, that byte — the common case for primitive aliases and
    /// `instruction`-bound extensions, used when encoding a primitive
    /// `Instruction` that isn't operand-bearing.
    pub fn opcode_byte(&self) -> Option<u8> {
        match self.code.peek() {
            Some([b]) => Some(*b),
            _ => None,
        }
    }
}

/// Ordered, append-only list of definitions with newest-first shadowing.
#[derive(Default)]
pub struct Dictionary {
    entries: Vec<Definition>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary {
            entries: Vec::new(),
        }
    }

    /// Append a new definition. Never patches an existing entry in
    /// place, even if `name` already exists — the new entry shadows it.
    pub fn define(&mut self, brief: Option<Instruction>, word: String, code: LazyCode) {
        self.entries.push(Definition { word, brief, code });
    }

    /// Drop every definition. The caller is responsible for
    /// repopulating via the standard-library initializer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Newest-first iterator, the order every lookup here walks in.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &Definition> {
        self.entries.iter().rev()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Definition> {
        self.iter_newest_first().find(|d| d.word == name)
    }

    pub fn find_by_brief(&self, brief: &Instruction) -> Option<&Definition> {
        self.iter_newest_first()
            .find(|d| d.brief.as_ref() == Some(brief))
    }

    /// Resolve a primitive opcode byte back to its bound `Instruction`,
    /// for disassembly. Only definitions whose code has already been
    /// forced to that exact single byte are visible here — this never
    /// itself forces anything.
    pub fn find_by_opcode(&self, byte: u8) -> Option<Instruction> {
        self.iter_newest_first()
            .find(|d| d.opcode_byte() == Some(byte) && d.brief.is_some())
            .and_then(|d| d.brief.clone())
    }

    /// Resolve an exact produced byte sequence (typically a two-byte
    /// call) back to the definition it belongs to, for disassembly.
    /// Only already-forced code is visible here.
    pub fn find_by_code(&self, bytes: &[u8]) -> Option<&Definition> {
        self.iter_newest_first().find(|d| d.code.peek() == Some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_prefers_the_newest_definition() {
        let mut dict = Dictionary::new();
        dict.define(None, "foo".into(), LazyCode::ready(vec![1]));
        dict.define(None, "foo".into(), LazyCode::ready(vec![2]));
        let found = dict.find_by_name("foo").unwrap();
        assert_eq!(found.code.peek(), Some(&[2][..]));
    }

    #[test]
    fn find_by_brief_resolves_a_primitive_alias() {
        let mut dict = Dictionary::new();
        dict.define(
            Some(Instruction::Dup),
            "dup".into(),
            LazyCode::ready(vec![0x23]),
        );
        let found = dict.find_by_brief(&Instruction::Dup).unwrap();
        assert_eq!(found.word, "dup");
    }
}
