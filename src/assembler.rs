//! # Assembler / Shrinker
//!
//! Turns a parsed [`Node`] tree into bytes, in two modes:
//!
//! - **Eager** ([`eager_assemble`]): produce bytes right now, suitable
//!   for an execute frame or for feeding back into `shrink`.
//! - **Lazy** ([`compile_definition`] / [`compile_variable`]): wrap a
//!   body in a [`LazyCode`] whose generator runs eager assembly and then
//!   [`shrink`] the first time the defined word is referenced.
//!
//! Shrinking is the decision at the center of this whole toolchain:
//! whether a definition's bytes stay inline at every call site, or get
//! committed once to a device address and replaced everywhere by a
//! two-byte call. See [`shrink`] for the exact thresholds.

use crate::compiler::Alloc;
use crate::dict::Dictionary;
use crate::error::{CompileError, ToolError};
use crate::instr::{encode_call, disassemble, Instruction};
use crate::lazy::LazyCode;
use crate::opcodes as op;
use crate::parser::Node;

/// Eagerly assemble a node list to bytes, resolving every `Token`
/// against `dict` and forcing its code (which may itself recursively
/// force other, not-yet-forced definitions it depends on).
pub fn eager_assemble(
    nodes: &[Node],
    dict: &Dictionary,
    alloc: &mut Alloc,
) -> Result<Vec<u8>, ToolError> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Token(name) => {
                let def = dict
                    .find_by_name(name)
                    .ok_or_else(|| CompileError::UnknownWord(name.clone()))?;
                out.extend_from_slice(def.code.force(dict, alloc)?);
            }
            Node::Number(n) => {
                out.extend(Instruction::Literal(*n).encode(dict)?);
            }
            Node::Address(a) => {
                out.extend(encode_call(*a)?);
            }
            Node::Quotation(children) => {
                let q = eager_assemble(children, dict, alloc)?;
                // Single-word-quotation optimization: `[ w ]` where `w`
                // resolved to a two-byte call degenerates to pushing
                // that call's address directly.
                let disassembled = disassemble(&q, dict);
                if let [Instruction::Word { addr, .. }] = disassembled.as_slice() {
                    out.extend(Instruction::Literal(*addr).encode(dict)?);
                } else {
                    let len = q.len() + 1; // +1 for the trailing return
                    let len: u8 = len
                        .try_into()
                        .map_err(|_| CompileError::QuoteTooLarge(q.len()))?;
                    out.push(op::QUOTE);
                    out.push(len);
                    out.extend(q);
                    out.push(op::RETURN);
                }
            }
        }
    }
    Ok(out)
}

/// The outcome of shrinking a definition's assembled bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shrunk {
    /// The bytes are short enough to stay inline at every call site.
    Inline(Vec<u8>),
    /// The bytes were committed to the device at `addr`; `site` is what
    /// a reference to this word encodes to (a two-byte call).
    Committed { addr: i16, site: Vec<u8> },
}

impl Shrunk {
    /// The bytes a reference to this definition encodes to.
    pub fn site_bytes(&self) -> &[u8] {
        match self {
            Shrunk::Inline(bytes) => bytes,
            Shrunk::Committed { site, .. } => site,
        }
    }
}

/// Decide whether assembled bytes `code` stay inline or commit to the
/// device, advancing `alloc` in the committed case.
///
/// - 0, 1, or 2 bytes: inline, no device address consumed.
/// - 3 or more bytes: commit. The call site becomes a two-byte call to
///   the current `alloc.address`; `alloc.address` advances by
///   `code.len() + 1` (the `+1` is the trailing return appended on the
///   device side); `code ++ [return]` is appended to `alloc.pending`.
pub fn shrink(code: Vec<u8>, alloc: &mut Alloc) -> Result<Shrunk, ToolError> {
    if code.len() <= 2 {
        return Ok(Shrunk::Inline(code));
    }
    let addr = alloc.address;
    let site = encode_call(addr)?;
    let mut committed = code;
    committed.push(op::RETURN);
    alloc.address += committed.len() as i16;
    alloc.pending.extend_from_slice(&committed);
    Ok(Shrunk::Committed { addr, site })
}

/// Build the lazy code for an ordinary `define`d or stdlib word: on
/// first reference, eagerly assemble `body` and shrink the result.
pub fn compile_definition(body: Vec<Node>) -> LazyCode {
    LazyCode::deferred(move |dict, alloc| {
        let code = eager_assemble(&body, dict, alloc)?;
        let shrunk = shrink(code, alloc)?;
        Ok(shrunk.site_bytes().to_vec())
    })
}

/// Build the lazy code for a `variable`: always commits a fresh 2-byte
/// storage cell to the device, regardless of size, and a reference to
/// the word pushes that cell's address rather than calling it.
///
/// This is the resolution of an ambiguity left open by the source
/// material (see DESIGN.md): a variable's defining word is never
/// executed, only referenced for its address, so the ordinary
/// inline-vs-commit size threshold does not apply to it — it always
/// needs a stable device address to read and write through.
pub fn compile_variable() -> LazyCode {
    LazyCode::deferred(move |dict, alloc| {
        let addr = alloc.address;
        alloc.address += 2;
        alloc.pending.extend_from_slice(&[0, 0]);
        Instruction::Literal(addr)
            .encode(dict)
            .map_err(ToolError::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::Dictionary;

    fn dict_with_dup_mul() -> Dictionary {
        let mut dict = Dictionary::new();
        dict.define(Some(Instruction::Dup), "dup".into(), LazyCode::ready(vec![op::DUP]));
        dict.define(Some(Instruction::Mul), "*".into(), LazyCode::ready(vec![op::MUL]));
        dict
    }

    #[test]
    fn shrink_boundary_inlines_up_to_two_bytes() {
        let mut alloc = Alloc::default();
        assert_eq!(shrink(vec![], &mut alloc).unwrap(), Shrunk::Inline(vec![]));
        assert_eq!(
            shrink(vec![op::DUP], &mut alloc).unwrap(),
            Shrunk::Inline(vec![op::DUP])
        );
        assert_eq!(
            shrink(vec![op::DUP, op::MUL], &mut alloc).unwrap(),
            Shrunk::Inline(vec![op::DUP, op::MUL])
        );
        assert_eq!(alloc.address, 0);
        assert!(alloc.pending.is_empty());
    }

    #[test]
    fn shrink_commits_three_or_more_bytes_with_a_trailing_return() {
        let mut alloc = Alloc::default();
        let result = shrink(vec![op::DUP, op::MUL, op::DUP], &mut alloc).unwrap();
        match result {
            Shrunk::Committed { addr, site } => {
                assert_eq!(addr, 0);
                assert_eq!(site.len(), 2);
            }
            other => panic!("expected Committed, got {other:?}"),
        }
        assert_eq!(alloc.address, 4); // 3 bytes + trailing return
        assert_eq!(alloc.pending, vec![op::DUP, op::MUL, op::DUP, op::RETURN]);
    }

    #[test]
    fn shrink_is_idempotent_across_two_forces() {
        let dict = {
            let mut d = dict_with_dup_mul();
            let body = vec![Node::Token("dup".into()), Node::Token("*".into()), Node::Token("dup".into())];
            d.define(None, "cube_ish".into(), compile_definition(body));
            d
        };
        let mut alloc = Alloc::default();
        let first = dict
            .find_by_name("cube_ish")
            .unwrap()
            .code
            .force(&dict, &mut alloc)
            .unwrap()
            .to_vec();
        let addr_after_first = alloc.address;
        let second = dict
            .find_by_name("cube_ish")
            .unwrap()
            .code
            .force(&dict, &mut alloc)
            .unwrap()
            .to_vec();
        assert_eq!(first, second);
        assert_eq!(alloc.address, addr_after_first);
    }

    #[test]
    fn single_word_quotation_degenerates_to_a_literal_push() {
        let mut dict = dict_with_dup_mul();
        let body = vec![Node::Token("dup".into()), Node::Token("*".into()), Node::Token("dup".into())];
        dict.define(None, "square3".into(), compile_definition(body));
        let mut alloc = Alloc::default();
        // Force the commit so `square3` has a real address.
        dict.find_by_name("square3")
            .unwrap()
            .code
            .force(&dict, &mut alloc)
            .unwrap();

        let nodes = vec![Node::Quotation(vec![Node::Token("square3".into())])];
        let bytes = eager_assemble(&nodes, &dict, &mut alloc).unwrap();
        // Literal(addr) where addr == 0 encodes as the 2-byte lit8 form.
        assert_eq!(bytes, vec![op::LIT8, 0]);
    }

    #[test]
    fn quotation_with_more_than_one_instruction_emits_quote_and_return() {
        let dict = dict_with_dup_mul();
        let mut alloc = Alloc::default();
        let nodes = vec![Node::Quotation(vec![
            Node::Token("dup".into()),
            Node::Token("*".into()),
        ])];
        let bytes = eager_assemble(&nodes, &dict, &mut alloc).unwrap();
        assert_eq!(bytes, vec![op::QUOTE, 3, op::DUP, op::MUL, op::RETURN]);
    }

    #[test]
    fn unknown_token_is_a_compile_error() {
        let dict = Dictionary::new();
        let mut alloc = Alloc::default();
        let nodes = vec![Node::Token("nosuchword".into())];
        let err = eager_assemble(&nodes, &dict, &mut alloc).unwrap_err();
        assert!(matches!(
            err,
            ToolError::Compile(CompileError::UnknownWord(ref w)) if w == "nosuchword"
        ));
    }

    #[test]
    fn variable_always_commits_a_two_byte_cell_and_pushes_its_address() {
        let dict = {
            let mut d = Dictionary::new();
            d.define(None, "counter".into(), compile_variable());
            d
        };
        let mut alloc = Alloc::default();
        let bytes = dict
            .find_by_name("counter")
            .unwrap()
            .code
            .force(&dict, &mut alloc)
            .unwrap();
        assert_eq!(bytes, vec![op::LIT8, 0]);
        assert_eq!(alloc.address, 2);
        assert_eq!(alloc.pending, vec![0, 0]);
    }
}
