//! Property-based invariants from the spec's testable-properties section:
//! lex round-trip, literal encoding range, call addressing, and event
//! payload sizing. Shrink idempotence/boundary and the single-word
//! quotation optimization are covered as ordinary `#[test]`s alongside
//! the assembler (they need a populated dictionary, which doesn't fit
//! quickcheck's `Arbitrary` shape as naturally).

use quickcheck::{Gen, TestResult};
use quickcheck_macros::quickcheck;

use stitchforth::device::vm::scalar_payload;
use stitchforth::dict::Dictionary;
use stitchforth::instr::{decode_call, encode_call, Instruction};
use stitchforth::lexer::lex;

/// A token that lexes as a single plain word: no brackets, no leading
/// tick, no whitespace — the domain the spec's lex round-trip property
/// is stated over.
#[derive(Clone, Debug)]
struct PlainToken(String);

impl quickcheck::Arbitrary for PlainToken {
    fn arbitrary(g: &mut Gen) -> Self {
        const ALPHABET: &[char] = &[
            'a', 'b', 'c', 'd', 'e', 'f', 'g', 'x', 'y', 'z', 'A', 'B', 'Z', '0', '1', '9', '+',
            '-', '*', '/', '?', '!',
        ];
        let len = 1 + (usize::arbitrary(g) % 5);
        let s: String = (0..len)
            .map(|_| *g.choose(ALPHABET).expect("non-empty alphabet"))
            .collect();
        PlainToken(s)
    }
}

#[quickcheck]
fn lex_join_round_trips_plain_token_lists(tokens: Vec<PlainToken>) -> TestResult {
    if tokens.is_empty() {
        return TestResult::discard();
    }
    let words: Vec<String> = tokens.into_iter().map(|t| t.0).collect();
    let joined = words.join(" ");
    match lex(&joined) {
        Ok(lexed) => TestResult::from_bool(lexed == words),
        Err(_) => TestResult::failed(),
    }
}

#[quickcheck]
fn literal_encoding_length_matches_the_i8_boundary(x: i16) -> bool {
    let dict = Dictionary::new();
    let bytes = Instruction::Literal(x).encode(&dict).expect("literal always encodes");
    if (-128..=127).contains(&x) {
        bytes.len() == 2
    } else {
        bytes.len() == 3
    }
}

#[quickcheck]
fn call_addressing_round_trips_for_every_fifteen_bit_address(raw: u16) -> bool {
    let addr = (raw % 32_768) as i16;
    let bytes = encode_call(addr).expect("address is within range");
    decode_call(bytes[0], bytes[1]) == Some(addr)
}

#[quickcheck]
fn call_addressing_rejects_negative_addresses(addr: i16) -> TestResult {
    if addr >= 0 {
        return TestResult::discard();
    }
    TestResult::from_bool(encode_call(addr).is_err())
}

#[quickcheck]
fn scalar_event_size_matches_the_spec_table(v: i16) -> bool {
    let expected = if v == 0 {
        0
    } else if (-128..=127).contains(&v) {
        1
    } else {
        2
    };
    scalar_payload(v).len() == expected
}
