//! # Memoized, Deferred Byte-Code Generation
//!
//! [`LazyCode`] is the suspended computation behind every dictionary
//! entry's `code` field. On first force it runs a generator against the
//! dictionary and the live allocation state, records the produced bytes
//! in a [`once_cell::unsync::OnceCell`], and returns the same bytes on
//! every later force without re-running the generator or touching
//! allocation state again — the mechanism that makes shrinking
//! idempotent.
//!
//! The generator takes `(&Dictionary, &mut Alloc)` rather than
//! `&mut CompilerState`: assembling a definition's body means looking up
//! other words in the same dictionary this entry lives in, and a lookup
//! borrows the dictionary immutably. If forcing instead took the whole
//! compiler state mutably, that immutable borrow would have to stay
//! alive across the very call that forces it — the borrow checker
//! forbids exactly that. Splitting the dictionary (read-only during
//! assembly) from the allocator (the only thing a force mutates) avoids
//! the conflict without unsafe code or interior mutability beyond the
//! single `OnceCell` already here.
//!
//! Two constructors cover the two shapes dictionary entries come in:
//! - [`LazyCode::ready`] for primitive aliases and `instruction`-bound
//!   extensions, whose one-byte code is already known and never consumes
//!   a device address.
//! - [`LazyCode::deferred`] for secondary definitions (stdlib words and
//!   anything introduced by `define`/`variable`), whose generator runs
//!   the assembler against the word's body the first time the word is
//!   referenced.

use once_cell::unsync::OnceCell;

use crate::compiler::Alloc;
use crate::dict::Dictionary;
use crate::error::ToolError;

type Generator = Box<dyn Fn(&Dictionary, &mut Alloc) -> Result<Vec<u8>, ToolError>>;

pub struct LazyCode {
    cell: OnceCell<Vec<u8>>,
    generator: Option<Generator>,
}

impl LazyCode {
    /// A value that is already known and consumes no device address when
    /// "forced" — used for primitive aliases and `instruction` extensions.
    pub fn ready(bytes: Vec<u8>) -> Self {
        let cell = OnceCell::new();
        // Always succeeds: the cell was just created.
        let _ = cell.set(bytes);
        LazyCode {
            cell,
            generator: None,
        }
    }

    /// A suspended computation run against the dictionary and allocator
    /// on first force.
    pub fn deferred<F>(generator: F) -> Self
    where
        F: Fn(&Dictionary, &mut Alloc) -> Result<Vec<u8>, ToolError> + 'static,
    {
        LazyCode {
            cell: OnceCell::new(),
            generator: Some(Box::new(generator)),
        }
    }

    /// Force this code, running the generator only on the first call.
    /// Idempotent: the second and later calls return the memoized bytes
    /// without touching `alloc` at all.
    pub fn force(&self, dict: &Dictionary, alloc: &mut Alloc) -> Result<&[u8], ToolError> {
        if self.cell.get().is_none() {
            let generator = self
                .generator
                .as_ref()
                .expect("a cell with no generator is always pre-populated by `ready`");
            let bytes = generator(dict, alloc)?;
            // Another force cannot have raced us in; the compiler is
            // single-threaded (see the concurrency model).
            let _ = self.cell.set(bytes);
        }
        Ok(self
            .cell
            .get()
            .expect("just populated, or populated by `ready` at construction")
            .as_slice())
    }

    /// The memoized bytes, if this code has already been forced (or was
    /// constructed `ready`). Used by lookups that must not themselves
    /// force anything (e.g. disassembly).
    pub fn peek(&self) -> Option<&[u8]> {
        self.cell.get().map(Vec::as_slice)
    }
}
