// This module is the page/endianness driver and the home of the compile session.
// compile() walks the spellbook's pages in lexicographically sorted order, builds
// each page's rule tree once in the session arena, and emits two programs per page
// (native byte order, then with all multi-byte reads swapped) under entry symbols
// derived deterministically from the page name. All entry symbols are assigned up
// front so use-rules can resolve their targets to program handles regardless of
// page order, which also makes mutually recursive pages compile without cycle
// detection. The session owns the bumpalo arena backing the transient rule trees
// and gathers compile statistics behind a RefCell, in the same shape as an
// arena-backed compilation session threading state through a larger compiler.

//! Rule-book compilation: driver, session, and entry-point naming.

use std::cell::RefCell;
use std::fmt;

use bumpalo::Bump;
use hashbrown::HashMap;
use log::{debug, trace};

use crate::book::Spellbook;
use crate::program::CompiledBook;

pub mod error;
pub mod expr;

pub(crate) mod emit;
pub(crate) mod tree;

pub use error::{CompileError, CompileResult};

/// Behavior-neutral diagnostic switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Compiled programs log each evaluated rule's source line at trace level.
    pub trace_rules: bool,
    /// Retain rule source text in the artifact so listings can embed it.
    pub keep_rule_text: bool,
}

/// Counters gathered while compiling one book.
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    pub pages: usize,
    pub programs: usize,
    pub nodes: usize,
    pub pointer_reads_reused: usize,
    pub value_reads_reused: usize,
    pub exprs_folded: usize,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compiled {} pages into {} programs: {} nodes, {} pointer reads reused, \
             {} value reads reused, {} expressions folded",
            self.pages,
            self.programs,
            self.nodes,
            self.pointer_reads_reused,
            self.value_reads_reused,
            self.exprs_folded
        )
    }
}

/// Arena and bookkeeping shared by everything compiled from one book.
pub(crate) struct CompileSession<'arena> {
    arena: &'arena Bump,
    opts: CompileOptions,
    stats: RefCell<CompileStats>,
}

impl<'arena> CompileSession<'arena> {
    pub(crate) fn new(arena: &'arena Bump, opts: CompileOptions) -> Self {
        Self {
            arena,
            opts,
            stats: RefCell::new(CompileStats::default()),
        }
    }

    pub(crate) fn arena(&self) -> &'arena Bump {
        self.arena
    }

    pub(crate) fn opts(&self) -> &CompileOptions {
        &self.opts
    }

    pub(crate) fn note_node(&self) {
        self.stats.borrow_mut().nodes += 1;
    }

    pub(crate) fn note_pointer_reuse(&self) {
        self.stats.borrow_mut().pointer_reads_reused += 1;
    }

    pub(crate) fn note_value_reuse(&self) {
        self.stats.borrow_mut().value_reads_reused += 1;
    }

    pub(crate) fn note_fold(&self) {
        self.stats.borrow_mut().exprs_folded += 1;
    }

    fn take_stats(&self) -> CompileStats {
        self.stats.take()
    }
}

/// Symbol a page compiles under: dash-separated tokens capitalized and
/// concatenated, with a fixed suffix for the swapped variant.
pub fn page_symbol(page: &str, swapped: bool) -> String {
    let mut symbol = String::with_capacity(page.len());
    for token in page.split('-') {
        let mut chars = token.chars();
        if let Some(first) = chars.next() {
            symbol.extend(first.to_uppercase());
            symbol.push_str(chars.as_str());
        }
    }
    if swapped {
        symbol.push_str("__Swapped");
    }
    symbol
}

/// Full entry-point name for a page variant.
pub fn entry_symbol(page: &str, swapped: bool) -> String {
    format!("Identify{}", page_symbol(page, swapped))
}

/// Compile every page of the book, native and swapped, into a [`CompiledBook`].
pub fn compile(book: &Spellbook, opts: CompileOptions) -> CompileResult<CompiledBook> {
    let arena = Bump::new();
    let session = CompileSession::new(&arena, opts);
    let pages = book.sorted_pages();

    // Assign every entry symbol before emitting anything so use-rules can
    // target pages in either direction, including cycles.
    let mut symbols = HashMap::new();
    let mut index = 0usize;
    for page in &pages {
        for swapped in [false, true] {
            symbols.insert(entry_symbol(page, swapped), index);
            index += 1;
        }
    }

    let mut programs = Vec::with_capacity(index);
    for page in &pages {
        let rules = book.rules(page).unwrap_or(&[]);
        debug!("compiling page {page:?} ({} rules)", rules.len());
        let tree = tree::treeify(session.arena(), page, rules)?;
        for swapped in [false, true] {
            let program = emit::build(&session, &symbols, page, rules, &tree, swapped)?;
            trace!("emitted {} ({} nodes)", program.symbol(), program.node_count());
            programs.push(program);
        }
    }

    let mut stats = session.take_stats();
    stats.pages = pages.len();
    stats.programs = programs.len();
    debug!("{stats}");

    Ok(CompiledBook::assemble(programs, symbols, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_symbols_capitalize_dash_tokens() {
        assert_eq!(page_symbol("elf", false), "Elf");
        assert_eq!(page_symbol("mach-o", false), "MachO");
        assert_eq!(page_symbol("ms-dos", true), "MsDos__Swapped");
        assert_eq!(page_symbol("x86-boot", false), "X86Boot");
    }

    #[test]
    fn entry_symbols_carry_the_identify_prefix() {
        assert_eq!(entry_symbol("gzip", false), "IdentifyGzip");
        assert_eq!(entry_symbol("gzip", true), "IdentifyGzip__Swapped");
    }
}
