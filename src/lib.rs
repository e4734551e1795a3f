//! grimoire - magic rule-book compilation.
//!
//! Compiles a "magic" file-format rule database (a [`Spellbook`] of named
//! pages, each an ordered tree of typed byte tests) into executable matcher
//! programs. Every page yields two entry points, one for native byte order
//! and one with all multi-byte reads byte-swapped; each maps a buffer and a
//! base offset to the labels of the rule chains that matched.
//!
//! # Primary Usage
//!
//! ```
//! use grimoire::{compile, CompileOptions, Spellbook};
//! use grimoire::book::{ByteWidth, Endianness, IntegerKind, IntegerTest, Kind, Offset, Rule};
//!
//! let mut book = Spellbook::new();
//! book.add_page(
//!     "elf",
//!     vec![Rule {
//!         level: 0,
//!         offset: Offset::Direct { offset: 0, relative: false },
//!         kind: Kind::Integer(IntegerKind {
//!             width: ByteWidth::Four,
//!             endian: Endianness::Little,
//!             test: IntegerTest::Equal,
//!             mask: None,
//!             adjust: None,
//!             value: 0x464c_457f,
//!             match_any: false,
//!         }),
//!         description: "ELF".into(),
//!         line: "0 lelong 0x464c457f ELF".into(),
//!     }],
//! );
//!
//! let compiled = compile(&book, CompileOptions::default()).unwrap();
//! let labels = compiled.identify("IdentifyElf", b"\x7fELF\x01\x01", 0).unwrap();
//! assert_eq!(labels, vec!["ELF".to_string()]);
//! ```
//!
//! # Architecture
//!
//! - [`book`] - Rule database model ([`Spellbook`], rules, offsets, kinds)
//! - [`compiler`] - Tree builder, offset expressions, per-node compiler, driver
//! - [`program`] - Compiled programs, entry points, execution, listings
//! - [`runtime`] - Bounds-checked reads and string/search primitives

pub mod book;
pub mod compiler;
pub mod program;
pub mod runtime;

pub use book::{Rule, Spellbook};
pub use compiler::{
    compile, entry_symbol, page_symbol, CompileError, CompileOptions, CompileResult, CompileStats,
};
pub use program::{CompiledBook, Entry, EntryError, PageProgram};
pub use runtime::StringTestFlags;
