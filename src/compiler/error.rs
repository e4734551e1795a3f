// This module defines the compile-time error type using the thiserror crate. Every
// variant is a rule-database defect: a level that skips past its parent, a clear or
// default rule appearing outside any default-marker scope, or a use rule naming a
// page the book does not contain. Each variant carries the page name and the
// offending rule's original source line so the database author can find it.
// Match-time non-matches are deliberately not represented here; they are ordinary
// control flow inside the compiled programs, never errors.

//! Error types for rule-book compilation.

use thiserror::Error;

/// A defect in the rule database, fatal to compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("rule at level {level} skips past its parent in page {page:?}: {line}")]
    LevelSkip {
        page: String,
        level: u32,
        line: String,
    },

    #[error("{family} rule outside any default group in page {page:?}: {line}")]
    NoDefaultScope {
        family: &'static str,
        page: String,
        line: String,
    },

    #[error("use rule references unknown page {target:?} in page {page:?}: {line}")]
    UnknownUseTarget {
        page: String,
        target: String,
        line: String,
    },
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
