// This module groups the match-time primitives the compiled programs are expressed
// in terms of: bounds-checked integer reads parameterized by width and endianness,
// and the string/search byte-pattern tests with their textual matching flags. These
// are the only ways generated matchers touch the input buffer.

//! Match-time buffer primitives.

pub mod read;
pub mod strings;

pub use read::read_uint;
pub use strings::{search_test, string_test, StringTestFlags};
