//! Lazy, origin-relative pathnames and the lexical helpers used to build them.

mod normalize;
mod path;

pub use normalize::normalize;
pub use path::*;
