//! Iterable value representations.

mod simple;
mod spliced;

pub use simple::SimpleIterable;
pub use spliced::SpliceNode;
