//! Structured value representations.

mod layered;
mod simple;

pub use layered::LayeredStructured;
pub use simple::SimpleStructured;
