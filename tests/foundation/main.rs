//! Integration tests for Layer 0: Foundation
//!
//! Tests for problems, the type registry and the structural matcher.

mod matching;
mod problems;
