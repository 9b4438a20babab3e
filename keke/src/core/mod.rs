//! Deterministic, pure logic shared by the agent runtime.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod action;
pub mod normalize;
pub mod paths;
pub mod snapshot_name;
pub mod tier;
pub mod transcript;
