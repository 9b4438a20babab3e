//! Local agent runtime.
//!
//! Turns a free-text request into a bounded sequence of file and command
//! operations proposed by a remote model, runs only what the user has
//! authorized, and snapshots files before overwriting them.
//!
//! - **[`core`]**: Pure logic (action model, argument normalization, path
//!   rules, snapshot naming, conversation state). No I/O.
//! - **[`io`]**: Side effects (project layout, grants, snapshots, child
//!   processes, remote transport), each behind a narrow API.
//!
//! [`dispatch`], [`looping`] and [`rollback`] combine the two to implement
//! the CLI commands.

pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod rollback;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod ui;
