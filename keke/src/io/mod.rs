//! I/O helpers: project layout, config, grants, snapshots, child processes,
//! and the remote agent transport.

pub mod changelog;
pub mod config;
pub mod permissions;
pub mod process;
pub mod project;
pub mod prompter;
pub mod remote;
pub mod snapshot;
pub mod workspace;
