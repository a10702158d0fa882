//! # Tidewater
//!
//! Command-line front end for the release engine: layered configuration,
//! argument parsing and the `workloads`/`release` commands. The engine itself
//! lives in `tidewater-release`.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod cli;
pub mod commands;
pub mod config;

pub use tidewater_core;
pub use tidewater_manifests;
pub use tidewater_release;
