// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Versioned bash environment bootstrapper.
//!
//! Copies a tree of shell modules into a version-stamped directory under
//! `~/.bash_bootstrap`, points the `current` symlink at it, runs one-shot
//! download modules, and makes `~/.bashrc` source every module in priority
//! order. Every step converges, so running it again after a failure picks up
//! where the last run left off.

pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod module;
pub mod path;
pub mod startup;
pub mod store;
pub mod version;

pub use bootstrap::{Bootstrap, BootstrapError, InstallState, Status};
pub use config::{BootstrapConfig, SourceTree};
pub use path::Layout;
pub use version::{Git2, GitCli, VersionId, VersionResolver};
