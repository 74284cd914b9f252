// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.
//!
//! # Installation Layout
//!
//! Everything bash-bootstrap touches on the user's machine hangs off of their
//! home directory, and none of it is configurable:
//!
//! - `~/.bash_bootstrap/` is the __install root__.
//! - `~/.bash_bootstrap/<version>/` is a __version directory__.
//! - `~/.bash_bootstrap/current` is the __active symlink__, whose target is
//!   the bare version name so the install root survives a home directory move.
//! - `~/.bashrc` is the __startup file__ that sources the active modules.

use std::path::{Path, PathBuf};

/// Name of install root directory inside user's home directory.
pub const INSTALL_ROOT_NAME: &str = ".bash_bootstrap";

/// Name of the active symlink inside the install root.
pub const ACTIVE_SYMLINK_NAME: &str = "current";

/// Name of the startup file inside user's home directory.
pub const STARTUP_FILE_NAME: &str = ".bashrc";

/// Login mode init files in the order bash looks for them.
pub const LOGIN_FILE_NAMES: [&str; 3] = [".bash_profile", ".bash_login", ".profile"];

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Fixed on-disk layout of an installation.
///
/// Does not check if any of the paths it hands out actually exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    home: PathBuf,
}

impl Layout {
    /// Construct layout rooted at target home directory.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Construct layout rooted at the current user's home directory.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if home directory path cannot be determined.
    pub fn try_default() -> Result<Self> {
        home_dir().map(Self::new)
    }

    pub fn home(&self) -> &Path {
        self.home.as_path()
    }

    pub fn install_root(&self) -> PathBuf {
        self.home.join(INSTALL_ROOT_NAME)
    }

    pub fn active_symlink(&self) -> PathBuf {
        self.install_root().join(ACTIVE_SYMLINK_NAME)
    }

    pub fn startup_file(&self) -> PathBuf {
        self.home.join(STARTUP_FILE_NAME)
    }

    /// Candidate login mode init files, in bash lookup order.
    pub fn login_files(&self) -> Vec<PathBuf> {
        LOGIN_FILE_NAMES
            .iter()
            .map(|name| self.home.join(name))
            .collect()
    }

    /// Home-relative prefix that module activation lines are written with.
    ///
    /// Always goes through the active symlink, e.g., `~/.bash_bootstrap/current`,
    /// so the startup file never needs to know the active version.
    pub fn activation_prefix(&self) -> String {
        format!("~/{INSTALL_ROOT_NAME}/{ACTIVE_SYMLINK_NAME}")
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
