// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Install store management and manipulation.
//!
//! Bash-bootstrap keeps every installed version of the module payload in one
//! place called the __install store__, rooted at `~/.bash_bootstrap`.
//!
//! # Install Store Layout
//!
//! Each installed version lives in its own __version directory__ named after
//! its version identifier. A single __active symlink__ named `current` selects
//! which version directory is in use. The symlink target is always the bare
//! version name, i.e., a relative symlink, so the whole install store keeps
//! working if the user's home directory moves.
//!
//! ```text
//! ~/.bash_bootstrap/
//! ├── 3f9a1c2/
//! ├── a1b2c3d/
//! └── current -> a1b2c3d
//! ```
//!
//! # Convergence
//!
//! The install store never tries to be clever about what it already has.
//! Convergence always recopies the version directory, and always recreates
//! the active symlink. Neither step is atomic, so a crash can leave behind a
//! half-copied version directory or a missing symlink. Running convergence
//! again with the same inputs repairs both.

use crate::version::VersionId;

use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Versioned install store.
#[derive(Debug, Clone)]
pub struct InstallStore {
    root: PathBuf,
    symlink_name: String,
}

impl InstallStore {
    /// Construct new install store handle.
    ///
    /// Does not touch the filesystem.
    pub fn new(root: impl Into<PathBuf>, symlink_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            symlink_name: symlink_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Absolute path to active symlink.
    pub fn active_path(&self) -> PathBuf {
        self.root.join(&self.symlink_name)
    }

    /// Absolute path to version directory of target version.
    pub fn version_dir(&self, version: &VersionId) -> PathBuf {
        self.root.join(version)
    }

    /// Check if install root exists.
    pub fn is_present(&self) -> bool {
        fs::symlink_metadata(&self.root).is_ok()
    }

    /// Read target of active symlink.
    ///
    /// Returns [`None`] if the active symlink does not exist. Target is
    /// returned as is, even if dangling.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Io`] if active symlink exists but cannot be read.
    pub fn active_version(&self) -> Result<Option<PathBuf>> {
        let link = self.active_path();
        match fs::read_link(&link) {
            Ok(target) => Ok(Some(target)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io("read symlink", &link, err)),
        }
    }

    /// Converge install store onto target version.
    ///
    /// Guarantees that the version directory of `version` is a fresh copy of
    /// `module_source`, and that the active symlink points at it. Install
    /// root is created if missing. Any existing content at the version
    /// directory is considered stale, and is replaced. Returns absolute path
    /// to the active symlink.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Io`] if any filesystem operation fails. The
    ///   install store may be partially converged afterwards, which a repeated
    ///   call with the same arguments will complete.
    #[instrument(skip(self, module_source), level = "debug")]
    pub fn converge(&self, version: &VersionId, module_source: impl AsRef<Path>) -> Result<PathBuf> {
        let module_source = module_source.as_ref();

        mkdirp::mkdirp(&self.root).map_err(|err| StoreError::io("create", &self.root, err))?;

        let previous = self.active_version()?;
        match &previous {
            Some(target) => debug!("active symlink currently targets {:?}", target.display()),
            None => debug!("no active symlink in {:?}", self.root.display()),
        }

        let version_dir = self.version_dir(version);
        info!(
            "copy {:?} into {:?}",
            module_source.display(),
            version_dir.display()
        );
        remove_any(&version_dir)?;
        copy_tree(module_source, &version_dir)?;

        let link = self.active_path();
        remove_any(&link)?;
        make_relative_symlink(version.as_str(), &link)?;
        info!("activate version {version}");

        Ok(link)
    }
}

/// Remove whatever exists at target path, without following symlinks.
///
/// Missing paths and dangling symlinks are fine.
fn remove_any(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(StoreError::io("inspect", path, err)),
    };

    debug!("remove stale {:?}", path.display());
    if metadata.is_dir() {
        fs::remove_dir_all(path).map_err(|err| StoreError::io("remove directory", path, err))
    } else {
        fs::remove_file(path).map_err(|err| StoreError::io("remove", path, err))
    }
}

/// Recursively copy directory tree verbatim.
///
/// File permissions are preserved, and symlinks are recreated instead of
/// followed.
fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(source).to_path_buf();
            StoreError::io("walk", &path, io::Error::from(err))
        })?;

        // INVARIANT: Walk only yields paths under source.
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|err| StoreError::io("walk", entry.path(), io::Error::other(err)))?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|err| StoreError::io("create", &target, err))?;
        } else if file_type.is_symlink() {
            let link_target = fs::read_link(entry.path())
                .map_err(|err| StoreError::io("read symlink", entry.path(), err))?;
            make_relative_symlink(link_target, &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|err| StoreError::io("copy", entry.path(), err))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn make_relative_symlink(target: impl AsRef<Path>, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target.as_ref(), link)
        .map_err(|err| StoreError::io("create symlink", link, err))
}

#[cfg(windows)]
fn make_relative_symlink(target: impl AsRef<Path>, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(target.as_ref(), link)
        .map_err(|err| StoreError::io("create symlink", link, err))
}

/// All possible error types for install store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("failed to {action} {:?}", path.display())]
    Io {
        #[source]
        source: io::Error,
        action: &'static str,
        path: PathBuf,
    },
}

impl StoreError {
    fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            source,
            action,
            path: path.into(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
