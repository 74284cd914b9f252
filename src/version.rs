// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version resolution.
//!
//! Every installation is stamped with a __version identifier__ derived from
//! the content of the source tree it was installed from. The identifier is
//! the abbreviated commit hash of `HEAD` in the source tree's repository, so
//! an identical source tree always produces an identical identifier.
//!
//! The identifier doubles as a directory name and as the target of the active
//! symlink, so it is validated before anything gets to touch the filesystem.

use crate::path::ACTIVE_SYMLINK_NAME;

use git2::Repository;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument};

/// Short, stable identifier of a source tree.
///
/// # Invariant
///
/// - Never empty.
/// - Contains no path separators or surrounding whitespace.
/// - Never names a special directory entry or the active symlink.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionId(String);

impl VersionId {
    /// Construct new version identifier.
    ///
    /// Surrounding whitespace is trimmed off before validation.
    ///
    /// # Errors
    ///
    /// - Return [`VersionError::InvalidVersion`] if identifier cannot be used
    ///   as a version directory name.
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref().trim();
        let is_valid = !id.is_empty()
            && !id.contains(['/', '\\'])
            && !id.chars().any(char::is_whitespace)
            && !matches!(id, "." | ".." | ACTIVE_SYMLINK_NAME);

        if !is_valid {
            return Err(VersionError::InvalidVersion { id: id.to_string() });
        }

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for VersionId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.0)
    }
}

impl AsRef<Path> for VersionId {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// Derive version identifier of a source tree.
pub trait VersionResolver {
    /// Resolve version identifier of current source tree.
    ///
    /// Must not have side effects.
    fn resolve(&self) -> Result<VersionId>;
}

impl<R> VersionResolver for Box<R>
where
    R: VersionResolver + ?Sized,
{
    fn resolve(&self) -> Result<VersionId> {
        (**self).resolve()
    }
}

/// Resolve version through the Git binary.
///
/// Locates `git` on `PATH`, and runs `git rev-parse --verify --short HEAD`
/// inside of the source tree.
#[derive(Debug, Clone)]
pub struct GitCli {
    source_root: PathBuf,
}

impl GitCli {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }
}

impl VersionResolver for GitCli {
    /// Resolve version identifier through Git binary.
    ///
    /// # Errors
    ///
    /// - Return [`VersionError::ToolingUnavailable`] if `git` is not on `PATH`.
    /// - Return [`VersionError::ResolutionFailed`] if `git` cannot be run, or
    ///   exits with non-zero exit code, e.g., not inside of a repository.
    /// - Return [`VersionError::InvalidVersion`] if output is not a usable
    ///   identifier.
    #[instrument(skip(self), level = "debug")]
    fn resolve(&self) -> Result<VersionId> {
        let git = which::which("git").map_err(|err| VersionError::ToolingUnavailable {
            tool: "git".into(),
            source: err,
        })?;
        debug!("resolve version with {:?}", git.display());

        let output = Command::new(&git)
            .args(["rev-parse", "--verify", "--short", "HEAD"])
            .current_dir(&self.source_root)
            .output()
            .map_err(|err| VersionError::ResolutionFailed {
                source_root: self.source_root.clone(),
                reason: format!("cannot run {:?}: {err}", git.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(output.stderr.as_slice());
            return Err(VersionError::ResolutionFailed {
                source_root: self.source_root.clone(),
                reason: format!("git rev-parse failed ({}): {}", output.status, stderr.trim()),
            });
        }

        VersionId::new(String::from_utf8_lossy(output.stdout.as_slice()))
    }
}

/// Resolve version through libgit2.
///
/// Discovers the repository containing the source tree, and abbreviates the
/// commit `HEAD` points to.
#[derive(Debug, Clone)]
pub struct Git2 {
    source_root: PathBuf,
}

impl Git2 {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }
}

impl VersionResolver for Git2 {
    /// Resolve version identifier through libgit2.
    ///
    /// # Errors
    ///
    /// - Return [`VersionError::ResolutionFailed`] if source tree is not in a
    ///   repository, or `HEAD` has no commit yet.
    /// - Return [`VersionError::InvalidVersion`] if abbreviated hash is not a
    ///   usable identifier.
    #[instrument(skip(self), level = "debug")]
    fn resolve(&self) -> Result<VersionId> {
        let failed = |err: git2::Error| VersionError::ResolutionFailed {
            source_root: self.source_root.clone(),
            reason: err.message().to_string(),
        };

        let repository = Repository::discover(&self.source_root).map_err(failed)?;
        let commit = repository
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(failed)?;
        let short = commit.as_object().short_id().map_err(failed)?;

        match short.as_str() {
            Some(id) => VersionId::new(id),
            None => Err(VersionError::ResolutionFailed {
                source_root: self.source_root.clone(),
                reason: "abbreviated commit id is not valid UTF-8".into(),
            }),
        }
    }
}

/// Version resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// Required external command cannot be located.
    #[error("cannot locate required command {tool:?}")]
    ToolingUnavailable {
        #[source]
        source: which::Error,
        tool: String,
    },

    /// Version control cannot produce an identifier.
    #[error("failed to resolve version of {:?}: {reason}", source_root.display())]
    ResolutionFailed { source_root: PathBuf, reason: String },

    /// Identifier cannot be used as a version directory name.
    #[error("invalid version identifier {id:?}")]
    InvalidVersion { id: String },
}

/// Friendly result alias :3
pub type Result<T, E = VersionError> = std::result::Result<T, E>;
