// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sourced module listing.
//!
//! Sourced modules are activated in __priority__ order. The priority of a
//! module comes from its file name: a leading two digit prefix like `07-` or
//! `10-` is the priority, and anything without one sorts after every prefixed
//! module. Modules of equal priority are ordered by file name, so the listing
//! never depends on directory iteration order.

use std::{
    cmp::Ordering,
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

/// Priority of modules without a two digit prefix.
///
/// Greater than every two digit prefix, so `99-last.sh` still comes before
/// `aliases.sh`.
pub const UNPREFIXED_PRIORITY: u8 = 100;

/// Sourced module inside of a version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    priority: u8,
    file_name: String,
    activation_path: String,
}

impl ModuleEntry {
    /// Construct new module entry.
    ///
    /// The activation path is `file_name` joined onto `prefix`.
    pub fn new(file_name: impl Into<String>, prefix: &str) -> Self {
        let file_name = file_name.into();
        let activation_path = format!("{}/{}", prefix.trim_end_matches('/'), file_name);

        Self {
            priority: priority(&file_name),
            file_name,
            activation_path,
        }
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn file_name(&self) -> &str {
        self.file_name.as_str()
    }

    /// Path the startup file sources this module with.
    pub fn activation_path(&self) -> &str {
        self.activation_path.as_str()
    }
}

impl Ord for ModuleEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.file_name.cmp(&other.file_name))
    }
}

impl PartialOrd for ModuleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Derive priority from module file name.
pub fn priority(file_name: &str) -> u8 {
    match file_name.as_bytes() {
        [tens @ b'0'..=b'9', ones @ b'0'..=b'9', ..] => (tens - b'0') * 10 + (ones - b'0'),
        _ => UNPREFIXED_PRIORITY,
    }
}

/// List sourced modules of active installation in priority order.
///
/// Only files directly inside of `active_path` are listed. Symlinks to files
/// count as files, while directories and symlinks to directories are skipped.
/// Every call reads the directory again.
///
/// # Errors
///
/// - Return [`ListError::ReadActive`] if `active_path` cannot be listed, or
///   an entry of it cannot be inspected.
/// - Return [`ListError::NonUnicodeName`] if a module file name is not valid
///   unicode, because it could not be written into the startup file.
pub fn list_modules(active_path: impl AsRef<Path>, prefix: &str) -> Result<Vec<ModuleEntry>> {
    let active_path = active_path.as_ref();
    let read_err = |err: io::Error| ListError::ReadActive {
        source: err,
        path: active_path.to_path_buf(),
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(active_path).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        // INVARIANT: Dangling symlinks are skipped, any other stat failure is not.
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(ListError::ReadActive { source: err, path }),
        }

        let file_name = entry
            .file_name()
            .into_string()
            .map_err(|_| ListError::NonUnicodeName { path })?;
        entries.push(ModuleEntry::new(file_name, prefix));
    }
    entries.sort();

    Ok(entries)
}

/// Module listing error types.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// Active installation cannot be listed.
    #[error("failed to list modules in {:?}", path.display())]
    ReadActive {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Module file name cannot be written as text.
    #[error("module file name of {:?} is not valid unicode", path.display())]
    NonUnicodeName { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = ListError> = std::result::Result<T, E>;
