// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Startup file editing.
//!
//! The startup file (`~/.bashrc`) belongs to the user. Bash-bootstrap only
//! owns one contiguous region of it called the __managed block__, delimited by
//! a START and a STOP sentinel line:
//!
//! ```text
//! # >>> BEGIN AUTOMATIC BASH BOOTSTRAP <<<
//! source ~/.bash_bootstrap/current/00-env.sh
//! source ~/.bash_bootstrap/current/aliases.sh
//! # >>>  END AUTOMATIC BASH BOOTSTRAP  <<<
//! ```
//!
//! Syncing never patches the managed block. It cuts the old block out, and
//! appends a freshly generated one at the end of the file, separated from the
//! user's content by one blank line. That separator is cut out along with the
//! block on the next sync, so syncing twice with the same modules leaves the
//! file byte-for-byte identical. Everything outside of the block is left alone.
//!
//! # Corruption
//!
//! A startup file that contains only one of the sentinels, more than one of
//! either, or STOP before START is considered corrupt. Guessing where the block
//! ends could delete user content, so the file is left untouched instead.

use crate::module::list::ModuleEntry;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// First line of the managed block.
pub const START_MARKER: &str = "# >>> BEGIN AUTOMATIC BASH BOOTSTRAP <<<";

/// Last line of the managed block.
pub const STOP_MARKER: &str = "# >>>  END AUTOMATIC BASH BOOTSTRAP  <<<";

/// Startup file content split around its managed block.
///
/// # Invariant
///
/// - `retained` never contains a START or STOP marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupEdit {
    retained: String,
    sources: Vec<String>,
}

impl StartupEdit {
    /// Parse startup file content.
    ///
    /// Cuts out existing managed block, if any, along with the blank separator
    /// line that precedes it.
    ///
    /// # Errors
    ///
    /// - Return [`StartupError::CorruptManagedBlock`] if sentinel lines do not
    ///   form exactly one well-formed managed block or none at all.
    pub fn parse(content: &str) -> Result<Self> {
        let lines = content.split_inclusive('\n').collect::<Vec<_>>();
        let starts = marker_lines(&lines, START_MARKER);
        let stops = marker_lines(&lines, STOP_MARKER);

        let retained = match (starts.as_slice(), stops.as_slice()) {
            ([], []) => content.to_string(),
            ([start], [stop]) if start < stop => {
                // INVARIANT: Separator blank line belongs to managed block.
                let head_end = match start.checked_sub(1) {
                    Some(prev) if is_blank(lines[prev]) => prev,
                    _ => *start,
                };
                let mut retained = lines[..head_end].concat();
                retained.push_str(&lines[stop + 1..].concat());
                retained
            }
            _ => {
                return Err(StartupError::CorruptManagedBlock {
                    path: None,
                    start_lines: starts.iter().map(|idx| idx + 1).collect(),
                    stop_lines: stops.iter().map(|idx| idx + 1).collect(),
                })
            }
        };

        Ok(Self {
            retained,
            sources: Vec::new(),
        })
    }

    /// Replace module activation lines of managed block.
    pub fn set_modules<'a>(&mut self, entries: impl IntoIterator<Item = &'a ModuleEntry>) {
        self.sources = entries
            .into_iter()
            .map(|entry| entry.activation_path().to_string())
            .collect();
    }

    /// User content outside of managed block.
    pub fn retained(&self) -> &str {
        self.retained.as_str()
    }
}

impl Display for StartupEdit {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.retained)?;

        if !self.retained.is_empty() {
            if !self.retained.ends_with('\n') {
                fmt.write_str("\n")?;
            }
            fmt.write_str("\n")?;
        }

        writeln!(fmt, "{START_MARKER}")?;
        for path in &self.sources {
            writeln!(fmt, "source {}", shell_word(path))?;
        }
        writeln!(fmt, "{STOP_MARKER}")
    }
}

/// Sync managed block of startup file with module listing.
///
/// A missing startup file is treated as empty, and gets created. The file is
/// overwritten in place, so a symlinked startup file stays a symlink.
///
/// # Errors
///
/// - Return [`StartupError::ReadStartupFile`] if startup file cannot be read.
/// - Return [`StartupError::CorruptManagedBlock`] if startup file has a
///   malformed managed block. The file is not modified.
/// - Return [`StartupError::WriteStartupFile`] if startup file cannot be
///   written.
#[instrument(skip(startup_file, entries), level = "debug")]
pub fn sync_managed_block(startup_file: impl AsRef<Path>, entries: &[ModuleEntry]) -> Result<()> {
    let startup_file = startup_file.as_ref();
    let content = match fs::read_to_string(startup_file) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("no startup file at {:?}, creating it", startup_file.display());
            String::new()
        }
        Err(err) => {
            return Err(StartupError::ReadStartupFile {
                source: err,
                path: startup_file.to_path_buf(),
            })
        }
    };

    let mut edit = StartupEdit::parse(&content).map_err(|err| err.at(startup_file))?;
    edit.set_modules(entries);
    let updated = edit.to_string();

    if updated == content {
        info!("managed block of {:?} already up to date", startup_file.display());
        return Ok(());
    }

    fs::write(startup_file, updated.as_bytes()).map_err(|err| StartupError::WriteStartupFile {
        source: err,
        path: startup_file.to_path_buf(),
    })?;
    info!(
        "sourced {} modules in {:?}",
        entries.len(),
        startup_file.display()
    );

    Ok(())
}

fn marker_lines(lines: &[&str], marker: &str) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(marker))
        .map(|(idx, _)| idx)
        .collect()
}

/// Quote path as a single shell word.
///
/// A leading `~/` stays unquoted so the shell still expands it. Paths made of
/// plain characters are left as is.
fn shell_word(path: &str) -> String {
    let (home, rest) = match path.strip_prefix("~/") {
        Some(rest) => ("~/", rest),
        None => ("", path),
    };

    let is_plain = |ch: char| ch.is_ascii_alphanumeric() || "/._-+=:,@%".contains(ch);
    if !rest.is_empty() && rest.chars().all(is_plain) {
        return path.to_string();
    }

    format!("{home}'{}'", rest.replace('\'', r"'\''"))
}

fn is_blank(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']).is_empty()
}

/// Startup file editing error types.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Startup file cannot be read.
    #[error("failed to read startup file {:?}", path.display())]
    ReadStartupFile {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Startup file cannot be written.
    #[error("failed to write startup file {:?}", path.display())]
    WriteStartupFile {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Sentinel lines do not form one well-formed managed block.
    #[error(
        "corrupt managed block{}: START marker on lines {start_lines:?}, STOP marker on lines {stop_lines:?}",
        path.as_ref().map(|path| format!(" in {:?}", path.display())).unwrap_or_default()
    )]
    CorruptManagedBlock {
        path: Option<PathBuf>,
        start_lines: Vec<usize>,
        stop_lines: Vec<usize>,
    },
}

impl StartupError {
    fn at(self, startup_file: &Path) -> Self {
        match self {
            Self::CorruptManagedBlock {
                start_lines,
                stop_lines,
                ..
            } => Self::CorruptManagedBlock {
                path: Some(startup_file.to_path_buf()),
                start_lines,
                stop_lines,
            },
            other => other,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = StartupError> = std::result::Result<T, E>;
