// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Login mode diagnostics.
//!
//! Bash only reads `~/.bashrc` for interactive non-login shells. Login shells,
//! e.g., new tmux panes or SSH sessions, read `~/.bash_profile`,
//! `~/.bash_login`, or `~/.profile` instead. Unless one of them sources the
//! startup file, none of the installed modules get loaded in login shells.
//!
//! The check is a heuristic. Any existing candidate mentioning the startup
//! file counts, even one bash would skip because an earlier candidate exists.
//!
//! # See Also
//!
//! - [Bash Startup Files](https://www.gnu.org/software/bash/manual/html_node/Bash-Startup-Files.html)

use std::{fs::read_to_string, io::ErrorKind, path::PathBuf};
use tracing::{debug, warn};

/// Check if login mode init files appear to load the startup file.
///
/// Every existing candidate is scanned, and any line mentioning
/// `startup_name` in any of them counts as loading it. Returns false if no
/// candidate exists. Unreadable candidates are skipped with a warning.
pub fn login_loads_startup_file(candidates: &[PathBuf], startup_name: &str) -> bool {
    for candidate in candidates {
        match read_to_string(candidate) {
            Ok(content) => {
                debug!("scan {:?} for {startup_name:?}", candidate.display());
                if content.lines().any(|line| line.contains(startup_name)) {
                    return true;
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => warn!("cannot read {:?}: {err}", candidate.display()),
        }
    }

    false
}

/// Warn user that login shells will not load the startup file.
pub fn warn_not_loaded(startup_name: &str) {
    warn!("the init scripts for bash login mode don't seem to load the {startup_name} file");
    warn!("consider adding the following: source ~/{startup_name}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    fn candidates(home: &Path) -> Vec<PathBuf> {
        [".bash_profile", ".bash_login", ".profile"]
            .iter()
            .map(|name| home.join(name))
            .collect()
    }

    #[test]
    fn no_candidates_exist() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        assert!(!login_loads_startup_file(&candidates(home.path()), ".bashrc"));

        Ok(())
    }

    #[test]
    fn first_candidate_sources_startup_file() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        fs::write(
            home.path().join(".bash_login"),
            "umask 022\n[ -f ~/.bashrc ] && . ~/.bashrc\n",
        )?;

        assert!(login_loads_startup_file(&candidates(home.path()), ".bashrc"));

        Ok(())
    }

    #[test]
    fn any_existing_candidate_counts() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        fs::write(home.path().join(".bash_profile"), "export PATH=$HOME/bin:$PATH\n")?;
        fs::write(home.path().join(".profile"), "source ~/.bashrc\n")?;

        assert!(login_loads_startup_file(&candidates(home.path()), ".bashrc"));

        Ok(())
    }

    #[test]
    fn no_existing_candidate_mentions_startup_file() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        fs::write(home.path().join(".bash_profile"), "export PATH=$HOME/bin:$PATH\n")?;
        fs::write(home.path().join(".profile"), "umask 022\n")?;

        assert!(!login_loads_startup_file(&candidates(home.path()), ".bashrc"));

        Ok(())
    }
}
