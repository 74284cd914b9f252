// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Download module activation.
//!
//! Runs every download module to completion, one after the other. Activation
//! is not best-effort: later modules may depend on earlier ones, so the first
//! non-zero exit code aborts the remaining modules.
//!
//! Version directories are recopied on every convergence, so every download
//! module runs again on every convergence as well. Download modules are
//! expected to be idempotent.

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io::{self, ErrorKind},
    path::{self, Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument};

/// Exit code of a finished program.
///
/// Holds [`None`] if the program was terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub Option<i32>);

impl ExitCode {
    pub const SUCCESS: Self = Self(Some(0));

    pub fn success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl Display for ExitCode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self.0 {
            Some(code) => write!(fmt, "exit code {code}"),
            None => fmt.write_str("terminated by signal"),
        }
    }
}

/// Opaque program that runs to completion.
pub trait Executable {
    /// Run program inside of target working directory, and wait for it.
    fn run(&self, working_dir: &Path) -> io::Result<ExitCode>;
}

/// Layer of indirection for program execution.
pub trait Launcher {
    type Program: Executable;

    /// Prepare program at target path with arguments.
    fn program(&self, path: &Path, args: &[OsString]) -> Self::Program;
}

/// Program executed as a child process.
///
/// The child inherits standard input and output of the current process, so
/// interactive installers keep working.
#[derive(Debug, Clone)]
pub struct Subprocess {
    path: PathBuf,
    args: Vec<OsString>,
}

impl Executable for Subprocess {
    fn run(&self, working_dir: &Path) -> io::Result<ExitCode> {
        // INVARIANT: Relative paths resolve against our working directory, not
        // the child's.
        let program = path::absolute(&self.path)?;
        let status = Command::new(program)
            .args(&self.args)
            .current_dir(working_dir)
            .spawn()?
            .wait()?;

        Ok(ExitCode(status.code()))
    }
}

/// Launch programs as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    type Program = Subprocess;

    fn program(&self, path: &Path, args: &[OsString]) -> Self::Program {
        Subprocess {
            path: path.to_path_buf(),
            args: args.to_vec(),
        }
    }
}

/// Run download modules.
#[derive(Debug, Default, Clone)]
pub struct ModuleActivator<L = SystemLauncher>
where
    L: Launcher,
{
    launcher: L,
}

impl<L> ModuleActivator<L>
where
    L: Launcher,
{
    /// Construct new activator.
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    /// Run every download module exactly once.
    ///
    /// Every regular file directly inside of `downloads_dir` is executed with
    /// no arguments from inside of `working_dir`, sorted by file name.
    ///
    /// # Errors
    ///
    /// - Return [`ActivateError::ReadDownloads`] if download module directory
    ///   cannot be listed.
    /// - Return [`ActivateError::Spawn`] if a download module cannot be run.
    /// - Return [`ActivateError::ModuleFailed`] for first download module
    ///   that exits unsuccessfully. Remaining download modules do not run.
    #[instrument(skip(self, downloads_dir, working_dir), level = "debug")]
    pub fn activate_once(
        &self,
        downloads_dir: impl AsRef<Path>,
        working_dir: impl AsRef<Path>,
    ) -> Result<()> {
        let downloads_dir = downloads_dir.as_ref();
        let working_dir = working_dir.as_ref();

        for path in download_modules(downloads_dir)? {
            info!("run download module {:?}", path.display());
            let code = self
                .launcher
                .program(&path, &[])
                .run(working_dir)
                .map_err(|err| ActivateError::Spawn {
                    source: err,
                    path: path.clone(),
                })?;

            if !code.success() {
                return Err(ActivateError::ModuleFailed { path, code });
            }
            debug!("download module {:?} finished", path.display());
        }

        Ok(())
    }

    /// Run an arbitrary program from inside of `working_dir`.
    ///
    /// # Errors
    ///
    /// - Return [`ActivateError::Spawn`] if program cannot be run.
    /// - Return [`ActivateError::ModuleFailed`] if program exits
    ///   unsuccessfully.
    pub fn run_program(
        &self,
        program: impl AsRef<Path>,
        args: &[OsString],
        working_dir: impl AsRef<Path>,
    ) -> Result<()> {
        let program = program.as_ref();
        let code = self
            .launcher
            .program(program, args)
            .run(working_dir.as_ref())
            .map_err(|err| ActivateError::Spawn {
                source: err,
                path: program.to_path_buf(),
            })?;

        if !code.success() {
            return Err(ActivateError::ModuleFailed {
                path: program.to_path_buf(),
                code,
            });
        }

        Ok(())
    }
}

/// List regular files directly inside of download module directory.
fn download_modules(downloads_dir: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |err: io::Error| ActivateError::ReadDownloads {
        source: err,
        path: downloads_dir.to_path_buf(),
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(downloads_dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        // INVARIANT: Follow symlinks, and skip anything that is not a file.
        //   - Dangling symlinks are skipped, any other stat failure is not.
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => paths.push(path),
            Ok(_) => continue,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ActivateError::ReadDownloads {
                    source: err,
                    path,
                })
            }
        }
    }
    paths.sort();

    Ok(paths)
}

/// Download module activation error types.
#[derive(Debug, thiserror::Error)]
pub enum ActivateError {
    /// Download module directory cannot be listed.
    #[error("failed to read download modules in {:?}", path.display())]
    ReadDownloads {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Program cannot be executed at all.
    #[error("failed to execute {:?}", path.display())]
    Spawn {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Program ran, but did not exit successfully.
    #[error("{:?} failed with {code}", path.display())]
    ModuleFailed { path: PathBuf, code: ExitCode },
}

/// Friendly result alias :3
pub type Result<T, E = ActivateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, collections::HashMap, rc::Rc};

    type Calls = Rc<RefCell<Vec<(PathBuf, Vec<OsString>, PathBuf)>>>;

    #[derive(Default, Clone)]
    struct FakeLauncher {
        codes: HashMap<PathBuf, ExitCode>,
        calls: Calls,
    }

    struct FakeProgram {
        path: PathBuf,
        args: Vec<OsString>,
        code: ExitCode,
        calls: Calls,
    }

    impl Executable for FakeProgram {
        fn run(&self, working_dir: &Path) -> io::Result<ExitCode> {
            self.calls.borrow_mut().push((
                self.path.clone(),
                self.args.clone(),
                working_dir.to_path_buf(),
            ));
            Ok(self.code)
        }
    }

    impl Launcher for FakeLauncher {
        type Program = FakeProgram;

        fn program(&self, path: &Path, args: &[OsString]) -> Self::Program {
            FakeProgram {
                path: path.to_path_buf(),
                args: args.to_vec(),
                code: self.codes.get(path).copied().unwrap_or(ExitCode::SUCCESS),
                calls: self.calls.clone(),
            }
        }
    }

    fn downloads_fixture(names: &[&str]) -> anyhow::Result<tempfile::TempDir> {
        let dir = tempfile::tempdir()?;
        for name in names {
            fs::write(dir.path().join(name), "#!/bin/sh\nexit 0\n")?;
        }
        fs::create_dir(dir.path().join("nested"))?;

        Ok(dir)
    }

    #[test]
    fn activate_runs_modules_in_name_order() -> anyhow::Result<()> {
        let downloads = downloads_fixture(&["20-fzf", "00-starship", "10-zoxide"])?;
        let launcher = FakeLauncher::default();
        let activator = ModuleActivator::new(launcher.clone());

        activator.activate_once(downloads.path(), "/work")?;

        let result = launcher.calls.borrow().clone();
        let expect = ["00-starship", "10-zoxide", "20-fzf"]
            .iter()
            .map(|name| (downloads.path().join(name), Vec::new(), PathBuf::from("/work")))
            .collect::<Vec<_>>();
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn activate_stops_at_first_failure() -> anyhow::Result<()> {
        let downloads = downloads_fixture(&["a", "b", "c"])?;
        let mut launcher = FakeLauncher::default();
        launcher
            .codes
            .insert(downloads.path().join("b"), ExitCode(Some(3)));
        let activator = ModuleActivator::new(launcher.clone());

        let result = activator.activate_once(downloads.path(), "/work");

        match result {
            Err(ActivateError::ModuleFailed { path, code }) => {
                assert_eq!(path, downloads.path().join("b"));
                assert_eq!(code, ExitCode(Some(3)));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(launcher.calls.borrow().len(), 2);

        Ok(())
    }

    #[test]
    fn activate_fails_on_missing_directory() {
        let activator = ModuleActivator::new(FakeLauncher::default());
        let result = activator.activate_once("/nowhere/downloads", "/work");
        assert!(matches!(result, Err(ActivateError::ReadDownloads { .. })));
    }

    #[test]
    fn run_program_passes_arguments() -> anyhow::Result<()> {
        let launcher = FakeLauncher::default();
        let activator = ModuleActivator::new(launcher.clone());

        activator.run_program("/work/fzf/install", &["--all".into()], "/work")?;

        let result = launcher.calls.borrow().clone();
        let expect = vec![(
            PathBuf::from("/work/fzf/install"),
            vec![OsString::from("--all")],
            PathBuf::from("/work"),
        )];
        assert_eq!(result, expect);

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_runs_in_working_directory() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let downloads = dir.path().join("downloads");
        let work = dir.path().join("work");
        fs::create_dir_all(&downloads)?;
        fs::create_dir_all(&work)?;
        let script = downloads.join("touch");
        fs::write(&script, "#!/bin/sh\ntouch ran\n")?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

        ModuleActivator::new(SystemLauncher).activate_once(&downloads, &work)?;
        assert!(work.join("ran").is_file());

        fs::write(&script, "#!/bin/sh\nexit 7\n")?;
        let result = ModuleActivator::new(SystemLauncher).activate_once(&downloads, &work);
        assert!(matches!(
            result,
            Err(ActivateError::ModuleFailed {
                code: ExitCode(Some(7)),
                ..
            })
        ));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_resolves_relative_module_path() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        // Relative to the test process, not to the working directory.
        let dir = tempfile::tempdir_in(".")?;
        let downloads = dir.path().join("downloads");
        fs::create_dir_all(&downloads)?;
        let script = downloads.join("touch");
        fs::write(&script, "#!/bin/sh\ntouch ran\n")?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        let work = tempfile::tempdir()?;
        assert!(downloads.is_relative());

        ModuleActivator::new(SystemLauncher).activate_once(&downloads, work.path())?;
        assert!(work.path().join("ran").is_file());

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn activate_fails_on_symlink_loop() -> anyhow::Result<()> {
        let downloads = downloads_fixture(&["00-starship"])?;
        std::os::unix::fs::symlink("10-loop", downloads.path().join("10-loop"))?;
        let activator = ModuleActivator::new(FakeLauncher::default());

        let result = activator.activate_once(downloads.path(), "/work");
        assert!(matches!(result, Err(ActivateError::ReadDownloads { .. })));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn activate_skips_dangling_symlink() -> anyhow::Result<()> {
        let downloads = downloads_fixture(&["00-starship"])?;
        std::os::unix::fs::symlink("nowhere", downloads.path().join("10-dangling"))?;
        let launcher = FakeLauncher::default();
        let activator = ModuleActivator::new(launcher.clone());

        activator.activate_once(downloads.path(), "/work")?;
        assert_eq!(launcher.calls.borrow().len(), 1);

        Ok(())
    }
}
