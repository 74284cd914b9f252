// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installation workflow.
//!
//! Sequences every component into the two top-level workflows: a fresh
//! install, and an upgrade of an existing installation.
//!
//! # State Machine
//!
//! ```text
//!                 ┌──────────────> Installing ──> Installed
//! Uninstalled ────┤
//! Installed ──────┴──────────────> Upgrading ───> (not implemented)
//!
//! any error ───────────────────────> Failed
//! ```
//!
//! Whether the machine counts as installed is decided by the existence of the
//! install root _before_ convergence runs, because convergence creates it.
//! Both workflows converge the install store and run the download modules.
//! A fresh install then runs the third-party installer and syncs the startup
//! file. Upgrades are reserved, and always fail for now.

use crate::{
    audit::{login_loads_startup_file, warn_not_loaded},
    config::SourceTree,
    module::{
        activate::{Launcher, ModuleActivator, SystemLauncher},
        list::{list_modules, ModuleEntry},
    },
    path::{Layout, ACTIVE_SYMLINK_NAME, STARTUP_FILE_NAME},
    startup::sync_managed_block,
    store::InstallStore,
    version::{VersionId, VersionResolver},
};

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// State of an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Uninstalled,
    Installing,
    Installed,
    Upgrading,
    Failed,
}

impl Display for InstallState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Uninstalled => "uninstalled",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Upgrading => "upgrading",
            Self::Failed => "failed",
        };
        fmt.write_str(name)
    }
}

/// Snapshot of installation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Version the source tree would install.
    pub resolved: VersionId,

    /// Target of the active symlink, if any.
    pub active: Option<PathBuf>,

    /// Detected installation state.
    pub state: InstallState,
}

/// Installation workflow driver.
pub struct Bootstrap<R, L = SystemLauncher>
where
    R: VersionResolver,
    L: Launcher,
{
    layout: Layout,
    source: SourceTree,
    resolver: R,
    activator: ModuleActivator<L>,
    state: InstallState,
}

impl<R, L> Bootstrap<R, L>
where
    R: VersionResolver,
    L: Launcher,
{
    /// Construct new workflow driver.
    ///
    /// Starts out in whatever state the installation layout is in.
    pub fn new(layout: Layout, source: SourceTree, resolver: R, launcher: L) -> Self {
        let mut bootstrap = Self {
            layout,
            source,
            resolver,
            activator: ModuleActivator::new(launcher),
            state: InstallState::Uninstalled,
        };
        bootstrap.state = bootstrap.detect_state();
        bootstrap
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn source(&self) -> &SourceTree {
        &self.source
    }

    pub fn store(&self) -> InstallStore {
        InstallStore::new(self.layout.install_root(), ACTIVE_SYMLINK_NAME)
    }

    /// Detect whether an installation exists.
    pub fn detect_state(&self) -> InstallState {
        if self.store().is_present() {
            InstallState::Installed
        } else {
            InstallState::Uninstalled
        }
    }

    /// Run installation workflow.
    ///
    /// Returns the final state. Login mode diagnostics run last, and only
    /// ever warn.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::NotImplemented`] if an installation already
    ///   exists.
    /// - Return any component error that aborts the workflow. State is
    ///   [`InstallState::Failed`] afterwards.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&mut self) -> Result<InstallState> {
        match self.run_workflow() {
            Ok(()) => Ok(self.state),
            Err(err) => {
                self.transition(InstallState::Failed);
                Err(err)
            }
        }
    }

    fn run_workflow(&mut self) -> Result<()> {
        // INVARIANT: Detect state before convergence creates the install root.
        let detected = self.detect_state();
        self.transition(detected);

        let active = self.converge()?;
        match detected {
            InstallState::Installed => {
                self.transition(InstallState::Upgrading);
                self.upgrade()?;
            }
            _ => {
                self.transition(InstallState::Installing);
                self.install(&active)?;
                self.transition(InstallState::Installed);
            }
        }

        if !self.login_loads_startup_file() {
            warn_not_loaded(STARTUP_FILE_NAME);
        }

        Ok(())
    }

    /// Resolve version, converge install store, and run download modules.
    fn converge(&self) -> Result<PathBuf> {
        let version = self.resolver.resolve()?;
        info!("bootstrap version {version}");

        let active = self.store().converge(&version, self.source.modules_dir())?;
        self.activator
            .activate_once(self.source.downloads_dir(), &active)?;

        Ok(active)
    }

    /// Finish fresh install.
    fn install(&self, active: &Path) -> Result<()> {
        let installer = &self.source.config().installer;
        if installer.enabled {
            let program = active.join(&installer.program);
            let args = installer.args.iter().map(OsString::from).collect::<Vec<_>>();
            info!("run installer {:?}", program.display());
            self.activator
                .run_program(&program, &args, active)
                .map_err(BootstrapError::Installer)?;
        }

        let entries = self.modules()?;
        sync_managed_block(self.layout.startup_file(), &entries)?;

        Ok(())
    }

    fn upgrade(&self) -> Result<()> {
        Err(BootstrapError::NotImplemented {
            operation: "upgrade of an existing installation",
        })
    }

    /// List sourced modules of active installation in priority order.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::List`] if active installation cannot be
    ///   listed.
    pub fn modules(&self) -> Result<Vec<ModuleEntry>> {
        Ok(list_modules(
            self.layout.active_symlink(),
            &self.layout.activation_prefix(),
        )?)
    }

    /// Report installation status.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::Version`] if version cannot be resolved.
    /// - Return [`BootstrapError::Store`] if active symlink cannot be read.
    pub fn status(&self) -> Result<Status> {
        Ok(Status {
            resolved: self.resolver.resolve()?,
            active: self.store().active_version()?,
            state: self.detect_state(),
        })
    }

    /// Check if login shells appear to load the startup file.
    pub fn login_loads_startup_file(&self) -> bool {
        login_loads_startup_file(&self.layout.login_files(), STARTUP_FILE_NAME)
    }

    fn transition(&mut self, next: InstallState) {
        if self.state != next {
            info!("{} -> {}", self.state, next);
        }
        self.state = next;
    }
}

/// Installation workflow error types.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Version resolution fails.
    #[error(transparent)]
    Version(#[from] crate::version::VersionError),

    /// Install store convergence fails.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    /// Download module activation fails.
    #[error(transparent)]
    Activate(#[from] crate::module::activate::ActivateError),

    /// Third-party installer fails.
    #[error("third-party installer failed")]
    Installer(#[source] crate::module::activate::ActivateError),

    /// Module listing fails.
    #[error(transparent)]
    List(#[from] crate::module::list::ListError),

    /// Startup file editing fails.
    #[error(transparent)]
    Startup(#[from] crate::startup::StartupError),

    /// Workflow is reserved, but has no implementation yet.
    #[error("not implemented: {operation}")]
    NotImplemented { operation: &'static str },
}

/// Friendly result alias :3
pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BootstrapConfig,
        module::activate::{ExitCode, Executable},
        startup::{START_MARKER, STOP_MARKER},
    };
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, fs, io, rc::Rc};

    struct FixedVersion(&'static str);

    impl VersionResolver for FixedVersion {
        fn resolve(&self) -> crate::version::Result<VersionId> {
            VersionId::new(self.0)
        }
    }

    #[derive(Default, Clone)]
    struct FakeLauncher {
        fail: Option<PathBuf>,
        calls: Rc<RefCell<Vec<(PathBuf, PathBuf)>>>,
    }

    struct FakeProgram {
        path: PathBuf,
        code: ExitCode,
        calls: Rc<RefCell<Vec<(PathBuf, PathBuf)>>>,
    }

    impl Executable for FakeProgram {
        fn run(&self, working_dir: &Path) -> io::Result<ExitCode> {
            self.calls
                .borrow_mut()
                .push((self.path.clone(), working_dir.to_path_buf()));
            Ok(self.code)
        }
    }

    impl Launcher for FakeLauncher {
        type Program = FakeProgram;

        fn program(&self, path: &Path, _args: &[OsString]) -> Self::Program {
            let code = match &self.fail {
                Some(fail) if fail == path => ExitCode(Some(1)),
                _ => ExitCode::SUCCESS,
            };
            FakeProgram {
                path: path.to_path_buf(),
                code,
                calls: self.calls.clone(),
            }
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        layout: Layout,
        source: SourceTree,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            let dir = tempfile::tempdir()?;
            let home = dir.path().join("home");
            let root = dir.path().join("source");
            fs::create_dir_all(&home)?;
            fs::create_dir_all(root.join("modules").join("fzf"))?;
            fs::create_dir_all(root.join("downloads"))?;
            for name in ["aliases.sh", "10-path.sh", "00-env.sh"] {
                fs::write(root.join("modules").join(name), format!("# {name}\n"))?;
            }
            fs::write(root.join("modules").join("fzf").join("install"), "")?;
            fs::write(root.join("downloads").join("starship"), "")?;
            fs::write(home.join(".bashrc"), "alias g=git\n")?;

            Ok(Self {
                layout: Layout::new(&home),
                source: SourceTree::new(&root, BootstrapConfig::default()),
                dir,
            })
        }

        fn bootstrap(&self, launcher: FakeLauncher) -> Bootstrap<FixedVersion, FakeLauncher> {
            Bootstrap::new(
                self.layout.clone(),
                self.source.clone(),
                FixedVersion("a1b2c3d"),
                launcher,
            )
        }
    }

    #[test]
    fn fresh_install() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let launcher = FakeLauncher::default();
        let mut bootstrap = fx.bootstrap(launcher.clone());
        assert_eq!(bootstrap.state(), InstallState::Uninstalled);

        let state = bootstrap.run()?;
        assert_eq!(state, InstallState::Installed);

        let active = fx.layout.active_symlink();
        assert_eq!(fs::read_link(&active)?, PathBuf::from("a1b2c3d"));
        assert!(fx.layout.install_root().join("a1b2c3d").join("00-env.sh").is_file());

        let calls = launcher.calls.borrow().clone();
        let expect = vec![
            (fx.source.downloads_dir().join("starship"), active.clone()),
            (active.join("fzf/install"), active.clone()),
        ];
        assert_eq!(calls, expect);

        let result = fs::read_to_string(fx.layout.startup_file())?;
        let expect = format!(
            "alias g=git\n\n{START_MARKER}\n\
             source ~/.bash_bootstrap/current/00-env.sh\n\
             source ~/.bash_bootstrap/current/10-path.sh\n\
             source ~/.bash_bootstrap/current/aliases.sh\n\
             {STOP_MARKER}\n"
        );
        assert_eq!(result, expect);

        let modules = bootstrap
            .modules()?
            .into_iter()
            .map(|entry| (entry.priority(), entry.file_name().to_string()))
            .collect::<Vec<_>>();
        assert_eq!(
            modules,
            vec![
                (0, "00-env.sh".to_string()),
                (10, "10-path.sh".to_string()),
                (100, "aliases.sh".to_string()),
            ]
        );
        assert!(!bootstrap.login_loads_startup_file());

        Ok(())
    }

    #[test]
    fn existing_install_is_upgrade() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        fx.bootstrap(FakeLauncher::default()).run()?;
        let before = fs::read_to_string(fx.layout.startup_file())?;

        let mut bootstrap = fx.bootstrap(FakeLauncher::default());
        assert_eq!(bootstrap.state(), InstallState::Installed);
        let result = bootstrap.run();

        assert!(matches!(result, Err(BootstrapError::NotImplemented { .. })));
        assert_eq!(bootstrap.state(), InstallState::Failed);
        assert_eq!(fs::read_to_string(fx.layout.startup_file())?, before);

        Ok(())
    }

    #[test]
    fn failing_download_module_aborts_install() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let launcher = FakeLauncher {
            fail: Some(fx.source.downloads_dir().join("starship")),
            ..FakeLauncher::default()
        };
        let mut bootstrap = fx.bootstrap(launcher.clone());

        let result = bootstrap.run();

        assert!(matches!(result, Err(BootstrapError::Activate(_))));
        assert_eq!(bootstrap.state(), InstallState::Failed);
        assert_eq!(launcher.calls.borrow().len(), 1);
        assert_eq!(fs::read_to_string(fx.layout.startup_file())?, "alias g=git\n");

        Ok(())
    }

    #[test]
    fn failing_installer_aborts_install() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let launcher = FakeLauncher {
            fail: Some(fx.layout.active_symlink().join("fzf/install")),
            ..FakeLauncher::default()
        };
        let mut bootstrap = fx.bootstrap(launcher);

        let result = bootstrap.run();

        assert!(matches!(result, Err(BootstrapError::Installer(_))));
        assert_eq!(fs::read_to_string(fx.layout.startup_file())?, "alias g=git\n");

        Ok(())
    }

    #[test]
    fn disabled_installer_is_skipped() -> anyhow::Result<()> {
        let mut fx = Fixture::new()?;
        let mut config = BootstrapConfig::default();
        config.installer.enabled = false;
        fx.source = SourceTree::new(fx.dir.path().join("source"), config);
        let launcher = FakeLauncher::default();

        fx.bootstrap(launcher.clone()).run()?;

        assert_eq!(launcher.calls.borrow().len(), 1);

        Ok(())
    }

    #[test]
    fn status_reports_active_version() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let bootstrap = fx.bootstrap(FakeLauncher::default());

        let status = bootstrap.status()?;
        assert_eq!(status.resolved.as_str(), "a1b2c3d");
        assert_eq!(status.active, None);
        assert_eq!(status.state, InstallState::Uninstalled);

        fx.bootstrap(FakeLauncher::default()).run()?;
        let status = bootstrap.status()?;
        assert_eq!(status.active, Some(PathBuf::from("a1b2c3d")));
        assert_eq!(status.state, InstallState::Installed);

        Ok(())
    }
}
