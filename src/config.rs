// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional `bootstrap.toml` file that a source tree
//! may carry at its top-level. The configuration only describes the source
//! side of an installation, i.e., where the module payload lives, where the
//! download modules live, and what third-party installer to run on a fresh
//! install. The installation layout itself is fixed, see [`Layout`].
//!
//! [`Layout`]: crate::path::Layout

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Name of configuration file at the top-level of a source tree.
pub const CONFIG_FILE_NAME: &str = "bootstrap.toml";

/// Source tree configuration layout.
///
/// Every field has a default, so an empty or missing configuration file
/// describes the standard layout: modules under `modules/`, download modules
/// under `downloads/`, and the fzf installer invoked with `--all`.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Directory containing the module payload.
    pub modules: PathBuf,

    /// Directory containing one-shot download modules.
    pub downloads: PathBuf,

    /// Third-party installer to run on fresh installs.
    pub installer: InstallerSettings,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            modules: PathBuf::from("modules"),
            downloads: PathBuf::from("downloads"),
            installer: InstallerSettings::default(),
        }
    }
}

impl FromStr for BootstrapConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: BootstrapConfig = toml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on path fields.
        config.modules = expand_path(&config.modules)?;
        config.downloads = expand_path(&config.downloads)?;

        Ok(config)
    }
}

impl Display for BootstrapConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Third-party installer settings.
///
/// The installer program path is relative to the active version directory,
/// and is always executed from inside of it.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// Program to execute.
    pub program: PathBuf,

    /// Arguments to pass to program.
    pub args: Vec<String>,

    /// Run the installer at all.
    pub enabled: bool,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("fzf/install"),
            args: vec!["--all".into()],
            enabled: true,
        }
    }
}

/// Source tree to bootstrap from.
///
/// Pairs the root of a source tree with its configuration so that relative
/// configuration paths can be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    root: PathBuf,
    config: BootstrapConfig,
}

impl SourceTree {
    /// Construct new source tree with explicit configuration.
    pub fn new(root: impl Into<PathBuf>, config: BootstrapConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Open source tree at target path.
    ///
    /// Loads `bootstrap.toml` at the top-level of the source tree, falling
    /// back to the default configuration if it does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadConfigFile`] if configuration file exists
    ///   but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if configuration is malformed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config_path = root.join(CONFIG_FILE_NAME);
        let config = match read_to_string(&config_path) {
            Ok(data) => data.parse()?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no {CONFIG_FILE_NAME} in {:?}, using defaults", root.display());
                BootstrapConfig::default()
            }
            Err(err) => {
                return Err(ConfigError::ReadConfigFile {
                    source: err,
                    config_path,
                })
            }
        };

        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Absolute path to module payload directory.
    pub fn modules_dir(&self) -> PathBuf {
        self.root.join(&self.config.modules)
    }

    /// Absolute path to download module directory.
    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join(&self.config.downloads)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned();

    Ok(PathBuf::from(expanded))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file {:?}", config_path.display())]
    ReadConfigFile {
        #[source]
        source: std::io::Error,
        config_path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
