// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use bash_bootstrap::{
    audit::warn_not_loaded,
    module::activate::SystemLauncher,
    path::{Layout, STARTUP_FILE_NAME},
    Bootstrap, Git2, GitCli, SourceTree, VersionResolver,
};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::{
    env,
    path::{self, PathBuf},
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "bash-bootstrap [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Root of source tree to bootstrap from.
    #[arg(short, long, global = true, value_name = "path")]
    pub source: Option<PathBuf>,

    /// Version control backend used to resolve the source tree version.
    #[arg(long, global = true, value_enum, default_value_t = Vcs::Git)]
    pub vcs: Vcs,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        // INVARIANT: Source root is always absolute.
        let source_root = match self.source {
            Some(root) => path::absolute(root)?,
            None => env::current_dir()?,
        };
        let source = SourceTree::open(&source_root)?;
        let resolver: Box<dyn VersionResolver> = match self.vcs {
            Vcs::Git => Box::new(GitCli::new(&source_root)),
            Vcs::Libgit2 => Box::new(Git2::new(&source_root)),
        };
        let bootstrap = Bootstrap::new(Layout::try_default()?, source, resolver, SystemLauncher);

        match self.command {
            Command::Install => run_install(bootstrap),
            Command::Status => run_status(bootstrap),
            Command::List => run_list(bootstrap),
            Command::Check => run_check(bootstrap),
            Command::Config => run_config(bootstrap),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Vcs {
    /// Run the git binary found on PATH.
    Git,

    /// Use libgit2 in-process.
    Libgit2,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Install modules of source tree, and source them in startup file.
    #[command(override_usage = "bash-bootstrap install [options]")]
    Install,

    /// Show resolved version, active version, and installation state.
    #[command(override_usage = "bash-bootstrap status [options]")]
    Status,

    /// List modules of active installation in activation order.
    #[command(override_usage = "bash-bootstrap list [options]")]
    List,

    /// Check if login shells load the startup file.
    #[command(override_usage = "bash-bootstrap check [options]")]
    Check,

    /// Show effective configuration of source tree.
    #[command(override_usage = "bash-bootstrap config [options]")]
    Config,
}

type Driver = Bootstrap<Box<dyn VersionResolver>, SystemLauncher>;

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_install(mut bootstrap: Driver) -> Result<()> {
    let state = bootstrap.run()?;
    info!("bootstrap {state}");

    Ok(())
}

fn run_status(bootstrap: Driver) -> Result<()> {
    let status = bootstrap.status()?;
    let active = status
        .active
        .map(|target| target.display().to_string())
        .unwrap_or_else(|| "<none>".into());

    println!("resolved: {}", status.resolved);
    println!("active:   {active}");
    println!("state:    {}", status.state);

    Ok(())
}

fn run_list(bootstrap: Driver) -> Result<()> {
    for entry in bootstrap.modules()? {
        println!("{}\t{}", entry.priority(), entry.activation_path());
    }

    Ok(())
}

fn run_check(bootstrap: Driver) -> Result<()> {
    if bootstrap.login_loads_startup_file() {
        info!("login shells load the {STARTUP_FILE_NAME} file");
    } else {
        warn_not_loaded(STARTUP_FILE_NAME);
    }

    Ok(())
}

fn run_config(bootstrap: Driver) -> Result<()> {
    print!("{}", bootstrap.source().config());

    Ok(())
}
