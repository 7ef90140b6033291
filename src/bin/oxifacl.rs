// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use oxifacl::{
    acl::{Acl, AclEntries, EntryMap},
    config::{AclDefinition, AclResource},
    path::default_definition_path,
    reconcile::{gateway::SetfaclGateway, Reconciler},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use std::{ffi::OsString, fs::read_to_string, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "oxifacl [options] <oxifacl-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Program used to read ACLs.
    #[arg(long, global = true, value_name = "program", default_value = "getfacl")]
    pub getfacl: OsString,

    /// Program used to mutate ACLs.
    #[arg(long, global = true, value_name = "program", default_value = "setfacl")]
    pub setfacl: OsString,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let gateway = SetfaclGateway::new(self.getfacl, self.setfacl);
        match self.command {
            Command::Apply(opts) => run_apply(opts, gateway).await,
            Command::Set(opts) => run_set(opts, gateway),
            Command::Show(opts) => run_show(opts, gateway),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Converge every ACL declared in declaration file.
    #[command(override_usage = "oxifacl apply [options]")]
    Apply(ApplyOptions),

    /// Converge ACL of one path to the entries given.
    #[command(override_usage = "oxifacl set [options] <path>")]
    Set(SetOptions),

    /// Show current ACL of path.
    #[command(override_usage = "oxifacl show <path>")]
    Show(ShowOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyOptions {
    /// Path to ACL declaration file.
    #[arg(short, long, value_name = "path")]
    pub file: Option<PathBuf>,

    /// Only show what would change.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of paths to converge at the same time.
    #[arg(short, long, value_name = "count", default_value_t = 1)]
    pub jobs: usize,
}

/// Declared entries are the complete desired state of a category. Named
/// entries left out of a category are removed.
#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SetOptions {
    /// Path to converge ACL of.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,

    #[command(flatten)]
    pub access: EntryArgs,

    /// Default ACL user entries.
    #[arg(long, value_name = "[name:]perms")]
    pub default_user: Vec<String>,

    /// Default ACL group entries.
    #[arg(long, value_name = "[name:]perms")]
    pub default_group: Vec<String>,

    /// Default ACL mask entry.
    #[arg(long, value_name = "perms")]
    pub default_mask: Vec<String>,

    /// Default ACL other entry.
    #[arg(long, value_name = "perms")]
    pub default_other: Vec<String>,

    /// Apply access ACL changes to directory contents as well.
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Only show what would change.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Args, Clone, Debug)]
struct EntryArgs {
    /// User entries.
    #[arg(short, long, value_name = "[name:]perms")]
    pub user: Vec<String>,

    /// Group entries.
    #[arg(short, long, value_name = "[name:]perms")]
    pub group: Vec<String>,

    /// Mask entry.
    #[arg(short, long, value_name = "perms")]
    pub mask: Vec<String>,

    /// Other entry.
    #[arg(short, long, value_name = "perms")]
    pub other: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ShowOptions {
    /// Path to show ACL of.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,
}

#[tokio::main]
async fn main() {
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

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_apply(opts: ApplyOptions, gateway: SetfaclGateway) -> Result<()> {
    let path = match opts.file {
        Some(path) => path,
        None => default_definition_path()?,
    };
    let definition: AclDefinition = read_to_string(&path)
        .with_context(|| format!("failed to read ACL declarations at {:?}", path.display()))?
        .parse()?;

    let dry_run = opts.dry_run;
    let outcomes = stream::iter(definition.resources)
        .map(|resource| {
            let reconciler = Reconciler::new(gateway.clone());
            tokio::task::spawn_blocking(move || converge_resource(&reconciler, &resource, dry_run))
        })
        .buffered(opts.jobs.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut failures = 0;
    for outcome in outcomes {
        if let Err(error) = outcome? {
            error!("{error:?}");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("failed to converge {failures} declared ACL(s)");
    }

    Ok(())
}

fn converge_resource(
    reconciler: &Reconciler,
    resource: &AclResource,
    dry_run: bool,
) -> Result<()> {
    let desired = resource.desired();
    converge(reconciler, &resource.path, &desired, resource.recurse, dry_run)
}

fn run_set(opts: SetOptions, gateway: SetfaclGateway) -> Result<()> {
    let access = entries_from_args(&opts.access)?;
    let default = AclEntries {
        user: entry_map(&opts.default_user)?,
        group: entry_map(&opts.default_group)?,
        mask: entry_map(&opts.default_mask)?,
        other: entry_map(&opts.default_other)?,
    };
    let desired = Acl::new(access).with_default(default);

    let reconciler = Reconciler::new(gateway);
    converge(&reconciler, &opts.path, &desired, opts.recursive, opts.dry_run)
}

fn run_show(opts: ShowOptions, gateway: SetfaclGateway) -> Result<()> {
    let reconciler = Reconciler::new(gateway);
    let acl = reconciler.current(&opts.path)?;
    print!("{acl}");

    Ok(())
}

fn converge(
    reconciler: &Reconciler,
    path: impl AsRef<std::path::Path>,
    desired: &Acl,
    recursive: bool,
    dry_run: bool,
) -> Result<()> {
    let path = path.as_ref();
    if dry_run {
        let plan = reconciler.plan(path, desired, recursive)?;
        for op in plan.iter() {
            info!("would set ACL ({op}) on {:?}", path.display());
        }
    } else if reconciler.converge(path, desired, recursive)?.is_empty() {
        info!("ACL of {:?} already converged", path.display());
    }

    Ok(())
}

fn entries_from_args(args: &EntryArgs) -> Result<AclEntries> {
    Ok(AclEntries {
        user: entry_map(&args.user)?,
        group: entry_map(&args.group)?,
        mask: entry_map(&args.mask)?,
        other: entry_map(&args.other)?,
    })
}

/// Map "perms" to base entry, and "name:perms" to named entry.
fn entry_map(args: &[String]) -> Result<EntryMap> {
    args.iter().map(|arg| entry(arg)).collect()
}

fn entry(arg: &str) -> Result<(String, String)> {
    let (qualifier, perms) = arg.split_once(':').unwrap_or(("", arg));
    let perms = perms.trim();
    if perms.is_empty() || perms.contains(':') {
        bail!("invalid ACL entry {arg:?}, expected [name:]perms");
    }

    Ok((qualifier.to_string(), perms.to_string()))
}
