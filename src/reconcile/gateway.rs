// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operating system ACL access.
//!
//! Reading and mutating ACLs is delegated to an [`AclGateway`]. The shipped
//! gateway shells out to the `getfacl` and `setfacl` utilities, which every
//! ACL-capable Linux system provides.

use crate::{
    acl::{diff::Change, Category},
    reconcile::plan::MutateFlags,
};

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Command,
};
use tracing::{debug, instrument};

/// Layer of indirection for ACL primitives.
pub trait AclGateway {
    /// Read textual ACL listing of path.
    fn read(&self, path: &Path) -> Result<String>;

    /// Set or remove one ACL entry of path.
    fn mutate(
        &self,
        path: &Path,
        category: Category,
        qualifier: &str,
        change: &Change,
        flags: MutateFlags,
    ) -> Result<()>;
}

/// ACL access through `getfacl` and `setfacl`.
#[derive(Clone, Debug)]
pub struct SetfaclGateway {
    getfacl: OsString,
    setfacl: OsString,
}

impl Default for SetfaclGateway {
    fn default() -> Self {
        Self::new("getfacl", "setfacl")
    }
}

impl SetfaclGateway {
    /// Construct new gateway using target programs.
    pub fn new(getfacl: impl Into<OsString>, setfacl: impl Into<OsString>) -> Self {
        Self {
            getfacl: getfacl.into(),
            setfacl: setfacl.into(),
        }
    }
}

impl AclGateway for SetfaclGateway {
    #[instrument(skip(self), level = "debug")]
    fn read(&self, path: &Path) -> Result<String> {
        syscall_non_interactive(&self.getfacl, read_args(path))
    }

    #[instrument(skip(self), level = "debug")]
    fn mutate(
        &self,
        path: &Path,
        category: Category,
        qualifier: &str,
        change: &Change,
        flags: MutateFlags,
    ) -> Result<()> {
        let output = syscall_non_interactive(
            &self.setfacl,
            mutate_args(path, category, qualifier, change, flags),
        )?;
        if !output.is_empty() {
            debug!("{output}");
        }

        Ok(())
    }
}

fn read_args(path: &Path) -> Vec<OsString> {
    vec![
        "--no-effective".into(),
        "--absolute-names".into(),
        "--".into(),
        path.into(),
    ]
}

fn mutate_args(
    path: &Path,
    category: Category,
    qualifier: &str,
    change: &Change,
    flags: MutateFlags,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if flags.recursive {
        args.push("-R".into());
    }

    if flags.default {
        args.push("-d".into());
    }

    match change {
        Change::Set(perms) => {
            args.push("-m".into());
            args.push(format!("{category}:{qualifier}:{perms}").into());
        }
        Change::Remove => {
            args.push("-x".into());
            args.push(format!("{category}:{qualifier}").into());
        }
    }

    args.push("--".into());
    args.push(path.into());
    args
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(output.stderr.as_slice());

        // INVARIANT: Chomp trailing newlines.
        return Err(GatewayError::Command {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            message: stderr.trim_end().to_string(),
        });
    }

    Ok(stdout)
}

/// ACL primitive failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Program ran, but reported failure.
    #[error("command {program:?} failed: {message}")]
    Command { program: String, message: String },

    /// Program could not be run at all.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
