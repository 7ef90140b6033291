// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of ACL declaration files to simplify the process of
//! deserialization. File I/O is left to the caller to figure out.

use crate::acl::{Acl, AclEntries, DeclaredEntries, EntrySpec};

use serde::Deserialize;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// ACL declaration layout.
///
/// An ACL declaration lists the desired ACL state of any number of paths.
/// Each path gets its own `[[acl]]` table.
///
/// # General Layout
///
/// ```toml
/// [[acl]]
/// path = "$HOME/shared"
/// recurse = true
/// user = { "" = "rwx", alice = "r-x" }
/// group = "r-x"
/// other = "---"
///
/// [acl.default]
/// user = { "" = "rwx", alice = "r-x" }
/// group = "r-x"
/// other = "---"
/// ```
///
/// Every category accepts either a bare permission string that targets the
/// base entry, or a table of qualifiers to permission strings where the empty
/// qualifier is the base entry. Categories left out are declared empty, which
/// means that their named entries get removed.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct AclDefinition {
    /// Declared ACL resources.
    #[serde(default, rename = "acl")]
    pub resources: Vec<AclResource>,
}

impl FromStr for AclDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut definition: AclDefinition =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every target path.
        for resource in definition.resources.iter_mut() {
            resource.path = TargetPath::new(
                shellexpand::full(resource.path.to_string().as_str())
                    .map_err(ConfigError::ShellExpansion)?
                    .into_owned(),
            );
        }

        Ok(definition)
    }
}

/// Desired ACL state of one path.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct AclResource {
    /// Path to reconcile.
    pub path: TargetPath,

    /// Apply access ACL changes recursively to directory contents.
    #[serde(default)]
    pub recurse: bool,

    /// Owner and named user entries.
    #[serde(default)]
    pub user: EntrySpec,

    /// Owning group and named group entries.
    #[serde(default)]
    pub group: EntrySpec,

    /// Mask entry.
    #[serde(default)]
    pub mask: EntrySpec,

    /// Other entry.
    #[serde(default)]
    pub other: EntrySpec,

    /// Default ACL entries, only valid for directories.
    #[serde(default)]
    pub default: Option<DeclaredEntries>,
}

impl AclResource {
    /// Normalize declaration into desired ACL.
    pub fn desired(&self) -> Acl {
        let access = AclEntries::from(DeclaredEntries {
            user: self.user.clone(),
            group: self.group.clone(),
            mask: self.mask.clone(),
            other: self.other.clone(),
        });

        Acl {
            access,
            default: self.default.clone().map(AclEntries::from),
        }
    }
}

/// Path to reconcile ACL of.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct TargetPath(PathBuf);

impl TargetPath {
    /// Construct new target path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat target path as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl AsRef<Path> for TargetPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl Display for TargetPath {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}
