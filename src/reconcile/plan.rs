// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Translate change sets into primitive ACL operations.
//!
//! A [`Plan`] is the ordered list of entry mutations required to carry out a
//! [`ChangeSet`] on one path. Planning is pure. It never touches the file
//! system, which makes it the place where every change is validated before
//! the first mutation is issued.
//!
//! # Ordering
//!
//! Access ACL changes come first, followed by default ACL changes as a
//! separate pass. Within each pass, changes follow category order, i.e.,
//! user, group, mask, other. Since `setfacl` recalculates the mask whenever a
//! group class entry changes, a mask change is always written after the
//! entries that would otherwise clobber it. Reconciliation pins a declared
//! mask into the change set whenever the group class changes, see
//! [`ChangeSet::pin_declared_mask`].

use crate::{
    acl::{
        diff::{Change, ChangeSet, EntryChanges},
        Category,
    },
    reconcile::PathKind,
};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Flags modifying a primitive mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MutateFlags {
    /// Apply to directory and everything beneath it.
    pub recursive: bool,

    /// Target default ACL instead of access ACL.
    pub default: bool,
}

impl MutateFlags {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            default: false,
        }
    }

    pub fn default_acl() -> Self {
        Self {
            recursive: false,
            default: true,
        }
    }
}

/// Primitive mutation of a single ACL entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AclOp {
    pub category: Category,
    pub qualifier: String,
    pub change: Change,
    pub flags: MutateFlags,
}

impl AclOp {
    /// Construct new primitive mutation.
    pub fn new(
        category: Category,
        qualifier: impl Into<String>,
        change: Change,
        flags: MutateFlags,
    ) -> Self {
        Self {
            category,
            qualifier: qualifier.into(),
            change,
            flags,
        }
    }

    /// Check if operation would remove a base entry.
    pub fn is_base_removal(&self) -> bool {
        self.qualifier.is_empty() && self.change == Change::Remove
    }
}

/// Show operation as `setfacl` entry, e.g., "default:user:alice:r--".
impl Display for AclOp {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.flags.default {
            fmt.write_str("default:")?;
        }

        match &self.change {
            Change::Set(perms) => write!(fmt, "{}:{}:{perms}", self.category, self.qualifier),
            Change::Remove => write!(fmt, "{}:{}:remove", self.category, self.qualifier),
        }
    }
}

/// Ordered list of primitive mutations for one path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    pub ops: Vec<AclOp>,
}

impl Plan {
    /// Plan out change set for a path of given kind.
    ///
    /// Base entry removals are dropped first. Access changes are flagged
    /// recursive if and only if recursion was requested and the path is a
    /// directory.
    ///
    /// # Errors
    ///
    /// - Return [`InvalidOperation::DefaultOnNonDirectory`] if any default ACL
    ///   change remains for a path that is not a directory.
    pub fn build(kind: PathKind, changes: ChangeSet, recursive: bool) -> Result<Self> {
        let changes = changes.without_base_removals();

        let access_flags = if recursive && kind.is_dir() {
            MutateFlags::recursive()
        } else {
            MutateFlags::default()
        };
        let mut ops = ops_for(&changes.access, access_flags);

        if let Some(default) = &changes.default {
            let default_ops = ops_for(default, MutateFlags::default_acl());
            if let Some(op) = default_ops.first().filter(|_| !kind.is_dir()) {
                return Err(InvalidOperation::DefaultOnNonDirectory { op: op.clone() });
            }
            ops.extend(default_ops);
        }

        Ok(Self { ops })
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AclOp> {
        self.ops.iter()
    }
}

fn ops_for(changes: &EntryChanges, flags: MutateFlags) -> Vec<AclOp> {
    changes
        .iter()
        .map(|(category, qualifier, change)| AclOp::new(category, qualifier, change.clone(), flags))
        .collect()
}

/// Change that cannot be carried out on target path.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOperation {
    /// Default ACL requested for something other than a directory.
    #[error("default ACL only valid on directories, cannot apply ({op})")]
    DefaultOnNonDirectory { op: AclOp },

    /// Base entries always exist, and cannot be removed.
    #[error("base ACL entries cannot be removed, cannot apply ({op})")]
    BaseEntryRemoval { op: AclOp },
}

/// Friendly result alias :3
type Result<T, E = InvalidOperation> = std::result::Result<T, E>;
