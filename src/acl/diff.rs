// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Structural ACL diffing.
//!
//! Compare a current ACL against a desired ACL, and compute the minimal set of
//! entry changes that transform the former into the latter. Qualifiers only in
//! the current ACL are removed, qualifiers only in the desired ACL are added,
//! and qualifiers whose permissions differ are overwritten. The same rule
//! applies to every level of the model, so the default section is diffed
//! exactly like the access section.
//!
//! Diffing is purely structural. It has no idea which removals the file system
//! would actually accept. See [`ChangeSet::without_base_removals`] for that.

use crate::acl::{Acl, AclEntries, Category, Entries, EntryMap};

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::debug;

/// Change to apply to a single ACL entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// Add entry, or overwrite its permissions.
    Set(String),

    /// Remove entry.
    Remove,
}

impl Display for Change {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Set(perms) => fmt.write_str(perms),
            Self::Remove => fmt.write_str("remove"),
        }
    }
}

/// Mapping of qualifier to change.
pub type ChangeMap = BTreeMap<String, Change>;

/// Changes per entry of each category.
pub type EntryChanges = Entries<Change>;

/// Full set of changes between two ACLs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Changes to access ACL.
    pub access: EntryChanges,

    /// Changes to default ACL, if any.
    pub default: Option<EntryChanges>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.access.is_empty() && self.default.as_ref().is_none_or(Entries::is_empty)
    }

    /// Drop every removal that targets a base entry.
    ///
    /// Base entries always exist on real file system objects, and cannot be
    /// removed. The mask base entry only exists alongside named entries, and
    /// vanishes on its own without them. Either way, removing a base entry is
    /// never a valid primitive operation.
    pub fn without_base_removals(mut self) -> Self {
        strip_base_removals(&mut self.access, "");
        if let Some(default) = self.default.as_mut() {
            strip_base_removals(default, "default:");
        }

        if self.default.as_ref().is_some_and(Entries::is_empty) {
            self.default = None;
        }

        self
    }

    /// Rewrite declared masks after any change to the group class.
    ///
    /// `setfacl` recalculates the mask whenever a named entry or the owning
    /// group entry changes. Thus, a declared mask that already matches the
    /// current one still gets clobbered by such a change, unless it is set
    /// again afterwards.
    pub fn pin_declared_mask(mut self, desired: &Acl) -> Self {
        pin_mask(&mut self.access, &desired.access);
        if let (Some(changes), Some(desired)) = (self.default.as_mut(), desired.default.as_ref()) {
            pin_mask(changes, desired);
        }

        self
    }
}

fn pin_mask(changes: &mut EntryChanges, desired: &AclEntries) {
    if let Some(perms) = desired.mask.get("") {
        let group_class = changes.user.keys().any(|qualifier| !qualifier.is_empty())
            || !changes.group.is_empty();
        if group_class {
            changes
                .mask
                .entry(String::new())
                .or_insert_with(|| Change::Set(perms.clone()));
        }
    }
}

fn strip_base_removals(changes: &mut EntryChanges, section: &str) {
    for category in Category::ALL {
        let entries = changes.get_mut(category);
        if entries.get("") == Some(&Change::Remove) {
            debug!("ignoring removal of base entry {section}{category}::");
            entries.remove("");
        }
    }
}

/// Structural difference between current and desired state.
pub trait Diff {
    /// Shape of computed changes.
    type Changes;

    /// Compute changes that turn `self` into `desired`.
    fn diff(&self, desired: &Self) -> Self::Changes;
}

impl Diff for EntryMap {
    type Changes = ChangeMap;

    fn diff(&self, desired: &Self) -> Self::Changes {
        let mut changes = ChangeMap::new();

        for qualifier in self.keys().filter(|key| !desired.contains_key(*key)) {
            changes.insert(qualifier.clone(), Change::Remove);
        }

        for (qualifier, perms) in desired {
            if self.get(qualifier) != Some(perms) {
                changes.insert(qualifier.clone(), Change::Set(perms.clone()));
            }
        }

        changes
    }
}

impl Diff for AclEntries {
    type Changes = EntryChanges;

    fn diff(&self, desired: &Self) -> Self::Changes {
        let mut changes = EntryChanges::default();
        for category in Category::ALL {
            *changes.get_mut(category) = self.get(category).diff(desired.get(category));
        }

        changes
    }
}

impl Diff for Acl {
    type Changes = ChangeSet;

    /// Diff access and default sections.
    ///
    /// An absent default section is equivalent to an empty one.
    fn diff(&self, desired: &Self) -> Self::Changes {
        let empty = AclEntries::default();
        let current_default = self.default.as_ref().unwrap_or(&empty);
        let desired_default = desired.default.as_ref().unwrap_or(&empty);
        let default = current_default.diff(desired_default);

        ChangeSet {
            access: self.access.diff(&desired.access),
            default: (!default.is_empty()).then_some(default),
        }
    }
}

/// Compute changes that turn current ACL into desired ACL.
pub fn diff(current: &Acl, desired: &Acl) -> ChangeSet {
    current.diff(desired)
}
