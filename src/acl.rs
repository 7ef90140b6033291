// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! POSIX ACL model.
//!
//! A POSIX __access control list__ extends the traditional owner, group, and
//! other permission bits of a file system object with additional entries for
//! named users and named groups. Every entry belongs to one of four
//! __categories__: `user`, `group`, `mask`, or `other`. Each entry is keyed by
//! a __qualifier__, i.e., the name of the user or group the entry applies to.
//! An empty qualifier denotes the __base entry__ of a category, which mirrors
//! the traditional permission bits and can never be removed.
//!
//! # Access and Default ACLs
//!
//! Directories may carry a second ACL named the __default ACL__. The default
//! ACL is never consulted for access checks. Instead, it is inherited by new
//! children created under the directory. A default ACL has the exact same
//! shape as the access ACL, but it cannot nest another default ACL of its own.
//! Hence, the model is a fixed two-level structure: [`Acl`] holds the access
//! entries, and optionally the default entries.
//!
//! # Declaring Desired State
//!
//! Callers declare entries of a category either as a bare permission string,
//! which targets the base entry, or as a full mapping of qualifiers to
//! permission strings. Both forms normalize into [`EntryMap`] through
//! [`EntrySpec`] before any diffing happens.
//!
//! # See Also
//!
//! 1. [Man page acl(5)](https://man7.org/linux/man-pages/man5/acl.5.html)
//! 2. [`diff`]
//! 3. [`parse`]

pub mod diff;
pub mod parse;

use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Mapping of qualifier to permission string.
///
/// Sorted by qualifier so that everything derived from it, e.g., change sets
/// and mutation order, stays deterministic.
pub type EntryMap = BTreeMap<String, String>;

/// ACL entry category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    User,
    Group,
    Mask,
    Other,
}

impl Category {
    /// All categories in the order `getfacl` lists them.
    pub const ALL: [Category; 4] = [Self::User, Self::Group, Self::Mask, Self::Other];

    /// Match category by its textual tag, e.g., "user".
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            "mask" => Some(Self::Mask),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Textual tag of category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Mask => "mask",
            Self::Other => "other",
        }
    }
}

impl Display for Category {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Entries of an ACL grouped by category.
///
/// Generic over the value stored per qualifier, so the same shape serves both
/// as an ACL ([`AclEntries`]) and as a set of changes against one
/// ([`EntryChanges`](crate::acl::diff::EntryChanges)). Every category is
/// always present, empty maps stand in for categories without entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entries<V> {
    pub user: BTreeMap<String, V>,
    pub group: BTreeMap<String, V>,
    pub mask: BTreeMap<String, V>,
    pub other: BTreeMap<String, V>,
}

impl<V> Default for Entries<V> {
    fn default() -> Self {
        Self {
            user: BTreeMap::new(),
            group: BTreeMap::new(),
            mask: BTreeMap::new(),
            other: BTreeMap::new(),
        }
    }
}

impl<V> Entries<V> {
    /// Entries of target category.
    pub fn get(&self, category: Category) -> &BTreeMap<String, V> {
        match category {
            Category::User => &self.user,
            Category::Group => &self.group,
            Category::Mask => &self.mask,
            Category::Other => &self.other,
        }
    }

    /// Mutable entries of target category.
    pub fn get_mut(&mut self, category: Category) -> &mut BTreeMap<String, V> {
        match category {
            Category::User => &mut self.user,
            Category::Group => &mut self.group,
            Category::Mask => &mut self.mask,
            Category::Other => &mut self.other,
        }
    }

    /// Iterate through all entries in category order, then qualifier order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &str, &V)> + '_ {
        Category::ALL.into_iter().flat_map(move |category| {
            self.get(category)
                .iter()
                .map(move |(qualifier, value)| (category, qualifier.as_str(), value))
        })
    }

    /// Total number of entries across all categories.
    pub fn len(&self) -> usize {
        Category::ALL
            .iter()
            .map(|category| self.get(*category).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// ACL entries holding permission strings, e.g., "rwx" or "r--".
pub type AclEntries = Entries<String>;

/// POSIX ACL of a file system object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Acl {
    /// Access ACL entries.
    pub access: AclEntries,

    /// Default ACL entries, only meaningful for directories.
    pub default: Option<AclEntries>,
}

impl Acl {
    /// Construct new ACL out of access entries with no default ACL.
    pub fn new(access: AclEntries) -> Self {
        Self {
            access,
            default: None,
        }
    }

    /// Attach default ACL entries.
    pub fn with_default(mut self, default: AclEntries) -> Self {
        self.default = Some(default);
        self
    }
}

/// Render ACL in the same line layout `getfacl` uses.
impl Display for Acl {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (category, qualifier, perms) in self.access.iter() {
            writeln!(fmt, "{category}:{qualifier}:{perms}")?;
        }

        if let Some(default) = &self.default {
            for (category, qualifier, perms) in default.iter() {
                writeln!(fmt, "default:{category}:{qualifier}:{perms}")?;
            }
        }

        Ok(())
    }
}

/// Declared entries of one category.
///
/// Either a bare permission string for the base entry, or a full mapping of
/// qualifier to permission string.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EntrySpec {
    Base(String),
    Qualified(EntryMap),
}

impl Default for EntrySpec {
    fn default() -> Self {
        Self::Qualified(EntryMap::new())
    }
}

impl From<&str> for EntrySpec {
    fn from(perms: &str) -> Self {
        Self::Base(perms.into())
    }
}

impl From<String> for EntrySpec {
    fn from(perms: String) -> Self {
        Self::Base(perms)
    }
}

impl From<EntryMap> for EntrySpec {
    fn from(entries: EntryMap) -> Self {
        Self::Qualified(entries)
    }
}

impl From<EntrySpec> for EntryMap {
    fn from(spec: EntrySpec) -> Self {
        match spec {
            EntrySpec::Base(perms) => EntryMap::from([(String::new(), perms.trim().into())]),
            EntrySpec::Qualified(entries) => entries
                .into_iter()
                .map(|(qualifier, perms)| (qualifier, perms.trim().into()))
                .collect(),
        }
    }
}

/// Declared entries of a whole ACL section.
///
/// Missing categories are declared empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeclaredEntries {
    pub user: EntrySpec,
    pub group: EntrySpec,
    pub mask: EntrySpec,
    pub other: EntrySpec,
}

impl From<DeclaredEntries> for AclEntries {
    fn from(declared: DeclaredEntries) -> Self {
        Self {
            user: declared.user.into(),
            group: declared.group.into(),
            mask: declared.mask.into(),
            other: declared.other.into(),
        }
    }
}
