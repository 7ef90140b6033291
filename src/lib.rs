// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Declarative POSIX ACL management.
//!
//! Oxifacl reconciles the POSIX ACL of a path to a declared desired state. The
//! current ACL is read from the file system, diffed against the desired ACL,
//! and only the entries that differ are set or removed.
//!
//! # See Also
//!
//! 1. [`acl`] for the ACL model.
//! 2. [`reconcile`] for the reconciliation pipeline.
//! 3. [`config`] for the declaration file layout.

pub mod acl;
pub mod config;
pub mod path;
pub mod reconcile;

pub use acl::{
    diff::{diff, Change, ChangeSet},
    Acl, AclEntries, Category, EntrySpec,
};
pub use reconcile::{
    gateway::{AclGateway, SetfaclGateway},
    Reconciler,
};
