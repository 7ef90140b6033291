// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! ACL reconciliation.
//!
//! Bring the ACL of a path in line with a declared desired state, issuing only
//! the entry mutations that are actually needed. Reconciliation is a short
//! pipeline:
//!
//! 1. Check that the target path exists.
//! 2. Read and parse the current ACL through an [`AclGateway`].
//! 3. Diff the current ACL against the desired ACL.
//! 4. Plan out primitive mutations, see [`Plan`].
//! 5. Execute the plan one mutation at a time.
//!
//! The current ACL is read fresh on every run. Thus, running reconciliation
//! again right after it succeeded is a no-op.
//!
//! # Known Limitations
//!
//! No rollback is performed. If a mutation fails, the mutations issued before
//! it stay applied, and the remaining ones are skipped. Rerunning
//! reconciliation picks up where the failed run left off.
//!
//! No locking is performed either. Concurrent modification of the same ACL by
//! another process is a race that the last writer wins.

pub mod gateway;
pub mod plan;

use crate::{
    acl::{diff::ChangeSet, diff::Diff, Acl},
    reconcile::{
        gateway::{AclGateway, GatewayError, SetfaclGateway},
        plan::{AclOp, InvalidOperation, Plan},
    },
};

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Kind of file system object at target path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    Directory,
    Other,
}

impl PathKind {
    /// Inspect target path, following symlinks.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::NotFound`] if path does not exist.
    /// - Return [`ReconcileError::Inspect`] if path metadata cannot be read.
    pub fn of(path: impl AsRef<Path>) -> Result<Self> {
        match fs::metadata(path.as_ref()) {
            Ok(metadata) if metadata.is_dir() => Ok(Self::Directory),
            Ok(_) => Ok(Self::Other),
            Err(error) if error.kind() == ErrorKind::NotFound => Err(ReconcileError::NotFound {
                path: path.as_ref().into(),
            }),
            Err(error) => Err(ReconcileError::Inspect {
                source: error,
                path: path.as_ref().into(),
            }),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Reconcile ACLs through a gateway.
#[derive(Debug, Default)]
pub struct Reconciler<G = SetfaclGateway>
where
    G: AclGateway,
{
    gateway: G,
}

impl<G> Reconciler<G>
where
    G: AclGateway,
{
    /// Construct new reconciler.
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Gateway used for ACL primitives.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Read current ACL of path.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::NotFound`] if path does not exist.
    /// - Return [`ReconcileError::Read`] if gateway fails to read ACL.
    #[instrument(skip(self, path), level = "debug")]
    pub fn current(&self, path: impl AsRef<Path>) -> Result<Acl> {
        PathKind::of(path.as_ref())?;
        self.read(path.as_ref())
    }

    /// Plan out changes needed to converge path to desired ACL.
    ///
    /// Nothing is mutated. Useful for dry runs.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::NotFound`] if path does not exist.
    /// - Return [`ReconcileError::Read`] if gateway fails to read ACL.
    /// - Return [`ReconcileError::InvalidOperation`] if desired ACL declares
    ///   default entries for a path that is not a directory.
    #[instrument(skip(self, path, desired), level = "debug")]
    pub fn plan(&self, path: impl AsRef<Path>, desired: &Acl, recursive: bool) -> Result<Plan> {
        let path = path.as_ref();
        let kind = PathKind::of(path)?;
        let current = self.read(path)?;
        debug!("current ACL of {:?}:\n{current}", path.display());
        debug!("desired ACL of {:?}:\n{desired}", path.display());

        let changes = current.diff(desired).pin_declared_mask(desired);
        debug!("changes required: {changes:?}");
        plan_for(path, kind, changes, recursive)
    }

    /// Converge path to desired ACL.
    ///
    /// Returns the mutations that were issued, which is empty if path was
    /// already converged.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::NotFound`] if path does not exist.
    /// - Return [`ReconcileError::Read`] if gateway fails to read ACL.
    /// - Return [`ReconcileError::InvalidOperation`] if desired ACL declares
    ///   default entries for a path that is not a directory.
    /// - Return [`ReconcileError::Mutate`] if gateway fails to mutate ACL.
    #[instrument(skip(self, path, desired), level = "debug")]
    pub fn converge(
        &self,
        path: impl AsRef<Path>,
        desired: &Acl,
        recursive: bool,
    ) -> Result<Plan> {
        let plan = self.plan(path.as_ref(), desired, recursive)?;
        self.execute(path.as_ref(), &plan)?;
        Ok(plan)
    }

    /// Apply precomputed change set to path.
    ///
    /// Base entry removals are dropped. Access changes are applied first,
    /// recursively if requested and path is a directory. Default ACL changes
    /// follow as a separate pass. The whole change set is validated before the
    /// first mutation is issued.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::NotFound`] if path does not exist.
    /// - Return [`ReconcileError::InvalidOperation`] if change set contains
    ///   default ACL changes for a path that is not a directory.
    /// - Return [`ReconcileError::Mutate`] if gateway fails to mutate ACL.
    #[instrument(skip(self, path, changes), level = "debug")]
    pub fn apply(
        &self,
        path: impl AsRef<Path>,
        changes: ChangeSet,
        recursive: bool,
    ) -> Result<Plan> {
        let path = path.as_ref();
        let kind = PathKind::of(path)?;
        let plan = plan_for(path, kind, changes, recursive)?;
        self.execute(path, &plan)?;
        Ok(plan)
    }

    /// Issue every mutation of plan in order.
    ///
    /// Stops at the first failure without undoing earlier mutations.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::InvalidOperation`] if plan tries to remove a
    ///   base entry.
    /// - Return [`ReconcileError::Mutate`] if gateway fails to mutate ACL.
    pub fn execute(&self, path: impl AsRef<Path>, plan: &Plan) -> Result<()> {
        let path = path.as_ref();
        for op in plan.iter() {
            if op.is_base_removal() {
                return Err(ReconcileError::InvalidOperation {
                    source: InvalidOperation::BaseEntryRemoval { op: op.clone() },
                    path: path.into(),
                });
            }

            info!("setting ACL ({op}) on {:?}", path.display());
            self.gateway
                .mutate(path, op.category, &op.qualifier, &op.change, op.flags)
                .map_err(|source| ReconcileError::Mutate {
                    source,
                    path: path.into(),
                    op: op.clone(),
                })?;
        }

        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Acl> {
        let text = self
            .gateway
            .read(path)
            .map_err(|source| ReconcileError::Read {
                source,
                path: path.into(),
            })?;

        Ok(Acl::parse(&text))
    }
}

fn plan_for(path: &Path, kind: PathKind, changes: ChangeSet, recursive: bool) -> Result<Plan> {
    Plan::build(kind, changes, recursive).map_err(|source| ReconcileError::InvalidOperation {
        source,
        path: path.into(),
    })
}

/// All possible error types for ACL reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Target path does not exist.
    #[error("cannot set ACL because {:?} does not exist", path.display())]
    NotFound { path: PathBuf },

    /// Target path exists, but cannot be inspected.
    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Change cannot be carried out on target path.
    #[error("invalid ACL operation on {:?}", path.display())]
    InvalidOperation {
        #[source]
        source: InvalidOperation,
        path: PathBuf,
    },

    /// Current ACL cannot be read.
    #[error("failed to read ACL of {:?}", path.display())]
    Read {
        #[source]
        source: GatewayError,
        path: PathBuf,
    },

    /// Mutation of ACL entry failed.
    #[error("failed to set ACL ({op}) on {:?}", path.display())]
    Mutate {
        #[source]
        source: GatewayError,
        path: PathBuf,
        op: AclOp,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
