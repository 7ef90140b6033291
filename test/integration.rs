// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{base_acl, entries, GatewayFixture};

use oxifacl::{
    acl::{
        diff::{diff, Change, ChangeMap, ChangeSet, EntryChanges},
        Acl, AclEntries, Category,
    },
    config::AclDefinition,
    reconcile::{
        plan::{AclOp, InvalidOperation, MutateFlags},
        ReconcileError, Reconciler,
    },
};

use anyhow::Result;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::fs;

fn set(perms: &str) -> Change {
    Change::Set(perms.into())
}

#[sealed_test]
fn converge_adds_named_entry_then_is_idempotent() -> Result<()> {
    fs::create_dir("share")?;
    let gateway = GatewayFixture::new().with_acl("share", base_acl("rwx", "r-x", "r-x"));
    let reconciler = Reconciler::new(gateway);

    let mut desired = base_acl("rwx", "r-x", "r-x");
    desired.access.user.insert("alice".into(), "r--".into());

    let result = reconciler.converge("share", &desired, false)?;
    let expect = vec![AclOp::new(
        Category::User,
        "alice",
        set("r--"),
        MutateFlags::default(),
    )];
    assert_eq!(result.ops, expect);

    let result = reconciler.converge("share", &desired, false)?;
    assert!(result.is_empty());
    assert_eq!(reconciler.gateway().calls().len(), 1);

    let current = reconciler.current("share")?;
    assert!(diff(&current, &desired).without_base_removals().is_empty());

    Ok(())
}

#[sealed_test]
fn converge_removes_undeclared_named_entries() -> Result<()> {
    fs::write("notes.txt", "blah")?;
    let mut current = base_acl("rw-", "r--", "r--");
    current.access.user.insert("bob".into(), "rw-".into());
    current.access.group.insert("devs".into(), "rw-".into());
    current.access.mask.insert("".into(), "rw-".into());
    let gateway = GatewayFixture::new().with_acl("notes.txt", current);
    let reconciler = Reconciler::new(gateway);

    let desired = base_acl("rw-", "r--", "---");
    reconciler.converge("notes.txt", &desired, false)?;

    let expect = vec![
        AclOp::new(Category::User, "bob", Change::Remove, MutateFlags::default()),
        AclOp::new(Category::Group, "devs", Change::Remove, MutateFlags::default()),
        AclOp::new(Category::Other, "", set("---"), MutateFlags::default()),
    ];
    assert_eq!(reconciler.gateway().calls(), expect);

    Ok(())
}

#[sealed_test]
fn apply_rejects_default_on_regular_file() -> Result<()> {
    fs::write("somefile", "blah")?;
    let reconciler = Reconciler::new(GatewayFixture::new());
    let changes = ChangeSet {
        access: EntryChanges::default(),
        default: Some(EntryChanges {
            user: ChangeMap::from([("".into(), set("rwx"))]),
            ..Default::default()
        }),
    };

    let result = reconciler.apply("somefile", changes, false);
    assert!(matches!(
        result,
        Err(ReconcileError::InvalidOperation {
            source: InvalidOperation::DefaultOnNonDirectory { .. },
            ..
        })
    ));
    assert!(reconciler.gateway().calls().is_empty());

    Ok(())
}

#[sealed_test]
fn apply_validates_default_before_any_access_change() -> Result<()> {
    fs::write("somefile", "blah")?;
    let reconciler = Reconciler::new(GatewayFixture::new());
    let changes = ChangeSet {
        access: EntryChanges {
            user: ChangeMap::from([("alice".into(), set("r--"))]),
            ..Default::default()
        },
        default: Some(EntryChanges {
            group: ChangeMap::from([("devs".into(), set("r-x"))]),
            ..Default::default()
        }),
    };

    let result = reconciler.apply("somefile", changes, true);
    assert!(result.is_err());
    assert!(reconciler.gateway().calls().is_empty());

    Ok(())
}

#[sealed_test]
fn apply_filters_base_entry_removal() -> Result<()> {
    fs::write("somefile", "blah")?;
    let reconciler = Reconciler::new(GatewayFixture::new());
    let changes = ChangeSet {
        access: EntryChanges {
            user: ChangeMap::from([("".into(), Change::Remove), ("bob".into(), Change::Remove)]),
            ..Default::default()
        },
        default: None,
    };

    reconciler.apply("somefile", changes, false)?;
    let expect = vec![AclOp::new(
        Category::User,
        "bob",
        Change::Remove,
        MutateFlags::default(),
    )];
    assert_eq!(reconciler.gateway().calls(), expect);

    Ok(())
}

#[sealed_test]
fn apply_to_missing_path_is_not_found() {
    let reconciler = Reconciler::new(GatewayFixture::new());
    let changes = ChangeSet {
        access: EntryChanges {
            user: ChangeMap::from([("alice".into(), set("r--"))]),
            ..Default::default()
        },
        default: None,
    };

    let result = reconciler.apply("missing", changes, false);
    assert!(matches!(result, Err(ReconcileError::NotFound { .. })));
    assert!(reconciler.gateway().calls().is_empty());
}

#[sealed_test]
fn recursion_only_applies_to_access_acl_of_directories() -> Result<()> {
    fs::create_dir("share")?;
    fs::write("notes.txt", "blah")?;
    let reconciler = Reconciler::new(GatewayFixture::new());
    let changes = ChangeSet {
        access: EntryChanges {
            group: ChangeMap::from([("devs".into(), set("rwx"))]),
            ..Default::default()
        },
        default: Some(EntryChanges {
            group: ChangeMap::from([("devs".into(), set("r-x"))]),
            ..Default::default()
        }),
    };

    reconciler.apply("share", changes.clone(), true)?;
    reconciler.apply("notes.txt", ChangeSet { default: None, ..changes }, true)?;

    let expect = vec![
        AclOp::new(Category::Group, "devs", set("rwx"), MutateFlags::recursive()),
        AclOp::new(Category::Group, "devs", set("r-x"), MutateFlags::default_acl()),
        AclOp::new(Category::Group, "devs", set("rwx"), MutateFlags::default()),
    ];
    assert_eq!(reconciler.gateway().calls(), expect);

    Ok(())
}

#[sealed_test]
fn converge_default_acl_of_directory() -> Result<()> {
    fs::create_dir("share")?;
    let current = base_acl("rwx", "r-x", "---").with_default(AclEntries {
        user: entries(&[("", "rwx"), ("bob", "rwx")]),
        group: entries(&[("", "r-x")]),
        mask: entries(&[("", "rwx")]),
        other: entries(&[("", "---")]),
    });
    let gateway = GatewayFixture::new().with_acl("share", current);
    let reconciler = Reconciler::new(gateway);

    let desired = base_acl("rwx", "r-x", "---").with_default(AclEntries {
        user: entries(&[("", "rwx"), ("alice", "r-x")]),
        group: entries(&[("", "r-x")]),
        mask: entries(&[("", "r-x")]),
        other: entries(&[("", "---")]),
    });
    reconciler.converge("share", &desired, false)?;

    let expect = vec![
        AclOp::new(Category::User, "alice", set("r-x"), MutateFlags::default_acl()),
        AclOp::new(Category::User, "bob", Change::Remove, MutateFlags::default_acl()),
        AclOp::new(Category::Mask, "", set("r-x"), MutateFlags::default_acl()),
    ];
    assert_eq!(reconciler.gateway().calls(), expect);
    assert_eq!(reconciler.gateway().acl("share"), desired);

    Ok(())
}

#[sealed_test]
fn converge_keeps_declared_mask_across_runs() -> Result<()> {
    fs::write("notes.txt", "blah")?;
    let mut current = base_acl("rw-", "r--", "r--");
    current.access.user.insert("alice".into(), "r--".into());
    current.access.mask.insert("".into(), "r--".into());
    let reconciler = Reconciler::new(GatewayFixture::new().with_acl("notes.txt", current));

    // Mask already matches, but setfacl recalculates it once alice changes.
    let mut desired = base_acl("rw-", "r--", "r--");
    desired.access.user.insert("alice".into(), "rw-".into());
    desired.access.mask.insert("".into(), "r--".into());

    let result = reconciler.converge("notes.txt", &desired, false)?;
    let expect = vec![
        AclOp::new(Category::User, "alice", set("rw-"), MutateFlags::default()),
        AclOp::new(Category::Mask, "", set("r--"), MutateFlags::default()),
    ];
    assert_eq!(result.ops, expect);
    assert_eq!(reconciler.gateway().acl("notes.txt"), desired);

    let result = reconciler.converge("notes.txt", &desired, false)?;
    assert!(result.is_empty());

    Ok(())
}

#[sealed_test]
fn gateway_failure_aborts_remaining_changes() -> Result<()> {
    fs::write("notes.txt", "blah")?;
    let gateway = GatewayFixture::new()
        .with_acl("notes.txt", base_acl("rw-", "r--", "r--"))
        .fail_on(Category::User, "bob");
    let reconciler = Reconciler::new(gateway);

    let mut desired = base_acl("rw-", "r--", "r--");
    desired.access.user.insert("alice".into(), "r--".into());
    desired.access.user.insert("bob".into(), "r--".into());
    desired.access.user.insert("carol".into(), "r--".into());

    let result = reconciler.converge("notes.txt", &desired, false);
    let op = match result {
        Err(ReconcileError::Mutate { op, .. }) => op,
        other => panic!("expected mutation failure, got {other:?}"),
    };
    assert_eq!(op, AclOp::new(Category::User, "bob", set("r--"), MutateFlags::default()));

    // Earlier mutations stay applied.
    let qualifiers = reconciler
        .gateway()
        .calls()
        .into_iter()
        .map(|op| op.qualifier)
        .collect::<Vec<_>>();
    assert_eq!(qualifiers, vec!["alice", "bob"]);
    assert!(reconciler
        .gateway()
        .acl("notes.txt")
        .access
        .user
        .contains_key("alice"));

    // Rerun picks up where the failed run left off.
    let reconciler = Reconciler::new(
        GatewayFixture::new().with_acl("notes.txt", reconciler.gateway().acl("notes.txt")),
    );
    let result = reconciler.converge("notes.txt", &desired, false)?;
    let qualifiers = result.iter().map(|op| op.qualifier.as_str()).collect::<Vec<_>>();
    assert_eq!(qualifiers, vec!["bob", "carol"]);

    Ok(())
}

#[sealed_test(env = [("SHARE_ROOT", "share")])]
fn converge_declared_resources() -> Result<()> {
    fs::create_dir("share")?;
    fs::write("share/notes.txt", "blah")?;
    let definition: AclDefinition = r#"
        [[acl]]
        path = "$SHARE_ROOT"
        user = "rwx"
        group = { "" = "r-x", devs = "rwx" }
        other = "---"

        [acl.default]
        user = "rwx"
        group = { "" = "r-x", devs = "rwx" }
        other = "---"

        [[acl]]
        path = "$SHARE_ROOT/notes.txt"
        user = { "" = "rw-", alice = "r--" }
        group = "r--"
        other = "r--"
    "#
    .parse()?;

    let gateway = GatewayFixture::new()
        .with_acl("share", base_acl("rwx", "r-x", "r-x"))
        .with_acl("share/notes.txt", base_acl("rw-", "r--", "r--"));
    let reconciler = Reconciler::new(gateway);

    for resource in &definition.resources {
        reconciler.converge(&resource.path, &resource.desired(), resource.recurse)?;
    }

    let expect = vec![
        AclOp::new(Category::Group, "devs", set("rwx"), MutateFlags::default()),
        AclOp::new(Category::Other, "", set("---"), MutateFlags::default()),
        AclOp::new(Category::User, "", set("rwx"), MutateFlags::default_acl()),
        AclOp::new(Category::Group, "", set("r-x"), MutateFlags::default_acl()),
        AclOp::new(Category::Group, "devs", set("rwx"), MutateFlags::default_acl()),
        AclOp::new(Category::Other, "", set("---"), MutateFlags::default_acl()),
        AclOp::new(Category::User, "alice", set("r--"), MutateFlags::default()),
    ];
    assert_eq!(reconciler.gateway().calls(), expect);

    for resource in &definition.resources {
        let plan = reconciler.plan(&resource.path, &resource.desired(), resource.recurse)?;
        assert!(plan.is_empty());
    }

    Ok(())
}

#[sealed_test]
fn current_acl_is_parsed_from_listing() -> Result<()> {
    fs::create_dir("share")?;
    let acl = base_acl("rwx", "r-x", "---").with_default(AclEntries {
        user: entries(&[("", "rwx")]),
        ..Default::default()
    });
    let reconciler = Reconciler::new(GatewayFixture::new().with_acl("share", acl.clone()));
    assert_eq!(reconciler.current("share")?, acl);

    let result = reconciler.current("missing");
    assert!(matches!(result, Err(ReconcileError::NotFound { .. })));

    Ok(())
}

#[test]
fn parsed_acl_matches_desired_model() {
    let text = "# file: /tmp/x\nuser::\nuser::rwx\ngroup::r-x\n";
    let expect = Acl {
        access: AclEntries {
            user: entries(&[("", "rwx")]),
            group: entries(&[("", "r-x")]),
            ..Default::default()
        },
        default: Some(AclEntries::default()),
    };
    assert_eq!(Acl::parse(text), expect);
}
