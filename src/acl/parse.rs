// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Parse textual ACL listings.
//!
//! Understands the line layout produced by `getfacl`, i.e., one
//! `category:qualifier:perms` entry per line, with default ACL entries
//! prefixed by `default:`. Header comments, blank lines, and anything else
//! that does not start with a known category are ignored. Malformed entry
//! lines are skipped rather than rejected.

use crate::acl::{Acl, AclEntries, Category};

use tracing::debug;

impl Acl {
    /// Parse textual ACL listing into ACL model.
    ///
    /// Never fails. Lines that cannot be understood are skipped. The default
    /// section is always present in the result, albeit empty for objects that
    /// lack a default ACL.
    pub fn parse(text: &str) -> Self {
        let mut access = AclEntries::default();
        let mut default = AclEntries::default();

        for (number, line) in text.lines().enumerate() {
            let Some(entry) = parse_line(line) else {
                if is_entry_line(line) {
                    debug!("skip malformed ACL line {}: {line:?}", number + 1);
                }
                continue;
            };

            let section = if entry.is_default {
                &mut default
            } else {
                &mut access
            };
            section
                .get_mut(entry.category)
                .insert(entry.qualifier.into(), entry.perms.into());
        }

        Self {
            access,
            default: Some(default),
        }
    }
}

struct ParsedLine<'a> {
    is_default: bool,
    category: Category,
    qualifier: &'a str,
    perms: &'a str,
}

fn is_entry_line(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(tag, _)| tag == "default" || Category::from_tag(tag).is_some())
}

fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let fields = line.split(':').collect::<Vec<_>>();
    if fields.len() < 3 {
        return None;
    }

    let (is_default, tag, qualifier, perms) = match fields[0] {
        "default" => (true, fields[1], fields[2], *fields.get(3)?),
        tag => (false, tag, fields[1], fields[2]),
    };
    let category = Category::from_tag(tag)?;

    // INVARIANT: Drop trailing annotations like "#effective:r--".
    let perms = perms.split('#').next().unwrap_or_default().trim();
    if perms.is_empty() {
        return None;
    }

    Some(ParsedLine {
        is_default,
        category,
        qualifier,
        perms,
    })
}
