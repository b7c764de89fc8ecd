/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;
use crate::hex::*;

/// How a process name filter compares.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum NameMatch {
    #[default]
    Equals,
    StartsWith,
    EndsWith,
    Contains,
}

impl NameMatch {
    pub fn matches(&self, pattern: &str, name: &str) -> bool {
        match self {
            NameMatch::Equals => name == pattern,
            NameMatch::StartsWith => name.starts_with(pattern),
            NameMatch::EndsWith => name.ends_with(pattern),
            NameMatch::Contains => name.contains(pattern),
        }
    }
}

/// Filters of a process list query. Every field that is set must match.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct ProcessQuery {
    pub name: Option<String>,
    pub name_match: NameMatch,
    pub pid: Option<i32>,
    pub parent_pid: Option<i32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub euid: Option<u32>,
    pub egid: Option<u32>,
    pub all_users: bool,
    pub triple: Option<String>,
}

impl ProcessQuery {
    fn decode(bytes: &[u8]) -> Option<Self> {
        let mut query = ProcessQuery::default();
        for (key, value) in decode_key_values(bytes)? {
            match key.as_str() {
                "name" => query.name = Some(decode_hex_str(value.as_bytes()).ok()?),
                "name_match" => {
                    query.name_match = match value.as_str() {
                        "equals" => NameMatch::Equals,
                        "starts_with" => NameMatch::StartsWith,
                        "ends_with" => NameMatch::EndsWith,
                        "contains" => NameMatch::Contains,
                        _ => return None,
                    }
                }
                "pid" => query.pid = Some(value.parse().ok()?),
                "parent_pid" => query.parent_pid = Some(value.parse().ok()?),
                "uid" => query.uid = Some(value.parse().ok()?),
                "gid" => query.gid = Some(value.parse().ok()?),
                "euid" => query.euid = Some(value.parse().ok()?),
                "egid" => query.egid = Some(value.parse().ok()?),
                "all_users" => query.all_users = value == "1",
                "triple" => query.triple = Some(decode_hex_str(value.as_bytes()).ok()?),
                _ => {}
            }
        }
        Some(query)
    }
}

/// `qfProcessInfo[:key:value;...]`, first of a process list.
#[derive(PartialEq, Debug)]
pub struct qfProcessInfo {
    pub query: ProcessQuery,
}

impl ParseCommand for qfProcessInfo {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let query = match bytes.strip_prefix(b":") {
            Some(filters) => ProcessQuery::decode(filters)?,
            None if bytes.is_empty() => ProcessQuery::default(),
            None => return None,
        };
        Some(qfProcessInfo { query })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filters() {
        let cmd =
            qfProcessInfo::parse(BytesMut::from(":name:6c73;name_match:starts_with;uid:1000;"))
                .unwrap();
        assert_eq!(cmd.query.name.as_deref(), Some("ls"));
        assert_eq!(cmd.query.name_match, NameMatch::StartsWith);
        assert_eq!(cmd.query.uid, Some(1000));
        assert!(cmd.query.name_match.matches("ls", "lsof"));

        assert_eq!(
            qfProcessInfo::parse(BytesMut::new()).unwrap().query,
            ProcessQuery::default()
        );
        assert_eq!(
            qfProcessInfo::parse(BytesMut::from(":name_match:regex;")),
            None
        );
    }
}
