/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;

use crate::commands::*;
use crate::hex::*;

/// `qPlatform_shell:hex(command),timeout[,hex(cwd)]`, the timeout in
/// seconds. A zero timeout waits forever.
#[derive(PartialEq, Debug)]
pub struct qPlatform_shell {
    pub command: String,
    pub timeout: Option<Duration>,
    pub cwd: Option<PathBuf>,
}

impl ParseCommand for qPlatform_shell {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes[..].split(|c| *c == b',');
        let command = iter.next().and_then(|c| decode_hex_str(c).ok())?;
        let timeout: u64 = match iter.next() {
            Some(t) => decode_hex(t).ok()?,
            None => 0,
        };
        let cwd = match iter.next() {
            Some(cwd) if !cwd.is_empty() => Some(PathBuf::from(OsString::from_vec(
                decode_hex_string(cwd).ok()?,
            ))),
            _ => None,
        };
        Some(qPlatform_shell {
            command,
            timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            cwd,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shell_command() {
        assert_eq!(
            qPlatform_shell::parse(BytesMut::from("6c73202d6c,a")),
            Some(qPlatform_shell {
                command: "ls -l".into(),
                timeout: Some(Duration::from_secs(10)),
                cwd: None,
            })
        );
        assert_eq!(
            qPlatform_shell::parse(BytesMut::from("6c73,0,2f746d70")),
            Some(qPlatform_shell {
                command: "ls".into(),
                timeout: None,
                cwd: Some(PathBuf::from("/tmp")),
            })
        );
    }
}
