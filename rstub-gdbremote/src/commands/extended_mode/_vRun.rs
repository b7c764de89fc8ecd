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

use bytes::BytesMut;

use crate::commands::*;
use crate::hex::*;

/// `vRun;filename[;argument]...`, every field hex encoded. An empty file
/// name reruns the previous program.
#[derive(PartialEq, Debug)]
pub struct vRun {
    pub filename: Option<PathBuf>,
    pub args: Vec<String>,
}

impl ParseCommand for vRun {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes[..].split(|c| *c == b';');
        let filename = match iter.next() {
            Some(name) if !name.is_empty() => Some(PathBuf::from(OsString::from_vec(
                decode_hex_string(name).ok()?,
            ))),
            _ => None,
        };
        let args = iter
            .map(|arg| decode_hex_str(arg).ok())
            .collect::<Option<Vec<_>>>()?;
        Some(vRun { filename, args })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn program_and_arguments() {
        assert_eq!(
            vRun::parse(BytesMut::from("2f62696e2f6c73;2d6c;2f746d70")),
            Some(vRun {
                filename: Some(PathBuf::from("/bin/ls")),
                args: vec!["-l".into(), "/tmp".into()],
            })
        );
        assert_eq!(
            vRun::parse(BytesMut::new()),
            Some(vRun {
                filename: None,
                args: vec![],
            })
        );
    }
}
