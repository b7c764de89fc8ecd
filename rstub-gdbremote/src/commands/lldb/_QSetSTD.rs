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

/// `QSetSTDIN:hex(path)`, `QSetSTDOUT:...` and `QSetSTDERR:...`.
#[derive(PartialEq, Debug)]
pub struct QSetSTD {
    pub fd: i32,
    pub path: PathBuf,
}

impl ParseCommand for QSetSTD {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let (fd, path) = if let Some(path) = bytes.strip_prefix(b"IN:") {
            (0, path)
        } else if let Some(path) = bytes.strip_prefix(b"OUT:") {
            (1, path)
        } else if let Some(path) = bytes.strip_prefix(b"ERR:") {
            (2, path)
        } else {
            return None;
        };
        Some(QSetSTD {
            fd,
            path: PathBuf::from(OsString::from_vec(decode_hex_string(path).ok()?)),
        })
    }
}
