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

/// `qPlatform_mkdir:mode,hex(path)`
#[derive(PartialEq, Debug)]
pub struct qPlatform_mkdir {
    pub mode: u32,
    pub path: PathBuf,
}

impl ParseCommand for qPlatform_mkdir {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes.splitn(2, |c| *c == b',');
        let mode = iter.next().and_then(|m| decode_hex(m).ok())?;
        let path = iter.next().and_then(|p| decode_hex_string(p).ok())?;
        Some(qPlatform_mkdir {
            mode,
            path: PathBuf::from(OsString::from_vec(path)),
        })
    }
}
