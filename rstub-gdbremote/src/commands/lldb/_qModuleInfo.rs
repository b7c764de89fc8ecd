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

/// `qModuleInfo:hex(path);hex(triple)`
#[derive(PartialEq, Debug)]
pub struct qModuleInfo {
    pub path: PathBuf,
    pub triple: String,
}

impl ParseCommand for qModuleInfo {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes.splitn(2, |c| *c == b';');
        let path = iter.next().and_then(|p| decode_hex_string(p).ok())?;
        let triple = iter.next().and_then(|t| decode_hex_str(t).ok())?;
        Some(qModuleInfo {
            path: PathBuf::from(OsString::from_vec(path)),
            triple,
        })
    }
}
