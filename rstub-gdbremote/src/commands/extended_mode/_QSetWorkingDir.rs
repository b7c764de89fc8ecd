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

#[derive(PartialEq, Debug)]
pub struct QSetWorkingDir {
    pub dir: PathBuf,
}

impl ParseCommand for QSetWorkingDir {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let dir = decode_hex_string(&bytes).ok()?;
        Some(QSetWorkingDir {
            dir: PathBuf::from(OsString::from_vec(dir)),
        })
    }
}
