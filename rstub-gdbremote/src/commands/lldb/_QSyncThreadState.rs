/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;
use rstub_target::Pid;

use crate::commands::*;
use crate::hex::*;

#[derive(PartialEq, Debug)]
pub struct QSyncThreadState {
    pub tid: Pid,
}

impl ParseCommand for QSyncThreadState {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let bytes = bytes.strip_suffix(b";").unwrap_or(&bytes[..]);
        Some(QSyncThreadState {
            tid: Pid::from_raw(decode_hex(bytes).ok()?),
        })
    }
}
