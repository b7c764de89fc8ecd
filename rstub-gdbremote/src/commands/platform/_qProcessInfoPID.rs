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

/// `qProcessInfoPID:<decimal pid>`
#[derive(PartialEq, Debug)]
pub struct qProcessInfoPID {
    pub pid: Pid,
}

impl ParseCommand for qProcessInfoPID {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(qProcessInfoPID {
            pid: Pid::from_raw(decode_dec(&bytes).ok()?),
        })
    }
}
