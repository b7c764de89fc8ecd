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

#[derive(PartialEq, Debug)]
pub struct qAttached {
    pub pid: Option<Pid>,
}

impl ParseCommand for qAttached {
    fn parse(bytes: BytesMut) -> Option<Self> {
        if bytes.is_empty() {
            Some(qAttached { pid: None })
        } else {
            let pid = decode_hex(bytes.strip_prefix(b":")?).ok()?;
            Some(qAttached {
                pid: Some(Pid::from_raw(pid)),
            })
        }
    }
}
