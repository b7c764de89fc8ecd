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
pub struct p {
    pub reg: usize,
    pub thread: Option<ThreadId>,
}

impl ParseCommand for p {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let (reg, thread) = split_thread_suffix(&bytes)?;
        Some(p {
            reg: decode_hex(reg).ok()?,
            thread,
        })
    }
}
