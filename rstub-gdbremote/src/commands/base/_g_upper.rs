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
pub struct G {
    pub vals: Vec<u8>,
    pub thread: Option<ThreadId>,
}

impl ParseCommand for G {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let (vals, thread) = split_thread_suffix(&bytes)?;
        if vals.is_empty() {
            None
        } else {
            let vals = decode_hex_string(vals).ok()?;
            Some(G { vals, thread })
        }
    }
}
