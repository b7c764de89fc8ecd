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

/// `Csig[;addr]`
#[derive(PartialEq, Debug)]
pub struct C {
    pub signal: i32,
    pub addr: Option<u64>,
}

impl ParseCommand for C {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes.splitn(2, |c| *c == b';');
        let signal = iter.next().and_then(|s| decode_hex(s).ok())?;
        let addr = match iter.next() {
            Some(addr) => Some(decode_hex(addr).ok()?),
            None => None,
        };
        Some(C { signal, addr })
    }
}
