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

/// `taddr:PP,MM`: search backwards from `addr` for a 32-bit pattern.
#[derive(PartialEq, Debug)]
pub struct t {
    pub addr: u64,
    pub pattern: u32,
    pub mask: u32,
}

impl ParseCommand for t {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let pos = bytes.iter().position(|c| *c == b':')?;
        let addr = decode_hex(&bytes[..pos]).ok()?;
        let (pattern, mask) = decode_addr_len(&bytes[pos + 1..])?;
        Some(t {
            addr,
            pattern: u32::try_from(pattern).ok()?,
            mask: u32::try_from(mask).ok()?,
        })
    }
}
