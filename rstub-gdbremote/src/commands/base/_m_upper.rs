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

/// `Maddr,length:XX...`
#[derive(PartialEq, Debug)]
pub struct M {
    pub addr: u64,
    pub length: usize,
    pub vals: Vec<u8>,
}

impl ParseCommand for M {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let pos = bytes.iter().position(|c| *c == b':')?;
        let (addr, length) = decode_addr_len(&bytes[..pos])?;
        let vals = decode_hex_string(&bytes[pos + 1..]).ok()?;
        if vals.len() != length {
            return None;
        }
        Some(M { addr, length, vals })
    }
}
