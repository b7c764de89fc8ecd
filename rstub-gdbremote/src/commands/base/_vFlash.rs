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
pub enum vFlash {
    Erase { addr: u64, length: usize },
    Write { addr: u64, data: Vec<u8> },
    Done,
}

impl ParseCommand for vFlash {
    fn parse(bytes: BytesMut) -> Option<Self> {
        if let Some(args) = bytes.strip_prefix(b"Erase:") {
            let (addr, length) = decode_addr_len(args)?;
            Some(vFlash::Erase { addr, length })
        } else if let Some(args) = bytes.strip_prefix(b"Write:") {
            let pos = args.iter().position(|c| *c == b':')?;
            let addr = decode_hex(&args[..pos]).ok()?;
            let data = decode_binary_string(&args[pos + 1..]).ok()?;
            Some(vFlash::Write { addr, data })
        } else if &bytes[..] == b"Done" {
            Some(vFlash::Done)
        } else {
            None
        }
    }
}
