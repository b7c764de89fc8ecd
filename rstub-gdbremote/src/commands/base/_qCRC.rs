/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

#[derive(PartialEq, Debug)]
pub struct qCRC {
    pub addr: u64,
    pub length: usize,
}

impl ParseCommand for qCRC {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let (addr, length) = decode_addr_len(&bytes)?;
        Some(qCRC { addr, length })
    }
}
