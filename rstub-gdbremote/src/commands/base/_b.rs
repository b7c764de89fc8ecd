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

/// `b<baud>`
#[derive(PartialEq, Debug)]
pub struct b {
    pub baud: u32,
}

impl ParseCommand for b {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(b {
            baud: decode_hex(&bytes).ok()?,
        })
    }
}
