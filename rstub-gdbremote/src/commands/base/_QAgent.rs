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
pub struct QAgent {
    pub enable: bool,
}

impl ParseCommand for QAgent {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let value: u32 = decode_hex(&bytes).ok()?;
        match value {
            0 => Some(QAgent { enable: false }),
            1 => Some(QAgent { enable: true }),
            _ => None,
        }
    }
}
