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
pub struct qRegisterInfo {
    pub reg: usize,
}

impl ParseCommand for qRegisterInfo {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(qRegisterInfo {
            reg: decode_hex(&bytes).ok()?,
        })
    }
}
