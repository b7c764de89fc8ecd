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

/// `qUserName:<decimal id>`
#[derive(PartialEq, Debug)]
pub struct qUserName {
    pub id: u32,
}

impl ParseCommand for qUserName {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(qUserName {
            id: decode_dec(&bytes).ok()?,
        })
    }
}
