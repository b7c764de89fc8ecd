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

/// `qGroupName:<decimal id>`
#[derive(PartialEq, Debug)]
pub struct qGroupName {
    pub id: u32,
}

impl ParseCommand for qGroupName {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(qGroupName {
            id: decode_dec(&bytes).ok()?,
        })
    }
}
