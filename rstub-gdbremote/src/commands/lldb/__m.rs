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

/// `_maddr`: deallocate memory returned by `_M`.
#[derive(PartialEq, Debug)]
pub struct _m {
    pub addr: u64,
}

impl ParseCommand for _m {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(_m {
            addr: decode_hex(&bytes).ok()?,
        })
    }
}
