/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `Qbtrace:bts`, `Qbtrace:pt` or `Qbtrace:off`.
#[derive(PartialEq, Debug)]
pub struct Qbtrace {
    pub mode: String,
}

impl ParseCommand for Qbtrace {
    fn parse(bytes: BytesMut) -> Option<Self> {
        match &bytes[..] {
            b"bts" | b"pt" | b"off" => Some(Qbtrace {
                mode: String::from_utf8(bytes.to_vec()).ok()?,
            }),
            _ => None,
        }
    }
}
