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
pub struct QLaunchArch {
    pub arch: String,
}

impl ParseCommand for QLaunchArch {
    fn parse(bytes: BytesMut) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        Some(QLaunchArch {
            arch: String::from_utf8(bytes.to_vec()).ok()?,
        })
    }
}
