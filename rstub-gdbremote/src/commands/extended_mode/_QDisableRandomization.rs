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
pub struct QDisableRandomization {
    pub disable: bool,
}

impl ParseCommand for QDisableRandomization {
    fn parse(bytes: BytesMut) -> Option<Self> {
        match &bytes[..] {
            b"0" => Some(QDisableRandomization { disable: false }),
            b"1" => Some(QDisableRandomization { disable: true }),
            _ => None,
        }
    }
}
