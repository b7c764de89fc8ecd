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
pub struct k {}

impl ParseCommand for k {
    fn parse(bytes: BytesMut) -> Option<Self> {
        if bytes.is_empty() { Some(k {}) } else { None }
    }
}
