/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `d`: toggle debug logging.
#[derive(PartialEq, Debug)]
pub struct d {}

impl ParseCommand for d {
    fn parse(bytes: BytesMut) -> Option<Self> {
        if bytes.is_empty() { Some(d {}) } else { None }
    }
}
