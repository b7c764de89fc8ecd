/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `R XX`: restart the program; the argument is ignored.
#[derive(PartialEq, Debug)]
pub struct R {}

impl ParseCommand for R {
    fn parse(_bytes: BytesMut) -> Option<Self> {
        Some(R {})
    }
}
