/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `jThreadsInfo[:{options}]`. Options are accepted and ignored.
#[derive(PartialEq, Debug)]
pub struct jThreadsInfo;

impl ParseCommand for jThreadsInfo {
    fn parse(bytes: BytesMut) -> Option<Self> {
        if bytes.is_empty() || bytes.starts_with(b":") {
            Some(jThreadsInfo)
        } else {
            None
        }
    }
}
