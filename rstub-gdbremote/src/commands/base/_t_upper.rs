/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `T<thread-id>`: is the thread alive?
#[derive(PartialEq, Debug)]
pub struct T {
    pub thread: ThreadId,
}

impl ParseCommand for T {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(T {
            thread: ThreadId::decode(&bytes)?,
        })
    }
}
