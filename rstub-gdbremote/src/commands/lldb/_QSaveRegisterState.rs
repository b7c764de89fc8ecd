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
pub struct QSaveRegisterState {
    pub thread: Option<ThreadId>,
}

impl ParseCommand for QSaveRegisterState {
    fn parse(bytes: BytesMut) -> Option<Self> {
        match split_thread_suffix(&bytes)? {
            (b"", thread) => Some(QSaveRegisterState { thread }),
            _ => None,
        }
    }
}
