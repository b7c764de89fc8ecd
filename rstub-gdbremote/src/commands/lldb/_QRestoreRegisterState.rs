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

/// `QRestoreRegisterState:<save-id>[;thread:<tid>;]`
#[derive(PartialEq, Debug)]
pub struct QRestoreRegisterState {
    pub id: u64,
    pub thread: Option<ThreadId>,
}

impl ParseCommand for QRestoreRegisterState {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let (id, thread) = split_thread_suffix(&bytes)?;
        Some(QRestoreRegisterState {
            id: decode_dec(id).ok()?,
            thread,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn save_id_is_decimal() {
        assert_eq!(
            QRestoreRegisterState::parse(BytesMut::from("12;thread:1f;")),
            Some(QRestoreRegisterState {
                id: 12,
                thread: Some(ThreadId::tid(0x1f)),
            })
        );
    }
}
