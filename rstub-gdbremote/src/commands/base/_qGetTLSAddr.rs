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

/// `qGetTLSAddr:thread-id,offset,lm`
#[derive(PartialEq, Debug)]
pub struct qGetTLSAddr {
    pub thread: ThreadId,
    pub offset: u64,
    pub link_map: u64,
}

impl ParseCommand for qGetTLSAddr {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes[..].split(|c| *c == b',');
        let thread = iter.next().and_then(ThreadId::decode)?;
        let offset = iter.next().and_then(|x| decode_hex(x).ok())?;
        let link_map = iter.next().and_then(|x| decode_hex(x).ok())?;
        Some(qGetTLSAddr {
            thread,
            offset,
            link_map,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn thread_offset_and_link_map() {
        assert_eq!(
            qGetTLSAddr::parse(BytesMut::from("p10.11,8,7ffff7ffe190")),
            Some(qGetTLSAddr {
                thread: ThreadId::pid_tid(0x10, 0x11),
                offset: 8,
                link_map: 0x7ffff7ffe190,
            })
        );
        assert_eq!(qGetTLSAddr::parse(BytesMut::from("11,8")), None);
    }
}
