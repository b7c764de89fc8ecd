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

/// `Pn...=r...`
#[derive(PartialEq, Debug)]
pub struct P {
    pub reg: usize,
    pub val: Vec<u8>,
    pub thread: Option<ThreadId>,
}

impl ParseCommand for P {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let (body, thread) = split_thread_suffix(&bytes)?;
        let pos = body.iter().position(|c| *c == b'=')?;
        let reg = decode_hex(&body[..pos]).ok()?;
        let val = decode_hex_string(&body[pos + 1..]).ok()?;
        Some(P { reg, val, thread })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_write_with_suffix() {
        assert_eq!(
            P::parse(BytesMut::from("10=efbe0000;thread:4d2;")),
            Some(P {
                reg: 0x10,
                val: vec![0xef, 0xbe, 0, 0],
                thread: Some(ThreadId::tid(0x4d2)),
            })
        );
        assert_eq!(P::parse(BytesMut::from("10")), None);
    }
}
