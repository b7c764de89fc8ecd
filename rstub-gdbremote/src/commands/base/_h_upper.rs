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
pub struct H {
    pub op: ThreadOp,
    pub id: ThreadId,
}

impl ParseCommand for H {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let (ch, bytes) = bytes.split_first()?;
        let op = match *ch {
            b'c' => Some(ThreadOp::Continue),
            b'g' | b'G' | b'm' | b'M' => Some(ThreadOp::General),
            _ => None,
        }?;
        let id = ThreadId::decode(bytes)?;
        Some(H { op, id })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn select_threads() {
        assert_eq!(
            H::parse(BytesMut::from("gp1a.1b")),
            Some(H {
                op: ThreadOp::General,
                id: ThreadId::pid_tid(0x1a, 0x1b)
            })
        );
        assert_eq!(
            H::parse(BytesMut::from("c-1")),
            Some(H {
                op: ThreadOp::Continue,
                id: ThreadId::tid(-1)
            })
        );
        assert_eq!(H::parse(BytesMut::from("q0")), None);
    }
}
