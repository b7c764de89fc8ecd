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

/// `Xaddr,length:XX...`, the data in escaped binary.
#[derive(PartialEq, Debug)]
pub struct X {
    pub addr: u64,
    pub length: usize,
    pub vals: Vec<u8>,
}

impl ParseCommand for X {
    fn parse(bytes: BytesMut) -> Option<Self> {
        // The data itself may contain ':' or ','.
        let pos = bytes.iter().position(|c| *c == b':')?;
        let (addr, length) = decode_addr_len(&bytes[..pos])?;
        let vals = decode_binary_string(&bytes[pos + 1..]).ok()?;
        Some(X { addr, length, vals })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn can_parse_X_special() {
        assert_eq!(
            X::parse(BytesMut::from(&b"7fffffffdbac,4:\x8a\x02\0\0"[..])),
            Some(X {
                addr: 0x7fffffffdbac,
                length: 4,
                vals: vec![0x8a, 0x02, 0, 0],
            })
        );
        assert_eq!(
            X::parse(BytesMut::from(&b"1000,3:,:}\x03"[..])),
            Some(X {
                addr: 0x1000,
                length: 3,
                vals: vec![b',', b':', b'#'],
            })
        );
        // Zero length: a support check.
        assert_eq!(
            X::parse(BytesMut::from(&b"1000,0:"[..])),
            Some(X {
                addr: 0x1000,
                length: 0,
                vals: vec![],
            })
        );
    }
}
