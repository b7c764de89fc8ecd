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

/// `qSearch:memory:address;length;search-pattern`, the pattern in binary.
#[derive(PartialEq, Debug)]
pub struct qSearch {
    pub addr: u64,
    pub length: usize,
    pub pattern: Vec<u8>,
}

impl ParseCommand for qSearch {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes.splitn(3, |c| *c == b';');
        let addr = iter.next().and_then(|x| decode_hex(x).ok())?;
        let length = iter.next().and_then(|x| decode_hex(x).ok())?;
        let pattern = iter.next().and_then(|x| decode_binary_string(x).ok())?;
        Some(qSearch {
            addr,
            length,
            pattern,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pattern_may_contain_separators() {
        assert_eq!(
            qSearch::parse(BytesMut::from(&b"1000;100;a;b}]"[..])),
            Some(qSearch {
                addr: 0x1000,
                length: 0x100,
                pattern: b"a;b}".to_vec(),
            })
        );
    }
}
