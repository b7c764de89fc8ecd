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

/// `qXfer:object:read:annex:offset,length` or
/// `qXfer:object:write:annex:offset:data`.
#[derive(PartialEq, Debug)]
pub enum qXfer {
    Read {
        object: String,
        annex: String,
        offset: u64,
        length: usize,
    },
    Write {
        object: String,
        annex: String,
        offset: u64,
        data: Vec<u8>,
    },
}

impl ParseCommand for qXfer {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes.splitn(4, |c| *c == b':');
        let object = String::from_utf8(iter.next()?.to_vec()).ok()?;
        let op = iter.next()?;
        let annex = String::from_utf8(iter.next()?.to_vec()).ok()?;
        let rest = iter.next()?;
        match op {
            b"read" => {
                let (offset, length) = decode_addr_len(rest)?;
                Some(qXfer::Read {
                    object,
                    annex,
                    offset,
                    length,
                })
            }
            b"write" => {
                let pos = rest.iter().position(|c| *c == b':')?;
                let offset = decode_hex(&rest[..pos]).ok()?;
                let data = decode_binary_string(&rest[pos + 1..]).ok()?;
                Some(qXfer::Write {
                    object,
                    annex,
                    offset,
                    data,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_and_write() {
        assert_eq!(
            qXfer::parse(BytesMut::from("features:read:target.xml:0,fff")),
            Some(qXfer::Read {
                object: "features".into(),
                annex: "target.xml".into(),
                offset: 0,
                length: 0xfff,
            })
        );
        assert_eq!(
            qXfer::parse(BytesMut::from("auxv:read::10,20")),
            Some(qXfer::Read {
                object: "auxv".into(),
                annex: String::new(),
                offset: 0x10,
                length: 0x20,
            })
        );
        assert_eq!(
            qXfer::parse(BytesMut::from(&b"siginfo:write::0:a}]:"[..])),
            Some(qXfer::Write {
                object: "siginfo".into(),
                annex: String::new(),
                offset: 0,
                data: b"a}:".to_vec(),
            })
        );
        assert_eq!(qXfer::parse(BytesMut::from("auxv:erase::0,1")), None);
    }
}
