/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;
use rstub_target::Protection;

use crate::commands::*;
use crate::hex::*;

/// `_Msize,permissions`: allocate memory in the target.
#[derive(PartialEq, Debug)]
pub struct _M {
    pub size: usize,
    pub protection: Protection,
}

impl ParseCommand for _M {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut iter = bytes.splitn(2, |c| *c == b',');
        let size = iter.next().and_then(|s| decode_hex(s).ok())?;
        let perms = iter.next().and_then(|p| std::str::from_utf8(p).ok())?;
        if perms.is_empty() || !perms.chars().all(|c| matches!(c, 'r' | 'w' | 'x')) {
            return None;
        }
        Some(_M {
            size,
            protection: Protection::from_rwx(perms),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocate() {
        assert_eq!(
            _M::parse(BytesMut::from("1000,rx")),
            Some(_M {
                size: 0x1000,
                protection: Protection::READ | Protection::EXECUTE,
            })
        );
        assert_eq!(_M::parse(BytesMut::from("1000,q")), None);
    }
}
