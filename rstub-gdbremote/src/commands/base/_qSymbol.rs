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

/// `qSymbol::` offers symbol lookups; `qSymbol:value:name` answers one.
#[derive(PartialEq, Debug)]
pub struct qSymbol {
    pub value: Option<u64>,
    pub name: Option<String>,
}

impl ParseCommand for qSymbol {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let pos = bytes.iter().position(|c| *c == b':')?;
        let (value, name) = (&bytes[..pos], &bytes[pos + 1..]);
        let value = if value.is_empty() {
            None
        } else {
            Some(decode_hex(value).ok()?)
        };
        let name = if name.is_empty() {
            None
        } else {
            Some(decode_hex_str(name).ok()?)
        };
        Some(qSymbol { value, name })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offer_and_answer() {
        assert_eq!(
            qSymbol::parse(BytesMut::from(":")),
            Some(qSymbol {
                value: None,
                name: None
            })
        );
        assert_eq!(
            qSymbol::parse(BytesMut::from("1000:6d61696e")),
            Some(qSymbol {
                value: Some(0x1000),
                name: Some("main".into())
            })
        );
    }
}
