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

#[derive(PartialEq, Debug)]
pub struct QProgramSignals {
    pub signals: Vec<i32>,
}

impl ParseCommand for QProgramSignals {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let signals = bytes[..]
            .split(|c| *c == b';')
            .filter(|sig| !sig.is_empty())
            .map(|sig| decode_hex(sig).ok())
            .collect::<Option<Vec<i32>>>()?;
        Some(QProgramSignals { signals })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn program_signals() {
        assert_eq!(
            QProgramSignals::parse(BytesMut::from("e;f;;1e")),
            Some(QProgramSignals {
                signals: vec![0xe, 0xf, 0x1e]
            })
        );
        assert_eq!(
            QProgramSignals::parse(BytesMut::new()),
            Some(QProgramSignals { signals: vec![] })
        );
        assert_eq!(QProgramSignals::parse(BytesMut::from("zz")), None);
    }
}
