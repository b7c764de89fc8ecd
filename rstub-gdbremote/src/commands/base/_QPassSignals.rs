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
pub struct QPassSignals {
    pub signals: Vec<i32>,
}

impl ParseCommand for QPassSignals {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let signals = bytes[..]
            .split(|c| *c == b';')
            .filter(|sig| !sig.is_empty())
            .map(|sig| decode_hex(sig).ok())
            .collect::<Option<Vec<i32>>>()?;
        Some(QPassSignals { signals })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pass_signals() {
        assert_eq!(
            QPassSignals::parse(BytesMut::from("e;10;14;")),
            Some(QPassSignals {
                signals: vec![0xe, 0x10, 0x14]
            })
        );
        assert_eq!(
            QPassSignals::parse(BytesMut::from("")),
            Some(QPassSignals { signals: vec![] })
        );
        assert_eq!(QPassSignals::parse(BytesMut::from("e;zz")), None);
    }
}
