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

/// `qRcmd,command`, the command hex encoded.
#[derive(PartialEq, Debug)]
pub struct qRcmd {
    pub cmd: String,
}

impl ParseCommand for qRcmd {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(qRcmd {
            cmd: decode_hex_str(&bytes).ok()?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn monitor_command() {
        assert_eq!(
            qRcmd::parse(BytesMut::from("68656c70")),
            Some(qRcmd {
                cmd: "help".into()
            })
        );
        assert_eq!(qRcmd::parse(BytesMut::from("6")), None);
    }
}
