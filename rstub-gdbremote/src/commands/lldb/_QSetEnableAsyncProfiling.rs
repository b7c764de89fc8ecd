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

/// `QSetEnableAsyncProfiling;enable:1;interval_usecs:1000000;scan_type:0xf;`
#[derive(PartialEq, Debug)]
pub struct QSetEnableAsyncProfiling {
    pub enable: bool,
    pub interval_usecs: u64,
    pub scan_type: u32,
}

impl ParseCommand for QSetEnableAsyncProfiling {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut cmd = QSetEnableAsyncProfiling {
            enable: false,
            interval_usecs: 1_000_000,
            scan_type: 0,
        };
        for (key, value) in decode_key_values(&bytes)? {
            match key.as_str() {
                "enable" => cmd.enable = value == "1",
                "interval_usecs" => cmd.interval_usecs = decode_dec(value.as_bytes()).ok()?,
                "scan_type" => {
                    let value = value.strip_prefix("0x").unwrap_or(&value);
                    cmd.scan_type = decode_hex(value.as_bytes()).ok()?;
                }
                _ => {}
            }
        }
        Some(cmd)
    }
}
