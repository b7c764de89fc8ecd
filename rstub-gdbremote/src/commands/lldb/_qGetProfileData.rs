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

/// `qGetProfileData[;scan_type:0x...]`
#[derive(PartialEq, Debug)]
pub struct qGetProfileData {
    pub scan_type: Option<u32>,
}

impl ParseCommand for qGetProfileData {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut scan_type = None;
        for (key, value) in decode_key_values(&bytes)? {
            if key == "scan_type" {
                let value = value.strip_prefix("0x").unwrap_or(&value);
                scan_type = Some(decode_hex(value.as_bytes()).ok()?);
            }
        }
        Some(qGetProfileData { scan_type })
    }
}
