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

/// `QEnvironmentHexEncoded:hex(KEY=VALUE)`
#[derive(PartialEq, Debug)]
pub struct QEnvironmentHexEncoded {
    pub key: String,
    pub value: String,
}

impl ParseCommand for QEnvironmentHexEncoded {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let decoded = decode_hex_str(&bytes).ok()?;
        let (key, value) = decoded.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        Some(QEnvironmentHexEncoded {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    }
}
