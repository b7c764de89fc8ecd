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

/// `qMemoryRegionInfo:addr`. The bare form asks whether the packet is
/// supported at all.
#[derive(PartialEq, Debug)]
pub struct qMemoryRegionInfo {
    pub addr: Option<u64>,
}

impl ParseCommand for qMemoryRegionInfo {
    fn parse(bytes: BytesMut) -> Option<Self> {
        if bytes.is_empty() {
            Some(qMemoryRegionInfo { addr: None })
        } else {
            Some(qMemoryRegionInfo {
                addr: Some(decode_hex(bytes.strip_prefix(b":")?).ok()?),
            })
        }
    }
}
