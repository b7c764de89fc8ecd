/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `QAllow:op:0|1;...`, enabling or disabling classes of operations.
#[derive(PartialEq, Debug)]
pub struct QAllow {
    pub operations: Vec<(String, bool)>,
}

impl ParseCommand for QAllow {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let operations = decode_key_values(&bytes)?
            .into_iter()
            .map(|(op, v)| match v.as_str() {
                "0" => Some((op, false)),
                "1" => Some((op, true)),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some(QAllow { operations })
    }
}
