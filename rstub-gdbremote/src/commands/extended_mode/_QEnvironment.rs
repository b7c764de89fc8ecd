/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `QEnvironment:KEY=VALUE`
#[derive(PartialEq, Debug)]
pub struct QEnvironment {
    pub key: String,
    pub value: String,
}

impl ParseCommand for QEnvironment {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let s = std::str::from_utf8(&bytes).ok()?;
        let (key, value) = s.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        Some(QEnvironment {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn value_may_contain_equals() {
        assert_eq!(
            QEnvironment::parse(BytesMut::from("A=b=c")),
            Some(QEnvironment {
                key: "A".into(),
                value: "b=c".into()
            })
        );
        assert_eq!(QEnvironment::parse(BytesMut::from("=c")), None);
        assert_eq!(QEnvironment::parse(BytesMut::from("A")), None);
    }
}
