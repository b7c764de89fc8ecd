/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `QSetLogging:bitmask=LOG_ALL|LOG_RNB_PACKETS;[mode=asl;]`
#[derive(PartialEq, Debug, Default, Clone)]
pub struct QSetLogging {
    /// Names in the `bitmask` key, e.g. `LOG_RNB_PACKETS`.
    pub flags: Vec<String>,
    /// Every other key.
    pub options: Vec<(String, String)>,
}

impl QSetLogging {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Any packet-level (`LOG_RNB_*`) category turned on.
    pub fn wants_packets(&self) -> bool {
        self.flags
            .iter()
            .any(|f| f.starts_with("LOG_RNB_") && f != "LOG_RNB_NONE")
    }

    /// Any debugger-level category turned on.
    pub fn wants_debug(&self) -> bool {
        self.flags
            .iter()
            .any(|f| !f.starts_with("LOG_RNB_") && f != "LOG_NONE")
    }
}

impl ParseCommand for QSetLogging {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut settings = QSetLogging::default();
        for kv in bytes[..].split(|c| *c == b';').filter(|kv| !kv.is_empty()) {
            let kv = std::str::from_utf8(kv).ok()?;
            let (key, value) = kv.split_once('=')?;
            if key == "bitmask" {
                settings.flags = value
                    .split('|')
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .collect();
            } else {
                settings.options.push((key.to_owned(), value.to_owned()));
            }
        }
        Some(settings)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bitmask_and_options() {
        let settings =
            QSetLogging::parse(BytesMut::from("bitmask=LOG_ALL|LOG_RNB_PACKETS;mode=asl;"))
                .unwrap();
        assert!(settings.has_flag("LOG_RNB_PACKETS"));
        assert!(settings.has_flag("LOG_ALL"));
        assert!(!settings.has_flag("LOG_BREAKPOINTS"));
        assert!(settings.wants_packets());
        assert!(settings.wants_debug());
        assert_eq!(settings.options, vec![("mode".into(), "asl".into())]);
        assert_eq!(QSetLogging::parse(BytesMut::from("bitmask")), None);

        let quiet = QSetLogging::parse(BytesMut::from("bitmask=LOG_NONE|LOG_RNB_NONE;")).unwrap();
        assert!(!quiet.wants_packets());
        assert!(!quiet.wants_debug());
    }
}
