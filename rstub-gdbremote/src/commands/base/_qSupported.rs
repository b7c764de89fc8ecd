/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;
use crate::response::*;

/// One `qSupported` feature, as sent by either side.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Feature {
    /// `name+`
    Supported(String),
    /// `name-`
    Unsupported(String),
    /// `name?`
    Maybe(String),
    /// `name=value`
    Value(String, String),
}

impl Feature {
    pub fn supported(name: &str) -> Self {
        Feature::Supported(name.to_owned())
    }

    pub fn value(name: &str, value: impl ToString) -> Self {
        Feature::Value(name.to_owned(), value.to_string())
    }

    pub fn name(&self) -> &str {
        match self {
            Feature::Supported(n)
            | Feature::Unsupported(n)
            | Feature::Maybe(n)
            | Feature::Value(n, _) => n,
        }
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        let s = std::str::from_utf8(bytes).ok()?;
        if let Some((name, value)) = s.split_once('=') {
            return Some(Feature::Value(name.to_owned(), value.to_owned()));
        }
        let (name, last) = s.split_at(s.len().checked_sub(1)?);
        match last {
            "+" => Some(Feature::Supported(name.to_owned())),
            "-" => Some(Feature::Unsupported(name.to_owned())),
            "?" => Some(Feature::Maybe(name.to_owned())),
            // Some clients send bare names; treat as supported.
            _ => Some(Feature::Supported(s.to_owned())),
        }
    }
}

impl WriteResponse for Feature {
    fn write_response(&self, f: &mut ResponseWriter) {
        match self {
            Feature::Supported(n) => {
                f.put_str(n);
                f.put_str("+");
            }
            Feature::Unsupported(n) => {
                f.put_str(n);
                f.put_str("-");
            }
            Feature::Maybe(n) => {
                f.put_str(n);
                f.put_str("?");
            }
            Feature::Value(n, v) => {
                f.put_str(n);
                f.put_str("=");
                f.put_str(v);
            }
        }
    }
}

#[derive(PartialEq, Debug)]
pub struct qSupported {
    pub features: Vec<Feature>,
}

impl ParseCommand for qSupported {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let features = match bytes.strip_prefix(b":") {
            Some(list) => list
                .split(|c| *c == b';')
                .filter(|f| !f.is_empty())
                .map(Feature::decode)
                .collect::<Option<Vec<_>>>()?,
            None if bytes.is_empty() => Vec::new(),
            None => return None,
        };
        Some(qSupported { features })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gdb_features() {
        let cmd = qSupported::parse(BytesMut::from(
            ":multiprocess+;swbreak+;xmlRegisters=i386;vContSupported-;fork-events?",
        ))
        .unwrap();
        assert_eq!(
            cmd.features,
            vec![
                Feature::supported("multiprocess"),
                Feature::supported("swbreak"),
                Feature::value("xmlRegisters", "i386"),
                Feature::Unsupported("vContSupported".into()),
                Feature::Maybe("fork-events".into()),
            ]
        );
        assert_eq!(qSupported::parse(BytesMut::new()).unwrap().features, vec![]);
    }
}
