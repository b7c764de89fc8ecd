/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;

/// `qLaunchGDBServer;host:<host>;port:<port>;`. A zero or missing port lets
/// the new server pick one.
#[derive(PartialEq, Debug)]
pub struct qLaunchGDBServer {
    pub host: Option<String>,
    pub port: u16,
}

impl ParseCommand for qLaunchGDBServer {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut cmd = qLaunchGDBServer { host: None, port: 0 };
        for (key, value) in decode_key_values(&bytes)? {
            match key.as_str() {
                "host" if !value.is_empty() => cmd.host = Some(value),
                "port" => cmd.port = value.parse().ok()?,
                _ => {}
            }
        }
        Some(cmd)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn host_and_port() {
        assert_eq!(
            qLaunchGDBServer::parse(BytesMut::from(";host:127.0.0.1;port:0;")),
            Some(qLaunchGDBServer {
                host: Some("127.0.0.1".into()),
                port: 0
            })
        );
        assert_eq!(
            qLaunchGDBServer::parse(BytesMut::new()),
            Some(qLaunchGDBServer {
                host: None,
                port: 0
            })
        );
    }
}
