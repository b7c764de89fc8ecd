/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::Path;

use rstub_util::commandline::HostPort;
use tokio::net::TcpListener;
use tokio::net::TcpStream;

/// Where debugger connections come from.
pub enum Endpoint {
    Listen(TcpListener),
    /// Dial out to a listening debugger instead.
    Reverse(HostPort),
}

impl Endpoint {
    /// Binds the listening socket, reporting its port through `named_pipe`.
    pub async fn new(
        address: &HostPort,
        reverse: bool,
        named_pipe: Option<&Path>,
    ) -> anyhow::Result<Self> {
        if reverse {
            return Ok(Endpoint::Reverse(address.clone()));
        }
        let listener = rstub_gdbremote::listen(&address.host, address.port)?;
        if let Some(pipe) = named_pipe {
            rstub_gdbremote::report_port(pipe, listener.local_addr()?.port()).await?;
        }
        Ok(Endpoint::Listen(listener))
    }

    pub fn port(&self) -> anyhow::Result<u16> {
        match self {
            Endpoint::Listen(listener) => Ok(listener.local_addr()?.port()),
            Endpoint::Reverse(address) => Ok(address.port),
        }
    }

    /// The next connection.
    pub async fn connection(&self) -> anyhow::Result<TcpStream> {
        Ok(match self {
            Endpoint::Listen(listener) => rstub_gdbremote::accept(listener).await?,
            Endpoint::Reverse(address) => {
                rstub_gdbremote::connect(&address.host, address.port).await?
            }
        })
    }
}
