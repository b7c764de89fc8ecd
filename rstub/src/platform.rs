/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The `platform` run mode. Always keep-alive, always the LLDB dialect.

use std::time::Duration;

use rstub_gdbremote::CompatMode;
use rstub_gdbremote::PlatformSession;
use rstub_gdbremote::ReceiveMode;
use rstub_gdbremote::Session;
use rstub_util::commandline::PlatformArguments;

use crate::endpoint::Endpoint;

const RETRY_DELAY: Duration = Duration::from_secs(1);

pub async fn run(args: PlatformArguments) -> anyhow::Result<()> {
    let log = args.log.init_tracing()?;
    let exe = std::env::current_exe()?;
    let new_delegate = || PlatformSession::new(exe.clone(), Vec::new()).with_log_control(log.clone());

    let endpoint = Endpoint::new(&args.address, args.reverse_connect, args.named_pipe.as_deref())
        .await?;
    eprintln!("Listening on port {}", endpoint.port()?);

    let mut delegate = new_delegate();
    loop {
        let stream = match endpoint.connection().await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!("No platform connection: {:#}", err);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };
        let session = Session::with_mode(delegate, Some(CompatMode::Lldb));
        delegate = match rstub_gdbremote::serve(stream, session, ReceiveMode::Raw).await {
            Ok(session) => session.into_delegate(),
            Err(err) => {
                tracing::warn!("Platform connection failed: {}", err);
                new_delegate()
            }
        };
    }
}
