/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The `slave` run mode: a one-connection debug server started by a
//! platform server.

use std::io::Write;

use rstub_gdbremote::DebugSession;
use rstub_gdbremote::ReceiveMode;
use rstub_gdbremote::Session;
use rstub_target::ptrace::PtraceSpawner;
use rstub_util::commandline::SlaveArguments;

pub async fn run(args: SlaveArguments) -> anyhow::Result<()> {
    let log = args.log.init_tracing()?;

    // Outlive the platform connection that started us.
    if let Err(err) = nix::unistd::setsid() {
        tracing::debug!("setsid: {}", err);
    }

    let listener = rstub_gdbremote::listen(&args.listen, args.port)?;
    let port = listener.local_addr()?.port();
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{} {}", port, std::process::id())?;
    stdout.flush()?;

    let stream = rstub_gdbremote::accept(&listener).await?;
    let delegate = DebugSession::new(Box::new(PtraceSpawner)).with_log_control(log);
    rstub_gdbremote::serve(stream, Session::new(delegate), ReceiveMode::Cooked).await?;
    Ok(())
}
