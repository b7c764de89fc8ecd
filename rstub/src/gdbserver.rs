/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The `gdbserver` run mode.

use std::time::Duration;

use anyhow::Context;
use rstub_gdbremote::CompatMode;
use rstub_gdbremote::DebugSession;
use rstub_gdbremote::ReceiveMode;
use rstub_gdbremote::Session;
use rstub_gdbremote::commands::AttachWait;
use rstub_gdbremote::commands::ProcessQuery;
use rstub_gdbremote::host;
use rstub_target::Pid;
use rstub_target::ptrace::PtraceSpawner;
use rstub_util::commandline::GdbServerArguments;

use crate::endpoint::Endpoint;

const RETRY_DELAY: Duration = Duration::from_secs(1);

pub async fn run(args: GdbServerArguments) -> anyhow::Result<()> {
    let log = args.log.init_tracing()?;

    if args.list_processes {
        return list_processes();
    }

    let mut delegate = DebugSession::new(Box::new(PtraceSpawner)).with_log_control(log);
    let launch = delegate.launch_info_mut();
    for (key, value) in &args.set_env {
        launch.env.insert(key.clone(), Some(value.clone()));
    }
    for key in &args.unset_env {
        launch.env.insert(key.clone(), None);
    }
    launch.setsid = args.setsid;

    // Attaching by name may poll for a while.
    let delegate = {
        let args = args.clone();
        tokio::task::spawn_blocking(move || start_target(delegate, &args)).await??
    };

    let mode = args.gdb_compat.then_some(CompatMode::Gdb);
    let endpoint = Endpoint::new(&args.address, args.reverse_connect, args.named_pipe.as_deref())
        .await?;
    eprintln!("Listening on port {}", endpoint.port()?);

    let mut session = Session::with_mode(delegate, mode);
    loop {
        let stream = match endpoint.connection().await {
            Ok(stream) => stream,
            Err(err) if args.keep_alive => {
                tracing::warn!("No debugger connection: {:#}", err);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
            Err(err) => return Err(err),
        };
        session = rstub_gdbremote::serve(stream, session, ReceiveMode::Cooked).await?;
        if !args.keep_alive {
            break;
        }
        // Protocol state is per connection; the target is not.
        session = Session::with_mode(session.into_delegate(), mode);
    }
    Ok(())
}

fn start_target(
    mut delegate: DebugSession,
    args: &GdbServerArguments,
) -> anyhow::Result<DebugSession> {
    if let Some(target) = &args.attach {
        let stop = match target.parse::<i32>() {
            Ok(pid) => delegate.attach(Pid::from_raw(pid)),
            Err(_) => delegate.attach_by_name(target, AttachWait::No),
        };
        stop.with_context(|| format!("Failed to attach to {}", target))?;
    } else if let Some(program) = &args.program {
        delegate
            .launch(program, &args.program_args)
            .with_context(|| format!("Failed to launch {}", program.display()))?;
    }
    Ok(delegate)
}

fn list_processes() -> anyhow::Result<()> {
    let query = ProcessQuery {
        all_users: true,
        ..Default::default()
    };
    println!("{:<8} {:<8} {:<8} NAME", "PID", "PPID", "UID");
    for info in host::process_list(&query)? {
        let command = if info.arguments.is_empty() {
            info.name.clone()
        } else {
            info.arguments.join(" ")
        };
        println!(
            "{:<8} {:<8} {:<8} {}",
            info.pid, info.parent_pid, info.real_uid, command
        );
    }
    Ok(())
}
