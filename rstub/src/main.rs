/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! rstub: a remote debug stub for GDB and LLDB.

mod endpoint;
mod gdbserver;
mod platform;
mod slave;

use clap::Parser;
use clap::Subcommand;
use rstub_util::commandline::GdbServerArguments;
use rstub_util::commandline::PlatformArguments;
use rstub_util::commandline::SlaveArguments;

/// A remote debug stub speaking the GDB and LLDB remote protocols.
#[derive(Debug, Parser)]
#[command(name = "rstub", version)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Debug one program, launched or attached to.
    #[command(name = "gdbserver", visible_alias = "g")]
    GdbServer(GdbServerArguments),

    /// Serve host queries and start debug servers on request.
    #[command(visible_alias = "p")]
    Platform(PlatformArguments),

    /// Debug server started by a platform server.
    #[command(visible_alias = "s")]
    Slave(SlaveArguments),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().mode {
        Mode::GdbServer(args) => gdbserver::run(args).await,
        Mode::Platform(args) => platform::run(args).await,
        Mode::Slave(args) => slave::run(args).await,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_aliases() {
        let cli = Cli::try_parse_from(["rstub", "g", ":1234", "/bin/true"]).unwrap();
        assert!(matches!(cli.mode, Mode::GdbServer(args) if args.address.port == 1234));

        let cli = Cli::try_parse_from(["rstub", "platform", "-N", "/tmp/pipe", "0"]).unwrap();
        assert!(matches!(cli.mode, Mode::Platform(args) if args.named_pipe.is_some()));

        let cli = Cli::try_parse_from(["rstub", "s", "--port", "7"]).unwrap();
        assert!(matches!(cli.mode, Mode::Slave(args) if args.port == 7));

        assert!(Cli::try_parse_from(["rstub", "bogus"]).is_err());
    }
}
