/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Arguments for each rstub run mode. The executable assembles these into
//! its subcommands.

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use chrono::Local;
use clap::Args;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::LogControl;

/// Parses an environment variable command-line argument.
pub fn parse_env(s: &str) -> anyhow::Result<(String, String)> {
    let mut iter = s.splitn(2, '=');

    let key = iter
        .next()
        .filter(|k| !k.is_empty())
        .ok_or("Invalid KEY=VALUE: string is empty")
        .map(String::from)
        .map_err(anyhow::Error::msg)?;

    let value = match iter.next() {
        Some(value) => value.to_owned(),
        None => std::env::var(&key).map_err(anyhow::Error::msg)?,
    };

    Ok((key, value))
}

/// A `[HOST]:PORT` pair. An omitted host means `localhost`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses `[HOST]:PORT`, `HOST:PORT` or a bare `PORT`.
pub fn parse_address(s: &str) -> anyhow::Result<HostPort> {
    let (host, port) = match s.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => ("", s),
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = port
        .parse::<u16>()
        .map_err(|e| anyhow::anyhow!("invalid port in {:?}: {}", s, e))?;
    Ok(HostPort {
        host: if host.is_empty() {
            String::from("localhost")
        } else {
            host.to_owned()
        },
        port,
    })
}

/// Logging options shared by every run mode.
#[derive(Debug, Clone, Default, Args)]
pub struct LogArguments {
    /// Direct logging to a file. This can also be set with the RUST_LOG_FILE
    /// environment variable, but the CLI flag takes precedence.
    #[arg(long = "log-output", short = 'o', value_name = "PATH", env = "RUST_LOG_FILE")]
    pub log_output: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Trace every remote protocol packet.
    #[arg(long = "debug-remote", short = 'D')]
    pub debug_remote: bool,

    /// Disable colored output.
    #[arg(long = "no-colors", short = 'n')]
    pub no_colors: bool,
}

impl LogArguments {
    /// Installs the global subscriber. `RUST_LOG` overrides the default
    /// `warn` level.
    pub fn init_tracing(&self) -> anyhow::Result<LogControl> {
        let base = std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("warn"));
        let (control, filter) = LogControl::new(&base, self.debug, self.debug_remote)?;

        let guard = match self.log_output.as_deref().and_then(open_log_file) {
            Some((writer, guard)) => {
                self.install(filter, writer)?;
                Some(guard)
            }
            None => {
                self.install(filter, io::stderr)?;
                None
            }
        };

        Ok(control.keep_guard(guard))
    }

    fn install<W>(
        &self,
        filter: tracing_subscriber::reload::Layer<
            tracing_subscriber::EnvFilter,
            tracing_subscriber::Registry,
        >,
        writer: W,
    ) -> anyhow::Result<()>
    where
        W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
    {
        let fmt = tracing_subscriber::fmt::layer()
            .with_ansi(!self.no_colors && self.log_output.is_none())
            .with_writer(writer)
            .boxed();
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt)
            .try_init()?;
        Ok(())
    }
}

/// Opens `path` for logging. An existing file is left alone; a timestamp is
/// appended to the new file's name instead.
fn open_log_file(
    path: &Path,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let orig_filename = path.file_name()?.to_os_string();
    let mut filename = orig_filename.clone();

    for _ in 0..100 {
        if parent.join(&filename).exists() {
            filename = orig_filename.clone();
            filename.push(format!("{}", Local::now().format(".%Y%m%d.%H%M%S.%f")));
        } else {
            break;
        }
    }

    if parent.join(&filename).exists() {
        eprintln!(" [rstub] WARNING: could not open log file, falling back to stderr");
        return None;
    }

    let file_writer = tracing_appender::rolling::never(parent, &filename);
    let (file_writer, guard) = tracing_appender::non_blocking(file_writer);
    eprintln!(" [rstub] Logging to file at {:?}", parent.join(&filename));
    Some((file_writer, guard))
}

/// Options of the `gdbserver` run mode.
#[derive(Debug, Clone, Args)]
pub struct GdbServerArguments {
    #[command(flatten)]
    pub log: LogArguments,

    /// Attach to a running process, by pid or by name.
    #[arg(long, short = 'a', value_name = "PID|NAME")]
    pub attach: Option<String>,

    /// Keep serving new connections after the first one ends.
    #[arg(long = "keep-alive", short = 'k')]
    pub keep_alive: bool,

    /// Connect to the debugger at the address instead of listening.
    #[arg(long = "reverse-connect", short = 'R')]
    pub reverse_connect: bool,

    /// Sets an environment variable for the launched program. Can be used
    /// multiple times.
    #[arg(
        long = "set-env",
        short = 'e',
        value_name = "KEY=VALUE",
        value_parser = parse_env,
        num_args = 1
    )]
    pub set_env: Vec<(String, String)>,

    /// Removes an environment variable for the launched program. Can be used
    /// multiple times.
    #[arg(long = "unset-env", short = 'E', value_name = "KEY", num_args = 1)]
    pub unset_env: Vec<String>,

    /// Speak the GDB dialect only.
    #[arg(long = "gdb-compat", short = 'g')]
    pub gdb_compat: bool,

    /// Write the listening port, NUL terminated, to this file once bound.
    #[arg(long = "named-pipe", short = 'N', value_name = "PATH")]
    pub named_pipe: Option<PathBuf>,

    /// Print the processes that can be debugged and exit.
    #[arg(long = "list-processes", short = 'L')]
    pub list_processes: bool,

    /// Start the debugged program in its own session.
    #[arg(long, short = 'S')]
    pub setsid: bool,

    #[arg(value_name = "[HOST]:PORT", default_value = "localhost:12345", value_parser = parse_address)]
    pub address: HostPort,

    /// Path of the program to debug.
    #[arg(value_name = "PROGRAM")]
    pub program: Option<PathBuf>,

    /// Arguments to the program to debug.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub program_args: Vec<String>,
}

/// Options of the `platform` run mode.
#[derive(Debug, Clone, Args)]
pub struct PlatformArguments {
    #[command(flatten)]
    pub log: LogArguments,

    /// Connect to the debugger at the address instead of listening.
    #[arg(long = "reverse-connect", short = 'R')]
    pub reverse_connect: bool,

    /// Write the listening port, NUL terminated, to this file once bound.
    #[arg(long = "named-pipe", short = 'N', value_name = "PATH")]
    pub named_pipe: Option<PathBuf>,

    #[arg(value_name = "[HOST]:PORT", default_value = "localhost:12345", value_parser = parse_address)]
    pub address: HostPort,
}

/// Options of the `slave` run mode, started by a platform server.
#[derive(Debug, Clone, Args)]
pub struct SlaveArguments {
    #[command(flatten)]
    pub log: LogArguments,

    /// Host to listen on.
    #[arg(long, value_name = "HOST", default_value = "localhost")]
    pub listen: String,

    /// Port to listen on. 0 picks a free one.
    #[arg(long, value_name = "PORT", default_value_t = 0)]
    pub port: u16,
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: GdbServerArguments,
    }

    #[test]
    fn addresses() {
        assert_eq!(
            parse_address("localhost:1234").unwrap(),
            HostPort {
                host: "localhost".into(),
                port: 1234
            }
        );
        assert_eq!(parse_address(":99").unwrap().host, "localhost");
        assert_eq!(parse_address("4000").unwrap().port, 4000);
        assert_eq!(parse_address("[::1]:4000").unwrap().host, "::1");
        assert!(parse_address("host:notaport").is_err());
    }

    #[test]
    fn env_arguments() {
        assert_eq!(
            parse_env("A=b=c").unwrap(),
            (String::from("A"), String::from("b=c"))
        );
        assert!(parse_env("=x").is_err());
    }

    #[test]
    fn gdbserver_command_line() {
        let w = Wrapper::try_parse_from([
            "rstub", "-k", "-e", "FOO=1", "-E", "BAR", ":2345", "/bin/true", "--", "-x",
        ])
        .unwrap();
        assert!(w.args.keep_alive);
        assert_eq!(w.args.address.port, 2345);
        assert_eq!(w.args.set_env, vec![("FOO".into(), "1".into())]);
        assert_eq!(w.args.unset_env, vec![String::from("BAR")]);
        assert_eq!(w.args.program, Some(PathBuf::from("/bin/true")));
        assert_eq!(w.args.program_args, vec![String::from("-x")]);
    }

    #[test]
    fn slave_command_line() {
        #[derive(Parser)]
        struct Slave {
            #[command(flatten)]
            args: SlaveArguments,
        }
        let s = Slave::try_parse_from(["rstub", "--listen", "0.0.0.0", "--port", "0"]).unwrap();
        assert_eq!(s.args.listen, "0.0.0.0");
        assert_eq!(s.args.port, 0);
        let s = Slave::try_parse_from(["rstub"]).unwrap();
        assert_eq!(s.args.listen, "localhost");
    }
}
