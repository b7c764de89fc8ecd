/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The delegate behind the `platform` run mode: host queries, remote files
//! and nested debug servers. It never debugs anything itself.

use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rstub_target::ErrorCode;
use rstub_target::Pid;
use rstub_target::ProcessInfo;
use rstub_util::LogControl;

use crate::SessionDelegate;
use crate::SessionState;
use crate::commands::Feature;
use crate::commands::OpenFlags;
use crate::commands::ProcessQuery;
use crate::commands::QSetLogging;
use crate::debug::module_info;
use crate::host;
use crate::host::HostIo;
use crate::types::FileStat;
use crate::types::HostInfo;
use crate::types::LaunchedServer;
use crate::types::ModuleInfo;
use crate::types::ProgramResult;
use crate::types::ServerVersion;

/// How long a freshly spawned debug server gets to report its port.
const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Session delegate for the `platform` run mode.
pub struct PlatformSession {
    files: HostIo,
    working_dir: Option<PathBuf>,
    /// Program started by `qLaunchGDBServer`, normally this executable.
    server_program: PathBuf,
    /// Arguments placed between the program and the `slave` options.
    server_args: Vec<String>,
    log: Option<LogControl>,
}

impl PlatformSession {
    /// Spawns nested debug servers with `program [args..] slave --listen
    /// <host> --port <port>`.
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        PlatformSession {
            files: HostIo::new(),
            working_dir: None,
            server_program: program,
            server_args: args,
            log: None,
        }
    }

    pub fn with_log_control(mut self, log: LogControl) -> Self {
        self.log = Some(log);
        self
    }

    fn spawn_server(&self, host: &str, port: u16) -> Result<LaunchedServer, ErrorCode> {
        let mut cmd = Command::new(&self.server_program);
        cmd.args(&self.server_args)
            .arg("slave")
            .arg("--listen")
            .arg(host)
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        tracing::info!("Starting debug server: {:?}", cmd);
        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().ok_or(ErrorCode::Unknown)?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut line = String::new();
            let read = BufReader::new(stdout).read_line(&mut line).map(|_| line);
            let _ = tx.send(read);
            // Reap the server once it is done.
            let _ = child.wait();
        });

        let line = match rx.recv_timeout(SERVER_STARTUP_TIMEOUT) {
            Ok(Ok(line)) => line,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                tracing::warn!("Debug server did not report its port");
                return Err(ErrorCode::Busy);
            }
        };
        let launched = parse_server_line(&line).ok_or_else(|| {
            tracing::warn!("Debug server reported {:?}", line);
            ErrorCode::Unknown
        })?;
        tracing::info!(
            "Debug server {} listening on port {}",
            launched.pid,
            launched.port
        );
        Ok(launched)
    }
}

/// Parses the `"<port> <pid>"` line a slave prints once it listens.
fn parse_server_line(line: &str) -> Option<LaunchedServer> {
    let mut words = line.split_whitespace();
    let port = words.next()?.parse().ok()?;
    let pid = words.next()?.parse().ok()?;
    Some(LaunchedServer {
        pid: Pid::from_raw(pid),
        port,
    })
}

impl SessionDelegate for PlatformSession {
    fn on_set_logging(
        &mut self,
        _state: &mut SessionState,
        settings: &QSetLogging,
    ) -> Result<(), ErrorCode> {
        let log = self.log.as_ref().ok_or(ErrorCode::Unsupported)?;
        log.configure(settings.wants_debug(), settings.wants_packets())
            .map_err(|_| ErrorCode::InvalidArgument)
    }

    fn on_query_supported(&mut self, _state: &mut SessionState) -> Result<Vec<Feature>, ErrorCode> {
        Ok(Vec::new())
    }

    fn on_query_server_version(
        &mut self,
        _state: &mut SessionState,
    ) -> Result<ServerVersion, ErrorCode> {
        Ok(ServerVersion::default())
    }

    fn on_query_host_info(&mut self, _state: &mut SessionState) -> Result<HostInfo, ErrorCode> {
        Ok(host::host_info())
    }

    fn on_query_process_list(
        &mut self,
        _state: &mut SessionState,
        query: &ProcessQuery,
    ) -> Result<Vec<ProcessInfo>, ErrorCode> {
        host::process_list(query)
    }

    fn on_query_process_info_pid(
        &mut self,
        _state: &mut SessionState,
        pid: Pid,
    ) -> Result<ProcessInfo, ErrorCode> {
        host::process_info(pid)
    }

    fn on_launch_debug_server(
        &mut self,
        _state: &mut SessionState,
        host: Option<&str>,
        port: u16,
    ) -> Result<LaunchedServer, ErrorCode> {
        self.spawn_server(host.unwrap_or("0.0.0.0"), port)
    }

    fn on_query_user_name(&mut self, _state: &mut SessionState, uid: u32) -> Result<String, ErrorCode> {
        host::user_name(uid)
    }

    fn on_query_group_name(
        &mut self,
        _state: &mut SessionState,
        gid: u32,
    ) -> Result<String, ErrorCode> {
        host::group_name(gid)
    }

    fn on_query_working_directory(
        &mut self,
        _state: &mut SessionState,
    ) -> Result<PathBuf, ErrorCode> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => host::working_directory(),
        }
    }

    fn on_set_working_directory(
        &mut self,
        _state: &mut SessionState,
        dir: &Path,
    ) -> Result<(), ErrorCode> {
        if !dir.is_dir() {
            return Err(ErrorCode::NotDirectory);
        }
        self.working_dir = Some(dir.to_owned());
        Ok(())
    }

    fn on_execute_program(
        &mut self,
        _state: &mut SessionState,
        command: &str,
        timeout: Option<Duration>,
        cwd: Option<&Path>,
    ) -> Result<ProgramResult, ErrorCode> {
        let cwd = cwd.or(self.working_dir.as_deref());
        host::run_shell(command, timeout, cwd)
    }

    fn on_file_create_directory(
        &mut self,
        _state: &mut SessionState,
        path: &Path,
        mode: u32,
    ) -> Result<(), ErrorCode> {
        self.files.mkdir(path, mode)
    }

    fn on_query_shared_library_info(
        &mut self,
        _state: &mut SessionState,
        path: &Path,
        triple: &str,
    ) -> Result<ModuleInfo, ErrorCode> {
        module_info(&self.files, path, triple)
    }

    fn on_file_set_system(
        &mut self,
        _state: &mut SessionState,
        pid: Option<i32>,
    ) -> Result<(), ErrorCode> {
        self.files.set_filesystem(pid);
        Ok(())
    }

    fn on_file_open(
        &mut self,
        _state: &mut SessionState,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<i32, ErrorCode> {
        self.files.open(path, flags, mode)
    }

    fn on_file_close(&mut self, _state: &mut SessionState, fd: i32) -> Result<(), ErrorCode> {
        self.files.close(fd)
    }

    fn on_file_read(
        &mut self,
        _state: &mut SessionState,
        fd: i32,
        count: usize,
        offset: u64,
    ) -> Result<Vec<u8>, ErrorCode> {
        self.files.pread(fd, count, offset)
    }

    fn on_file_write(
        &mut self,
        _state: &mut SessionState,
        fd: i32,
        offset: u64,
        data: &[u8],
    ) -> Result<usize, ErrorCode> {
        self.files.pwrite(fd, offset, data)
    }

    fn on_file_fstat(&mut self, _state: &mut SessionState, fd: i32) -> Result<FileStat, ErrorCode> {
        self.files.fstat(fd)
    }

    fn on_file_remove(&mut self, _state: &mut SessionState, path: &Path) -> Result<(), ErrorCode> {
        self.files.unlink(path)
    }

    fn on_file_read_link(
        &mut self,
        _state: &mut SessionState,
        path: &Path,
    ) -> Result<PathBuf, ErrorCode> {
        self.files.readlink(path)
    }

    fn on_file_exists(&mut self, _state: &mut SessionState, path: &Path) -> Result<bool, ErrorCode> {
        Ok(self.files.exists(path))
    }

    fn on_file_compute_md5(
        &mut self,
        _state: &mut SessionState,
        path: &Path,
    ) -> Result<[u8; 16], ErrorCode> {
        self.files.md5(path)
    }

    fn on_file_get_size(&mut self, _state: &mut SessionState, path: &Path) -> Result<u64, ErrorCode> {
        self.files.size(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn server_line() {
        let launched = parse_server_line("4242 1234\n").unwrap();
        assert_eq!(launched.port, 4242);
        assert_eq!(launched.pid, Pid::from_raw(1234));
        assert!(parse_server_line("4242\n").is_none());
        assert!(parse_server_line("").is_none());
    }

    #[test]
    fn launches_through_the_given_program() {
        // `sh -c '<script>' slave --listen ...` prints what a slave would.
        let mut platform = PlatformSession::new(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_owned(), "echo 5555 $$".to_owned()],
        );
        let mut state = SessionState::new(None);
        let launched = platform
            .on_launch_debug_server(&mut state, Some("127.0.0.1"), 0)
            .unwrap();
        assert_eq!(launched.port, 5555);
        assert!(launched.pid.as_raw() > 0);
    }

    #[test]
    fn working_directory_is_used_by_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let mut platform = PlatformSession::new(PathBuf::from("/bin/true"), Vec::new());
        let mut state = SessionState::new(None);

        assert_eq!(
            platform.on_set_working_directory(&mut state, &dir.path().join("missing")),
            Err(ErrorCode::NotDirectory)
        );
        platform
            .on_set_working_directory(&mut state, dir.path())
            .unwrap();
        assert_eq!(
            platform.on_query_working_directory(&mut state).unwrap(),
            dir.path()
        );

        let result = platform
            .on_execute_program(&mut state, "touch marker", None, None)
            .unwrap();
        assert_eq!(result.status, 0);
        assert!(dir.path().join("marker").exists());
    }
}
