/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Host-side services shared by the run modes: remote file I/O, the host
//! process table, user and group names, shell commands.

use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::io::Read;
use std::os::fd::AsRawFd;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::fs::FileExt;
use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use md5::Digest;
use md5::Md5;
use nix::sys::utsname::uname;
use nix::unistd::Gid;
use nix::unistd::Group;
use nix::unistd::Uid;
use nix::unistd::User;
use rstub_target::Architecture;
use rstub_target::ErrorCode;
use rstub_target::Pid;
use rstub_target::ProcessInfo;

use crate::commands::OpenFlags;
use crate::commands::ProcessQuery;
use crate::types::FileStat;
use crate::types::HostInfo;
use crate::types::ProgramResult;

/// Files opened by the client through `vFile:open`, keyed by the descriptor
/// handed back to it.
#[derive(Debug, Default)]
pub struct HostIo {
    files: HashMap<i32, File>,
    /// Process whose mount namespace paths resolve in (`vFile:setfs`).
    fs_pid: Option<i32>,
}

impl HostIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_filesystem(&mut self, pid: Option<i32>) {
        self.fs_pid = pid;
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match self.fs_pid {
            Some(pid) => {
                let root = PathBuf::from(format!("/proc/{}/root", pid));
                root.join(path.strip_prefix("/").unwrap_or(path))
            }
            None => path.to_owned(),
        }
    }

    pub fn open(&mut self, path: &Path, flags: OpenFlags, mode: u32) -> Result<i32, ErrorCode> {
        let mut options = fs::OpenOptions::new();
        options
            .read(flags.is_read_only() || flags.contains(OpenFlags::RDWR))
            .write(flags.intersects(OpenFlags::WRONLY | OpenFlags::RDWR))
            .append(flags.contains(OpenFlags::APPEND))
            .truncate(flags.contains(OpenFlags::TRUNC))
            .mode(mode);
        if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) {
            options.create_new(true);
        } else if flags.contains(OpenFlags::CREAT) {
            options.create(true);
        }
        let file = options.open(self.resolve(path))?;
        let fd = file.as_raw_fd();
        tracing::debug!("vFile: opened {} as {}", path.display(), fd);
        self.files.insert(fd, file);
        Ok(fd)
    }

    pub fn close(&mut self, fd: i32) -> Result<(), ErrorCode> {
        self.files
            .remove(&fd)
            .map(drop)
            .ok_or(ErrorCode::InvalidHandle)
    }

    fn file(&self, fd: i32) -> Result<&File, ErrorCode> {
        self.files.get(&fd).ok_or(ErrorCode::InvalidHandle)
    }

    pub fn pread(&self, fd: i32, count: usize, offset: u64) -> Result<Vec<u8>, ErrorCode> {
        let mut buf = vec![0u8; count];
        let n = self.file(fd)?.read_at(&mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    pub fn pwrite(&self, fd: i32, offset: u64, data: &[u8]) -> Result<usize, ErrorCode> {
        Ok(self.file(fd)?.write_at(data, offset)?)
    }

    pub fn fstat(&self, fd: i32) -> Result<FileStat, ErrorCode> {
        let meta = self.file(fd)?.metadata()?;
        Ok(FileStat {
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            mode: meta.mode(),
            nlink: meta.nlink() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev() as u32,
            size: meta.size(),
            blksize: meta.blksize(),
            blocks: meta.blocks(),
            atime: meta.atime() as u32,
            mtime: meta.mtime() as u32,
            ctime: meta.ctime() as u32,
        })
    }

    pub fn unlink(&self, path: &Path) -> Result<(), ErrorCode> {
        Ok(fs::remove_file(self.resolve(path))?)
    }

    pub fn readlink(&self, path: &Path) -> Result<PathBuf, ErrorCode> {
        Ok(fs::read_link(self.resolve(path))?)
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    pub fn size(&self, path: &Path) -> Result<u64, ErrorCode> {
        Ok(fs::metadata(self.resolve(path))?.len())
    }

    pub fn md5(&self, path: &Path) -> Result<[u8; 16], ErrorCode> {
        let mut file = File::open(self.resolve(path))?;
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; 0x10000];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize().into())
    }

    pub fn mkdir(&self, path: &Path, mode: u32) -> Result<(), ErrorCode> {
        Ok(fs::DirBuilder::new()
            .mode(mode)
            .create(self.resolve(path))?)
    }
}

/// gdb's CRC-32: polynomial 0x04c11db7, MSB first, no final inversion.
/// Start with `0xffffffff`.
pub fn crc32(data: &[u8], mut crc: u32) -> u32 {
    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04c1_1db7
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn native_arch() -> &'static Architecture {
    Architecture::native().unwrap_or(&Architecture::X86_64)
}

/// `qHostInfo` for the machine we run on.
pub fn host_info() -> HostInfo {
    let mut info = HostInfo::for_arch(native_arch());
    if let Ok(uts) = uname() {
        let release = uts.release().to_string_lossy();
        let version: String = release
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if !version.is_empty() {
            info.os_version = Some(version);
        }
        info.os_build = Some(release.into_owned());
    }
    info.hostname = nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok());
    info
}

pub fn process_info(pid: Pid) -> Result<ProcessInfo, ErrorCode> {
    ProcessInfo::from_proc(pid.as_raw(), native_arch()).map_err(|err| match err {
        ErrorCode::NotFound => ErrorCode::ProcessNotFound,
        err => err,
    })
}

fn matches(query: &ProcessQuery, info: &ProcessInfo) -> bool {
    let name_ok = match &query.name {
        Some(pattern) => query.name_match.matches(pattern, &info.name),
        None => true,
    };
    let restricted_to_us = !query.all_users && !nix::unistd::geteuid().is_root();
    name_ok
        && query.pid.is_none_or(|pid| pid == info.pid)
        && query.parent_pid.is_none_or(|ppid| ppid == info.parent_pid)
        && query.uid.is_none_or(|uid| uid == info.real_uid)
        && query.gid.is_none_or(|gid| gid == info.real_gid)
        && query.euid.is_none_or(|euid| euid == info.effective_uid)
        && query.egid.is_none_or(|egid| egid == info.effective_gid)
        && query.triple.as_ref().is_none_or(|t| *t == info.triple)
        && (!restricted_to_us || info.effective_uid == nix::unistd::geteuid().as_raw())
}

/// Host processes matching `query`, in pid order. Processes that vanish
/// while the table is read are skipped.
pub fn process_list(query: &ProcessQuery) -> Result<Vec<ProcessInfo>, ErrorCode> {
    let mut pids: Vec<i32> = fs::read_dir("/proc")?
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
        .collect();
    pids.sort_unstable();
    Ok(pids
        .into_iter()
        .filter_map(|pid| ProcessInfo::from_proc(pid, native_arch()).ok())
        .filter(|info| matches(query, info))
        .collect())
}

pub fn user_name(uid: u32) -> Result<String, ErrorCode> {
    User::from_uid(Uid::from_raw(uid))?
        .map(|user| user.name)
        .ok_or(ErrorCode::NotFound)
}

pub fn group_name(gid: u32) -> Result<String, ErrorCode> {
    Group::from_gid(Gid::from_raw(gid))?
        .map(|group| group.name)
        .ok_or(ErrorCode::NotFound)
}

pub fn working_directory() -> Result<PathBuf, ErrorCode> {
    Ok(std::env::current_dir()?)
}

/// Runs `command` through `/bin/sh`, collecting stdout and stderr. The
/// command is killed when it outlives `timeout`.
pub fn run_shell(
    command: &str,
    timeout: Option<Duration>,
    cwd: Option<&Path>,
) -> Result<ProgramResult, ErrorCode> {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c")
        .arg(format!("exec 2>&1\n{}", command))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    tracing::debug!("Running {:?}", cmd);
    let mut child = cmd.spawn()?;

    let mut stdout = child.stdout.take().ok_or(ErrorCode::Unknown)?;
    let reader = thread::spawn(move || {
        let mut output = Vec::new();
        stdout.read_to_end(&mut output).map(|_| output)
    });

    let deadline = timeout.map(|t| Instant::now() + t);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::warn!("{:?} timed out", command);
            let _ = child.kill();
            let _ = child.wait();
            return Err(ErrorCode::Busy);
        }
        thread::sleep(Duration::from_millis(10));
    };

    let output = match reader.join() {
        Ok(output) => output?,
        Err(_) => return Err(ErrorCode::Unknown),
    };
    Ok(ProgramResult {
        status: status.code().unwrap_or(-1),
        signal: status.signal().unwrap_or(0),
        output,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gdb_crc() {
        // CRC-32/MPEG-2 check value.
        assert_eq!(crc32(b"123456789", 0xffff_ffff), 0x0376_e6e7);
        assert_eq!(crc32(b"", 0xffff_ffff), 0xffff_ffff);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let mut io = HostIo::new();

        let fd = io
            .open(&path, OpenFlags::CREAT | OpenFlags::RDWR, 0o644)
            .unwrap();
        assert_eq!(io.pwrite(fd, 0, b"hello world").unwrap(), 11);
        assert_eq!(io.pread(fd, 5, 6).unwrap(), b"world");
        assert_eq!(io.pread(fd, 100, 6).unwrap(), b"world");
        assert_eq!(io.fstat(fd).unwrap().size, 11);
        io.close(fd).unwrap();
        assert_eq!(io.close(fd), Err(ErrorCode::InvalidHandle));

        assert!(io.exists(&path));
        assert_eq!(io.size(&path).unwrap(), 11);
        assert_eq!(
            io.md5(&path).unwrap(),
            [
                0x5e, 0xb6, 0x3b, 0xbb, 0xe0, 0x1e, 0xee, 0xd0, 0x93, 0xcb, 0x22, 0xbb, 0x8f, 0x5a,
                0xcd, 0xc3
            ]
        );

        assert_eq!(
            io.open(&path, OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::WRONLY, 0o644),
            Err(ErrorCode::AlreadyExist)
        );

        io.unlink(&path).unwrap();
        assert!(!io.exists(&path));
        assert_eq!(io.size(&path), Err(ErrorCode::NotFound));
    }

    #[test]
    fn directories_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let io = HostIo::new();
        let sub = dir.path().join("sub");
        io.mkdir(&sub, 0o755).unwrap();
        assert!(sub.is_dir());

        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&sub, &link).unwrap();
        assert_eq!(io.readlink(&link).unwrap(), sub);
    }

    #[test]
    fn shell() {
        let result = run_shell("echo hi; echo err >&2; exit 3", None, None).unwrap();
        assert_eq!(result.status, 3);
        assert_eq!(result.output, b"hi\nerr\n");

        // Every command of a list shares the one output stream.
        let result = run_shell("(echo a >&2); echo b >&2; echo c", None, None).unwrap();
        assert_eq!(result.status, 0);
        assert_eq!(result.output, b"a\nb\nc\n");

        let dir = tempfile::tempdir().unwrap();
        let result = run_shell("pwd", None, Some(dir.path())).unwrap();
        assert!(String::from_utf8_lossy(&result.output).trim().ends_with(
            dir.path().file_name().unwrap().to_str().unwrap()
        ));

        assert_eq!(
            run_shell("sleep 5", Some(Duration::from_millis(50)), None),
            Err(ErrorCode::Busy)
        );
    }

    #[test]
    fn finds_ourselves() {
        let me = std::process::id() as i32;
        let query = ProcessQuery {
            pid: Some(me),
            ..Default::default()
        };
        let list = process_list(&query).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].pid, me);
        assert_eq!(process_info(Pid::from_raw(me)).unwrap().pid, me);
    }
}
