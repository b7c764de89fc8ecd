/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fs;

use serde::Deserialize;
use serde::Serialize;

use crate::Address;
use crate::Architecture;
use crate::ErrorCode;
use crate::CpuType;
use crate::Endian;

/// Snapshot of a process' identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: i32,
    pub parent_pid: i32,
    pub real_uid: u32,
    pub real_gid: u32,
    pub effective_uid: u32,
    pub effective_gid: u32,
    pub name: String,
    pub arguments: Vec<String>,
    pub cpu: CpuType,
    pub pointer_size: usize,
    pub endian: Endian,
    pub os_type: String,
    pub os_vendor: String,
    pub triple: String,
}

impl ProcessInfo {
    /// Reads a live process' identity from procfs. The architecture is
    /// assumed, not detected.
    pub fn from_proc(pid: i32, arch: &Architecture) -> Result<Self, ErrorCode> {
        let status = fs::read_to_string(format!("/proc/{}/status", pid))?;
        let mut parent_pid = 0;
        let mut uids = [0; 2];
        let mut gids = [0; 2];
        let mut name = String::new();
        for line in status.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let mut nums = value.split_whitespace().filter_map(|v| v.parse::<u32>().ok());
            match key {
                "Name" => name = value.trim().to_owned(),
                "PPid" => parent_pid = value.trim().parse().unwrap_or(0),
                "Uid" => uids = [nums.next().unwrap_or(0), nums.next().unwrap_or(0)],
                "Gid" => gids = [nums.next().unwrap_or(0), nums.next().unwrap_or(0)],
                _ => {}
            }
        }

        // Kernel threads have an empty command line.
        let cmdline = fs::read(format!("/proc/{}/cmdline", pid)).unwrap_or_default();
        let arguments = cmdline
            .split(|b| *b == 0)
            .filter(|a| !a.is_empty())
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();

        Ok(ProcessInfo {
            pid,
            parent_pid,
            real_uid: uids[0],
            real_gid: gids[0],
            effective_uid: uids[1],
            effective_gid: gids[1],
            name,
            arguments,
            cpu: arch.cpu,
            pointer_size: arch.pointer_size,
            endian: arch.endian,
            os_type: "linux".to_owned(),
            os_vendor: "unknown".to_owned(),
            triple: arch.triple.to_owned(),
        })
    }
}

/// A shared library mapped into the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedLibrary {
    pub path: String,
    pub base: Address,
    pub main: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_own_process() {
        let pid = std::process::id() as i32;
        let info = ProcessInfo::from_proc(pid, &Architecture::X86_64).unwrap();
        assert_eq!(info.pid, pid);
        assert_eq!(info.parent_pid, nix::unistd::getppid().as_raw());
        assert_eq!(info.effective_uid, nix::unistd::geteuid().as_raw());
        assert!(!info.arguments.is_empty());
        assert_eq!(info.triple, "x86_64-pc-linux-gnu");
    }
}
