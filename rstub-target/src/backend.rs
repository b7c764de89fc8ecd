/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The capabilities a platform has to provide to be debugged.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::Address;
use crate::CpuState;
use crate::DebugEvent;
use crate::ErrorCode;
use crate::MemoryAccess;
use crate::MemoryRegionInfo;
use crate::Pid;
use crate::ProcessInfo;
use crate::Protection;
use crate::SharedLibrary;

/// Halts a running target from another thread. Handles are cheap to clone and
/// outlive any single resume.
pub trait Interrupt: Send + Sync {
    fn interrupt(&self) -> Result<(), ErrorCode>;
}

/// Image of the hardware debug registers, ready to be loaded into every
/// thread. On x86 `control` is DR7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugRegisters {
    pub addresses: [u64; 4],
    pub control: u64,
}

/// One attached or launched process, as seen by the platform.
///
/// Every method reports failures through [`ErrorCode`]; optional capabilities
/// default to [`ErrorCode::Unsupported`].
pub trait Backend: MemoryAccess + Send {
    /// Pid of the process.
    fn pid(&self) -> Pid;

    /// Current process information.
    fn info(&mut self) -> Result<ProcessInfo, ErrorCode>;

    /// Threads known to exist right now.
    fn threads(&mut self) -> Result<Vec<Pid>, ErrorCode>;

    fn read_registers(&mut self, tid: Pid) -> Result<CpuState, ErrorCode>;

    fn write_registers(&mut self, tid: Pid, state: &CpuState) -> Result<(), ErrorCode>;

    /// Lets a stopped thread run, optionally delivering a signal.
    fn resume(&mut self, tid: Pid, signal: Option<i32>) -> Result<(), ErrorCode>;

    /// Executes a single instruction on a stopped thread.
    fn step(&mut self, tid: Pid, signal: Option<i32>) -> Result<(), ErrorCode>;

    /// Blocks until the platform reports the next debug event.
    fn wait(&mut self) -> Result<DebugEvent, ErrorCode>;

    /// Stops every running thread except `except`.
    fn suspend(&mut self, except: Option<Pid>) -> Result<(), ErrorCode>;

    fn terminate(&mut self) -> Result<(), ErrorCode>;

    fn detach(&mut self) -> Result<(), ErrorCode>;

    /// A handle that can halt the process while [`Backend::wait`] blocks.
    fn interrupter(&self) -> Arc<dyn Interrupt>;

    fn shared_libraries(&mut self) -> Result<Vec<SharedLibrary>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn memory_region(&mut self, _addr: Address) -> Result<MemoryRegionInfo, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn allocate_memory(&mut self, _size: usize, _prot: Protection) -> Result<Address, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn deallocate_memory(&mut self, _addr: Address) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Loads the debug registers into every thread of the process.
    fn write_debug_registers(&mut self, _regs: &DebugRegisters) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Raw auxiliary vector.
    fn auxv(&mut self) -> Result<Vec<u8>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }
}

/// How to start a new inferior. Built up piece by piece by the launch packets
/// before the program is actually run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchInfo {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// `None` removes the variable from the inherited environment.
    pub env: BTreeMap<String, Option<String>>,
    pub working_dir: Option<PathBuf>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub disable_aslr: bool,
    /// Start the program in a session of its own.
    pub setsid: bool,
}

/// Creates backends, either by launching a program or attaching to one.
pub trait Spawner: Send {
    fn spawn(&mut self, launch: &LaunchInfo) -> Result<Box<dyn Backend>, ErrorCode>;

    fn attach(&mut self, pid: Pid) -> Result<Box<dyn Backend>, ErrorCode>;
}
