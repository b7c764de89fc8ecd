/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Debug target model for rstub.
//!
//! This crate knows nothing about the remote protocol. It provides:
//!  - the data model shared by every layer ([`Address`], [`StopInfo`],
//!    [`ProcessInfo`], [`CpuState`], ...),
//!  - the flat [`ErrorCode`] taxonomy,
//!  - the capability traits a platform backend implements ([`Backend`],
//!    [`Spawner`], [`Interrupt`]),
//!  - the [`Process`] model with its debug-event state machine, and
//!  - the software and hardware breakpoint managers.

mod arch;
mod backend;
pub mod breakpoint;
mod error;
mod event;
mod info;
mod memory;
mod process;
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub mod ptrace;
mod stop;
pub mod testing;
mod thread;

pub use arch::Architecture;
pub use arch::CpuState;
pub use arch::CpuType;
pub use arch::Endian;
pub use arch::RegisterDef;
pub use backend::Backend;
pub use backend::DebugRegisters;
pub use backend::Interrupt;
pub use backend::LaunchInfo;
pub use backend::Spawner;
pub use error::ErrorCode;
pub use event::DebugEvent;
pub use event::ExceptionCode;
pub use event::ExitKind;
pub use event::Transition;
pub use info::ProcessInfo;
pub use info::SharedLibrary;
pub use memory::Address;
pub use memory::MemoryAccess;
pub use memory::MemoryRegionInfo;
pub use memory::Protection;
pub use nix::unistd::Pid;
pub use process::Process;
pub use stop::StopEvent;
pub use stop::StopInfo;
pub use stop::StopReason;
pub use thread::Thread;
pub use thread::ThreadState;

/// Signal number reported for traps and breakpoints.
pub const SIGTRAP: i32 = 5;
