/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Platform debug events and what they mean for the process model.

use crate::Address;
use crate::ErrorCode;
use crate::Pid;
use crate::SIGTRAP;
use crate::StopInfo;
use crate::StopReason;

/// How a process or thread went away.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitKind {
    Exited(i32),
    Signaled(i32),
}

impl ExitKind {
    pub fn stop_info(self) -> StopInfo {
        match self {
            ExitKind::Exited(code) => StopInfo::exited(code),
            ExitKind::Signaled(sig) => StopInfo::killed(sig),
        }
    }
}

/// Exception classes a platform can report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExceptionCode {
    Breakpoint,
    SingleStep,
    AccessViolation,
    IllegalInstruction,
    IntegerDivide,
    /// A debug register fired; the event's address is the watched one.
    DebugRegister,
    Other(u32),
}

impl ExceptionCode {
    /// Classifies a raw Windows-style exception number.
    pub fn from_raw(code: u32) -> Self {
        match code {
            0x8000_0003 => ExceptionCode::Breakpoint,
            0x8000_0004 => ExceptionCode::SingleStep,
            0xc000_0005 => ExceptionCode::AccessViolation,
            0xc000_001d => ExceptionCode::IllegalInstruction,
            0xc000_0094 => ExceptionCode::IntegerDivide,
            other => ExceptionCode::Other(other),
        }
    }

    /// Stop reason and signal number reported for this exception.
    pub fn stop_info(self) -> StopInfo {
        let (reason, signal) = match self {
            ExceptionCode::Breakpoint => (StopReason::Breakpoint, SIGTRAP),
            ExceptionCode::SingleStep => (StopReason::SingleStep, SIGTRAP),
            ExceptionCode::AccessViolation => (StopReason::Signal, libc::SIGSEGV),
            ExceptionCode::IllegalInstruction => (StopReason::Signal, libc::SIGILL),
            ExceptionCode::IntegerDivide => (StopReason::Signal, libc::SIGFPE),
            ExceptionCode::DebugRegister | ExceptionCode::Other(_) => (StopReason::Trap, SIGTRAP),
        };
        StopInfo::stopped(reason, signal)
    }
}

/// One event reported by [`Backend::wait`](crate::Backend::wait).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugEvent {
    ProcessCreated { tid: Pid },
    ProcessExited(ExitKind),
    ThreadCreated { tid: Pid },
    ThreadExited { tid: Pid, kind: ExitKind },
    Exception {
        tid: Pid,
        code: ExceptionCode,
        address: Address,
    },
    ModuleLoaded { tid: Pid, base: Address },
    ModuleUnloaded { tid: Pid, base: Address },
    DebugString { tid: Pid, text: String },
    /// A POSIX signal stopped the thread.
    Signal { tid: Pid, signal: i32 },
    /// The platform's debugging facility failed.
    Fatal(ErrorCode),
}

/// Outcome of applying a [`DebugEvent`] to a process.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The process is stopped; this thread reported the event.
    Stopped(Pid),
    /// The process is gone.
    Exited,
    /// Bookkeeping only; wait for the next event.
    Continue,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::StopEvent;

    #[test]
    fn exception_mapping() {
        let bp = ExceptionCode::from_raw(0x8000_0003).stop_info();
        assert_eq!(bp.reason, StopReason::Breakpoint);
        assert_eq!(bp.signal, SIGTRAP);
        assert_eq!(bp.event, StopEvent::Stop);

        let step = ExceptionCode::from_raw(0x8000_0004).stop_info();
        assert_eq!(step.reason, StopReason::SingleStep);

        let segv = ExceptionCode::from_raw(0xc000_0005).stop_info();
        assert_eq!(segv.reason, StopReason::Signal);
        assert_eq!(segv.signal, libc::SIGSEGV);

        let other = ExceptionCode::from_raw(0x1234).stop_info();
        assert_eq!(other.reason, StopReason::Trap);

        let watch = ExceptionCode::DebugRegister.stop_info();
        assert_eq!(watch.reason, StopReason::Trap);
        assert_eq!(watch.signal, SIGTRAP);
    }

    #[test]
    fn exit_kinds() {
        assert_eq!(ExitKind::Exited(3).stop_info().event, StopEvent::Exit);
        let killed = ExitKind::Signaled(9).stop_info();
        assert_eq!(killed.event, StopEvent::Kill);
        assert_eq!(killed.signal, 9);
    }
}
