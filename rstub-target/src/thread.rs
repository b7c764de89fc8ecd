/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::Pid;
use crate::StopInfo;

/// Execution state of one thread.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ThreadState {
    #[default]
    Invalid,
    Running,
    Stopped,
    Stepped,
    Terminated,
}

/// A thread of the debugged process. Threads are owned by their
/// [`Process`](crate::Process); code that needs the process goes through it.
#[derive(Debug, Clone)]
pub struct Thread {
    tid: Pid,
    pub state: ThreadState,
    pub stop_info: StopInfo,
}

impl Thread {
    pub fn new(tid: Pid) -> Self {
        Thread {
            tid,
            state: ThreadState::Stopped,
            stop_info: StopInfo::default(),
        }
    }

    pub fn tid(&self) -> Pid {
        self.tid
    }

    pub fn is_alive(&self) -> bool {
        !matches!(self.state, ThreadState::Invalid | ThreadState::Terminated)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, ThreadState::Stopped | ThreadState::Stepped)
    }
}
