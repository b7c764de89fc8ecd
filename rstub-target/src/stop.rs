/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use serde::Deserialize;
use serde::Serialize;

use crate::Address;

/// What happened to a thread or process.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopEvent {
    #[default]
    None,
    /// Stopped and can be resumed.
    Stop,
    /// Exited normally with a status code.
    Exit,
    /// Killed by a signal.
    Kill,
}

/// Why a thread stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopReason {
    #[default]
    None,
    Breakpoint,
    Watchpoint,
    LibraryLoad,
    LibraryUnload,
    SingleStep,
    Trap,
    Signal,
}

/// Stop description attached to a thread after every stop.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StopInfo {
    pub event: StopEvent,
    pub reason: StopReason,
    pub signal: i32,
    pub status: i32,
    /// Breakpoint or watchpoint address when one is involved.
    pub address: Option<Address>,
    /// Whether a hardware site caused the stop.
    pub hardware: bool,
}

impl StopInfo {
    pub fn stopped(reason: StopReason, signal: i32) -> Self {
        StopInfo {
            event: StopEvent::Stop,
            reason,
            signal,
            ..Default::default()
        }
    }

    pub fn exited(status: i32) -> Self {
        StopInfo {
            event: StopEvent::Exit,
            status,
            ..Default::default()
        }
    }

    pub fn killed(signal: i32) -> Self {
        StopInfo {
            event: StopEvent::Kill,
            signal,
            ..Default::default()
        }
    }

    /// Stops that a breakpoint hit test should look at.
    pub fn is_trap(&self) -> bool {
        self.event == StopEvent::Stop
            && matches!(
                self.reason,
                StopReason::Breakpoint | StopReason::Trap | StopReason::Watchpoint
            )
    }
}
