/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeMap;

use rstub_target::Pid;
use rstub_target::StopEvent;
use rstub_target::StopInfo;
use rstub_target::StopReason;
use serde::Serialize;

use crate::SessionState;
use crate::hex::encode_hex;
use crate::response::ResponseWriter;
use crate::response::WriteResponse;
use crate::types::CompatMode;

/// Everything a stop reply reports about one thread, or about the exit of
/// the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCode {
    pub info: StopInfo,
    pub pid: Pid,
    /// Reporting thread. Absent for process exits.
    pub tid: Option<Pid>,
    pub thread_name: Option<String>,
    /// Expedited registers: register number and raw target-order bytes.
    pub registers: Vec<(usize, Vec<u8>)>,
    /// Every thread of the process, for `QListThreadsInStopReply`.
    pub threads: Vec<Pid>,
    pub core: Option<u32>,
}

impl StopCode {
    pub fn new(info: StopInfo, pid: Pid, tid: Option<Pid>) -> Self {
        StopCode {
            info,
            pid,
            tid,
            thread_name: None,
            registers: Vec::new(),
            threads: Vec::new(),
            core: None,
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.info.event, StopEvent::Exit | StopEvent::Kill)
    }

    /// Pairs the stop with the session settings that shape its encoding.
    pub fn reply<'a>(&'a self, state: &'a SessionState) -> StopReply<'a> {
        StopReply { code: self, state }
    }

    fn lldb_reason(&self) -> Option<&'static str> {
        match self.info.reason {
            StopReason::None => None,
            StopReason::Breakpoint => Some("breakpoint"),
            StopReason::Watchpoint => Some("watchpoint"),
            StopReason::SingleStep => Some("trace"),
            StopReason::Signal | StopReason::Trap => Some("signal"),
            StopReason::LibraryLoad | StopReason::LibraryUnload => Some("exception"),
        }
    }

    fn write_exit(&self, f: &mut ResponseWriter, state: &SessionState) {
        if self.info.event == StopEvent::Exit {
            f.put_str("W");
            f.put_u8_hex(self.info.status as u8);
        } else {
            f.put_str("X");
            f.put_u8_hex(self.info.signal as u8);
        }
        if state.multiprocess() || state.mode() == CompatMode::Lldb {
            f.put_str(";process:");
            f.put_num(self.pid.as_raw() as u32);
        }
    }

    fn write_registers(&self, f: &mut ResponseWriter) {
        for (regno, bytes) in &self.registers {
            f.put_num(*regno);
            f.put_str(":");
            f.put_hex_encoded(bytes);
            f.put_str(";");
        }
    }

    fn write_gdb(&self, f: &mut ResponseWriter, state: &SessionState) {
        self.write_registers(f);
        if let Some(tid) = self.tid {
            f.put_str("thread:");
            state.write_thread_id(f, self.pid, tid);
            f.put_str(";");
        }
        if let Some(core) = self.core {
            f.put_key_num("core", core);
        }
        match self.info.reason {
            StopReason::Breakpoint if self.info.hardware => {
                if state.remote_supports("hwbreak") {
                    f.put_str("hwbreak:;");
                }
            }
            StopReason::Breakpoint => {
                if state.remote_supports("swbreak") {
                    f.put_str("swbreak:;");
                }
            }
            StopReason::Watchpoint => {
                if let Some(addr) = self.info.address {
                    f.put_key_num("watch", addr.value());
                }
            }
            StopReason::LibraryLoad | StopReason::LibraryUnload => f.put_str("library:;"),
            _ => {}
        }
    }

    fn write_lldb(&self, f: &mut ResponseWriter, state: &SessionState) {
        if let Some(tid) = self.tid {
            f.put_key_num("thread", tid.as_raw() as u32);
        }
        if let Some(name) = &self.thread_name {
            f.put_key_hex("hexname", name);
        }
        if state.list_threads_in_stop_reply && !self.threads.is_empty() {
            f.put_str("threads:");
            for (i, tid) in self.threads.iter().enumerate() {
                if i > 0 {
                    f.put_str(",");
                }
                f.put_num(tid.as_raw() as u32);
            }
            f.put_str(";");
        }
        self.write_registers(f);
        if let Some(core) = self.core {
            f.put_key_num("core", core);
        }
        if let Some(reason) = self.lldb_reason() {
            f.put_key_str("reason", reason);
        }
        if self.info.reason == StopReason::Watchpoint {
            if let Some(addr) = self.info.address {
                f.put_key_hex("description", &format!("{} 0", addr.value()));
            }
        }
    }
}

/// Wire encoding of a [`StopCode`]: `T`, `W` or `X` packets.
pub struct StopReply<'a> {
    code: &'a StopCode,
    state: &'a SessionState,
}

impl WriteResponse for StopReply<'_> {
    fn write_response(&self, f: &mut ResponseWriter) {
        let code = self.code;
        if code.is_exit() {
            return code.write_exit(f, self.state);
        }
        f.put_str("T");
        f.put_u8_hex(code.info.signal as u8);
        match self.state.mode() {
            CompatMode::Gdb => code.write_gdb(f, self.state),
            CompatMode::Lldb => code.write_lldb(f, self.state),
        }
    }
}

#[derive(Serialize)]
struct ThreadJson<'a> {
    tid: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    signal: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    registers: BTreeMap<String, String>,
}

/// `jThreadsInfo` reply: one JSON object per thread.
pub struct ThreadsJson<'a>(pub &'a [StopCode]);

impl ThreadsJson<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        let threads = self
            .0
            .iter()
            .filter_map(|code| {
                Some(ThreadJson {
                    tid: code.tid?.as_raw(),
                    name: code.thread_name.as_deref(),
                    signal: code.info.signal,
                    reason: code.lldb_reason(),
                    registers: code
                        .registers
                        .iter()
                        .map(|(regno, bytes)| {
                            (
                                regno.to_string(),
                                String::from_utf8_lossy(&encode_hex(bytes)).into_owned(),
                            )
                        })
                        .collect(),
                })
            })
            .collect::<Vec<_>>();
        serde_json::to_string(&threads)
    }
}

impl WriteResponse for ThreadsJson<'_> {
    fn write_response(&self, f: &mut ResponseWriter) {
        match self.to_json() {
            Ok(json) => f.put_binary_encoded(json.as_bytes()),
            Err(err) => tracing::warn!("failed to encode threads info: {}", err),
        }
    }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;
    use rstub_target::Address;
    use rstub_target::SIGTRAP;

    use super::*;
    use crate::commands::Feature;

    fn body(code: &StopCode, state: &SessionState) -> String {
        let mut w = ResponseWriter::new(BytesMut::new());
        code.reply(state).write_response(&mut w);
        let out = w.finish();
        String::from_utf8_lossy(&out[1..out.len() - 3]).into_owned()
    }

    fn breakpoint() -> StopCode {
        let mut info = StopInfo::stopped(StopReason::Breakpoint, SIGTRAP);
        info.address = Some(Address::new(0x1000));
        let mut code = StopCode::new(info, Pid::from_raw(0x10), Some(Pid::from_raw(0x11)));
        code.registers.push((16, 0x1000u64.to_le_bytes().to_vec()));
        code.threads = vec![Pid::from_raw(0x10), Pid::from_raw(0x11)];
        code
    }

    #[test]
    fn gdb_breakpoint_stop() {
        let mut state = SessionState::new(Some(CompatMode::Gdb));
        state.remote_features = vec![Feature::supported("swbreak"), Feature::supported("multiprocess")];
        assert_eq!(
            body(&breakpoint(), &state),
            "T0510:0010000000000000;thread:p10.11;swbreak:;"
        );

        state.remote_features.clear();
        assert_eq!(
            body(&breakpoint(), &state),
            "T0510:0010000000000000;thread:11;"
        );
    }

    #[test]
    fn lldb_breakpoint_stop() {
        let mut state = SessionState::new(Some(CompatMode::Lldb));
        state.list_threads_in_stop_reply = true;
        assert_eq!(
            body(&breakpoint(), &state),
            "T05thread:11;threads:10,11;10:0010000000000000;reason:breakpoint;"
        );
    }

    #[test]
    fn exits() {
        let state = SessionState::new(Some(CompatMode::Gdb));
        let code = StopCode::new(StopInfo::exited(3), Pid::from_raw(0x10), None);
        assert_eq!(body(&code, &state), "W03");

        let state = SessionState::new(Some(CompatMode::Lldb));
        let code = StopCode::new(StopInfo::killed(9), Pid::from_raw(0x10), None);
        assert_eq!(body(&code, &state), "X09;process:10");
    }

    #[test]
    fn threads_json() {
        let json = ThreadsJson(&[breakpoint()]).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["tid"], 0x11);
        assert_eq!(value[0]["reason"], "breakpoint");
        assert_eq!(value[0]["registers"]["16"], "0010000000000000");
    }
}
