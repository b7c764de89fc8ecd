// @lint-ignore LICENSELINT
/*
 * MIT License
 *
 * Copyright (c) 2021 Daniel Prilik
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */


#![allow(non_snake_case, non_camel_case_types)]

use bytes::Bytes;
use bytes::BytesMut;
use paste::paste;
use rstub_target::Pid;
use thiserror::Error;

use crate::hex::*;

/// Declares packets that take nothing after their name.
macro_rules! bare_commands {
    ($($(#[$attrs:meta])* $name:ident,)*) => {
        $(
            $(#[$attrs])*
            #[derive(PartialEq, Debug)]
            pub struct $name;

            impl crate::commands::ParseCommand for $name {
                fn parse(bytes: bytes::BytesMut) -> Option<Self> {
                    bytes.is_empty().then_some($name)
                }
            }
        )*
    };
}

mod base;
mod extended_mode;
mod lldb;
mod monitor_cmd;
mod platform;

pub use base::*;
pub use extended_mode::*;
pub use lldb::*;
pub use monitor_cmd::*;
pub use platform::*;

trait ParseCommand: Sized {
    fn parse(buff: BytesMut) -> Option<Self>;
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum IdKind {
    // all threads: `-1'.
    All,
    // any thread: `0'.
    Any,
    Id(Pid),
}

impl IdKind {
    pub fn from_raw(pid: i32) -> Self {
        match pid {
            -1 => IdKind::All,
            0 => IdKind::Any,
            _ => IdKind::Id(Pid::from_raw(pid)),
        }
    }

    #[allow(clippy::wrong_self_convention)]
    pub fn into_raw(&self) -> i32 {
        match self {
            IdKind::All => -1,
            IdKind::Any => 0,
            IdKind::Id(pid) => pid.as_raw(),
        }
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes == b"-1" {
            Some(IdKind::All)
        } else {
            decode_hex::<i32>(bytes).ok().map(IdKind::from_raw)
        }
    }

    pub fn matches(&self, other: &IdKind) -> bool {
        match (self, &other) {
            (IdKind::All, _) => true,
            (IdKind::Any, _) => true,
            (IdKind::Id(pid1), IdKind::Id(pid2)) => pid1 == pid2,
            (IdKind::Id(_), _) => other.matches(self),
        }
    }
}

/// Operation an `H` packet selects a thread for.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ThreadOp {
    /// `Hc`, deprecated in favour of `vCont`.
    Continue,
    /// `Hg` and the legacy `HG`, `Hm`, `HM`: registers and memory.
    General,
}

/// Thread id as sent by the client: `p<pid>.<tid>` when the multiprocess
/// extension is in use, a bare `<tid>` otherwise.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ThreadId {
    pub pid: IdKind,
    pub tid: IdKind,
}

impl ThreadId {
    pub fn all() -> Self {
        ThreadId {
            tid: IdKind::All,
            pid: IdKind::All,
        }
    }

    pub fn any() -> Self {
        ThreadId {
            tid: IdKind::Any,
            pid: IdKind::Any,
        }
    }

    pub fn pid(pid: i32) -> Self {
        ThreadId {
            tid: IdKind::All,
            pid: IdKind::from_raw(pid),
        }
    }

    pub fn pid_tid(pid: i32, tid: i32) -> Self {
        ThreadId {
            pid: IdKind::from_raw(pid),
            tid: IdKind::from_raw(tid),
        }
    }

    pub fn tid(tid: i32) -> Self {
        ThreadId {
            pid: IdKind::Any,
            tid: IdKind::from_raw(tid),
        }
    }

    // NB: Specifying just a process, as ‘ppid’, is equivalent to ‘ppid.-1’.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match bytes.strip_prefix(b"p") {
            Some(rest) => {
                let mut iter = rest.splitn(2, |c| *c == b'.');
                let p = iter.next().and_then(IdKind::decode)?;
                match iter.next() {
                    Some(t) => Some(ThreadId {
                        pid: p,
                        tid: IdKind::decode(t)?,
                    }),
                    None => Some(ThreadId {
                        pid: p,
                        tid: IdKind::All,
                    }),
                }
            }
            None => Some(ThreadId {
                pid: IdKind::Any,
                tid: IdKind::decode(bytes)?,
            }),
        }
    }

    /// Check if `tid` matches `ThreadId`.
    pub fn matches(&self, other: &ThreadId) -> bool {
        self.pid.matches(&other.pid) && self.tid.matches(&other.tid)
    }

    pub fn getpid(&self) -> Option<Pid> {
        let id = self.pid.into_raw();
        if id > 0 { Some(Pid::from_raw(id)) } else { None }
    }

    pub fn gettid(&self) -> Option<Pid> {
        let id = self.tid.into_raw();
        if id > 0 { Some(Pid::from_raw(id)) } else { None }
    }
}

/// Splits off the `;thread:<tid>;` suffix LLDB appends to register packets
/// once `QThreadSuffixSupported` is negotiated.
fn split_thread_suffix(bytes: &[u8]) -> Option<(&[u8], Option<ThreadId>)> {
    const SUFFIX: &[u8] = b";thread:";
    match bytes.windows(SUFFIX.len()).position(|w| w == SUFFIX) {
        Some(pos) => {
            let rest = &bytes[pos + SUFFIX.len()..];
            let rest = rest.strip_suffix(b";").unwrap_or(rest);
            Some((&bytes[..pos], Some(ThreadId::decode(rest)?)))
        }
        None => Some((bytes, None)),
    }
}

/// Parses `addr,length`.
fn decode_addr_len(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut iter = bytes.splitn(2, |c| *c == b',');
    let addr = iter.next().and_then(|x| decode_hex(x).ok())?;
    let length = iter.next().and_then(|x| decode_hex(x).ok())?;
    Some((addr, length))
}

/// Parses a `;`-separated list of `key:value` pairs.
fn decode_key_values(bytes: &[u8]) -> Option<Vec<(String, String)>> {
    bytes
        .split(|c| *c == b';')
        .filter(|kv| !kv.is_empty())
        .map(|kv| {
            let kv = std::str::from_utf8(kv).ok()?;
            let (k, v) = kv.split_once(':').unwrap_or((kv, ""));
            Some((k.to_owned(), v.to_owned()))
        })
        .collect()
}

macro_rules! commands {
    (
        $(#[$attrs:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$ext_attrs:meta])*
                $ext:ident {
                    $($name:literal => $command:ident,)*
                }
            )*
        }
    ) => {paste! {
        $(
            #[allow(non_camel_case_types)]
            #[derive(PartialEq, Debug)]
            $(#[$ext_attrs])*
            $vis enum [<$ext:camel>] {
                $($command(self::$ext::$command),)*
            }
        )*

        /// Remote protocol commands
        $(#[$attrs])*
        $vis enum $Name {
            $(
                [<$ext:camel>]([<$ext:camel>]),
            )*
            Unknown(Bytes),
        }

        impl Command {
            pub fn try_parse(
                mut buf: BytesMut
            ) -> Result<Command, CommandParseError> {
                if buf.is_empty() {
                    return Err(CommandParseError::Empty);
                }

                let body = buf.as_ref();

                $(
                    match body {
                        $(_ if body.starts_with($name.as_bytes()) => {
                            let nb = $name.len();
                            let cmd = self::$ext::$command::parse(buf.split_off(nb))
                                .ok_or(CommandParseError::MalformedCommand(String::from(concat!($name))))?;

                            return Ok(
                                Command::[<$ext:camel>](
                                    [<$ext:camel>]::$command(cmd)
                                )
                            )
                        })*
                        _ => {},
                    }
                )*

                Ok(Command::Unknown(buf.freeze()))
            }
        }
    }};
}

/// Command parse error
#[derive(Debug, PartialEq, Error)]
pub enum CommandParseError {
    /// Command is empty
    #[error("Command is empty")]
    Empty,

    /// Malformed command
    #[error("Malformed command: {}", .0)]
    MalformedCommand(String),
}

commands! {
    #[derive(PartialEq, Debug)]
    pub enum Command {
        platform {
            "qPlatform_shell:" => qPlatform_shell,
            "qPlatform_mkdir:" => qPlatform_mkdir,
            "qLaunchGDBServer" => qLaunchGDBServer,
            "qfProcessInfo" => qfProcessInfo,
            "qsProcessInfo" => qsProcessInfo,
            "qProcessInfoPID:" => qProcessInfoPID,
            "qUserName:" => qUserName,
            "qGroupName:" => qGroupName,
            "qGetWorkingDir" => qGetWorkingDir,
        }

        lldb {
            "qHostInfo" => qHostInfo,
            "qProcessInfo" => qProcessInfo,
            "qRegisterInfo" => qRegisterInfo,
            "qMemoryRegionInfo" => qMemoryRegionInfo,
            "qWatchpointSupportInfo" => qWatchpointSupportInfo,
            "qShlibInfoAddr" => qShlibInfoAddr,
            "qModuleInfo:" => qModuleInfo,
            "jThreadsInfo" => jThreadsInfo,
            "qThreadStopInfo" => qThreadStopInfo,
            "QThreadSuffixSupported" => QThreadSuffixSupported,
            "QListThreadsInStopReply" => QListThreadsInStopReply,
            "QEnableErrorStrings" => QEnableErrorStrings,
            "QSaveRegisterState" => QSaveRegisterState,
            "QRestoreRegisterState:" => QRestoreRegisterState,
            "_M" => _M,
            "_m" => _m,
            "x" => x,
            "qGDBServerVersion" => qGDBServerVersion,
            "QSetMaxPacketSize:" => QSetMaxPacketSize,
            "QSetMaxPayloadSize:" => QSetMaxPayloadSize,
            "QSetLogging:" => QSetLogging,
            "QSyncThreadState:" => QSyncThreadState,
            "QSetEnableAsyncProfiling;" => QSetEnableAsyncProfiling,
            "qGetProfileData" => qGetProfileData,
            "qVAttachOrWaitSupported" => qVAttachOrWaitSupported,
            "qLaunchSuccess" => qLaunchSuccess,
            "QLaunchArch:" => QLaunchArch,
            "QSetDisableASLR:" => QSetDisableASLR,
            "QSetSTD" => QSetSTD,
            "A" => A,
        }

        extended_mode {
            "!" => ExclamationMark,
            "QDisableRandomization:" => QDisableRandomization,
            "QEnvironmentHexEncoded:" => QEnvironmentHexEncoded,
            "QEnvironment:" => QEnvironment,
            "QSetWorkingDir:" => QSetWorkingDir,
            "vRun;" => vRun,
            "vAttach" => vAttach,
            "R" => R,
            "r" => r,
        }

        monitor_cmd {
            "qRcmd," => qRcmd,
        }

        base {
            "?" => QuestionMark,
            "QStartNoAckMode" => QStartNoAckMode,
            "QThreadEvents:" => QThreadEvents,
            "QNonStop:" => QNonStop,
            "QAgent:" => QAgent,
            "QAllow:" => QAllow,
            "Qbtrace:" => Qbtrace,
            "QPassSignals:" => QPassSignals,
            "QProgramSignals:" => QProgramSignals,
            "qSupported" => qSupported,
            "qSymbol:" => qSymbol,
            "qAttached" => qAttached,
            "qOffsets" => qOffsets,
            "qCRC:" => qCRC,
            "qC" => qC,
            "qfThreadInfo" => qfThreadInfo,
            "qsThreadInfo" => qsThreadInfo,
            "qThreadExtraInfo," => qThreadExtraInfo,
            "qGetTLSAddr:" => qGetTLSAddr,
            "qGetTIBAddr:" => qGetTIBAddr,
            "qSearch:memory:" => qSearch,
            "qXfer:" => qXfer,
            "vCont" => vCont,
            "vKill;" => vKill,
            "vFile:" => vFile,
            "vFlash" => vFlash,
            "D" => D,
            "H" => H,
            "T" => T,
            "b" => b,
            "c" => c,
            "C" => C,
            "d" => d,
            "g" => g,
            "G" => G,
            "k" => k,
            "m" => m,
            "M" => M,
            "p" => p,
            "P" => P,
            "s" => s,
            "S" => S,
            "t" => t,
            "X" => X,
            "z" => z,
            "Z" => Z,
        }
    }
}

impl Command {
    /// Commands only the LLDB dialect understands.
    pub fn is_lldb_only(&self) -> bool {
        matches!(self, Command::Platform(_) | Command::Lldb(_))
    }

    /// Commands that let the target run until its next stop.
    pub fn is_resume(&self) -> bool {
        matches!(
            self,
            Command::Base(
                Base::c(_) | Base::C(_) | Base::s(_) | Base::S(_) | Base::vCont(vCont::Actions(_))
            )
        )
    }
}

/// Resume actions set by vCont.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ResumeAction {
    /// single step, with optional signal.
    Step(Option<i32>),
    /// continue, with optional signal.
    Continue(Option<i32>),
    /// Stop the thread.
    Stop,
    /// Keep stepping until pc doesn't belong to start..end.
    StepUntil(u64, u64),
}

/// One `action:thread` pair of a resume request. A missing thread applies
/// the action to every thread without an explicit one.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct ThreadResumeAction {
    pub action: ResumeAction,
    pub thread: ThreadId,
    /// Resume address, for `c addr` / `s addr`.
    pub address: Option<u64>,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BreakpointType {
    Software = 0,
    Hardware,
    WriteWatch,
    ReadWatch,
    AccessWatch,
}

impl BreakpointType {
    pub fn new(ty: u8) -> Option<Self> {
        match ty {
            0 => Some(BreakpointType::Software),
            1 => Some(BreakpointType::Hardware),
            2 => Some(BreakpointType::WriteWatch),
            3 => Some(BreakpointType::ReadWatch),
            4 => Some(BreakpointType::AccessWatch),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_vcont_test() {
        let vcont = vCont::parse(BytesMut::from(";s:p3e86d3.3e86d3;c:p3e86d3.-1"));
        assert!(vcont.is_some());

        let vcont = vCont::parse(BytesMut::from(";c:p2.-1"));
        assert!(vcont.is_some());
    }

    #[test]
    fn unknown_command() {
        let mut packet = BytesMut::from("just,an,unknown,command");
        let cmd = Command::try_parse(packet.split());
        assert!(matches!(cmd, Ok(Command::Unknown(_))));
    }

    #[test]
    fn malformed_command() {
        let mut packet = BytesMut::from("vCont,Just a bad command;c:1.-1");
        let cmd = Command::try_parse(packet.split());
        assert_eq!(
            cmd,
            Err::<Command, CommandParseError>(CommandParseError::MalformedCommand(String::from(
                "vCont"
            )))
        );
    }

    #[test]
    fn prefixes_resolve_to_the_longest_command() {
        assert!(matches!(
            Command::try_parse(BytesMut::from("qCRC:1000,10")),
            Ok(Command::Base(Base::qCRC(_)))
        ));
        assert!(matches!(
            Command::try_parse(BytesMut::from("qC")),
            Ok(Command::Base(Base::qC(_)))
        ));
        assert!(matches!(
            Command::try_parse(BytesMut::from("qProcessInfoPID:12")),
            Ok(Command::Platform(Platform::qProcessInfoPID(_)))
        ));
        assert!(matches!(
            Command::try_parse(BytesMut::from("qProcessInfo")),
            Ok(Command::Lldb(Lldb::qProcessInfo(_)))
        ));
        assert!(matches!(
            Command::try_parse(BytesMut::from("QEnvironmentHexEncoded:413d31")),
            Ok(Command::ExtendedMode(ExtendedMode::QEnvironmentHexEncoded(_)))
        ));
    }

    #[test]
    fn resumes() {
        for packet in ["c", "C05", "s", "S0b;1000", "vCont;c:p1.-1"] {
            assert!(
                Command::try_parse(BytesMut::from(packet)).unwrap().is_resume(),
                "{}",
                packet
            );
        }
        for packet in ["vCont?", "g", "qC", "k"] {
            assert!(!Command::try_parse(BytesMut::from(packet)).unwrap().is_resume());
        }
    }

    #[test]
    fn thread_ids() {
        assert_eq!(ThreadId::decode(b"p1a.1b"), Some(ThreadId::pid_tid(0x1a, 0x1b)));
        assert_eq!(ThreadId::decode(b"p1a"), Some(ThreadId::pid(0x1a)));
        assert_eq!(ThreadId::decode(b"-1"), Some(ThreadId::tid(-1)));
        assert_eq!(ThreadId::decode(b"0"), Some(ThreadId::any()));
        assert_eq!(ThreadId::decode(b"p-1.-1"), Some(ThreadId::all()));
        assert_eq!(ThreadId::decode(b"zz"), None);
        assert_eq!(ThreadId::decode(b"2a").and_then(|t| t.gettid()), Some(Pid::from_raw(0x2a)));
    }

    #[test]
    fn thread_suffix() {
        assert_eq!(
            split_thread_suffix(b"10;thread:2a;"),
            Some((&b"10"[..], Some(ThreadId::tid(0x2a))))
        );
        assert_eq!(split_thread_suffix(b"10"), Some((&b"10"[..], None)));
        assert_eq!(split_thread_suffix(b";thread:zz;"), None);
    }
}
