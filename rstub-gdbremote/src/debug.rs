/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The delegate behind the `gdbserver` and `slave` run modes: one debugged
//! process, driven through [`Process`].

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use rstub_target::Address;
use rstub_target::Architecture;
use rstub_target::CpuState;
use rstub_target::CpuType;
use rstub_target::ErrorCode;
use rstub_target::Interrupt;
use rstub_target::LaunchInfo;
use rstub_target::MemoryRegionInfo;
use rstub_target::Pid;
use rstub_target::Process;
use rstub_target::ProcessInfo;
use rstub_target::Protection;
use rstub_target::Spawner;
use rstub_target::StopInfo;
use rstub_target::StopReason;
use rstub_target::Thread;
use rstub_target::ThreadState;
use rstub_target::Transition;
use rstub_target::breakpoint::Lifetime;
use rstub_target::breakpoint::Mode;
use rstub_util::LogControl;

use crate::SessionDelegate;
use crate::SessionState;
use crate::commands::AttachTarget;
use crate::commands::AttachWait;
use crate::commands::Breakpoint;
use crate::commands::BreakpointType;
use crate::commands::Feature;
use crate::commands::OpenFlags;
use crate::commands::ProcessQuery;
use crate::commands::QSetLogging;
use crate::commands::ResumeAction;
use crate::commands::ThreadResumeAction;
use crate::host;
use crate::host::HostIo;
use crate::stop_reply::StopCode;
use crate::types::FileStat;
use crate::types::HostInfo;
use crate::types::ModuleInfo;
use crate::types::RegisterInfo;
use crate::types::ServerVersion;
use crate::types::XferChunk;

const ATTACH_WAIT_POLL: Duration = Duration::from_millis(100);
const ATTACH_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Bytes read at a time by `qSearch:memory`.
const SEARCH_CHUNK: usize = 0x10000;

/// How far back `t` looks for its pattern.
const SEARCH_BACKWARD_WINDOW: u64 = 0x10000;

const PAGE_SIZE: u64 = 0x1000;

// Linux comm names are cut at 15 bytes.
const COMM_LEN: usize = 15;

const AT_PHDR: u64 = 3;
const AT_PHNUM: u64 = 5;
const PT_DYNAMIC: u32 = 2;
const PT_PHDR: u32 = 6;
const DT_NULL: u64 = 0;
const DT_DEBUG: u64 = 21;
const PHDR_SIZE: usize = 56;
const DYN_SIZE: usize = 16;

const MONITOR_HELP: &str = "\
monitor commands:
  set debug on|off          debug level logging
  set remote-debug on|off   log every packet
  log <directives>          replace the log filter
  info log                  show the log filter
  help                      this text
";

/// What a resume request boils down to for an all-stop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Continue {
        tid: Option<Pid>,
        signal: Option<i32>,
        address: Option<u64>,
    },
    Step {
        tid: Option<Pid>,
        signal: Option<i32>,
        address: Option<u64>,
    },
    Range {
        tid: Option<Pid>,
        start: u64,
        end: u64,
    },
}

impl Plan {
    /// A step wins over a continue; thread-less actions apply to the
    /// current thread.
    fn new(actions: &[ThreadResumeAction]) -> Result<Self, ErrorCode> {
        let stepping = actions
            .iter()
            .find(|a| matches!(a.action, ResumeAction::Step(_) | ResumeAction::StepUntil(..)));
        if let Some(a) = stepping {
            let tid = a.thread.gettid();
            return Ok(match a.action {
                ResumeAction::StepUntil(start, end) => Plan::Range { tid, start, end },
                ResumeAction::Step(signal) => Plan::Step {
                    tid,
                    signal,
                    address: a.address,
                },
                _ => unreachable!(),
            });
        }
        actions
            .iter()
            .find_map(|a| match a.action {
                ResumeAction::Continue(signal) => Some(Plan::Continue {
                    tid: a.thread.gettid(),
                    signal,
                    address: a.address,
                }),
                _ => None,
            })
            .ok_or(ErrorCode::InvalidArgument)
    }
}

/// Session delegate that debugs one process at a time.
///
/// The process outlives connections: a keep-alive server hands the same
/// delegate to every new session.
pub struct DebugSession {
    spawner: Box<dyn Spawner>,
    process: Option<Process>,
    /// Built up by the launch packets, consumed by `A` and `vRun`.
    launch: LaunchInfo,
    /// Outcome of the last `A`, for `qLaunchSuccess`.
    launch_error: Option<ErrorCode>,
    saved_registers: HashMap<u64, (Pid, CpuState)>,
    next_save_id: u64,
    pass_signals: HashSet<i32>,
    files: HostIo,
    log: Option<LogControl>,
}

impl DebugSession {
    pub fn new(spawner: Box<dyn Spawner>) -> Self {
        DebugSession {
            spawner,
            process: None,
            launch: LaunchInfo::default(),
            launch_error: None,
            saved_registers: HashMap::new(),
            next_save_id: 1,
            pass_signals: HashSet::new(),
            files: HostIo::new(),
            log: None,
        }
    }

    /// Lets the client change logging with `QSetLogging`, `d` and `monitor`.
    pub fn with_log_control(mut self, log: LogControl) -> Self {
        self.log = Some(log);
        self
    }

    /// Settings applied to every program this session launches.
    pub fn launch_info_mut(&mut self) -> &mut LaunchInfo {
        &mut self.launch
    }

    pub fn process(&self) -> Option<&Process> {
        self.process.as_ref()
    }

    /// True while there is a live process to debug.
    pub fn has_process(&self) -> bool {
        self.process.as_ref().is_some_and(Process::is_alive)
    }

    /// Starts `program` stopped at its first instruction.
    pub fn launch(&mut self, program: &Path, args: &[String]) -> Result<StopCode, ErrorCode> {
        self.check_no_process()?;
        self.launch.program = program.to_owned();
        self.launch.args = args.to_vec();
        tracing::info!("Launching {:?} {:?}", self.launch.program, self.launch.args);
        let process = Process::create(self.spawner.as_mut(), &self.launch)?;
        self.adopt(process)
    }

    pub fn attach(&mut self, pid: Pid) -> Result<StopCode, ErrorCode> {
        self.check_no_process()?;
        tracing::info!("Attaching to {}", pid);
        let process = Process::attach(self.spawner.as_mut(), pid)?;
        self.adopt(process)
    }

    /// Attaches to a process by name, waiting for it to show up as asked.
    pub fn attach_by_name(&mut self, name: &str, wait: AttachWait) -> Result<StopCode, ErrorCode> {
        let pid = find_process(name, wait)?;
        self.attach(pid)
    }

    fn adopt(&mut self, process: Process) -> Result<StopCode, ErrorCode> {
        self.saved_registers.clear();
        self.process = Some(process);
        self.stop_code(None)
    }

    fn check_no_process(&self) -> Result<(), ErrorCode> {
        if self.has_process() {
            Err(ErrorCode::AlreadyExist)
        } else {
            Ok(())
        }
    }

    fn process_mut(&mut self) -> Result<&mut Process, ErrorCode> {
        self.process.as_mut().ok_or(ErrorCode::ProcessNotFound)
    }

    fn arch(&self) -> &'static Architecture {
        match &self.process {
            Some(process) => process.arch(),
            None => Architecture::native().unwrap_or(&Architecture::X86_64),
        }
    }

    fn thread_or_current(&mut self, tid: Option<Pid>) -> Result<Pid, ErrorCode> {
        let process = self.process_mut()?;
        match tid {
            Some(tid) => Ok(tid),
            None => process
                .current_thread()
                .map(Thread::tid)
                .ok_or(ErrorCode::ProcessNotFound),
        }
    }

    /// The stop reply for `tid`, or for the current thread. A dead process
    /// reports how it ended.
    fn stop_code(&mut self, tid: Option<Pid>) -> Result<StopCode, ErrorCode> {
        let process = self.process_mut()?;
        let pid = process.pid();
        if !process.is_alive() {
            let info = process
                .threads()
                .next()
                .map(|t| t.stop_info.clone())
                .unwrap_or_else(|| StopInfo::exited(0));
            return Ok(StopCode::new(info, pid, None));
        }

        let tid = match tid {
            Some(tid) => tid,
            None => process
                .current_thread()
                .map(Thread::tid)
                .ok_or(ErrorCode::ProcessNotFound)?,
        };
        let info = process
            .thread(tid)
            .map(|t| t.stop_info.clone())
            .ok_or(ErrorCode::NotFound)?;

        let mut code = StopCode::new(info, pid, Some(tid));
        code.threads = process.thread_ids();
        let regs = process.read_registers(tid)?;
        let arch = process.arch();
        for regno in [arch.pc, arch.sp, arch.fp] {
            code.registers.push((regno, regs.register_bytes(regno)?));
        }
        Ok(code)
    }

    fn set_pc(process: &mut Process, tid: Pid, pc: u64) -> Result<(), ErrorCode> {
        let mut regs = process.read_registers(tid)?;
        regs.set_pc(pc);
        process.write_registers(tid, &regs)
    }

    fn run(&mut self, plan: Plan) -> Result<Transition, ErrorCode> {
        let pass_signals = self.pass_signals.clone();
        let process = self.process_mut()?;
        match plan {
            Plan::Step {
                tid,
                signal,
                address,
            } => {
                let tid = match tid {
                    Some(tid) => tid,
                    None => process
                        .current_thread()
                        .map(Thread::tid)
                        .ok_or(ErrorCode::ProcessNotFound)?,
                };
                if let Some(pc) = address {
                    Self::set_pc(process, tid, pc)?;
                }
                process.resume(Some(tid), signal)
            }
            Plan::Range { tid, start, end } => {
                let tid = match tid {
                    Some(tid) => tid,
                    None => process
                        .current_thread()
                        .map(Thread::tid)
                        .ok_or(ErrorCode::ProcessNotFound)?,
                };
                loop {
                    let transition = process.resume(Some(tid), None)?;
                    let stepped = transition == Transition::Stopped(tid)
                        && process.thread(tid).map(|t| t.state) == Some(ThreadState::Stepped);
                    if !stepped {
                        return Ok(transition);
                    }
                    let pc = process.read_registers(tid)?.pc();
                    if pc < start || pc >= end {
                        return Ok(transition);
                    }
                }
            }
            Plan::Continue {
                tid,
                signal,
                address,
            } => {
                if let Some(tid) = tid {
                    process.set_current_thread(tid)?;
                }
                if let Some(pc) = address {
                    let tid = process
                        .current_thread()
                        .map(Thread::tid)
                        .ok_or(ErrorCode::ProcessNotFound)?;
                    Self::set_pc(process, tid, pc)?;
                }
                let mut signal = signal;
                loop {
                    let transition = process.resume(None, signal)?;
                    let Transition::Stopped(tid) = transition else {
                        return Ok(transition);
                    };
                    let passed = process.thread(tid).and_then(|t| {
                        (t.stop_info.reason == StopReason::Signal
                            && pass_signals.contains(&t.stop_info.signal))
                        .then_some(t.stop_info.signal)
                    });
                    match passed {
                        Some(sig) => {
                            tracing::debug!("passing signal {} to {}", sig, tid);
                            signal = Some(sig);
                        }
                        None => return Ok(transition),
                    }
                }
            }
        }
    }

    fn kill(&mut self) -> Result<StopCode, ErrorCode> {
        let process = self.process_mut()?;
        if process.is_alive() {
            process.terminate()?;
        }
        let code = self.stop_code(None);
        self.process = None;
        self.saved_registers.clear();
        code
    }

    fn log_control(&self) -> Result<&LogControl, ErrorCode> {
        self.log.as_ref().ok_or(ErrorCode::Unsupported)
    }

    fn configure_logging(&self, debug: bool, remote: bool) -> Result<(), ErrorCode> {
        self.log_control()?
            .configure(debug, remote)
            .map_err(|err| {
                tracing::warn!("logging not changed: {}", err);
                ErrorCode::InvalidArgument
            })
    }

    fn monitor(&mut self, command: &str) -> Result<String, ErrorCode> {
        let words: Vec<&str> = command.split_whitespace().collect();
        let on = |word: &str| match word {
            "on" | "1" => Ok(true),
            "off" | "0" => Ok(false),
            _ => Err(ErrorCode::InvalidArgument),
        };
        match words.as_slice() {
            ["help"] => Ok(MONITOR_HELP.to_owned()),
            ["set", "debug", value] => {
                let remote = self.log_control()?.is_remote();
                self.configure_logging(on(value)?, remote)?;
                Ok(String::new())
            }
            ["set", "remote-debug", value] => {
                let debug = self.log_control()?.is_debug();
                self.configure_logging(debug, on(value)?)?;
                Ok(String::new())
            }
            ["log", directives] => {
                self.log_control()?.set_filter(directives).map_err(|err| {
                    tracing::warn!("bad log filter {:?}: {}", directives, err);
                    ErrorCode::InvalidArgument
                })?;
                Ok(String::new())
            }
            ["info", "log"] => Ok(format!("{}\n", self.log_control()?.directives())),
            _ => Err(ErrorCode::Unsupported),
        }
    }

    fn libraries_svr4(&mut self) -> Result<Vec<u8>, ErrorCode> {
        let mut xml = String::from("<library-list-svr4 version=\"1.0\">");
        for lib in self.process_mut()?.shared_libraries()? {
            if lib.main {
                continue;
            }
            let _ = write!(
                xml,
                "<library name=\"{}\" lm=\"{:#x}\" l_addr=\"{:#x}\" l_ld=\"0x0\"/>",
                xml_escape(&lib.path),
                lib.base.value(),
                lib.base.value()
            );
        }
        xml.push_str("</library-list-svr4>");
        Ok(xml.into_bytes())
    }

    fn threads_xml(&mut self, state: &SessionState) -> Result<Vec<u8>, ErrorCode> {
        let process = self.process_mut()?;
        let pid = process.pid();
        let mut xml = String::from("<threads>");
        for thread in process.threads().filter(|t| t.is_alive()) {
            let id = if state.multiprocess() {
                format!("p{:x}.{:x}", pid.as_raw(), thread.tid().as_raw())
            } else {
                format!("{:x}", thread.tid().as_raw())
            };
            let _ = write!(xml, "<thread id=\"{}\"/>", id);
        }
        xml.push_str("</threads>");
        Ok(xml.into_bytes())
    }

    /// Finds `r_debug` through the `DT_DEBUG` entry of the main executable's
    /// dynamic section.
    fn r_debug_address(&mut self) -> Result<Address, ErrorCode> {
        let process = self.process_mut()?;
        if process.arch().pointer_size != 8 {
            return Err(ErrorCode::Unsupported);
        }
        let auxv = process.backend().auxv()?;
        let entries: HashMap<u64, u64> = auxv
            .chunks_exact(16)
            .filter_map(|c| Some((le_u64(c, 0)?, le_u64(c, 8)?)))
            .collect();
        let phdr = *entries.get(&AT_PHDR).ok_or(ErrorCode::NotFound)?;
        let phnum = *entries.get(&AT_PHNUM).ok_or(ErrorCode::NotFound)? as usize;

        let table = process.read_memory(Address::new(phdr), phnum * PHDR_SIZE)?;
        let mut bias = 0;
        let mut dynamic = None;
        for header in table.chunks_exact(PHDR_SIZE) {
            let kind = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let vaddr = le_u64(header, 16).ok_or(ErrorCode::InvalidArgument)?;
            let memsz = le_u64(header, 40).ok_or(ErrorCode::InvalidArgument)?;
            match kind {
                PT_PHDR => bias = phdr.wrapping_sub(vaddr),
                PT_DYNAMIC => dynamic = Some((vaddr, memsz)),
                _ => {}
            }
        }
        let (vaddr, memsz) = dynamic.ok_or(ErrorCode::NotFound)?;

        let section = process.read_memory(Address::new(bias.wrapping_add(vaddr)), memsz as usize)?;
        for entry in section.chunks_exact(DYN_SIZE) {
            match le_u64(entry, 0) {
                Some(DT_NULL) | None => break,
                Some(DT_DEBUG) => {
                    return match le_u64(entry, 8) {
                        Some(0) | None => Err(ErrorCode::NotFound),
                        Some(addr) => Ok(Address::new(addr)),
                    };
                }
                Some(_) => {}
            }
        }
        Err(ErrorCode::NotFound)
    }
}

fn le_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let word = bytes.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(word.try_into().ok()?))
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Target description for `qXfer:features:read:target.xml`.
fn target_xml(arch: &Architecture) -> String {
    let feature = match arch.cpu {
        CpuType::Arm64 | CpuType::Arm => "org.gnu.gdb.aarch64.core",
        CpuType::X86_64 | CpuType::X86 => "org.gnu.gdb.i386.core",
    };
    let mut xml = String::from("<?xml version=\"1.0\"?><!DOCTYPE target SYSTEM \"gdb-target.dtd\">");
    let _ = write!(
        xml,
        "<target version=\"1.0\"><architecture>{}</architecture><feature name=\"{}\">",
        arch.gdb_arch, feature
    );
    for (regno, reg) in arch.registers.iter().enumerate() {
        let ty = if regno == arch.pc {
            "code_ptr"
        } else if regno == arch.sp || regno == arch.fp {
            "data_ptr"
        } else {
            "int"
        };
        let _ = write!(
            xml,
            "<reg name=\"{}\" bitsize=\"{}\" type=\"{}\" regnum=\"{}\"/>",
            reg.name, reg.bits, ty, regno
        );
    }
    xml.push_str("</feature></target>");
    xml
}

fn find_process(name: &str, wait: AttachWait) -> Result<Pid, ErrorCode> {
    let query = ProcessQuery {
        name: Some(name.chars().take(COMM_LEN).collect()),
        ..Default::default()
    };
    let ours = nix::unistd::getpid().as_raw();
    let existing: Vec<i32> = host::process_list(&query)?
        .into_iter()
        .map(|info| info.pid)
        .filter(|pid| *pid != ours)
        .collect();

    if wait != AttachWait::Always {
        if let Some(pid) = existing.iter().max() {
            return Ok(Pid::from_raw(*pid));
        }
        if wait == AttachWait::No {
            return Err(ErrorCode::ProcessNotFound);
        }
    }

    tracing::info!("Waiting for a process named {:?}", name);
    let deadline = Instant::now() + ATTACH_WAIT_TIMEOUT;
    while Instant::now() < deadline {
        thread::sleep(ATTACH_WAIT_POLL);
        let found = host::process_list(&query)?
            .into_iter()
            .map(|info| info.pid)
            .find(|pid| *pid != ours && !existing.contains(pid));
        if let Some(pid) = found {
            return Ok(Pid::from_raw(pid));
        }
    }
    Err(ErrorCode::ProcessNotFound)
}

impl SessionDelegate for DebugSession {
    fn interrupter(&self) -> Option<Arc<dyn Interrupt>> {
        self.process
            .as_ref()
            .filter(|p| p.is_alive())
            .map(Process::interrupter)
    }

    fn on_enable_extended_mode(&mut self, _state: &mut SessionState) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn on_toggle_debug_flag(&mut self, _state: &mut SessionState) -> Result<(), ErrorCode> {
        let on = self.log_control()?.toggle_debug().map_err(|err| {
            tracing::warn!("logging not changed: {}", err);
            ErrorCode::Unknown
        })?;
        tracing::info!("debug logging {}", if on { "on" } else { "off" });
        Ok(())
    }

    fn on_set_max_packet_size(
        &mut self,
        _state: &mut SessionState,
        _size: usize,
    ) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn on_set_max_payload_size(
        &mut self,
        _state: &mut SessionState,
        _size: usize,
    ) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn on_set_logging(
        &mut self,
        _state: &mut SessionState,
        settings: &QSetLogging,
    ) -> Result<(), ErrorCode> {
        self.configure_logging(settings.wants_debug(), settings.wants_packets())
    }

    fn on_query_supported(&mut self, _state: &mut SessionState) -> Result<Vec<Feature>, ErrorCode> {
        Ok([
            "swbreak",
            "hwbreak",
            "qXfer:features:read",
            "qXfer:auxv:read",
            "qXfer:libraries-svr4:read",
            "qXfer:threads:read",
            "QPassSignals",
            "QDisableRandomization",
            "QEnvironment",
            "QEnvironmentHexEncoded",
        ]
        .into_iter()
        .map(Feature::supported)
        .collect())
    }

    fn on_execute_command(
        &mut self,
        _state: &mut SessionState,
        command: &str,
    ) -> Result<String, ErrorCode> {
        self.monitor(command)
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

    fn on_non_stop_mode(&mut self, _state: &mut SessionState, enable: bool) -> Result<(), ErrorCode> {
        if enable {
            Err(ErrorCode::Unsupported)
        } else {
            Ok(())
        }
    }

    fn on_pass_signals(
        &mut self,
        _state: &mut SessionState,
        signals: &[i32],
    ) -> Result<(), ErrorCode> {
        self.pass_signals = signals.iter().copied().collect();
        Ok(())
    }

    fn on_query_symbol(
        &mut self,
        _state: &mut SessionState,
        _name: Option<&str>,
        _value: Option<u64>,
    ) -> Result<Option<String>, ErrorCode> {
        Ok(None)
    }

    fn on_query_register_info(
        &mut self,
        _state: &mut SessionState,
        regno: usize,
    ) -> Result<RegisterInfo, ErrorCode> {
        RegisterInfo::new(self.arch(), regno).ok_or(ErrorCode::NotFound)
    }

    fn on_attach(
        &mut self,
        _state: &mut SessionState,
        target: &AttachTarget,
    ) -> Result<StopCode, ErrorCode> {
        match target {
            AttachTarget::Pid(pid) => self.attach(*pid),
            AttachTarget::Name { name, wait } => self.attach_by_name(name, *wait),
        }
    }

    fn on_run_attach(
        &mut self,
        _state: &mut SessionState,
        program: Option<&Path>,
        args: &[String],
    ) -> Result<StopCode, ErrorCode> {
        let program = match program {
            Some(program) => program.to_owned(),
            None if !self.launch.program.as_os_str().is_empty() => self.launch.program.clone(),
            None => return Err(ErrorCode::InvalidArgument),
        };
        self.launch(&program, args)
    }

    fn on_detach(&mut self, _state: &mut SessionState, pid: Option<Pid>) -> Result<(), ErrorCode> {
        let process = self.process_mut()?;
        if pid.is_some_and(|pid| pid != process.pid()) {
            return Err(ErrorCode::ProcessNotFound);
        }
        process.detach()?;
        tracing::info!("Detached from {}", process.pid());
        self.process = None;
        self.saved_registers.clear();
        Ok(())
    }

    fn on_query_attached(
        &mut self,
        _state: &mut SessionState,
        pid: Option<Pid>,
    ) -> Result<bool, ErrorCode> {
        let process = self.process_mut()?;
        if pid.is_some_and(|pid| pid != process.pid()) {
            return Err(ErrorCode::ProcessNotFound);
        }
        Ok(process.is_attached())
    }

    fn on_query_process_info(
        &mut self,
        _state: &mut SessionState,
    ) -> Result<ProcessInfo, ErrorCode> {
        self.process_mut()?.info().cloned()
    }

    fn on_restart(&mut self, _state: &mut SessionState) -> Result<(), ErrorCode> {
        if self.launch.program.as_os_str().is_empty() {
            return Err(ErrorCode::InvalidArgument);
        }
        if self.has_process() {
            self.kill()?;
        }
        let program = self.launch.program.clone();
        let args = self.launch.args.clone();
        self.launch(&program, &args).map(|_| ())
    }

    fn on_interrupt(&mut self, _state: &mut SessionState) -> Result<(), ErrorCode> {
        // Already stopped.
        Ok(())
    }

    fn on_terminate_thread(&mut self, _state: &mut SessionState) -> Result<StopCode, ErrorCode> {
        self.kill()
    }

    fn on_terminate(&mut self, _state: &mut SessionState, pid: Pid) -> Result<StopCode, ErrorCode> {
        if self.process_mut()?.pid() != pid {
            return Err(ErrorCode::ProcessNotFound);
        }
        self.kill()
    }

    fn on_query_thread_stop_info(
        &mut self,
        _state: &mut SessionState,
        tid: Option<Pid>,
    ) -> Result<StopCode, ErrorCode> {
        self.stop_code(tid)
    }

    fn on_query_threads_info(
        &mut self,
        _state: &mut SessionState,
    ) -> Result<Vec<StopCode>, ErrorCode> {
        let tids = self.process_mut()?.thread_ids();
        tids.into_iter().map(|tid| self.stop_code(Some(tid))).collect()
    }

    fn on_query_thread_list(
        &mut self,
        _state: &mut SessionState,
    ) -> Result<Vec<(Pid, Pid)>, ErrorCode> {
        let Some(process) = self.process.as_ref().filter(|p| p.is_alive()) else {
            return Ok(Vec::new());
        };
        let pid = process.pid();
        Ok(process
            .threads()
            .filter(|t| t.is_alive())
            .map(|t| (pid, t.tid()))
            .collect())
    }

    fn on_query_current_thread(
        &mut self,
        _state: &mut SessionState,
    ) -> Result<(Pid, Pid), ErrorCode> {
        let process = self.process_mut()?;
        let tid = process
            .current_thread()
            .map(Thread::tid)
            .ok_or(ErrorCode::ProcessNotFound)?;
        Ok((process.pid(), tid))
    }

    fn on_thread_is_alive(&mut self, _state: &mut SessionState, tid: Pid) -> Result<(), ErrorCode> {
        match self.process_mut()?.thread(tid) {
            Some(thread) if thread.is_alive() => Ok(()),
            _ => Err(ErrorCode::NotFound),
        }
    }

    fn on_query_thread_info(
        &mut self,
        _state: &mut SessionState,
        tid: Pid,
    ) -> Result<String, ErrorCode> {
        let thread = self.process_mut()?.thread(tid).ok_or(ErrorCode::NotFound)?;
        Ok(format!("{:?}", thread.state))
    }

    fn on_query_hardware_watchpoint_count(
        &mut self,
        _state: &mut SessionState,
    ) -> Result<usize, ErrorCode> {
        Ok(match &self.process {
            Some(process) => process.hardware_slot_count(),
            None => self.arch().hardware_slots,
        })
    }

    fn on_query_shared_libraries_info_address(
        &mut self,
        _state: &mut SessionState,
    ) -> Result<Address, ErrorCode> {
        self.r_debug_address()
    }

    fn on_query_shared_library_info(
        &mut self,
        _state: &mut SessionState,
        path: &Path,
        triple: &str,
    ) -> Result<ModuleInfo, ErrorCode> {
        module_info(&self.files, path, triple)
    }

    fn on_resume(
        &mut self,
        _state: &mut SessionState,
        actions: &[ThreadResumeAction],
    ) -> Result<StopCode, ErrorCode> {
        let plan = Plan::new(actions)?;
        tracing::debug!("resuming: {:?}", plan);
        match self.run(plan)? {
            Transition::Stopped(tid) => self.stop_code(Some(tid)),
            _ => self.stop_code(None),
        }
    }

    fn on_read_general_registers(
        &mut self,
        _state: &mut SessionState,
        tid: Option<Pid>,
    ) -> Result<Vec<u8>, ErrorCode> {
        let tid = self.thread_or_current(tid)?;
        Ok(self.process_mut()?.read_registers(tid)?.to_bytes())
    }

    fn on_write_general_registers(
        &mut self,
        _state: &mut SessionState,
        tid: Option<Pid>,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        let tid = self.thread_or_current(tid)?;
        let process = self.process_mut()?;
        let mut regs = process.read_registers(tid)?;
        regs.update_from_bytes(data)?;
        process.write_registers(tid, &regs)
    }

    fn on_save_registers(
        &mut self,
        _state: &mut SessionState,
        tid: Option<Pid>,
    ) -> Result<u64, ErrorCode> {
        let tid = self.thread_or_current(tid)?;
        let regs = self.process_mut()?.read_registers(tid)?;
        let id = self.next_save_id;
        self.next_save_id += 1;
        self.saved_registers.insert(id, (tid, regs));
        Ok(id)
    }

    fn on_restore_registers(
        &mut self,
        _state: &mut SessionState,
        tid: Option<Pid>,
        id: u64,
    ) -> Result<(), ErrorCode> {
        let (saved_tid, regs) = self.saved_registers.remove(&id).ok_or(ErrorCode::NotFound)?;
        let tid = tid.unwrap_or(saved_tid);
        self.process_mut()?.write_registers(tid, &regs)
    }

    fn on_read_register_value(
        &mut self,
        _state: &mut SessionState,
        tid: Option<Pid>,
        regno: usize,
    ) -> Result<Vec<u8>, ErrorCode> {
        let tid = self.thread_or_current(tid)?;
        self.process_mut()?.read_registers(tid)?.register_bytes(regno)
    }

    fn on_write_register_value(
        &mut self,
        _state: &mut SessionState,
        tid: Option<Pid>,
        regno: usize,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        let tid = self.thread_or_current(tid)?;
        let process = self.process_mut()?;
        let mut regs = process.read_registers(tid)?;
        regs.set_register_bytes(regno, data)?;
        process.write_registers(tid, &regs)
    }

    fn on_read_memory(
        &mut self,
        _state: &mut SessionState,
        addr: Address,
        len: usize,
    ) -> Result<Vec<u8>, ErrorCode> {
        self.process_mut()?.read_memory(addr, len)
    }

    fn on_write_memory(
        &mut self,
        _state: &mut SessionState,
        addr: Address,
        data: &[u8],
    ) -> Result<usize, ErrorCode> {
        self.process_mut()?.write_memory(addr, data)
    }

    fn on_allocate_memory(
        &mut self,
        _state: &mut SessionState,
        size: usize,
        protection: Protection,
    ) -> Result<Address, ErrorCode> {
        self.process_mut()?.allocate_memory(size, protection)
    }

    fn on_deallocate_memory(
        &mut self,
        _state: &mut SessionState,
        addr: Address,
    ) -> Result<(), ErrorCode> {
        self.process_mut()?.deallocate_memory(addr)
    }

    fn on_query_memory_region_info(
        &mut self,
        _state: &mut SessionState,
        addr: Address,
    ) -> Result<MemoryRegionInfo, ErrorCode> {
        match self.process_mut()?.memory_region(addr) {
            Err(ErrorCode::NotFound) => Ok(MemoryRegionInfo {
                start: Address::new(addr.value() & !(PAGE_SIZE - 1)),
                length: PAGE_SIZE,
                protection: Protection::empty(),
                name: None,
            }),
            other => other,
        }
    }

    fn on_compute_crc(
        &mut self,
        _state: &mut SessionState,
        addr: Address,
        len: usize,
    ) -> Result<u32, ErrorCode> {
        let data = self.process_mut()?.read_memory(addr, len)?;
        if data.len() < len {
            return Err(ErrorCode::InvalidAddress);
        }
        Ok(host::crc32(&data, 0xffff_ffff))
    }

    fn on_search(
        &mut self,
        _state: &mut SessionState,
        addr: Address,
        len: usize,
        pattern: &[u8],
    ) -> Result<Option<Address>, ErrorCode> {
        if pattern.is_empty() || pattern.len() > len {
            return Ok(None);
        }
        let process = self.process_mut()?;
        let mut offset = 0;
        while offset + pattern.len() <= len {
            // Chunks overlap so that a match across a boundary is seen.
            let want = (SEARCH_CHUNK + pattern.len() - 1).min(len - offset);
            let chunk = process.read_memory(addr + offset as u64, want)?;
            if let Some(pos) = chunk.windows(pattern.len()).position(|w| w == pattern) {
                return Ok(Some(addr + (offset + pos) as u64));
            }
            if chunk.len() < want {
                break;
            }
            offset += SEARCH_CHUNK;
        }
        Ok(None)
    }

    fn on_search_backward(
        &mut self,
        _state: &mut SessionState,
        addr: Address,
        pattern: u32,
        mask: u32,
    ) -> Result<Address, ErrorCode> {
        let start = addr.value().saturating_sub(SEARCH_BACKWARD_WINDOW);
        let len = (addr.value() - start) as usize + 4;
        let data = self.process_mut()?.read_memory(Address::new(start), len)?;
        (0..data.len().saturating_sub(3))
            .rev()
            .find(|&i| {
                let word = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
                word & mask == pattern & mask
            })
            .map(|i| Address::new(start + i as u64))
            .ok_or(ErrorCode::NotFound)
    }

    fn on_insert_breakpoint(
        &mut self,
        _state: &mut SessionState,
        bkpt: &Breakpoint,
    ) -> Result<(), ErrorCode> {
        if !bkpt.conditions.is_empty() || !bkpt.commands.is_empty() {
            tracing::debug!("ignoring breakpoint conditions and commands");
        }
        let process = self.process_mut()?;
        let addr = Address::new(bkpt.addr);
        match hardware_mode(bkpt.ty) {
            None => {
                let (bpm, backend) = process.software_breakpoints();
                bpm.add(backend, addr, Lifetime::Permanent, bkpt.kind, Mode::EXEC)
            }
            Some(mode) => {
                let (bpm, backend) = process.hardware_breakpoints();
                bpm.add(backend, addr, Lifetime::Permanent, bkpt.kind, mode)
            }
        }
    }

    fn on_remove_breakpoint(
        &mut self,
        _state: &mut SessionState,
        bkpt: &Breakpoint,
    ) -> Result<(), ErrorCode> {
        let process = self.process_mut()?;
        let addr = Address::new(bkpt.addr);
        match hardware_mode(bkpt.ty) {
            None => {
                let (bpm, backend) = process.software_breakpoints();
                bpm.remove(backend, addr)
            }
            Some(mode) => {
                let (bpm, backend) = process.hardware_breakpoints();
                bpm.remove_mode(backend, addr, mode)
            }
        }
    }

    fn on_xfer_read(
        &mut self,
        state: &mut SessionState,
        object: &str,
        annex: &str,
        offset: u64,
        len: usize,
    ) -> Result<XferChunk, ErrorCode> {
        let data = match object {
            "features" if annex == "target.xml" => target_xml(self.arch()).into_bytes(),
            "features" => return Err(ErrorCode::NotFound),
            "auxv" => self.process_mut()?.backend().auxv()?,
            "libraries-svr4" => self.libraries_svr4()?,
            "threads" => self.threads_xml(state)?,
            _ => return Err(ErrorCode::Unsupported),
        };
        Ok(XferChunk::slice(&data, offset, len))
    }

    fn on_disable_aslr(&mut self, _state: &mut SessionState, disable: bool) -> Result<(), ErrorCode> {
        self.launch.disable_aslr = disable;
        Ok(())
    }

    fn on_set_environment_variable(
        &mut self,
        _state: &mut SessionState,
        key: &str,
        value: &str,
    ) -> Result<(), ErrorCode> {
        self.launch
            .env
            .insert(key.to_owned(), Some(value.to_owned()));
        Ok(())
    }

    fn on_set_working_directory(
        &mut self,
        _state: &mut SessionState,
        dir: &Path,
    ) -> Result<(), ErrorCode> {
        self.launch.working_dir = Some(dir.to_owned());
        Ok(())
    }

    fn on_set_std_file(
        &mut self,
        _state: &mut SessionState,
        fd: i32,
        path: &Path,
    ) -> Result<(), ErrorCode> {
        let slot = match fd {
            0 => &mut self.launch.stdin,
            1 => &mut self.launch.stdout,
            2 => &mut self.launch.stderr,
            _ => return Err(ErrorCode::InvalidArgument),
        };
        *slot = Some(path.to_owned());
        Ok(())
    }

    fn on_set_architecture(&mut self, _state: &mut SessionState, arch: &str) -> Result<(), ErrorCode> {
        let native = Architecture::native().ok_or(ErrorCode::Unsupported)?;
        let names: &[&str] = match native.cpu {
            CpuType::X86_64 => &["x86_64", "amd64", "i386:x86-64"],
            CpuType::Arm64 => &["arm64", "aarch64"],
            CpuType::X86 => &["i386", "i686"],
            CpuType::Arm => &["arm"],
        };
        let name = arch.split('-').next().unwrap_or(arch);
        if names.contains(&name) || arch == native.triple {
            Ok(())
        } else {
            Err(ErrorCode::InvalidArgument)
        }
    }

    fn on_set_program_arguments(
        &mut self,
        _state: &mut SessionState,
        args: &[String],
    ) -> Result<(), ErrorCode> {
        let (program, rest) = args.split_first().ok_or(ErrorCode::InvalidArgument)?;
        let result = self.launch(&PathBuf::from(program), rest).map(|_| ());
        self.launch_error = result.err();
        result
    }

    fn on_query_launch_success(&mut self, _state: &mut SessionState) -> Result<(), ErrorCode> {
        match self.launch_error {
            Some(err) => Err(err),
            None if self.has_process() => Ok(()),
            None => Err(ErrorCode::ProcessNotFound),
        }
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

/// `qModuleInfo` for a file on this host.
pub(crate) fn module_info(files: &HostIo, path: &Path, triple: &str) -> Result<ModuleInfo, ErrorCode> {
    let digest = files.md5(path)?;
    let md5 = digest.iter().fold(String::new(), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    });
    Ok(ModuleInfo {
        uuid: None,
        md5: Some(md5),
        triple: triple.to_owned(),
        file_path: path.to_string_lossy().into_owned(),
        file_offset: 0,
        file_size: files.size(path)?,
    })
}

/// Access mode of a `Z1`..`Z4` site; `None` for software breakpoints.
fn hardware_mode(ty: BreakpointType) -> Option<Mode> {
    match ty {
        BreakpointType::Software => None,
        BreakpointType::Hardware => Some(Mode::EXEC),
        BreakpointType::WriteWatch => Some(Mode::WRITE),
        BreakpointType::ReadWatch => Some(Mode::READ),
        BreakpointType::AccessWatch => Some(Mode::READ | Mode::WRITE),
    }
}

#[cfg(test)]
mod test {
    use rstub_target::testing::FakeMachine;

    use super::*;
    use crate::commands::ThreadId;

    fn action(action: ResumeAction, thread: ThreadId) -> ThreadResumeAction {
        ThreadResumeAction {
            action,
            thread,
            address: None,
        }
    }

    #[test]
    fn steps_win_over_continues() {
        let plan = Plan::new(&[
            action(ResumeAction::Continue(None), ThreadId::all()),
            action(ResumeAction::Step(Some(5)), ThreadId::tid(0x11)),
        ])
        .unwrap();
        assert_eq!(
            plan,
            Plan::Step {
                tid: Some(Pid::from_raw(0x11)),
                signal: Some(5),
                address: None
            }
        );
        assert_eq!(
            Plan::new(&[action(ResumeAction::Stop, ThreadId::all())]),
            Err(ErrorCode::InvalidArgument)
        );
    }

    #[test]
    fn target_description() {
        let xml = target_xml(&Architecture::X86_64);
        assert!(xml.contains("<architecture>i386:x86-64</architecture>"));
        assert!(xml.contains("<reg name=\"rip\" bitsize=\"64\" type=\"code_ptr\" regnum=\"16\"/>"));
        assert_eq!(xml.matches("<reg ").count(), Architecture::X86_64.registers.len());
    }

    #[test]
    fn launch_settings_reach_the_spawner() {
        let machine = FakeMachine::new(0x10);
        machine.map(0x1000, vec![0x90; 16], Protection::READ | Protection::EXECUTE);
        let mut session = DebugSession::new(Box::new(machine.spawner()));
        let mut state = SessionState::new(None);

        session
            .on_set_environment_variable(&mut state, "FOO", "bar")
            .unwrap();
        session
            .on_set_std_file(&mut state, 1, Path::new("/tmp/out"))
            .unwrap();
        session.on_disable_aslr(&mut state, true).unwrap();
        assert_eq!(
            session.on_set_std_file(&mut state, 7, Path::new("/tmp/x")),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(
            session.on_query_launch_success(&mut state),
            Err(ErrorCode::ProcessNotFound)
        );

        session
            .on_set_program_arguments(&mut state, &["/bin/true".to_owned(), "-x".to_owned()])
            .unwrap();
        session.on_query_launch_success(&mut state).unwrap();

        let launches = machine.launches();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].program, PathBuf::from("/bin/true"));
        assert_eq!(launches[0].args, vec!["-x".to_owned()]);
        assert_eq!(launches[0].env.get("FOO"), Some(&Some("bar".to_owned())));
        assert_eq!(launches[0].stdout, Some(PathBuf::from("/tmp/out")));
        assert!(launches[0].disable_aslr);

        // One process at a time.
        assert_eq!(
            session.on_set_program_arguments(&mut state, &["/bin/true".to_owned()]),
            Err(ErrorCode::AlreadyExist)
        );
    }

    #[test]
    fn saved_registers_come_back() {
        let machine = FakeMachine::new(0x10);
        machine.set_pc(Pid::from_raw(0x10), 0x1000);
        let mut session = DebugSession::new(Box::new(machine.spawner()));
        let mut state = SessionState::new(None);
        session.attach(Pid::from_raw(0x10)).unwrap();

        let id = session.on_save_registers(&mut state, None).unwrap();
        machine.set_pc(Pid::from_raw(0x10), 0x2000);
        session.on_restore_registers(&mut state, None, id).unwrap();
        assert_eq!(machine.pc(Pid::from_raw(0x10)), 0x1000);
        assert_eq!(
            session.on_restore_registers(&mut state, None, id),
            Err(ErrorCode::NotFound)
        );
    }

    #[test]
    fn memory_search() {
        let machine = FakeMachine::new(0x10);
        machine.map(0x1000, b"..needle..needle".to_vec(), Protection::READ);
        let mut session = DebugSession::new(Box::new(machine.spawner()));
        let mut state = SessionState::new(None);
        session.attach(Pid::from_raw(0x10)).unwrap();

        assert_eq!(
            session
                .on_search(&mut state, Address::new(0x1000), 16, b"needle")
                .unwrap(),
            Some(Address::new(0x1002))
        );
        assert_eq!(
            session
                .on_search(&mut state, Address::new(0x1003), 13, b"needle")
                .unwrap(),
            Some(Address::new(0x100a))
        );
        assert_eq!(
            session
                .on_search(&mut state, Address::new(0x1000), 16, b"nope")
                .unwrap(),
            None
        );
    }

    #[test]
    fn unmapped_regions_have_no_permissions() {
        let machine = FakeMachine::new(0x10);
        machine.map(0x1000, vec![0; 0x1000], Protection::READ);
        let mut session = DebugSession::new(Box::new(machine.spawner()));
        let mut state = SessionState::new(None);
        session.attach(Pid::from_raw(0x10)).unwrap();

        let region = session
            .on_query_memory_region_info(&mut state, Address::new(0x5123))
            .unwrap();
        assert_eq!(region.start, Address::new(0x5000));
        assert!(region.protection.is_empty());
    }
}
