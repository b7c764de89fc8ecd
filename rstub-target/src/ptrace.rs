/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Linux x86-64 backend built on ptrace.
//!
//! Memory goes through `/proc/<pid>/mem`; everything else through ptrace and
//! `waitpid(__WALL)`. The process is run all-stop: when one thread reports an
//! event, the others are stopped with `SIGSTOP` before control returns. A
//! thread that turns out to have stopped for another reason keeps that status
//! queued, and it is reported once the thread is resumed.

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::fs;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use nix::sys::personality;
use nix::sys::personality::Persona;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::signal::kill;
use nix::sys::wait::WaitPidFlag;
use nix::sys::wait::WaitStatus;
use nix::sys::wait::waitpid;

use crate::Address;
use crate::Architecture;
use crate::Backend;
use crate::CpuState;
use crate::DebugEvent;
use crate::DebugRegisters;
use crate::ErrorCode;
use crate::ExceptionCode;
use crate::ExitKind;
use crate::Interrupt;
use crate::LaunchInfo;
use crate::MemoryAccess;
use crate::MemoryRegionInfo;
use crate::Pid;
use crate::ProcessInfo;
use crate::Protection;
use crate::SharedLibrary;
use crate::Spawner;

/// Creates ptrace backends.
#[derive(Debug, Default)]
pub struct PtraceSpawner;

impl Spawner for PtraceSpawner {
    fn spawn(&mut self, launch: &LaunchInfo) -> Result<Box<dyn Backend>, ErrorCode> {
        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args);
        for (key, value) in &launch.env {
            match value {
                Some(value) => cmd.env(key, value),
                None => cmd.env_remove(key),
            };
        }
        if let Some(dir) = &launch.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(path) = &launch.stdin {
            cmd.stdin(Stdio::from(File::open(path)?));
        }
        if let Some(path) = &launch.stdout {
            cmd.stdout(Stdio::from(File::create(path)?));
        }
        if let Some(path) = &launch.stderr {
            cmd.stderr(Stdio::from(File::create(path)?));
        }

        let disable_aslr = launch.disable_aslr;
        let new_session = launch.setsid;
        // SAFETY: only async-signal-safe syscalls run between fork and exec.
        unsafe {
            cmd.pre_exec(move || {
                if disable_aslr {
                    let persona = personality::get()?;
                    personality::set(persona | Persona::ADDR_NO_RANDOMIZE)?;
                }
                if new_session {
                    nix::unistd::setsid()?;
                }
                ptrace::traceme()?;
                Ok(())
            });
        }

        let child = cmd.spawn()?;
        let pid = Pid::from_raw(child.id() as i32);
        match waitpid(pid, Some(WaitPidFlag::__WALL))? {
            WaitStatus::Stopped(_, Signal::SIGTRAP) => {}
            other => {
                tracing::warn!("unexpected first stop of {}: {:?}", pid, other);
                return Err(ErrorCode::ProcessNotFound);
            }
        }
        tracing::info!("launched {} as pid {}", launch.program.display(), pid);
        Ok(Box::new(PtraceBackend::new(pid, [pid].into_iter().collect())?))
    }

    fn attach(&mut self, pid: Pid) -> Result<Box<dyn Backend>, ErrorCode> {
        let mut threads = BTreeSet::new();
        for tid in task_ids(pid)? {
            ptrace::attach(tid)?;
            waitpid(tid, Some(WaitPidFlag::__WALL))?;
            threads.insert(tid);
        }
        tracing::info!("attached to pid {} ({} threads)", pid, threads.len());
        Ok(Box::new(PtraceBackend::new(pid, threads)?))
    }
}

fn task_ids(pid: Pid) -> Result<Vec<Pid>, ErrorCode> {
    let mut tids = Vec::new();
    for entry in fs::read_dir(format!("/proc/{}/task", pid))? {
        let entry = entry?;
        if let Some(tid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            tids.push(Pid::from_raw(tid));
        }
    }
    if tids.is_empty() {
        return Err(ErrorCode::ProcessNotFound);
    }
    Ok(tids)
}

struct PtraceInterrupt {
    pid: Pid,
    requested: Arc<AtomicBool>,
}

impl Interrupt for PtraceInterrupt {
    fn interrupt(&self) -> Result<(), ErrorCode> {
        self.requested.store(true, Ordering::SeqCst);
        kill(self.pid, Signal::SIGSTOP)?;
        Ok(())
    }
}

/// One traced process.
pub struct PtraceBackend {
    pid: Pid,
    mem: File,
    threads: BTreeSet<Pid>,
    /// Threads currently running (not stopped by ptrace).
    running: BTreeSet<Pid>,
    /// Clone children whose initial stop has not been collected yet.
    fresh: BTreeSet<Pid>,
    /// Initial stops of clone children whose clone event is still to come.
    early: BTreeSet<Pid>,
    /// Statuses collected while stopping other threads.
    pending: VecDeque<WaitStatus>,
    /// Threads with one of our `SIGSTOP`s still queued.
    stale_stops: BTreeSet<Pid>,
    stepping: Option<Pid>,
    interrupt: Arc<AtomicBool>,
    debug_registers: DebugRegisters,
}

impl PtraceBackend {
    fn new(pid: Pid, threads: BTreeSet<Pid>) -> Result<Self, ErrorCode> {
        let options = ptrace::Options::PTRACE_O_TRACECLONE | ptrace::Options::PTRACE_O_EXITKILL;
        for tid in &threads {
            ptrace::setoptions(*tid, options)?;
        }
        let mem = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(format!("/proc/{}/mem", pid))?;
        Ok(PtraceBackend {
            pid,
            mem,
            threads,
            running: BTreeSet::new(),
            fresh: BTreeSet::new(),
            early: BTreeSet::new(),
            pending: VecDeque::new(),
            stale_stops: BTreeSet::new(),
            stepping: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            debug_registers: DebugRegisters::default(),
        })
    }

    fn collect_fresh(&mut self, tid: Pid) -> Result<(), ErrorCode> {
        if self.fresh.remove(&tid) {
            waitpid(tid, Some(WaitPidFlag::__WALL))?;
            self.load_debug_registers(tid)?;
        }
        Ok(())
    }

    fn load_debug_registers(&self, tid: Pid) -> Result<(), ErrorCode> {
        if self.debug_registers == DebugRegisters::default() {
            return Ok(());
        }
        poke_debug_registers(tid, &self.debug_registers)
    }

    fn has_pending(&self, tid: Pid) -> bool {
        self.pending.iter().any(|status| status.pid() == Some(tid))
    }

    /// Works out why `tid` took a `SIGTRAP`.
    fn classify_trap(&mut self, tid: Pid) -> Result<(ExceptionCode, Address), ErrorCode> {
        let dr6 = peek_user(tid, debugreg_offset(6))?;
        if dr6 != 0 {
            poke_user(tid, debugreg_offset(6), 0)?;
        }
        let stepped = self.stepping == Some(tid);
        if stepped {
            self.stepping = None;
        }
        if let Some(address) = dr6_hit(dr6, &self.debug_registers) {
            return Ok((ExceptionCode::DebugRegister, address));
        }
        if stepped {
            return Ok((ExceptionCode::SingleStep, Address::invalid()));
        }
        let code = match ptrace::getsiginfo(tid) {
            Ok(info) if info.si_code == SI_KERNEL => ExceptionCode::Breakpoint,
            Ok(info) => ExceptionCode::Other(info.si_code as u32),
            Err(err) => {
                tracing::debug!("no siginfo for {}: {}", tid, err);
                ExceptionCode::Breakpoint
            }
        };
        Ok((code, Address::invalid()))
    }

    fn exited(&mut self, tid: Pid, kind: ExitKind) -> DebugEvent {
        self.running.remove(&tid);
        self.threads.remove(&tid);
        self.stale_stops.remove(&tid);
        if tid == self.pid {
            DebugEvent::ProcessExited(kind)
        } else {
            DebugEvent::ThreadExited { tid, kind }
        }
    }

    /// Turns a wait status into an event. `None` for bookkeeping-only stops.
    fn decode(&mut self, status: WaitStatus) -> Result<Option<DebugEvent>, ErrorCode> {
        tracing::trace!("wait status: {:?}", status);
        let event = match status {
            WaitStatus::Exited(tid, code) => self.exited(tid, ExitKind::Exited(code)),
            WaitStatus::Signaled(tid, sig, _) => self.exited(tid, ExitKind::Signaled(sig as i32)),
            WaitStatus::PtraceEvent(tid, _, libc::PTRACE_EVENT_CLONE) => {
                let new = Pid::from_raw(ptrace::getevent(tid)? as i32);
                self.threads.insert(new);
                if self.early.remove(&new) {
                    self.load_debug_registers(new)?;
                } else {
                    self.fresh.insert(new);
                }
                ptrace::cont(tid, None)?;
                DebugEvent::ThreadCreated { tid: new }
            }
            WaitStatus::PtraceEvent(tid, _, _) => {
                ptrace::cont(tid, None)?;
                return Ok(None);
            }
            WaitStatus::Stopped(tid, Signal::SIGSTOP) if !self.threads.contains(&tid) => {
                // The child of a clone event not seen yet.
                self.early.insert(tid);
                return Ok(None);
            }
            WaitStatus::Stopped(tid, Signal::SIGSTOP) if self.fresh.contains(&tid) => {
                self.fresh.remove(&tid);
                self.load_debug_registers(tid)?;
                return Ok(None);
            }
            WaitStatus::Stopped(tid, Signal::SIGSTOP) if self.stale_stops.contains(&tid) => {
                self.stale_stops.remove(&tid);
                ptrace::cont(tid, None)?;
                return Ok(None);
            }
            WaitStatus::Stopped(tid, Signal::SIGTRAP) => {
                self.running.remove(&tid);
                let (code, address) = self.classify_trap(tid)?;
                DebugEvent::Exception { tid, code, address }
            }
            WaitStatus::Stopped(tid, sig) => {
                self.running.remove(&tid);
                let signal = if sig == Signal::SIGSTOP && self.interrupt.swap(false, Ordering::SeqCst)
                {
                    libc::SIGINT
                } else {
                    sig as i32
                };
                DebugEvent::Signal { tid, signal }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    fn maps(&self) -> Result<Vec<(MemoryRegionInfo, u64)>, ErrorCode> {
        let text = fs::read_to_string(format!("/proc/{}/maps", self.pid))?;
        Ok(text.lines().filter_map(parse_maps_line).collect())
    }
}

/// `si_code` of a trap raised by `int3`.
const SI_KERNEL: i32 = 0x80;

fn debugreg_offset(index: usize) -> usize {
    std::mem::offset_of!(libc::user, u_debugreg) + index * std::mem::size_of::<libc::c_ulong>()
}

/// Loads `regs` with DR7 cleared first and written last, so no
/// half-programmed slot fires.
fn poke_debug_registers(tid: Pid, regs: &DebugRegisters) -> Result<(), ErrorCode> {
    poke_user(tid, debugreg_offset(7), 0)?;
    for (i, addr) in regs.addresses.iter().enumerate() {
        poke_user(tid, debugreg_offset(i), *addr)?;
    }
    poke_user(tid, debugreg_offset(7), regs.control)
}

/// The watched address of the lowest enabled slot flagged in DR6.
fn dr6_hit(dr6: u64, regs: &DebugRegisters) -> Option<Address> {
    (0..regs.addresses.len())
        .find(|slot| dr6 & (1 << slot) != 0 && regs.control & (0b11 << (2 * slot)) != 0)
        .map(|slot| Address::new(regs.addresses[slot]))
}

/// Takes the first queued status that can be reported: an exit, or the stop
/// of a thread that has been resumed since.
fn next_reportable(
    pending: &mut VecDeque<WaitStatus>,
    running: &BTreeSet<Pid>,
) -> Option<WaitStatus> {
    let index = pending.iter().position(|status| match status {
        WaitStatus::Exited(..) | WaitStatus::Signaled(..) => true,
        other => other.pid().is_some_and(|tid| running.contains(&tid)),
    })?;
    pending.remove(index)
}

fn peek_user(tid: Pid, offset: usize) -> Result<u64, ErrorCode> {
    nix::errno::Errno::clear();
    // SAFETY: PTRACE_PEEKUSER takes an offset and returns a word.
    let value = unsafe {
        libc::ptrace(
            libc::PTRACE_PEEKUSER,
            tid.as_raw(),
            offset as *mut libc::c_void,
            std::ptr::null_mut::<libc::c_void>(),
        )
    };
    if value == -1 && nix::errno::Errno::last_raw() != 0 {
        return Err(nix::errno::Errno::last().into());
    }
    Ok(value as u64)
}

fn poke_user(tid: Pid, offset: usize, value: u64) -> Result<(), ErrorCode> {
    // SAFETY: PTRACE_POKEUSER takes an offset and a word by value.
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_POKEUSER,
            tid.as_raw(),
            offset as *mut libc::c_void,
            value as *mut libc::c_void,
        )
    };
    if rc == -1 {
        return Err(nix::errno::Errno::last().into());
    }
    Ok(())
}

fn parse_maps_line(line: &str) -> Option<(MemoryRegionInfo, u64)> {
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let perms = fields.next()?;
    let offset = u64::from_str_radix(fields.next()?, 16).ok()?;
    let _dev = fields.next()?;
    let _inode = fields.next()?;
    let name = fields.next().map(str::to_owned);

    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    Some((
        MemoryRegionInfo {
            start: Address::new(start),
            length: end - start,
            protection: Protection::from_rwx(perms),
            name,
        },
        offset,
    ))
}

fn to_cpu_state(regs: &libc::user_regs_struct) -> CpuState {
    let mut state = CpuState::new(&Architecture::X86_64);
    let values = [
        regs.rax,
        regs.rbx,
        regs.rcx,
        regs.rdx,
        regs.rsi,
        regs.rdi,
        regs.rbp,
        regs.rsp,
        regs.r8,
        regs.r9,
        regs.r10,
        regs.r11,
        regs.r12,
        regs.r13,
        regs.r14,
        regs.r15,
        regs.rip,
        regs.eflags,
        regs.cs,
        regs.ss,
        regs.ds,
        regs.es,
        regs.fs,
        regs.gs,
    ];
    for (regno, value) in values.into_iter().enumerate() {
        let _ = state.set(regno, value);
    }
    state
}

fn apply_cpu_state(state: &CpuState, regs: &mut libc::user_regs_struct) {
    let fields: [&mut u64; 24] = [
        &mut regs.rax,
        &mut regs.rbx,
        &mut regs.rcx,
        &mut regs.rdx,
        &mut regs.rsi,
        &mut regs.rdi,
        &mut regs.rbp,
        &mut regs.rsp,
        &mut regs.r8,
        &mut regs.r9,
        &mut regs.r10,
        &mut regs.r11,
        &mut regs.r12,
        &mut regs.r13,
        &mut regs.r14,
        &mut regs.r15,
        &mut regs.rip,
        &mut regs.eflags,
        &mut regs.cs,
        &mut regs.ss,
        &mut regs.ds,
        &mut regs.es,
        &mut regs.fs,
        &mut regs.gs,
    ];
    for (regno, field) in fields.into_iter().enumerate() {
        if let Some(value) = state.get(regno) {
            *field = value;
        }
    }
}

fn to_signal(signal: Option<i32>) -> Result<Option<Signal>, ErrorCode> {
    signal
        .filter(|s| *s != 0)
        .map(Signal::try_from)
        .transpose()
        .map_err(ErrorCode::from)
}

impl MemoryAccess for PtraceBackend {
    fn read(&mut self, addr: Address, buf: &mut [u8]) -> Result<usize, ErrorCode> {
        Ok(self.mem.read_at(buf, addr.value())?)
    }

    fn write(&mut self, addr: Address, buf: &[u8]) -> Result<usize, ErrorCode> {
        Ok(self.mem.write_at(buf, addr.value())?)
    }
}

impl Backend for PtraceBackend {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn info(&mut self) -> Result<ProcessInfo, ErrorCode> {
        ProcessInfo::from_proc(self.pid.as_raw(), &Architecture::X86_64)
    }

    fn threads(&mut self) -> Result<Vec<Pid>, ErrorCode> {
        Ok(self.threads.iter().copied().collect())
    }

    fn read_registers(&mut self, tid: Pid) -> Result<CpuState, ErrorCode> {
        Ok(to_cpu_state(&ptrace::getregs(tid)?))
    }

    fn write_registers(&mut self, tid: Pid, state: &CpuState) -> Result<(), ErrorCode> {
        let mut regs = ptrace::getregs(tid)?;
        apply_cpu_state(state, &mut regs);
        ptrace::setregs(tid, regs)?;
        Ok(())
    }

    fn resume(&mut self, tid: Pid, signal: Option<i32>) -> Result<(), ErrorCode> {
        self.collect_fresh(tid)?;
        // A thread with a queued stop stays put; `wait` reports the stop.
        if !self.has_pending(tid) {
            ptrace::cont(tid, to_signal(signal)?)?;
        }
        self.running.insert(tid);
        Ok(())
    }

    fn step(&mut self, tid: Pid, signal: Option<i32>) -> Result<(), ErrorCode> {
        self.collect_fresh(tid)?;
        if !self.has_pending(tid) {
            ptrace::step(tid, to_signal(signal)?)?;
            self.stepping = Some(tid);
        }
        self.running.insert(tid);
        Ok(())
    }

    fn wait(&mut self) -> Result<DebugEvent, ErrorCode> {
        loop {
            let status = match next_reportable(&mut self.pending, &self.running) {
                Some(status) => status,
                None => waitpid(Pid::from_raw(-1), Some(WaitPidFlag::__WALL))?,
            };
            if let Some(event) = self.decode(status)? {
                return Ok(event);
            }
        }
    }

    fn suspend(&mut self, except: Option<Pid>) -> Result<(), ErrorCode> {
        let running = std::mem::take(&mut self.running);
        for tid in running.into_iter().filter(|t| Some(*t) != except) {
            if self.has_pending(tid) {
                continue;
            }
            // SAFETY: plain syscall with integer arguments.
            let rc = unsafe {
                libc::syscall(
                    libc::SYS_tgkill,
                    self.pid.as_raw(),
                    tid.as_raw(),
                    libc::SIGSTOP,
                )
            };
            if rc != 0 {
                continue;
            }
            match waitpid(tid, Some(WaitPidFlag::__WALL)) {
                Ok(WaitStatus::Stopped(_, Signal::SIGSTOP)) => {}
                Ok(status) => {
                    tracing::debug!("{} stopped with {:?} before our SIGSTOP", tid, status);
                    if !matches!(status, WaitStatus::Exited(..) | WaitStatus::Signaled(..)) {
                        self.stale_stops.insert(tid);
                    }
                    self.pending.push_back(status);
                }
                Err(err) => tracing::warn!("failed to stop {}: {}", tid, err),
            }
        }
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), ErrorCode> {
        kill(self.pid, Signal::SIGKILL)?;
        Ok(())
    }

    fn detach(&mut self) -> Result<(), ErrorCode> {
        for tid in &self.threads {
            if let Err(err) = ptrace::detach(*tid, None) {
                tracing::warn!("failed to detach from {}: {}", tid, err);
            }
        }
        Ok(())
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        Arc::new(PtraceInterrupt {
            pid: self.pid,
            requested: self.interrupt.clone(),
        })
    }

    fn shared_libraries(&mut self) -> Result<Vec<SharedLibrary>, ErrorCode> {
        let exe = fs::read_link(format!("/proc/{}/exe", self.pid))
            .ok()
            .map(|p| p.to_string_lossy().into_owned());
        let mut libraries: Vec<SharedLibrary> = Vec::new();
        for (region, offset) in self.maps()? {
            let Some(path) = region.name else {
                continue;
            };
            if offset != 0 || !path.starts_with('/') {
                continue;
            }
            if libraries.iter().any(|l| l.path == path) {
                continue;
            }
            let main = exe.as_deref() == Some(path.as_str());
            libraries.push(SharedLibrary {
                path,
                base: region.start,
                main,
            });
        }
        libraries.sort_by_key(|l| !l.main);
        Ok(libraries)
    }

    fn memory_region(&mut self, addr: Address) -> Result<MemoryRegionInfo, ErrorCode> {
        let maps = self.maps()?;
        if let Some((region, _)) = maps.iter().find(|(r, _)| r.contains(addr)) {
            return Ok(region.clone());
        }
        // Report the unmapped gap so clients can skip over it.
        let next = maps
            .iter()
            .map(|(r, _)| r.start)
            .find(|start| *start > addr)
            .map_or(u64::MAX, |a| a.value());
        Ok(MemoryRegionInfo {
            start: addr,
            length: next - addr.value(),
            protection: Protection::empty(),
            name: None,
        })
    }

    fn write_debug_registers(&mut self, regs: &DebugRegisters) -> Result<(), ErrorCode> {
        self.debug_registers = *regs;
        for tid in &self.threads {
            if self.fresh.contains(tid) {
                continue;
            }
            poke_debug_registers(*tid, regs)?;
        }
        Ok(())
    }

    fn auxv(&mut self) -> Result<Vec<u8>, ErrorCode> {
        Ok(fs::read(format!("/proc/{}/auxv", self.pid))?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn maps_line() {
        let line = "7f0000000000-7f0000021000 r-xp 00000000 08:01 1234  /usr/lib/libc.so.6";
        let (region, offset) = parse_maps_line(line).unwrap();
        assert_eq!(region.start, Address::new(0x7f00_0000_0000));
        assert_eq!(region.length, 0x21000);
        assert_eq!(region.protection, Protection::READ | Protection::EXECUTE);
        assert_eq!(region.name.as_deref(), Some("/usr/lib/libc.so.6"));
        assert_eq!(offset, 0);

        let anon = "7ffd0000-7ffd1000 rw-p 00000000 00:00 0";
        assert_eq!(parse_maps_line(anon).and_then(|(r, _)| r.name), None);
    }

    #[test]
    fn dr6_names_the_enabled_slot() {
        let regs = DebugRegisters {
            addresses: [0x1000, 0x2000, 0x3000, 0],
            // Slots 0 and 1 enabled.
            control: 0b0101,
        };
        assert_eq!(dr6_hit(0b10, &regs), Some(Address::new(0x2000)));
        assert_eq!(dr6_hit(0b11, &regs), Some(Address::new(0x1000)));
        // Slot 2 is armed but disabled; the single-step bit names no slot.
        assert_eq!(dr6_hit(0b100, &regs), None);
        assert_eq!(dr6_hit(1 << 14, &regs), None);
        assert_eq!(dr6_hit(0, &regs), None);
    }

    #[test]
    fn queued_stops_wait_for_their_thread() {
        let (a, b) = (Pid::from_raw(100), Pid::from_raw(101));
        let mut pending = VecDeque::from([
            WaitStatus::Stopped(a, Signal::SIGTRAP),
            WaitStatus::Stopped(b, Signal::SIGUSR1),
        ]);
        let mut running = BTreeSet::new();
        assert_eq!(next_reportable(&mut pending, &running), None);

        running.insert(b);
        assert_eq!(
            next_reportable(&mut pending, &running),
            Some(WaitStatus::Stopped(b, Signal::SIGUSR1))
        );
        assert_eq!(next_reportable(&mut pending, &running), None);

        pending.push_back(WaitStatus::Exited(b, 3));
        assert_eq!(
            next_reportable(&mut pending, &BTreeSet::new()),
            Some(WaitStatus::Exited(b, 3))
        );
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn register_mapping() {
        // SAFETY: user_regs_struct is plain old data.
        let mut regs: libc::user_regs_struct = unsafe { std::mem::zeroed() };
        regs.rip = 0x401000;
        regs.rsp = 0x7fff0000;
        regs.eflags = 0x246;
        let state = to_cpu_state(&regs);
        assert_eq!(state.pc(), 0x401000);
        assert_eq!(state.sp(), 0x7fff0000);
        assert_eq!(state.get(17), Some(0x246));

        let mut out: libc::user_regs_struct = unsafe { std::mem::zeroed() };
        apply_cpu_state(&state, &mut out);
        assert_eq!(out.rip, 0x401000);
        assert_eq!(out.eflags, 0x246);
    }
}
