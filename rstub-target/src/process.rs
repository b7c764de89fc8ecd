/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The debugged process.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::Address;
use crate::Architecture;
use crate::Backend;
use crate::CpuState;
use crate::DebugEvent;
use crate::ErrorCode;
use crate::ExceptionCode;
use crate::Interrupt;
use crate::LaunchInfo;
use crate::MemoryRegionInfo;
use crate::Pid;
use crate::ProcessInfo;
use crate::Protection;
use crate::SIGTRAP;
use crate::SharedLibrary;
use crate::Spawner;
use crate::StopInfo;
use crate::StopReason;
use crate::Thread;
use crate::ThreadState;
use crate::Transition;
use crate::breakpoint::DebugRegisterSlots;
use crate::breakpoint::HardwareBreakpointManager;
use crate::breakpoint::SoftwareBreakpointManager;
use crate::breakpoint::SoftwareTraps;

/// A process under debugger control, its threads and its breakpoints.
///
/// The process owns its backend and its breakpoint managers; the managers are
/// handed the backend for each operation rather than holding on to it.
pub struct Process {
    backend: Box<dyn Backend>,
    pid: Pid,
    arch: &'static Architecture,
    info: Option<ProcessInfo>,
    threads: BTreeMap<Pid, Thread>,
    current: Option<Pid>,
    software: Option<SoftwareBreakpointManager>,
    hardware: Option<HardwareBreakpointManager>,
    initialized: bool,
    alive: bool,
    attached: bool,
}

impl Process {
    fn new(backend: Box<dyn Backend>, attached: bool) -> Self {
        let pid = backend.pid();
        Process {
            backend,
            pid,
            arch: &Architecture::X86_64,
            info: None,
            threads: BTreeMap::new(),
            current: None,
            software: None,
            hardware: None,
            initialized: false,
            alive: true,
            attached,
        }
    }

    /// Launches a new inferior. It comes back stopped at its first
    /// instruction.
    pub fn create(spawner: &mut dyn Spawner, launch: &LaunchInfo) -> Result<Self, ErrorCode> {
        let backend = spawner.spawn(launch)?;
        let mut process = Process::new(backend, false);
        process.initialize(StopInfo::stopped(StopReason::Trap, SIGTRAP))?;
        Ok(process)
    }

    /// Attaches to a running process.
    pub fn attach(spawner: &mut dyn Spawner, pid: Pid) -> Result<Self, ErrorCode> {
        let backend = spawner.attach(pid)?;
        let mut process = Process::new(backend, true);
        process.initialize(StopInfo::stopped(StopReason::None, 0))?;
        Ok(process)
    }

    /// Wraps an already stopped backend.
    pub fn from_backend(backend: Box<dyn Backend>, attached: bool) -> Result<Self, ErrorCode> {
        let mut process = Process::new(backend, attached);
        process.initialize(StopInfo::stopped(StopReason::None, 0))?;
        Ok(process)
    }

    /// Discovers threads and architecture. Fails with `AlreadyExist` the
    /// second time.
    pub fn initialize(&mut self, initial: StopInfo) -> Result<(), ErrorCode> {
        if self.initialized {
            return Err(ErrorCode::AlreadyExist);
        }
        self.update_info()?;
        for tid in self.backend.threads()? {
            let mut thread = Thread::new(tid);
            thread.stop_info = initial.clone();
            self.threads.insert(tid, thread);
        }
        self.current = self.threads.keys().next().copied();
        self.initialized = true;
        tracing::info!(
            "debugging pid {} ({} threads, {:?})",
            self.pid,
            self.threads.len(),
            self.arch.cpu
        );
        Ok(())
    }

    fn update_info(&mut self) -> Result<(), ErrorCode> {
        if self.info.is_some() {
            return Err(ErrorCode::AlreadyExist);
        }
        let info = self.backend.info()?;
        self.arch = match info.cpu {
            crate::CpuType::Arm64 => &Architecture::AARCH64,
            _ => &Architecture::X86_64,
        };
        self.info = Some(info);
        Ok(())
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn arch(&self) -> &'static Architecture {
        self.arch
    }

    /// Process information, fetched once.
    pub fn info(&mut self) -> Result<&ProcessInfo, ErrorCode> {
        match self.update_info() {
            Ok(()) | Err(ErrorCode::AlreadyExist) => {}
            Err(err) => return Err(err),
        }
        self.info.as_ref().ok_or(ErrorCode::Unknown)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn backend(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    pub fn interrupter(&self) -> Arc<dyn Interrupt> {
        self.backend.interrupter()
    }

    /// Threads in tid order. The iterator can be taken again at any time.
    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    pub fn thread_ids(&self) -> Vec<Pid> {
        self.threads.keys().copied().collect()
    }

    pub fn thread(&self, tid: Pid) -> Option<&Thread> {
        self.threads.get(&tid)
    }

    pub fn current_thread(&self) -> Option<&Thread> {
        self.current.and_then(|tid| self.threads.get(&tid))
    }

    /// Selects the thread later operations default to.
    pub fn set_current_thread(&mut self, tid: Pid) -> Result<(), ErrorCode> {
        if !self.threads.contains_key(&tid) {
            return Err(ErrorCode::NotFound);
        }
        self.current = Some(tid);
        Ok(())
    }

    /// Loaded shared libraries, main executable first when known.
    pub fn shared_libraries(&mut self) -> Result<std::vec::IntoIter<SharedLibrary>, ErrorCode> {
        Ok(self.backend.shared_libraries()?.into_iter())
    }

    fn check_alive(&self) -> Result<(), ErrorCode> {
        if self.alive {
            Ok(())
        } else {
            Err(ErrorCode::ProcessNotFound)
        }
    }

    /// Reads up to `len` bytes, as seen by the program: traps inserted by the
    /// debugger are hidden.
    pub fn read_memory(&mut self, addr: Address, len: usize) -> Result<Vec<u8>, ErrorCode> {
        self.check_alive()?;
        if !addr.is_valid() {
            return Err(ErrorCode::InvalidArgument);
        }
        let mut buf = vec![0; len];
        let mut total = 0;
        while total < len {
            match self.backend.read(addr + total as u64, &mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(err) if total == 0 => return Err(err),
                Err(_) => break,
            }
        }
        buf.truncate(total);
        if let Some(bpm) = &self.software {
            bpm.insert_stashed_insns(addr, &mut buf);
        }
        Ok(buf)
    }

    /// Writes memory and keeps breakpoint bookkeeping consistent with it.
    pub fn write_memory(&mut self, addr: Address, data: &[u8]) -> Result<usize, ErrorCode> {
        self.check_alive()?;
        if !addr.is_valid() {
            return Err(ErrorCode::InvalidArgument);
        }
        self.backend.write_exact(addr, data)?;
        if let Some(bpm) = &mut self.software {
            bpm.refresh_original(addr, data);
        }
        Ok(data.len())
    }

    pub fn memory_region(&mut self, addr: Address) -> Result<MemoryRegionInfo, ErrorCode> {
        self.check_alive()?;
        self.backend.memory_region(addr)
    }

    pub fn allocate_memory(&mut self, size: usize, prot: Protection) -> Result<Address, ErrorCode> {
        self.check_alive()?;
        self.backend.allocate_memory(size, prot)
    }

    pub fn deallocate_memory(&mut self, addr: Address) -> Result<(), ErrorCode> {
        self.check_alive()?;
        self.backend.deallocate_memory(addr)
    }

    pub fn read_registers(&mut self, tid: Pid) -> Result<CpuState, ErrorCode> {
        self.check_alive()?;
        if !self.threads.contains_key(&tid) {
            return Err(ErrorCode::NotFound);
        }
        self.backend.read_registers(tid)
    }

    pub fn write_registers(&mut self, tid: Pid, state: &CpuState) -> Result<(), ErrorCode> {
        self.check_alive()?;
        if !self.threads.contains_key(&tid) {
            return Err(ErrorCode::NotFound);
        }
        self.backend.write_registers(tid, state)
    }

    /// Split borrow of the software manager and the backend, creating the
    /// manager on first use.
    pub fn software_breakpoints(&mut self) -> (&mut SoftwareBreakpointManager, &mut dyn Backend) {
        let arch = self.arch;
        let bpm = self
            .software
            .get_or_insert_with(|| SoftwareBreakpointManager::new(SoftwareTraps::new(arch)));
        (bpm, self.backend.as_mut())
    }

    /// Split borrow of the hardware manager and the backend, creating the
    /// manager on first use.
    pub fn hardware_breakpoints(&mut self) -> (&mut HardwareBreakpointManager, &mut dyn Backend) {
        let arch = self.arch;
        let bpm = self
            .hardware
            .get_or_insert_with(|| HardwareBreakpointManager::new(DebugRegisterSlots::new(arch)));
        (bpm, self.backend.as_mut())
    }

    /// Number of hardware slots available on this target.
    pub fn hardware_slot_count(&self) -> usize {
        self.arch.hardware_slots
    }

    /// Materializes breakpoints before the target runs.
    pub fn before_resume(&mut self) -> Result<(), ErrorCode> {
        self.check_alive()?;
        if let Some(bpm) = &mut self.software {
            bpm.enable(self.backend.as_mut())?;
        }
        if let Some(bpm) = &mut self.hardware {
            bpm.enable(self.backend.as_mut())?;
        }
        Ok(())
    }

    /// Removes breakpoints from the stopped target and lets each stopped
    /// thread find out whether it hit one.
    pub fn after_resume(&mut self) -> Result<(), ErrorCode> {
        if !self.alive {
            return Ok(());
        }
        if let Some(bpm) = &mut self.software {
            bpm.disable(self.backend.as_mut())?;
        }
        if let Some(bpm) = &mut self.hardware {
            bpm.disable(self.backend.as_mut())?;
        }

        for thread in self.threads.values_mut() {
            if !thread.is_stopped() {
                continue;
            }
            if let Some(bpm) = &mut self.software {
                if bpm.hit(self.backend.as_mut(), thread)?.is_some() {
                    continue;
                }
            }
            if let Some(bpm) = &mut self.hardware {
                bpm.hit(self.backend.as_mut(), thread)?;
            }
        }
        Ok(())
    }

    /// Applies one debug event to the process model.
    pub fn apply(&mut self, event: DebugEvent) -> Result<Transition, ErrorCode> {
        tracing::trace!("debug event: {:?}", event);
        match event {
            DebugEvent::ProcessCreated { tid } => {
                let thread = self.threads.entry(tid).or_insert_with(|| Thread::new(tid));
                thread.state = ThreadState::Stopped;
                thread.stop_info = StopInfo::stopped(StopReason::Trap, SIGTRAP);
                Ok(Transition::Stopped(tid))
            }
            DebugEvent::ProcessExited(kind) => {
                self.alive = false;
                let info = kind.stop_info();
                for thread in self.threads.values_mut() {
                    thread.state = ThreadState::Terminated;
                    thread.stop_info = info.clone();
                }
                Ok(Transition::Exited)
            }
            DebugEvent::ThreadCreated { tid } => {
                self.threads.insert(tid, Thread::new(tid));
                self.backend.resume(tid, None)?;
                if let Some(thread) = self.threads.get_mut(&tid) {
                    thread.state = ThreadState::Running;
                }
                Ok(Transition::Continue)
            }
            DebugEvent::ThreadExited { tid, .. } => {
                self.threads.remove(&tid);
                if self.current == Some(tid) {
                    self.current = self.threads.keys().next().copied();
                }
                Ok(Transition::Continue)
            }
            DebugEvent::Exception { tid, code, address } => {
                let mut info = code.stop_info();
                let located = info.reason == StopReason::Signal
                    || code == ExceptionCode::DebugRegister;
                if address.is_valid() && located {
                    info.address = Some(address);
                }
                Ok(self.stop_thread(tid, info))
            }
            DebugEvent::ModuleLoaded { tid, .. } => {
                Ok(self.stop_thread(tid, StopInfo::stopped(StopReason::LibraryLoad, SIGTRAP)))
            }
            DebugEvent::ModuleUnloaded { tid, .. } => Ok(self.stop_thread(
                tid,
                StopInfo::stopped(StopReason::LibraryUnload, SIGTRAP),
            )),
            DebugEvent::DebugString { tid, text } => {
                tracing::debug!("debug string from {}: {}", tid, text);
                Ok(self.stop_thread(tid, StopInfo::stopped(StopReason::None, SIGTRAP)))
            }
            DebugEvent::Signal { tid, signal } => {
                let reason = if signal == SIGTRAP {
                    StopReason::Trap
                } else {
                    StopReason::Signal
                };
                Ok(self.stop_thread(tid, StopInfo::stopped(reason, signal)))
            }
            DebugEvent::Fatal(err) => Err(err),
        }
    }

    fn stop_thread(&mut self, tid: Pid, info: StopInfo) -> Transition {
        let thread = self.threads.entry(tid).or_insert_with(|| Thread::new(tid));
        thread.state = if info.reason == StopReason::SingleStep {
            ThreadState::Stepped
        } else {
            ThreadState::Stopped
        };
        thread.stop_info = info;
        self.current = Some(tid);
        Transition::Stopped(tid)
    }

    /// Waits until the process stops or exits.
    pub fn wait(&mut self) -> Result<Transition, ErrorCode> {
        loop {
            let event = self.backend.wait()?;
            match self.apply(event)? {
                Transition::Continue => continue,
                other => return Ok(other),
            }
        }
    }

    fn mark_running(&mut self, tid: Pid) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.state = ThreadState::Running;
            thread.stop_info = StopInfo::default();
        }
    }

    fn on_software_breakpoint(&mut self, tid: Pid) -> Result<bool, ErrorCode> {
        let Some(bpm) = &self.software else {
            return Ok(false);
        };
        if bpm.is_empty() {
            return Ok(false);
        }
        let pc = self.backend.read_registers(tid)?.pc();
        Ok(bpm.has(Address::new(pc)))
    }

    /// Runs the process until the next stop. With `step`, only that thread
    /// executes one instruction; otherwise every thread runs. `signal` goes
    /// to the stepped thread, or the current one.
    ///
    /// A thread sitting on one of our breakpoints is first stepped off it with
    /// breakpoints removed, so it does not trap on the spot.
    pub fn resume(
        &mut self,
        step: Option<Pid>,
        signal: Option<i32>,
    ) -> Result<Transition, ErrorCode> {
        self.check_alive()?;
        if let Some(tid) = step {
            if !self.threads.contains_key(&tid) {
                return Err(ErrorCode::NotFound);
            }
        }

        let mut signal = signal;
        let lead = step
            .or(self.current)
            .or_else(|| self.threads.keys().next().copied());

        if let Some(tid) = lead {
            if self.on_software_breakpoint(tid)? {
                self.backend.step(tid, signal.take())?;
                self.mark_running(tid);
                let transition = self.wait()?;
                let stepped = transition == Transition::Stopped(tid)
                    && self.threads.get(&tid).map(|t| t.state) == Some(ThreadState::Stepped);
                if step.is_some() || !stepped {
                    return self.finish_resume(transition);
                }
            }
        }

        self.before_resume()?;

        match step {
            Some(tid) => {
                self.backend.step(tid, signal)?;
                self.mark_running(tid);
            }
            None => {
                let order = lead
                    .into_iter()
                    .chain(self.threads.keys().copied().filter(|t| Some(*t) != lead))
                    .collect::<Vec<_>>();
                for tid in order {
                    let sig = if Some(tid) == lead { signal } else { None };
                    self.backend.resume(tid, sig)?;
                    self.mark_running(tid);
                }
            }
        }

        let transition = self.wait()?;
        self.finish_resume(transition)
    }

    fn finish_resume(&mut self, transition: Transition) -> Result<Transition, ErrorCode> {
        if let Transition::Stopped(tid) = transition {
            self.backend.suspend(Some(tid))?;
            for thread in self.threads.values_mut() {
                if thread.state == ThreadState::Running {
                    thread.state = ThreadState::Stopped;
                    thread.stop_info = StopInfo::stopped(StopReason::None, 0);
                }
            }
            self.after_resume()?;
        }
        Ok(transition)
    }

    /// Asks a running process to stop.
    pub fn interrupt(&self) -> Result<(), ErrorCode> {
        self.check_alive()?;
        self.backend.interrupter().interrupt()
    }

    /// Kills the process and reaps it.
    pub fn terminate(&mut self) -> Result<(), ErrorCode> {
        self.check_alive()?;
        self.backend.terminate()?;
        loop {
            if self.wait()? == Transition::Exited {
                return Ok(());
            }
        }
    }

    /// Removes every breakpoint so the process can run on its own.
    pub fn prepare_for_detach(&mut self) -> Result<(), ErrorCode> {
        if let Some(bpm) = &mut self.software {
            bpm.clear(self.backend.as_mut())?;
        }
        if let Some(bpm) = &mut self.hardware {
            bpm.clear(self.backend.as_mut())?;
        }
        Ok(())
    }

    pub fn detach(&mut self) -> Result<(), ErrorCode> {
        self.check_alive()?;
        self.prepare_for_detach()?;
        self.backend.detach()?;
        self.alive = false;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ExitKind;
    use crate::StopEvent;
    use crate::breakpoint::Lifetime;
    use crate::breakpoint::Mode;
    use crate::testing::FakeMachine;

    fn launch(machine: &FakeMachine) -> Process {
        Process::create(&mut machine.spawner(), &LaunchInfo::default()).unwrap()
    }

    #[test]
    fn initialize_twice_fails() {
        let machine = FakeMachine::new(10);
        let mut process = launch(&machine);
        assert_eq!(
            process.initialize(StopInfo::default()),
            Err(ErrorCode::AlreadyExist)
        );
        assert_eq!(process.info().map(|i| i.pid), Ok(10));
        assert_eq!(process.current_thread().map(|t| t.tid().as_raw()), Some(10));
    }

    #[test]
    fn thread_events_keep_waiting() {
        let machine = FakeMachine::new(10);
        machine.map(0x1000, vec![0x90, 0x90, 0xcc], Protection::all());
        let mut process = launch(&machine);
        machine.set_pc(Pid::from_raw(10), 0x1000);

        machine.add_thread(11);
        machine.push_event(DebugEvent::ThreadCreated {
            tid: Pid::from_raw(11),
        });
        machine.push_event(DebugEvent::ThreadExited {
            tid: Pid::from_raw(11),
            kind: ExitKind::Exited(0),
        });
        machine.push_event(DebugEvent::Exception {
            tid: Pid::from_raw(10),
            code: ExceptionCode::Breakpoint,
            address: Address::new(0x1002),
        });

        let transition = process.resume(None, None).unwrap();
        assert_eq!(transition, Transition::Stopped(Pid::from_raw(10)));
        assert_eq!(process.threads().count(), 1);
    }

    #[test]
    fn breakpoint_round_trip_through_resume() {
        let machine = FakeMachine::new(20);
        machine.map(0x4000, vec![0x90; 32], Protection::READ | Protection::EXECUTE);
        let tid = Pid::from_raw(20);
        let mut process = launch(&machine);
        machine.set_pc(tid, 0x4000);

        let (bpm, backend) = process.software_breakpoints();
        bpm.add(backend, Address::new(0x4010), Lifetime::Permanent, 1, Mode::EXEC)
            .unwrap();

        assert_eq!(process.resume(None, None), Ok(Transition::Stopped(tid)));
        assert_eq!(machine.pc(tid), 0x4010);
        assert_eq!(machine.peek(0x4010, 1), vec![0x90]);
        let thread = process.thread(tid).unwrap();
        assert_eq!(thread.stop_info.reason, StopReason::Breakpoint);
        assert_eq!(thread.stop_info.event, StopEvent::Stop);

        // The site is still registered: running again hits it again only
        // after moving past it.
        assert_eq!(
            process.read_memory(Address::new(0x4010), 1),
            Ok(vec![0x90])
        );
        assert_eq!(process.resume(Some(tid), None), Ok(Transition::Stopped(tid)));
        assert_eq!(process.thread(tid).map(|t| t.state), Some(ThreadState::Stepped));
        assert_eq!(process.resume(None, None), Ok(Transition::Exited));
        assert!(!process.is_alive());
        assert_eq!(
            process.read_memory(Address::new(0x4000), 1),
            Err(ErrorCode::ProcessNotFound)
        );
        assert_eq!(process.before_resume(), Err(ErrorCode::ProcessNotFound));
    }

    #[test]
    fn debug_register_stop_names_the_watchpoint() {
        let machine = FakeMachine::new(60);
        machine.map(0x2000, vec![0; 0x10], Protection::READ | Protection::WRITE);
        machine.map(0x4000, vec![0x90; 8], Protection::READ | Protection::EXECUTE);
        let tid = Pid::from_raw(60);
        let mut process = launch(&machine);
        machine.set_pc(tid, 0x4000);

        let (bpm, backend) = process.hardware_breakpoints();
        bpm.add(backend, Address::new(0x2000), Lifetime::Permanent, 8, Mode::WRITE)
            .unwrap();

        machine.push_event(DebugEvent::Exception {
            tid,
            code: ExceptionCode::DebugRegister,
            address: Address::new(0x2000),
        });
        assert_eq!(process.resume(None, None), Ok(Transition::Stopped(tid)));
        let thread = process.thread(tid).unwrap();
        assert_eq!(thread.stop_info.reason, StopReason::Watchpoint);
        assert_eq!(thread.stop_info.address, Some(Address::new(0x2000)));
        assert!(thread.stop_info.hardware);

        // A trap no debug register accounts for stays a plain trap.
        machine.push_event(DebugEvent::Exception {
            tid,
            code: ExceptionCode::Other(0),
            address: Address::invalid(),
        });
        assert_eq!(process.resume(None, None), Ok(Transition::Stopped(tid)));
        let thread = process.thread(tid).unwrap();
        assert_eq!(thread.stop_info.reason, StopReason::Trap);
        assert!(!thread.stop_info.hardware);
    }

    #[test]
    fn interrupt_stops_a_spinning_thread() {
        let machine = FakeMachine::new(50);
        machine.map(0x4000, vec![0xeb, 0xfe], Protection::READ | Protection::EXECUTE);
        let tid = Pid::from_raw(50);
        let mut process = launch(&machine);
        machine.set_pc(tid, 0x4000);

        let interrupter = process.interrupter();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            interrupter.interrupt()
        });
        assert_eq!(process.resume(None, None), Ok(Transition::Stopped(tid)));
        assert_eq!(waker.join().unwrap(), Ok(()));

        let thread = process.thread(tid).unwrap();
        assert_eq!(thread.stop_info.reason, StopReason::Signal);
        assert_eq!(thread.stop_info.signal, libc::SIGINT);
        assert_eq!(machine.pc(tid), 0x4000);
    }

    #[test]
    fn detach_clears_breakpoints() {
        let machine = FakeMachine::new(30);
        machine.map(0x4000, vec![0x90; 8], Protection::READ | Protection::EXECUTE);
        let mut process = Process::attach(&mut machine.spawner(), Pid::from_raw(30)).unwrap();
        let (bpm, backend) = process.software_breakpoints();
        bpm.add(backend, Address::new(0x4004), Lifetime::Permanent, 1, Mode::EXEC)
            .unwrap();
        process.before_resume().unwrap();
        assert_eq!(machine.peek(0x4004, 1), vec![0xcc]);

        process.detach().unwrap();
        assert_eq!(machine.peek(0x4004, 1), vec![0x90]);
        assert!(machine.is_detached());
    }

    #[test]
    fn attach_to_unknown_pid() {
        let machine = FakeMachine::new(30);
        assert!(matches!(
            Process::attach(&mut machine.spawner(), Pid::from_raw(31)),
            Err(ErrorCode::ProcessNotFound)
        ));
    }

    #[test]
    fn invalid_address_rejected() {
        let machine = FakeMachine::new(40);
        let mut process = launch(&machine);
        assert_eq!(
            process.read_memory(Address::invalid(), 4),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(
            process.write_memory(Address::invalid(), &[1]),
            Err(ErrorCode::InvalidArgument)
        );
    }
}
