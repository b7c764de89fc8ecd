/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! An in-memory machine that implements [`Backend`], for tests.
//!
//! The fake "executes" x86-64 code by sliding the program counter forward
//! until it reaches a trap byte (`0xcc`) or falls off the end of its region,
//! which is enough to drive breakpoints, single steps and exits end to end.
//! A `jmp .` (`eb fe`) spins: `wait` then blocks until the process is
//! interrupted.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Condvar;
use parking_lot::Mutex;

use crate::Address;
use crate::Architecture;
use crate::Backend;
use crate::CpuState;
use crate::CpuType;
use crate::DebugEvent;
use crate::DebugRegisters;
use crate::Endian;
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

const TRAP: u8 = 0xcc;
const SPIN: [u8; 2] = [0xeb, 0xfe];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run {
    Continue(Pid),
    Step(Pid),
}

struct Region {
    start: u64,
    bytes: Vec<u8>,
    prot: Protection,
    name: Option<String>,
}

impl Region {
    fn end(&self) -> u64 {
        self.start + self.bytes.len() as u64
    }
}

struct Machine {
    pid: Pid,
    regions: Vec<Region>,
    threads: BTreeMap<Pid, CpuState>,
    events: VecDeque<DebugEvent>,
    running: Option<Run>,
    fail_writes: bool,
    debug_registers: DebugRegisters,
    libraries: Vec<SharedLibrary>,
    exit_code: i32,
    exited: bool,
    detached: bool,
    killed: bool,
    launches: Vec<LaunchInfo>,
    next_alloc: u64,
}

impl Machine {
    fn region(&self, addr: u64) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| addr >= r.start && addr < r.end())
    }

    fn region_mut(&mut self, addr: u64) -> Option<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| addr >= r.start && addr < r.end())
    }

    fn code_at(&self, pc: u64) -> Option<u8> {
        self.region(pc)
            .filter(|r| r.prot.contains(Protection::EXECUTE))
            .map(|r| r.bytes[(pc - r.start) as usize])
    }

    fn spins_at(&self, pc: u64) -> bool {
        self.code_at(pc) == Some(SPIN[0]) && self.code_at(pc + 1) == Some(SPIN[1])
    }

    /// Runs `tid` until something happens. `None` when it is stuck in a spin
    /// loop.
    fn run(&mut self, tid: Pid) -> Option<DebugEvent> {
        let Some(regs) = self.threads.get(&tid) else {
            return Some(DebugEvent::Fatal(ErrorCode::ProcessNotFound));
        };
        let mut pc = regs.pc();
        loop {
            if self.spins_at(pc) {
                if let Some(regs) = self.threads.get_mut(&tid) {
                    regs.set_pc(pc);
                }
                return None;
            }
            match self.code_at(pc) {
                Some(TRAP) => {
                    if let Some(regs) = self.threads.get_mut(&tid) {
                        regs.set_pc(pc + 1);
                    }
                    return Some(DebugEvent::Exception {
                        tid,
                        code: ExceptionCode::Breakpoint,
                        address: Address::new(pc),
                    });
                }
                Some(_) => pc += 1,
                None => {
                    self.exited = true;
                    return Some(DebugEvent::ProcessExited(ExitKind::Exited(self.exit_code)));
                }
            }
        }
    }
}

/// Interrupt requests, with a way to sleep until one arrives.
#[derive(Default)]
struct Latch {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    fn raise(&self) {
        *self.raised.lock() = true;
        self.cond.notify_all();
    }

    fn take(&self) -> bool {
        std::mem::take(&mut *self.raised.lock())
    }

    fn wait(&self) {
        let mut raised = self.raised.lock();
        while !*raised {
            self.cond.wait(&mut raised);
        }
        *raised = false;
    }
}

/// Shared handle to a fake machine. Clones see the same state, so a test can
/// keep one while the code under test owns a backend.
#[derive(Clone)]
pub struct FakeMachine {
    inner: Arc<Mutex<Machine>>,
    interrupted: Arc<Latch>,
}

impl FakeMachine {
    /// A stopped process with a single thread whose tid is the pid.
    pub fn new(pid: i32) -> Self {
        let pid = Pid::from_raw(pid);
        let mut threads = BTreeMap::new();
        threads.insert(pid, CpuState::new(&Architecture::X86_64));
        FakeMachine {
            inner: Arc::new(Mutex::new(Machine {
                pid,
                regions: Vec::new(),
                threads,
                events: VecDeque::new(),
                running: None,
                fail_writes: false,
                debug_registers: DebugRegisters::default(),
                libraries: Vec::new(),
                exit_code: 0,
                exited: false,
                detached: false,
                killed: false,
                launches: Vec::new(),
                next_alloc: 0x7000_0000,
            })),
            interrupted: Arc::new(Latch::default()),
        }
    }

    pub fn pid(&self) -> Pid {
        self.inner.lock().pid
    }

    /// Maps a region of memory.
    pub fn map(&self, start: u64, bytes: Vec<u8>, prot: Protection) {
        self.map_named(start, bytes, prot, None)
    }

    pub fn map_named(&self, start: u64, bytes: Vec<u8>, prot: Protection, name: Option<&str>) {
        self.inner.lock().regions.push(Region {
            start,
            bytes,
            prot,
            name: name.map(str::to_owned),
        });
    }

    /// Reads raw memory, traps included.
    pub fn peek(&self, addr: u64, len: usize) -> Vec<u8> {
        let machine = self.inner.lock();
        (addr..addr + len as u64)
            .map(|a| {
                machine
                    .region(a)
                    .map(|r| r.bytes[(a - r.start) as usize])
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Writes raw memory.
    pub fn poke(&self, addr: u64, data: &[u8]) {
        let mut machine = self.inner.lock();
        for (i, b) in data.iter().enumerate() {
            let a = addr + i as u64;
            if let Some(r) = machine.region_mut(a) {
                let offset = (a - r.start) as usize;
                r.bytes[offset] = *b;
            }
        }
    }

    pub fn add_thread(&self, tid: i32) {
        self.inner
            .lock()
            .threads
            .insert(Pid::from_raw(tid), CpuState::new(&Architecture::X86_64));
    }

    pub fn set_pc(&self, tid: Pid, pc: u64) {
        if let Some(regs) = self.inner.lock().threads.get_mut(&tid) {
            regs.set_pc(pc);
        }
    }

    pub fn pc(&self, tid: Pid) -> u64 {
        self.inner
            .lock()
            .threads
            .get(&tid)
            .map_or(0, CpuState::pc)
    }

    pub fn set_register(&self, tid: Pid, regno: usize, value: u64) {
        if let Some(regs) = self.inner.lock().threads.get_mut(&tid) {
            let _ = regs.set(regno, value);
        }
    }

    /// Queues an event that `wait` reports before simulating execution.
    pub fn push_event(&self, event: DebugEvent) {
        self.inner.lock().events.push_back(event);
    }

    /// When set, every write transfers zero bytes.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    pub fn set_exit_code(&self, code: i32) {
        self.inner.lock().exit_code = code;
    }

    pub fn add_library(&self, path: &str, base: u64) {
        self.inner.lock().libraries.push(SharedLibrary {
            path: path.to_owned(),
            base: Address::new(base),
            main: false,
        });
    }

    pub fn debug_registers(&self) -> DebugRegisters {
        self.inner.lock().debug_registers
    }

    pub fn is_detached(&self) -> bool {
        self.inner.lock().detached
    }

    pub fn is_killed(&self) -> bool {
        self.inner.lock().killed
    }

    /// Launch requests seen by [`FakeSpawner`].
    pub fn launches(&self) -> Vec<LaunchInfo> {
        self.inner.lock().launches.clone()
    }

    pub fn backend(&self) -> FakeBackend {
        FakeBackend {
            machine: self.clone(),
        }
    }

    pub fn spawner(&self) -> FakeSpawner {
        FakeSpawner {
            machine: self.clone(),
        }
    }
}

/// [`Backend`] over a [`FakeMachine`].
pub struct FakeBackend {
    machine: FakeMachine,
}

struct FakeInterrupt(Arc<Latch>);

impl Interrupt for FakeInterrupt {
    fn interrupt(&self) -> Result<(), ErrorCode> {
        self.0.raise();
        Ok(())
    }
}

impl MemoryAccess for FakeBackend {
    fn read(&mut self, addr: Address, buf: &mut [u8]) -> Result<usize, ErrorCode> {
        let machine = self.machine.inner.lock();
        let Some(region) = machine.region(addr.value()) else {
            return Err(ErrorCode::InvalidAddress);
        };
        let offset = (addr.value() - region.start) as usize;
        let n = buf.len().min(region.bytes.len() - offset);
        buf[..n].copy_from_slice(&region.bytes[offset..offset + n]);
        Ok(n)
    }

    fn write(&mut self, addr: Address, buf: &[u8]) -> Result<usize, ErrorCode> {
        let mut machine = self.machine.inner.lock();
        if machine.fail_writes {
            return Ok(0);
        }
        let Some(region) = machine.region_mut(addr.value()) else {
            return Err(ErrorCode::InvalidAddress);
        };
        let offset = (addr.value() - region.start) as usize;
        let n = buf.len().min(region.bytes.len() - offset);
        region.bytes[offset..offset + n].copy_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl Backend for FakeBackend {
    fn pid(&self) -> Pid {
        self.machine.pid()
    }

    fn info(&mut self) -> Result<ProcessInfo, ErrorCode> {
        let pid = self.machine.pid().as_raw();
        Ok(ProcessInfo {
            pid,
            parent_pid: 1,
            real_uid: 1000,
            real_gid: 1000,
            effective_uid: 1000,
            effective_gid: 1000,
            name: "fake".to_owned(),
            arguments: vec!["fake".to_owned()],
            cpu: CpuType::X86_64,
            pointer_size: 8,
            endian: Endian::Little,
            os_type: "linux".to_owned(),
            os_vendor: "unknown".to_owned(),
            triple: Architecture::X86_64.triple.to_owned(),
        })
    }

    fn threads(&mut self) -> Result<Vec<Pid>, ErrorCode> {
        Ok(self.machine.inner.lock().threads.keys().copied().collect())
    }

    fn read_registers(&mut self, tid: Pid) -> Result<CpuState, ErrorCode> {
        self.machine
            .inner
            .lock()
            .threads
            .get(&tid)
            .cloned()
            .ok_or(ErrorCode::ProcessNotFound)
    }

    fn write_registers(&mut self, tid: Pid, state: &CpuState) -> Result<(), ErrorCode> {
        let mut machine = self.machine.inner.lock();
        let regs = machine
            .threads
            .get_mut(&tid)
            .ok_or(ErrorCode::ProcessNotFound)?;
        *regs = state.clone();
        Ok(())
    }

    fn resume(&mut self, tid: Pid, _signal: Option<i32>) -> Result<(), ErrorCode> {
        let mut machine = self.machine.inner.lock();
        if machine.exited {
            return Err(ErrorCode::ProcessNotFound);
        }
        if machine.running.is_none() {
            machine.running = Some(Run::Continue(tid));
        }
        Ok(())
    }

    fn step(&mut self, tid: Pid, _signal: Option<i32>) -> Result<(), ErrorCode> {
        let mut machine = self.machine.inner.lock();
        if machine.exited {
            return Err(ErrorCode::ProcessNotFound);
        }
        machine.running = Some(Run::Step(tid));
        Ok(())
    }

    fn wait(&mut self) -> Result<DebugEvent, ErrorCode> {
        let mut machine = self.machine.inner.lock();
        if let Some(event) = machine.events.pop_front() {
            return Ok(event);
        }
        let run = machine.running.take().ok_or(ErrorCode::ProcessNotFound)?;
        let tid = match run {
            Run::Continue(tid) | Run::Step(tid) => tid,
        };
        let interrupted = DebugEvent::Signal {
            tid,
            signal: libc::SIGINT,
        };
        if self.machine.interrupted.take() {
            return Ok(interrupted);
        }
        match run {
            Run::Step(tid) => {
                let pc = machine.threads.get(&tid).map_or(0, CpuState::pc);
                if !machine.spins_at(pc) {
                    if let Some(regs) = machine.threads.get_mut(&tid) {
                        regs.set_pc(pc + 1);
                    }
                }
                Ok(DebugEvent::Exception {
                    tid,
                    code: ExceptionCode::SingleStep,
                    address: Address::invalid(),
                })
            }
            Run::Continue(tid) => {
                if let Some(event) = machine.run(tid) {
                    return Ok(event);
                }
                drop(machine);
                self.machine.interrupted.wait();
                Ok(interrupted)
            }
        }
    }

    fn suspend(&mut self, _except: Option<Pid>) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), ErrorCode> {
        let mut machine = self.machine.inner.lock();
        machine.killed = true;
        machine.exited = true;
        machine
            .events
            .push_back(DebugEvent::ProcessExited(ExitKind::Signaled(libc::SIGKILL)));
        Ok(())
    }

    fn detach(&mut self) -> Result<(), ErrorCode> {
        self.machine.inner.lock().detached = true;
        Ok(())
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        Arc::new(FakeInterrupt(self.machine.interrupted.clone()))
    }

    fn shared_libraries(&mut self) -> Result<Vec<SharedLibrary>, ErrorCode> {
        Ok(self.machine.inner.lock().libraries.clone())
    }

    fn memory_region(&mut self, addr: Address) -> Result<MemoryRegionInfo, ErrorCode> {
        let machine = self.machine.inner.lock();
        let region = machine.region(addr.value()).ok_or(ErrorCode::NotFound)?;
        Ok(MemoryRegionInfo {
            start: Address::new(region.start),
            length: region.bytes.len() as u64,
            protection: region.prot,
            name: region.name.clone(),
        })
    }

    fn allocate_memory(&mut self, size: usize, prot: Protection) -> Result<Address, ErrorCode> {
        let mut machine = self.machine.inner.lock();
        let start = machine.next_alloc;
        machine.next_alloc += (size as u64 + 0xfff) & !0xfff;
        machine.regions.push(Region {
            start,
            bytes: vec![0; size],
            prot,
            name: None,
        });
        Ok(Address::new(start))
    }

    fn deallocate_memory(&mut self, addr: Address) -> Result<(), ErrorCode> {
        let mut machine = self.machine.inner.lock();
        let before = machine.regions.len();
        machine.regions.retain(|r| r.start != addr.value());
        if machine.regions.len() == before {
            return Err(ErrorCode::NotFound);
        }
        Ok(())
    }

    fn write_debug_registers(&mut self, regs: &DebugRegisters) -> Result<(), ErrorCode> {
        self.machine.inner.lock().debug_registers = *regs;
        Ok(())
    }

    fn auxv(&mut self) -> Result<Vec<u8>, ErrorCode> {
        // AT_PAGESZ 4096, AT_NULL
        let mut auxv = Vec::new();
        for word in [6u64, 4096, 0, 0] {
            auxv.extend_from_slice(&word.to_le_bytes());
        }
        Ok(auxv)
    }
}

/// [`Spawner`] that hands out backends for one [`FakeMachine`].
pub struct FakeSpawner {
    machine: FakeMachine,
}

impl Spawner for FakeSpawner {
    fn spawn(&mut self, launch: &LaunchInfo) -> Result<Box<dyn Backend>, ErrorCode> {
        self.machine.inner.lock().launches.push(launch.clone());
        Ok(Box::new(self.machine.backend()))
    }

    fn attach(&mut self, pid: Pid) -> Result<Box<dyn Backend>, ErrorCode> {
        if pid != self.machine.pid() {
            return Err(ErrorCode::ProcessNotFound);
        }
        Ok(Box::new(self.machine.backend()))
    }
}
