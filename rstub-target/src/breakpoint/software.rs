/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeMap;

use super::Mode;
use super::Site;
use super::SiteKind;
use super::Strategy;
use super::overlay;
use crate::Address;
use crate::Architecture;
use crate::Backend;
use crate::CpuType;
use crate::ErrorCode;
use crate::Protection;
use crate::StopReason;
use crate::Thread;

/// Original bytes recorded for sites that have not been patched yet. Each
/// entry is consumed by the first patch of its site.
#[derive(Debug, Default)]
pub struct Stash {
    entries: BTreeMap<Address, Vec<u8>>,
}

impl Stash {
    pub fn record(&mut self, addr: Address, bytes: Vec<u8>) {
        self.entries.insert(addr, bytes);
    }

    /// Takes the entry for `addr` if it covers exactly `len` bytes.
    pub fn take(&mut self, addr: Address, len: usize) -> Option<Vec<u8>> {
        match self.entries.remove(&addr) {
            Some(bytes) if bytes.len() == len => Some(bytes),
            _ => None,
        }
    }

    pub fn forget(&mut self, addr: Address) {
        self.entries.remove(&addr);
    }

    /// Applies a debugger write to any overlapping entry.
    pub fn update(&mut self, start: Address, data: &[u8]) {
        for (addr, bytes) in self.entries.iter_mut() {
            overlay(*addr, bytes, start, data);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Materializes sites by overwriting code with the architecture's trap
/// instruction.
#[derive(Debug)]
pub struct SoftwareTraps {
    arch: &'static Architecture,
    stash: Stash,
}

impl SoftwareTraps {
    pub fn new(arch: &'static Architecture) -> Self {
        SoftwareTraps {
            arch,
            stash: Stash::default(),
        }
    }

    pub fn stash(&self) -> &Stash {
        &self.stash
    }

    pub(crate) fn stash_mut(&mut self) -> &mut Stash {
        &mut self.stash
    }
}

impl Strategy for SoftwareTraps {
    const KIND: SiteKind = SiteKind::Software;

    fn is_valid(
        &self,
        backend: &mut dyn Backend,
        address: Address,
        size: u32,
        mode: Mode,
    ) -> Result<(), ErrorCode> {
        if mode != Mode::EXEC {
            return Err(ErrorCode::Unsupported);
        }
        let opcode = self.arch.trap_opcode(size)?;
        if !matches!(self.arch.cpu, CpuType::X86 | CpuType::X86_64)
            && address.value() % opcode.len() as u64 != 0
        {
            return Err(ErrorCode::InvalidArgument);
        }
        match backend.memory_region(address) {
            Ok(region) if !region.protection.contains(Protection::EXECUTE) => {
                Err(ErrorCode::InvalidAddress)
            }
            Ok(_) | Err(ErrorCode::Unsupported) => Ok(()),
            Err(ErrorCode::NotFound) => Err(ErrorCode::InvalidAddress),
            Err(err) => Err(err),
        }
    }

    fn on_add(&mut self, backend: &mut dyn Backend, site: &mut Site) -> Result<(), ErrorCode> {
        let len = self.arch.trap_opcode(site.size)?.len();
        let mut original = vec![0; len];
        backend.read_exact(site.address, &mut original)?;
        self.stash.record(site.address, original);
        Ok(())
    }

    fn on_remove(&mut self, site: &Site) {
        self.stash.forget(site.address);
    }

    fn enable_location(
        &mut self,
        backend: &mut dyn Backend,
        site: &mut Site,
    ) -> Result<(), ErrorCode> {
        let opcode = self.arch.trap_opcode(site.size)?;

        let original = match site.saved.take() {
            Some(saved) => saved,
            None => match self.stash.take(site.address, opcode.len()) {
                Some(stashed) => stashed,
                None => {
                    let mut bytes = vec![0; opcode.len()];
                    backend.read_exact(site.address, &mut bytes)?;
                    bytes
                }
            },
        };

        let written = backend.write_exact(site.address, opcode);
        site.saved = Some(original);
        if let Err(err) = written {
            // Put back whatever part of the trap made it in.
            if let Some(saved) = &site.saved {
                let _ = backend.write_exact(site.address, saved);
            }
            return Err(err);
        }

        site.enabled = true;
        Ok(())
    }

    fn disable_location(
        &mut self,
        backend: &mut dyn Backend,
        site: &mut Site,
    ) -> Result<(), ErrorCode> {
        let saved = site.saved.as_deref().ok_or(ErrorCode::Unknown)?;
        backend.write_exact(site.address, saved)?;
        site.enabled = false;
        Ok(())
    }

    fn hit_address(
        &self,
        backend: &mut dyn Backend,
        thread: &Thread,
    ) -> Result<Option<Address>, ErrorCode> {
        let regs = backend.read_registers(thread.tid())?;
        Ok(regs
            .pc()
            .checked_sub(self.arch.trap_pc_adjust)
            .map(Address::new))
    }

    fn find<'a>(&self, sites: &'a BTreeMap<Address, Site>, addr: Address) -> Option<&'a Site> {
        sites.get(&addr)
    }

    fn report_hit(
        &self,
        backend: &mut dyn Backend,
        thread: &mut Thread,
        site: &Site,
    ) -> Result<(), ErrorCode> {
        if self.arch.trap_pc_adjust != 0 {
            let mut regs = backend.read_registers(thread.tid())?;
            regs.set_pc(site.address.value());
            backend.write_registers(thread.tid(), &regs)?;
        }
        thread.stop_info.reason = StopReason::Breakpoint;
        thread.stop_info.address = Some(site.address);
        thread.stop_info.hardware = false;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Pid;
    use crate::StopInfo;
    use crate::breakpoint::Lifetime;
    use crate::breakpoint::SoftwareBreakpointManager;
    use crate::testing::FakeMachine;

    const CODE: u64 = 0x1000;

    fn setup() -> (FakeMachine, SoftwareBreakpointManager) {
        let machine = FakeMachine::new(100);
        machine.map(CODE, vec![0x90; 64], Protection::READ | Protection::EXECUTE);
        machine.map(0x8000, vec![0; 64], Protection::READ | Protection::WRITE);
        (
            machine,
            SoftwareBreakpointManager::new(SoftwareTraps::new(&Architecture::X86_64)),
        )
    }

    #[test]
    fn add_while_disabled_stashes_and_does_not_patch() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        let addr = Address::new(CODE + 4);

        bpm.add(&mut backend, addr, Lifetime::Permanent, 1, Mode::EXEC)
            .unwrap();
        assert_eq!(machine.peek(addr.value(), 1), vec![0x90]);
        assert_eq!(bpm.strategy().stash().len(), 1);

        bpm.enable(&mut backend).unwrap();
        assert_eq!(machine.peek(addr.value(), 1), vec![0xcc]);
        assert!(bpm.strategy().stash().is_empty());

        bpm.disable(&mut backend).unwrap();
        assert_eq!(machine.peek(addr.value(), 1), vec![0x90]);
    }

    #[test]
    fn refcounts_and_conflicts() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        let addr = Address::new(CODE);

        bpm.add(&mut backend, addr, Lifetime::Permanent, 1, Mode::EXEC)
            .unwrap();
        bpm.add(&mut backend, addr, Lifetime::Permanent, 1, Mode::EXEC)
            .unwrap();
        assert_eq!(bpm.get(addr).map(|s| s.refs), Some(2));
        assert_eq!(
            bpm.add(&mut backend, addr, Lifetime::Permanent, 1, Mode::WRITE),
            Err(ErrorCode::AlreadyExist)
        );

        bpm.enable(&mut backend).unwrap();
        bpm.remove(&mut backend, addr).unwrap();
        assert_eq!(machine.peek(CODE, 1), vec![0xcc]);
        bpm.remove(&mut backend, addr).unwrap();
        assert_eq!(machine.peek(CODE, 1), vec![0x90]);
        assert!(!bpm.has(addr));
        assert_eq!(bpm.remove(&mut backend, addr), Err(ErrorCode::NotFound));
    }

    #[test]
    fn rejects_non_executable_and_bad_kinds() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        assert_eq!(
            bpm.add(
                &mut backend,
                Address::new(0x8000),
                Lifetime::Permanent,
                1,
                Mode::EXEC
            ),
            Err(ErrorCode::InvalidAddress)
        );
        assert_eq!(
            bpm.add(
                &mut backend,
                Address::new(CODE),
                Lifetime::Permanent,
                2,
                Mode::EXEC
            ),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(
            bpm.add(
                &mut backend,
                Address::new(CODE),
                Lifetime::Permanent,
                1,
                Mode::WRITE
            ),
            Err(ErrorCode::Unsupported)
        );
        assert!(bpm.is_empty());
    }

    #[test]
    fn hit_rewinds_pc_and_drops_one_shot() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        let addr = Address::new(CODE + 8);
        let tid = Pid::from_raw(100);

        bpm.add(&mut backend, addr, Lifetime::TemporaryOneShot, 1, Mode::EXEC)
            .unwrap();
        bpm.enable(&mut backend).unwrap();
        bpm.disable(&mut backend).unwrap();

        machine.set_pc(tid, addr.value() + 1);
        let mut thread = Thread::new(tid);
        thread.stop_info = StopInfo::stopped(StopReason::Trap, 5);

        let site = bpm.hit(&mut backend, &mut thread).unwrap();
        assert_eq!(site.map(|s| s.address), Some(addr));
        assert_eq!(machine.pc(tid), addr.value());
        assert_eq!(thread.stop_info.reason, StopReason::Breakpoint);
        assert!(!bpm.has(addr));
    }

    #[test]
    fn hit_ignores_non_trap_stops_and_unknown_addresses() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        let tid = Pid::from_raw(100);
        bpm.add(
            &mut backend,
            Address::new(CODE),
            Lifetime::Permanent,
            1,
            Mode::EXEC,
        )
        .unwrap();

        let mut thread = Thread::new(tid);
        machine.set_pc(tid, CODE + 1);
        thread.stop_info = StopInfo::stopped(StopReason::Signal, 11);
        assert_eq!(bpm.hit(&mut backend, &mut thread), Ok(None));

        machine.set_pc(tid, CODE + 5);
        thread.stop_info = StopInfo::stopped(StopReason::Trap, 5);
        assert_eq!(bpm.hit(&mut backend, &mut thread), Ok(None));
        assert_eq!(machine.pc(tid), CODE + 5);
    }

    #[test]
    fn short_write_leaves_memory_unpatched() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        let addr = Address::new(CODE + 1);
        bpm.add(&mut backend, addr, Lifetime::Permanent, 1, Mode::EXEC)
            .unwrap();

        machine.fail_writes(true);
        assert!(bpm.enable(&mut backend).is_err());
        machine.fail_writes(false);
        assert_eq!(machine.peek(addr.value(), 1), vec![0x90]);
        assert_eq!(bpm.get(addr).map(|s| s.enabled), Some(false));
    }

    #[test]
    fn reads_see_original_bytes_and_writes_refresh_them() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        let addr = Address::new(CODE + 2);
        bpm.add(&mut backend, addr, Lifetime::Permanent, 1, Mode::EXEC)
            .unwrap();
        bpm.enable(&mut backend).unwrap();

        let mut buf = machine.peek(CODE, 4);
        assert_eq!(buf, vec![0x90, 0x90, 0xcc, 0x90]);
        bpm.insert_stashed_insns(Address::new(CODE), &mut buf);
        assert_eq!(buf, vec![0x90; 4]);

        bpm.disable(&mut backend).unwrap();
        bpm.refresh_original(Address::new(CODE + 2), &[0x55]);
        bpm.enable(&mut backend).unwrap();
        bpm.disable(&mut backend).unwrap();
        assert_eq!(machine.peek(addr.value(), 1), vec![0x55]);
    }

    #[test]
    fn clear_restores_everything() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        for offset in [0, 3, 9] {
            bpm.add(
                &mut backend,
                Address::new(CODE + offset),
                Lifetime::Permanent,
                1,
                Mode::EXEC,
            )
            .unwrap();
        }
        bpm.enable(&mut backend).unwrap();
        bpm.clear(&mut backend).unwrap();
        assert!(bpm.is_empty());
        assert_eq!(machine.peek(CODE, 16), vec![0x90; 16]);
    }
}
