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
use crate::Address;
use crate::Architecture;
use crate::Backend;
use crate::DebugRegisters;
use crate::ErrorCode;
use crate::StopReason;
use crate::Thread;

/// DR7 condition bits, indexed by access type.
const RW_EXEC: u64 = 0b00;
const RW_WRITE: u64 = 0b01;
const RW_ACCESS: u64 = 0b11;

fn len_bits(size: u32) -> Option<u64> {
    match size {
        1 => Some(0b00),
        2 => Some(0b01),
        8 => Some(0b10),
        4 => Some(0b11),
        _ => None,
    }
}

/// Materializes sites in a fixed number of debug register slots. Slots are
/// claimed when a site is registered, so running out is reported by `add`.
#[derive(Debug)]
pub struct DebugRegisterSlots {
    slots: Vec<Option<Address>>,
    image: DebugRegisters,
    dirty: bool,
}

impl DebugRegisterSlots {
    pub fn new(arch: &'static Architecture) -> Self {
        DebugRegisterSlots {
            slots: vec![None; arch.hardware_slots.min(4)],
            image: DebugRegisters::default(),
            dirty: false,
        }
    }

    /// Number of slots the target has.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The register image that was (or will be) loaded into the target.
    pub fn image(&self) -> &DebugRegisters {
        &self.image
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }
}

impl Strategy for DebugRegisterSlots {
    const KIND: SiteKind = SiteKind::Hardware;

    fn is_valid(
        &self,
        _backend: &mut dyn Backend,
        address: Address,
        size: u32,
        mode: Mode,
    ) -> Result<(), ErrorCode> {
        if mode.is_empty() {
            return Err(ErrorCode::InvalidArgument);
        }
        if mode.contains(Mode::EXEC) {
            if mode != Mode::EXEC || size != 1 {
                return Err(ErrorCode::InvalidArgument);
            }
        } else {
            if mode == Mode::READ {
                // No read-only condition in DR7.
                return Err(ErrorCode::Unsupported);
            }
            if len_bits(size).is_none() || address.value() % u64::from(size) != 0 {
                return Err(ErrorCode::InvalidArgument);
            }
        }
        if self.free_slot().is_none() {
            return Err(ErrorCode::NoSpace);
        }
        Ok(())
    }

    fn on_add(&mut self, _backend: &mut dyn Backend, site: &mut Site) -> Result<(), ErrorCode> {
        let slot = self.free_slot().ok_or(ErrorCode::NoSpace)?;
        self.slots[slot] = Some(site.address);
        site.slot = Some(slot);
        Ok(())
    }

    fn on_remove(&mut self, site: &Site) {
        if let Some(slot) = site.slot {
            self.slots[slot] = None;
        }
    }

    fn enable_location(
        &mut self,
        _backend: &mut dyn Backend,
        site: &mut Site,
    ) -> Result<(), ErrorCode> {
        let slot = site.slot.ok_or(ErrorCode::InvalidArgument)?;
        let rw = if site.mode == Mode::EXEC {
            RW_EXEC
        } else if site.mode == Mode::WRITE {
            RW_WRITE
        } else {
            RW_ACCESS
        };
        let len = if site.mode == Mode::EXEC {
            0
        } else {
            len_bits(site.size).ok_or(ErrorCode::InvalidArgument)?
        };

        let shift = 16 + 4 * slot;
        let control = &mut self.image.control;
        *control &= !(0b1111 << shift);
        *control |= (rw | (len << 2)) << shift;
        *control |= 1 << (2 * slot);
        self.image.addresses[slot] = site.address.value();
        self.dirty = true;
        site.enabled = true;
        Ok(())
    }

    fn disable_location(
        &mut self,
        _backend: &mut dyn Backend,
        site: &mut Site,
    ) -> Result<(), ErrorCode> {
        let slot = site.slot.ok_or(ErrorCode::InvalidArgument)?;
        self.image.control &= !(1 << (2 * slot));
        self.image.control &= !(0b1111 << (16 + 4 * slot));
        self.image.addresses[slot] = 0;
        self.dirty = true;
        site.enabled = false;
        Ok(())
    }

    fn commit(&mut self, backend: &mut dyn Backend) -> Result<(), ErrorCode> {
        if !self.dirty {
            return Ok(());
        }
        backend.write_debug_registers(&self.image)?;
        self.dirty = false;
        Ok(())
    }

    fn hit_address(
        &self,
        backend: &mut dyn Backend,
        thread: &Thread,
    ) -> Result<Option<Address>, ErrorCode> {
        if let Some(addr) = thread.stop_info.address {
            return Ok(Some(addr));
        }
        let regs = backend.read_registers(thread.tid())?;
        Ok(Some(Address::new(regs.pc())))
    }

    fn find<'a>(&self, sites: &'a BTreeMap<Address, Site>, addr: Address) -> Option<&'a Site> {
        sites.values().find(|site| site.covers(addr))
    }

    fn report_hit(
        &self,
        _backend: &mut dyn Backend,
        thread: &mut Thread,
        site: &Site,
    ) -> Result<(), ErrorCode> {
        thread.stop_info.reason = if site.mode == Mode::EXEC {
            StopReason::Breakpoint
        } else {
            StopReason::Watchpoint
        };
        thread.stop_info.address = Some(site.address);
        thread.stop_info.hardware = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Pid;
    use crate::Protection;
    use crate::StopInfo;
    use crate::breakpoint::HardwareBreakpointManager;
    use crate::breakpoint::Lifetime;
    use crate::testing::FakeMachine;

    fn setup() -> (FakeMachine, HardwareBreakpointManager) {
        let machine = FakeMachine::new(7);
        machine.map(0x1000, vec![0; 0x100], Protection::all());
        (
            machine,
            HardwareBreakpointManager::new(DebugRegisterSlots::new(&Architecture::X86_64)),
        )
    }

    #[test]
    fn fifth_site_runs_out_of_slots() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        for i in 0..4 {
            bpm.add(
                &mut backend,
                Address::new(0x1000 + i * 8),
                Lifetime::Permanent,
                8,
                Mode::WRITE,
            )
            .unwrap();
        }
        assert_eq!(
            bpm.add(
                &mut backend,
                Address::new(0x1080),
                Lifetime::Permanent,
                8,
                Mode::WRITE
            ),
            Err(ErrorCode::NoSpace)
        );

        bpm.remove(&mut backend, Address::new(0x1008)).unwrap();
        bpm.add(
            &mut backend,
            Address::new(0x1080),
            Lifetime::Permanent,
            1,
            Mode::EXEC,
        )
        .unwrap();
        assert_eq!(bpm.get(Address::new(0x1080)).and_then(|s| s.slot), Some(1));
    }

    #[test]
    fn dr7_encoding() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        bpm.add(
            &mut backend,
            Address::new(0x1000),
            Lifetime::Permanent,
            1,
            Mode::EXEC,
        )
        .unwrap();
        bpm.add(
            &mut backend,
            Address::new(0x1010),
            Lifetime::Permanent,
            4,
            Mode::WRITE,
        )
        .unwrap();
        bpm.add(
            &mut backend,
            Address::new(0x1020),
            Lifetime::Permanent,
            8,
            Mode::READ | Mode::WRITE,
        )
        .unwrap();

        bpm.enable(&mut backend).unwrap();
        let regs = machine.debug_registers();
        assert_eq!(regs.addresses, [0x1000, 0x1010, 0x1020, 0]);
        // L0 | L1 | L2, slot0 exec/len1, slot1 write/len4, slot2 access/len8
        let expected = 0b010101 | (0b1101 << 20) | (0b1011 << 24);
        assert_eq!(regs.control, expected);

        bpm.disable(&mut backend).unwrap();
        assert_eq!(machine.debug_registers().control, 0);
    }

    #[test]
    fn rejects_misaligned_watch() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        assert_eq!(
            bpm.add(
                &mut backend,
                Address::new(0x1002),
                Lifetime::Permanent,
                4,
                Mode::WRITE
            ),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(
            bpm.add(
                &mut backend,
                Address::new(0x1000),
                Lifetime::Permanent,
                4,
                Mode::READ
            ),
            Err(ErrorCode::Unsupported)
        );
    }

    #[test]
    fn watchpoint_hit() {
        let (machine, mut bpm) = setup();
        let mut backend = machine.backend();
        bpm.add(
            &mut backend,
            Address::new(0x1040),
            Lifetime::Permanent,
            8,
            Mode::WRITE,
        )
        .unwrap();

        let mut thread = Thread::new(Pid::from_raw(7));
        thread.stop_info = StopInfo::stopped(StopReason::Trap, 5);
        thread.stop_info.address = Some(Address::new(0x1044));
        let site = bpm.hit(&mut backend, &mut thread).unwrap();
        assert!(site.is_some());
        assert_eq!(thread.stop_info.reason, StopReason::Watchpoint);
        assert_eq!(thread.stop_info.address, Some(Address::new(0x1040)));
        assert!(thread.stop_info.hardware);
    }
}
