/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Breakpoint bookkeeping.
//!
//! A [`BreakpointManager`] owns the sites registered for one process and the
//! process-wide "enabled" switch. Sites are only materialized in the target
//! (trap bytes written, debug registers loaded) while the switch is on, which
//! the process turns on right before resuming and off right after stopping.
//! The mechanism that materializes a site is a [`Strategy`]: trap instructions
//! for [`SoftwareBreakpointManager`], debug register slots for
//! [`HardwareBreakpointManager`].

mod hardware;
mod software;

use std::collections::BTreeMap;

use bitflags::bitflags;

pub use self::hardware::DebugRegisterSlots;
pub use self::software::SoftwareTraps;
use crate::Address;
use crate::Backend;
use crate::ErrorCode;
use crate::Thread;

/// Software (trap instruction) breakpoints.
pub type SoftwareBreakpointManager = BreakpointManager<SoftwareTraps>;

/// Hardware (debug register) breakpoints and watchpoints.
pub type HardwareBreakpointManager = BreakpointManager<DebugRegisterSlots>;

/// When a site goes away by itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lifetime {
    Permanent,
    /// Removed the first time it is hit.
    TemporaryOneShot,
    /// Removed once it is hit, for run-to-location style stops.
    TemporaryUntilHit,
}

bitflags! {
    /// Which accesses trigger a site.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Mode: u32 {
        const EXEC = 1;
        const READ = 2;
        const WRITE = 4;
    }
}

/// How a site is materialized.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SiteKind {
    Software,
    Hardware,
}

/// A registered breakpoint or watchpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub address: Address,
    pub kind: SiteKind,
    pub lifetime: Lifetime,
    /// Trap kind for software sites, watched length for hardware ones.
    pub size: u32,
    pub mode: Mode,
    /// Number of outstanding `add` calls.
    pub refs: u32,
    /// True while the site is materialized in the target.
    pub enabled: bool,
    /// Original instruction bytes, for software sites.
    pub saved: Option<Vec<u8>>,
    /// Debug register slot, for hardware sites.
    pub slot: Option<usize>,
}

impl Site {
    /// True when `addr` falls inside the range this site covers.
    pub fn covers(&self, addr: Address) -> bool {
        addr.is_within(self.address, u64::from(self.size.max(1)))
    }
}

/// The part of a manager that differs between software and hardware sites.
pub trait Strategy: Send {
    const KIND: SiteKind;

    /// Rejects sites the mechanism cannot support.
    fn is_valid(
        &self,
        backend: &mut dyn Backend,
        address: Address,
        size: u32,
        mode: Mode,
    ) -> Result<(), ErrorCode>;

    /// Called once when a new site is registered.
    fn on_add(&mut self, backend: &mut dyn Backend, site: &mut Site) -> Result<(), ErrorCode>;

    /// Called once when a site is unregistered.
    fn on_remove(&mut self, site: &Site);

    fn enable_location(
        &mut self,
        backend: &mut dyn Backend,
        site: &mut Site,
    ) -> Result<(), ErrorCode>;

    fn disable_location(
        &mut self,
        backend: &mut dyn Backend,
        site: &mut Site,
    ) -> Result<(), ErrorCode>;

    /// Pushes accumulated changes to the target after a batch of
    /// enable/disable calls.
    fn commit(&mut self, _backend: &mut dyn Backend) -> Result<(), ErrorCode> {
        Ok(())
    }

    /// The address a stopped thread reports for this mechanism.
    fn hit_address(
        &self,
        backend: &mut dyn Backend,
        thread: &Thread,
    ) -> Result<Option<Address>, ErrorCode>;

    /// Finds the site responsible for a stop at `addr`.
    fn find<'a>(&self, sites: &'a BTreeMap<Address, Site>, addr: Address) -> Option<&'a Site>;

    /// Fixes up the thread after a hit: program counter, stop reason.
    fn report_hit(
        &self,
        backend: &mut dyn Backend,
        thread: &mut Thread,
        site: &Site,
    ) -> Result<(), ErrorCode>;
}

/// Registered sites of one process plus the global enabled switch.
#[derive(Debug)]
pub struct BreakpointManager<S> {
    sites: BTreeMap<Address, Site>,
    enabled: bool,
    strategy: S,
}

impl<S: Strategy> BreakpointManager<S> {
    pub fn new(strategy: S) -> Self {
        BreakpointManager {
            sites: BTreeMap::new(),
            enabled: false,
            strategy,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Whether sites are currently materialized in the target.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Registers a site, or takes another reference on an identical one.
    pub fn add(
        &mut self,
        backend: &mut dyn Backend,
        address: Address,
        lifetime: Lifetime,
        size: u32,
        mode: Mode,
    ) -> Result<(), ErrorCode> {
        if !address.is_valid() {
            return Err(ErrorCode::InvalidArgument);
        }

        if let Some(site) = self.sites.get_mut(&address) {
            if site.size != size || site.mode != mode {
                return Err(ErrorCode::AlreadyExist);
            }
            site.refs += 1;
            if lifetime == Lifetime::Permanent {
                site.lifetime = Lifetime::Permanent;
            }
            return Ok(());
        }

        self.strategy.is_valid(backend, address, size, mode)?;

        let mut site = Site {
            address,
            kind: S::KIND,
            lifetime,
            size,
            mode,
            refs: 1,
            enabled: false,
            saved: None,
            slot: None,
        };
        self.strategy.on_add(backend, &mut site)?;

        if self.enabled {
            let enabled = self
                .strategy
                .enable_location(backend, &mut site)
                .and_then(|()| self.strategy.commit(backend));
            if let Err(err) = enabled {
                self.strategy.on_remove(&site);
                return Err(err);
            }
        }

        tracing::debug!("added {:?} breakpoint at {}", S::KIND, address);
        self.sites.insert(address, site);
        Ok(())
    }

    /// Drops one reference to the site at `address`, unregistering it when
    /// none remain.
    pub fn remove(&mut self, backend: &mut dyn Backend, address: Address) -> Result<(), ErrorCode> {
        let site = self.sites.get_mut(&address).ok_or(ErrorCode::NotFound)?;
        if site.refs > 1 {
            site.refs -= 1;
            return Ok(());
        }
        self.unregister(backend, address)
    }

    /// [`remove`](Self::remove), restricted to a site of the given mode.
    pub fn remove_mode(
        &mut self,
        backend: &mut dyn Backend,
        address: Address,
        mode: Mode,
    ) -> Result<(), ErrorCode> {
        match self.sites.get(&address) {
            Some(site) if site.mode == mode => self.remove(backend, address),
            _ => Err(ErrorCode::NotFound),
        }
    }

    fn unregister(&mut self, backend: &mut dyn Backend, address: Address) -> Result<(), ErrorCode> {
        let Some(mut site) = self.sites.remove(&address) else {
            return Err(ErrorCode::NotFound);
        };

        if site.enabled {
            let restored = self
                .strategy
                .disable_location(backend, &mut site)
                .and_then(|()| self.strategy.commit(backend));
            if let Err(err) = restored {
                // Still in the target, so keep tracking it.
                site.refs = 1;
                self.sites.insert(address, site);
                return Err(err);
            }
        }

        self.strategy.on_remove(&site);
        tracing::debug!("removed {:?} breakpoint at {}", S::KIND, address);
        Ok(())
    }

    pub fn has(&self, address: Address) -> bool {
        self.sites.contains_key(&address)
    }

    pub fn get(&self, address: Address) -> Option<&Site> {
        self.sites.get(&address)
    }

    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Materializes every registered site. Every site is attempted; the first
    /// failure is returned.
    pub fn enable(&mut self, backend: &mut dyn Backend) -> Result<(), ErrorCode> {
        let mut result = Ok(());
        for site in self.sites.values_mut().filter(|s| !s.enabled) {
            if let Err(err) = self.strategy.enable_location(backend, site) {
                tracing::warn!("failed to enable breakpoint at {}: {}", site.address, err);
                result = result.and(Err(err));
            }
        }
        self.enabled = true;
        self.strategy.commit(backend).and(result)
    }

    /// Takes every site back out of the target.
    pub fn disable(&mut self, backend: &mut dyn Backend) -> Result<(), ErrorCode> {
        let mut result = Ok(());
        for site in self.sites.values_mut().filter(|s| s.enabled) {
            if let Err(err) = self.strategy.disable_location(backend, site) {
                tracing::warn!("failed to disable breakpoint at {}: {}", site.address, err);
                result = result.and(Err(err));
            }
        }
        self.enabled = false;
        self.strategy.commit(backend).and(result)
    }

    /// Decides whether `thread` stopped because of one of our sites. On a hit
    /// the thread's stop info (and program counter, for traps that advance it)
    /// are rewritten and temporary sites are dropped.
    pub fn hit(
        &mut self,
        backend: &mut dyn Backend,
        thread: &mut Thread,
    ) -> Result<Option<Site>, ErrorCode> {
        if !thread.stop_info.is_trap() {
            return Ok(None);
        }
        let Some(addr) = self.strategy.hit_address(backend, thread)? else {
            return Ok(None);
        };
        let Some(site) = self.strategy.find(&self.sites, addr).cloned() else {
            return Ok(None);
        };

        self.strategy.report_hit(backend, thread, &site)?;

        if site.lifetime != Lifetime::Permanent {
            self.unregister(backend, site.address)?;
        }
        Ok(Some(site))
    }

    /// Restores everything and forgets every site.
    pub fn clear(&mut self, backend: &mut dyn Backend) -> Result<(), ErrorCode> {
        let result = self.disable(backend);
        for site in std::mem::take(&mut self.sites).into_values() {
            self.strategy.on_remove(&site);
        }
        result
    }
}

impl SoftwareBreakpointManager {
    /// Overlays the original bytes of materialized sites onto `buf`, which
    /// holds target memory read from `start`.
    pub fn insert_stashed_insns(&self, start: Address, buf: &mut [u8]) {
        for site in self.sites.values().filter(|s| s.enabled) {
            if let Some(saved) = &site.saved {
                overlay(start, buf, site.address, saved);
            }
        }
    }

    /// Keeps saved original bytes in sync with a debugger write of `data` at
    /// `start`.
    pub fn refresh_original(&mut self, start: Address, data: &[u8]) {
        for site in self.sites.values_mut() {
            if let Some(saved) = site.saved.as_mut() {
                overlay(site.address, saved, start, data);
            }
        }
        self.strategy.stash_mut().update(start, data);
    }
}

/// Copies the part of `src` (located at `src_addr`) that overlaps `dst`
/// (located at `dst_addr`).
pub(crate) fn overlay(dst_addr: Address, dst: &mut [u8], src_addr: Address, src: &[u8]) {
    let dst_start = dst_addr.value();
    let dst_end = dst_start.saturating_add(dst.len() as u64);
    let src_start = src_addr.value();
    let src_end = src_start.saturating_add(src.len() as u64);

    let lo = dst_start.max(src_start);
    let hi = dst_end.min(src_end);
    if lo >= hi {
        return;
    }
    let len = (hi - lo) as usize;
    let d = (lo - dst_start) as usize;
    let s = (lo - src_start) as usize;
    dst[d..d + len].copy_from_slice(&src[s..s + len]);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlay_partial() {
        let mut buf = [0u8; 4];
        overlay(Address::new(10), &mut buf, Address::new(12), &[1, 2, 3, 4]);
        assert_eq!(buf, [0, 0, 1, 2]);
        overlay(Address::new(10), &mut buf, Address::new(8), &[7, 7, 9]);
        assert_eq!(buf, [9, 0, 1, 2]);
        overlay(Address::new(10), &mut buf, Address::new(20), &[5]);
        assert_eq!(buf, [9, 0, 1, 2]);
    }
}
