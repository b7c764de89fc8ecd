/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Target addresses and access to target memory.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::ops::Add;
use std::ops::Sub;

use bitflags::bitflags;
use serde::Deserialize;
use serde::Serialize;

use crate::ErrorCode;

/// An address in the target's address space. An address may be "unset", in
/// which case every memory operation rejects it. Equality, ordering and
/// hashing only look at the numeric value.
#[derive(Copy, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    value: u64,
    valid: bool,
}

impl Address {
    /// A valid address.
    pub const fn new(value: u64) -> Self {
        Address { value, valid: true }
    }

    /// The unset address.
    pub const fn invalid() -> Self {
        Address {
            value: 0,
            valid: false,
        }
    }

    /// Numeric value. Zero when unset.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// True when the address has been set.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Resets to the unset state.
    pub fn clear(&mut self) {
        *self = Address::invalid();
    }

    /// Adds an offset, returning `None` on overflow or when unset.
    pub fn checked_add(self, offset: u64) -> Option<Self> {
        if !self.valid {
            return None;
        }
        self.value.checked_add(offset).map(Address::new)
    }

    /// True when this address lies within `[start, start + len)`.
    pub fn is_within(&self, start: Address, len: u64) -> bool {
        self.value >= start.value && self.value - start.value < len
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address::new(value)
    }
}

impl Add<u64> for Address {
    type Output = Address;

    fn add(self, rhs: u64) -> Address {
        Address {
            value: self.value.wrapping_add(rhs),
            valid: self.valid,
        }
    }
}

impl Sub<u64> for Address {
    type Output = Address;

    fn sub(self, rhs: u64) -> Address {
        Address {
            value: self.value.wrapping_sub(rhs),
            valid: self.valid,
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Address {}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.valid {
            write!(f, "{:#x}", self.value)
        } else {
            f.write_str("<unset>")
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

bitflags! {
    /// Page protection of a memory region.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Protection: u32 {
        const EXECUTE = 1;
        const WRITE = 2;
        const READ = 4;
    }
}

impl Protection {
    /// Parses a permission string such as `rx` or `rw-`.
    pub fn from_rwx(s: &str) -> Self {
        let mut prot = Protection::empty();
        for c in s.chars() {
            match c {
                'r' => prot |= Protection::READ,
                'w' => prot |= Protection::WRITE,
                'x' => prot |= Protection::EXECUTE,
                _ => {}
            }
        }
        prot
    }

    /// The `rwx` spelling used by LLDB region replies, omitting absent bits.
    pub fn to_rwx(self) -> String {
        let mut s = String::with_capacity(3);
        if self.contains(Protection::READ) {
            s.push('r');
        }
        if self.contains(Protection::WRITE) {
            s.push('w');
        }
        if self.contains(Protection::EXECUTE) {
            s.push('x');
        }
        s
    }
}

/// A mapped region of target memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegionInfo {
    pub start: Address,
    pub length: u64,
    pub protection: Protection,
    pub name: Option<String>,
}

impl MemoryRegionInfo {
    /// True when `addr` lies in this region.
    pub fn contains(&self, addr: Address) -> bool {
        addr.is_within(self.start, self.length)
    }
}

/// Access to the memory of a (usually remote) address space.
pub trait MemoryAccess {
    /// Reads bytes starting at `addr`. Returns the number of bytes read, which
    /// may be less than `buf.len()`.
    fn read(&mut self, addr: Address, buf: &mut [u8]) -> Result<usize, ErrorCode>;

    /// Writes bytes starting at `addr`. Returns the number of bytes written,
    /// which may be less than `buf.len()`.
    fn write(&mut self, addr: Address, buf: &[u8]) -> Result<usize, ErrorCode>;

    /// Reads exactly the number of bytes wanted by `buf`.
    fn read_exact(&mut self, addr: Address, mut buf: &mut [u8]) -> Result<(), ErrorCode> {
        if !addr.is_valid() {
            return Err(ErrorCode::InvalidArgument);
        }
        let mut addr = addr;

        while !buf.is_empty() {
            match self.read(addr, buf)? {
                0 => break,
                n => {
                    addr = addr + n as u64;
                    buf = &mut buf[n..];
                }
            }
        }

        if !buf.is_empty() {
            // Failed to fill the whole buffer.
            Err(ErrorCode::InvalidAddress)
        } else {
            Ok(())
        }
    }

    /// Writes all of `buf`. A short write is an error; the bytes that did make
    /// it are left in place.
    fn write_exact(&mut self, addr: Address, mut buf: &[u8]) -> Result<(), ErrorCode> {
        if !addr.is_valid() {
            return Err(ErrorCode::InvalidArgument);
        }
        let mut addr = addr;

        while !buf.is_empty() {
            match self.write(addr, buf)? {
                0 => break,
                n => {
                    addr = addr + n as u64;
                    buf = &buf[n..];
                }
            }
        }

        if !buf.is_empty() {
            Err(ErrorCode::InvalidAddress)
        } else {
            Ok(())
        }
    }

    /// Reads a little-endian `u64` at the given address.
    fn read_u64(&mut self, addr: Address) -> Result<u64, ErrorCode> {
        let mut bytes = [0u8; 8];
        self.read_exact(addr, &mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn address_identity_is_value_based() {
        let mut a = Address::new(0x1000);
        assert!(a.is_valid());
        assert_eq!(a, Address::new(0x1000));
        assert!(a < Address::new(0x1001));
        a.clear();
        assert!(!a.is_valid());
        assert_eq!(a.value(), 0);
        assert_eq!(Address::invalid().checked_add(1), None);
        assert_eq!(format!("{}", Address::new(255)), "0xff");
    }

    #[test]
    fn protection_strings() {
        let prot = Protection::from_rwx("r-x");
        assert_eq!(prot, Protection::READ | Protection::EXECUTE);
        assert_eq!(prot.to_rwx(), "rx");
        assert_eq!(Protection::EXECUTE.bits(), 1);
        assert_eq!(Protection::WRITE.bits(), 2);
        assert_eq!(Protection::READ.bits(), 4);
    }

    struct Flat(Vec<u8>);

    impl MemoryAccess for Flat {
        fn read(&mut self, addr: Address, buf: &mut [u8]) -> Result<usize, ErrorCode> {
            let start = addr.value() as usize;
            let avail = self.0.len().saturating_sub(start).min(buf.len());
            buf[..avail].copy_from_slice(&self.0[start..start + avail]);
            Ok(avail)
        }

        fn write(&mut self, addr: Address, buf: &[u8]) -> Result<usize, ErrorCode> {
            let start = addr.value() as usize;
            let avail = self.0.len().saturating_sub(start).min(buf.len());
            self.0[start..start + avail].copy_from_slice(&buf[..avail]);
            Ok(avail)
        }
    }

    #[test]
    fn exact_transfers_are_all_or_error() {
        let mut mem = Flat(vec![0; 8]);
        assert_eq!(
            mem.write_exact(Address::new(6), &[1, 2, 3]),
            Err(ErrorCode::InvalidAddress)
        );
        assert_eq!(
            mem.write_exact(Address::invalid(), &[1]),
            Err(ErrorCode::InvalidArgument)
        );
        mem.write_exact(Address::new(0), &[9; 8]).unwrap();
        assert_eq!(mem.read_u64(Address::new(0)), Ok(0x0909090909090909));
        let mut buf = [0; 4];
        assert!(mem.read_exact(Address::new(6), &mut buf).is_err());
    }
}
