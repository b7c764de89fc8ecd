/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Per-architecture constant tables and register state.

use serde::Deserialize;
use serde::Serialize;

use crate::ErrorCode;

/// CPU family of a target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuType {
    X86,
    X86_64,
    Arm,
    Arm64,
}

impl CpuType {
    /// Mach-O style CPU type number, as expected by LLDB.
    pub fn lldb_cpu_type(self) -> u32 {
        const ABI64: u32 = 0x0100_0000;
        match self {
            CpuType::X86 => 7,
            CpuType::X86_64 => 7 | ABI64,
            CpuType::Arm => 12,
            CpuType::Arm64 => 12 | ABI64,
        }
    }

    /// Mach-O style CPU subtype number.
    pub fn lldb_cpu_subtype(self) -> u32 {
        match self {
            CpuType::X86 | CpuType::X86_64 => 3,
            CpuType::Arm => 9,
            CpuType::Arm64 => 0,
        }
    }
}

/// Byte order of a target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Endian {
    #[default]
    Unknown = 0,
    Big = 1,
    Little = 2,
    Pdp = 3,
}

impl Endian {
    /// Name used in LLDB info replies.
    pub fn as_str(self) -> &'static str {
        match self {
            Endian::Unknown => "unknown",
            Endian::Big => "big",
            Endian::Little => "little",
            Endian::Pdp => "pdp",
        }
    }
}

/// Describes one general purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDef {
    pub name: &'static str,
    pub bits: u32,
    pub dwarf: Option<u32>,
    /// LLDB generic role, such as `pc` or `sp`.
    pub generic: Option<&'static str>,
}

impl RegisterDef {
    /// Width in bytes.
    pub fn size(&self) -> usize {
        (self.bits / 8) as usize
    }
}

const fn reg(name: &'static str, bits: u32, dwarf: u32) -> RegisterDef {
    RegisterDef {
        name,
        bits,
        dwarf: Some(dwarf),
        generic: None,
    }
}

const fn role(name: &'static str, bits: u32, dwarf: u32, generic: &'static str) -> RegisterDef {
    RegisterDef {
        name,
        bits,
        dwarf: Some(dwarf),
        generic: Some(generic),
    }
}

const fn nodwarf(name: &'static str, bits: u32) -> RegisterDef {
    RegisterDef {
        name,
        bits,
        dwarf: None,
        generic: None,
    }
}

/// Everything rstub needs to know about one CPU architecture.
#[derive(Debug, PartialEq, Eq)]
pub struct Architecture {
    pub cpu: CpuType,
    pub endian: Endian,
    pub pointer_size: usize,
    /// General registers, in `g` packet order.
    pub registers: &'static [RegisterDef],
    pub pc: usize,
    pub sp: usize,
    pub fp: usize,
    /// Trap instructions, indexed by breakpoint kind (the `Z0` size field).
    trap_opcodes: &'static [(u32, &'static [u8])],
    /// How far the program counter has moved past a software trap when it is
    /// reported.
    pub trap_pc_adjust: u64,
    pub hardware_slots: usize,
    pub gdb_arch: &'static str,
    pub triple: &'static str,
}

const X86_64_REGISTERS: [RegisterDef; 24] = [
    reg("rax", 64, 0),
    reg("rbx", 64, 3),
    role("rcx", 64, 2, "arg4"),
    role("rdx", 64, 1, "arg3"),
    role("rsi", 64, 4, "arg2"),
    role("rdi", 64, 5, "arg1"),
    role("rbp", 64, 6, "fp"),
    role("rsp", 64, 7, "sp"),
    role("r8", 64, 8, "arg5"),
    role("r9", 64, 9, "arg6"),
    reg("r10", 64, 10),
    reg("r11", 64, 11),
    reg("r12", 64, 12),
    reg("r13", 64, 13),
    reg("r14", 64, 14),
    reg("r15", 64, 15),
    role("rip", 64, 16, "pc"),
    role("eflags", 32, 49, "flags"),
    reg("cs", 32, 51),
    reg("ss", 32, 52),
    reg("ds", 32, 53),
    reg("es", 32, 50),
    nodwarf("fs", 32),
    nodwarf("gs", 32),
];

const AARCH64_REGISTERS: [RegisterDef; 34] = [
    role("x0", 64, 0, "arg1"),
    role("x1", 64, 1, "arg2"),
    role("x2", 64, 2, "arg3"),
    role("x3", 64, 3, "arg4"),
    role("x4", 64, 4, "arg5"),
    role("x5", 64, 5, "arg6"),
    role("x6", 64, 6, "arg7"),
    role("x7", 64, 7, "arg8"),
    reg("x8", 64, 8),
    reg("x9", 64, 9),
    reg("x10", 64, 10),
    reg("x11", 64, 11),
    reg("x12", 64, 12),
    reg("x13", 64, 13),
    reg("x14", 64, 14),
    reg("x15", 64, 15),
    reg("x16", 64, 16),
    reg("x17", 64, 17),
    reg("x18", 64, 18),
    reg("x19", 64, 19),
    reg("x20", 64, 20),
    reg("x21", 64, 21),
    reg("x22", 64, 22),
    reg("x23", 64, 23),
    reg("x24", 64, 24),
    reg("x25", 64, 25),
    reg("x26", 64, 26),
    reg("x27", 64, 27),
    reg("x28", 64, 28),
    role("x29", 64, 29, "fp"),
    role("x30", 64, 30, "ra"),
    role("sp", 64, 31, "sp"),
    role("pc", 64, 32, "pc"),
    role("cpsr", 32, 33, "flags"),
];

impl Architecture {
    pub const X86_64: Architecture = Architecture {
        cpu: CpuType::X86_64,
        endian: Endian::Little,
        pointer_size: 8,
        registers: &X86_64_REGISTERS,
        pc: 16,
        sp: 7,
        fp: 6,
        trap_opcodes: &[(1, &[0xcc])],
        trap_pc_adjust: 1,
        hardware_slots: 4,
        gdb_arch: "i386:x86-64",
        triple: "x86_64-pc-linux-gnu",
    };

    pub const AARCH64: Architecture = Architecture {
        cpu: CpuType::Arm64,
        endian: Endian::Little,
        pointer_size: 8,
        registers: &AARCH64_REGISTERS,
        pc: 32,
        sp: 31,
        fp: 29,
        // brk #0
        trap_opcodes: &[(4, &[0x00, 0x00, 0x20, 0xd4])],
        trap_pc_adjust: 0,
        hardware_slots: 4,
        gdb_arch: "aarch64",
        triple: "aarch64-unknown-linux-gnu",
    };

    /// The architecture rstub itself was built for, if it has a table.
    pub fn native() -> Option<&'static Architecture> {
        if cfg!(target_arch = "x86_64") {
            Some(&Self::X86_64)
        } else if cfg!(target_arch = "aarch64") {
            Some(&Self::AARCH64)
        } else {
            None
        }
    }

    /// The trap instruction for a breakpoint of the given kind.
    pub fn trap_opcode(&self, kind: u32) -> Result<&'static [u8], ErrorCode> {
        self.trap_opcodes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, opcode)| *opcode)
            .ok_or(ErrorCode::InvalidArgument)
    }

    /// Looks a register up by its `g` packet index.
    pub fn register(&self, regno: usize) -> Option<&'static RegisterDef> {
        self.registers.get(regno)
    }

    /// Size in bytes of a full `g` packet.
    pub fn gpr_size(&self) -> usize {
        self.registers.iter().map(RegisterDef::size).sum()
    }

    /// Byte offset of a register in the `g` packet.
    pub fn register_offset(&self, regno: usize) -> usize {
        self.registers[..regno.min(self.registers.len())]
            .iter()
            .map(RegisterDef::size)
            .sum()
    }
}

/// The general registers of one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuState {
    arch: &'static Architecture,
    values: Vec<u64>,
}

impl CpuState {
    /// All-zero register state.
    pub fn new(arch: &'static Architecture) -> Self {
        CpuState {
            arch,
            values: vec![0; arch.registers.len()],
        }
    }

    pub fn arch(&self) -> &'static Architecture {
        self.arch
    }

    pub fn get(&self, regno: usize) -> Option<u64> {
        self.values.get(regno).copied()
    }

    /// Sets a register, truncating the value to the register's width.
    pub fn set(&mut self, regno: usize, value: u64) -> Result<(), ErrorCode> {
        let def = self.arch.register(regno).ok_or(ErrorCode::InvalidArgument)?;
        let mask = if def.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << def.bits) - 1
        };
        self.values[regno] = value & mask;
        Ok(())
    }

    pub fn pc(&self) -> u64 {
        self.values[self.arch.pc]
    }

    pub fn set_pc(&mut self, pc: u64) {
        self.values[self.arch.pc] = pc;
    }

    pub fn sp(&self) -> u64 {
        self.values[self.arch.sp]
    }

    pub fn fp(&self) -> u64 {
        self.values[self.arch.fp]
    }

    /// Target-order bytes of one register.
    pub fn register_bytes(&self, regno: usize) -> Result<Vec<u8>, ErrorCode> {
        let def = self.arch.register(regno).ok_or(ErrorCode::InvalidArgument)?;
        Ok(self.values[regno].to_le_bytes()[..def.size()].to_vec())
    }

    /// Replaces one register from target-order bytes.
    pub fn set_register_bytes(&mut self, regno: usize, bytes: &[u8]) -> Result<(), ErrorCode> {
        let def = self.arch.register(regno).ok_or(ErrorCode::InvalidArgument)?;
        if bytes.len() != def.size() {
            return Err(ErrorCode::InvalidArgument);
        }
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        self.values[regno] = u64::from_le_bytes(raw);
        Ok(())
    }

    /// The `g` packet layout: every register in order at its own width.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.arch.gpr_size());
        for (value, def) in self.values.iter().zip(self.arch.registers) {
            out.extend_from_slice(&value.to_le_bytes()[..def.size()]);
        }
        out
    }

    /// Parses the `G` packet layout. A short buffer only updates the registers
    /// it fully covers; a long one is rejected.
    pub fn update_from_bytes(&mut self, bytes: &[u8]) -> Result<(), ErrorCode> {
        if bytes.len() > self.arch.gpr_size() {
            return Err(ErrorCode::InvalidArgument);
        }
        let mut rest = bytes;
        for regno in 0..self.values.len() {
            let size = self.arch.registers[regno].size();
            if rest.len() < size {
                break;
            }
            let (head, tail) = rest.split_at(size);
            self.set_register_bytes(regno, head)?;
            rest = tail;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn x86_64_layout() {
        let arch = &Architecture::X86_64;
        assert_eq!(arch.registers.len(), 24);
        assert_eq!(arch.gpr_size(), 17 * 8 + 7 * 4);
        assert_eq!(arch.register(arch.pc).map(|r| r.name), Some("rip"));
        assert_eq!(arch.register_offset(17), 17 * 8);
        assert_eq!(arch.trap_opcode(1), Ok(&[0xcc][..]));
        assert_eq!(arch.trap_opcode(2), Err(ErrorCode::InvalidArgument));
    }

    #[test]
    fn cpu_state_bytes() {
        let mut state = CpuState::new(&Architecture::X86_64);
        state.set_pc(0x401000);
        state.set(17, 0x1_0000_0246).unwrap();
        assert_eq!(state.get(17), Some(0x246));
        let bytes = state.to_bytes();
        assert_eq!(&bytes[16 * 8..17 * 8], &0x401000u64.to_le_bytes());

        let mut other = CpuState::new(&Architecture::X86_64);
        other.update_from_bytes(&bytes).unwrap();
        assert_eq!(other, state);
        assert!(other.update_from_bytes(&vec![0; bytes.len() + 1]).is_err());
    }

    #[test]
    fn aarch64_trap() {
        let arch = &Architecture::AARCH64;
        assert_eq!(arch.trap_opcode(4).map(|o| o.len()), Ok(4));
        assert_eq!(arch.trap_pc_adjust, 0);
        assert_eq!(arch.register(arch.pc).map(|r| r.name), Some("pc"));
    }
}
