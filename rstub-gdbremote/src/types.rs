/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Reply payloads produced by session delegates and their wire encodings.

use rstub_target::Architecture;
use rstub_target::CpuType;
use rstub_target::Endian;
use rstub_target::MemoryRegionInfo;
use rstub_target::Pid;
use rstub_target::ProcessInfo;
use serde::Serialize;

use crate::response::ResponseWriter;
use crate::response::WriteResponse;

/// Protocol dialect spoken on a connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CompatMode {
    Gdb,
    Lldb,
}

/// `qGDBServerVersion`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub name: String,
    pub version: String,
}

impl Default for ServerVersion {
    fn default() -> Self {
        ServerVersion {
            name: String::from("rstub"),
            version: String::from(env!("CARGO_PKG_VERSION")),
        }
    }
}

impl WriteResponse for ServerVersion {
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_key_str("name", &self.name);
        f.put_key_str("version", &self.version);
    }
}

/// `qHostInfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub cpu: CpuType,
    pub endian: Endian,
    pub pointer_size: usize,
    pub triple: String,
    pub os_type: String,
    pub os_vendor: String,
    pub os_version: Option<String>,
    pub os_build: Option<String>,
    pub hostname: Option<String>,
    pub watchpoint_exceptions_received: Option<&'static str>,
}

impl HostInfo {
    pub fn for_arch(arch: &Architecture) -> Self {
        HostInfo {
            cpu: arch.cpu,
            endian: arch.endian,
            pointer_size: arch.pointer_size,
            triple: arch.triple.to_owned(),
            os_type: String::from("linux"),
            os_vendor: String::from("unknown"),
            os_version: None,
            os_build: None,
            hostname: None,
            watchpoint_exceptions_received: Some("after"),
        }
    }
}

impl WriteResponse for HostInfo {
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_key_str("cputype", &self.cpu.lldb_cpu_type().to_string());
        f.put_key_str("cpusubtype", &self.cpu.lldb_cpu_subtype().to_string());
        f.put_key_hex("triple", &self.triple);
        f.put_key_str("ostype", &self.os_type);
        f.put_key_str("vendor", &self.os_vendor);
        f.put_key_str("endian", self.endian.as_str());
        f.put_key_str("ptrsize", &self.pointer_size.to_string());
        if let Some(version) = &self.os_version {
            f.put_key_str("os_version", version);
        }
        if let Some(build) = &self.os_build {
            f.put_key_hex("os_build", build);
        }
        if let Some(hostname) = &self.hostname {
            f.put_key_hex("hostname", hostname);
        }
        if let Some(when) = self.watchpoint_exceptions_received {
            f.put_key_str("watchpoint_exceptions_received", when);
        }
    }
}

/// `qRegisterInfo<n>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    pub name: &'static str,
    pub bitsize: u32,
    pub offset: usize,
    pub encoding: &'static str,
    pub format: &'static str,
    pub set: &'static str,
    pub dwarf: Option<u32>,
    pub generic: Option<&'static str>,
}

impl RegisterInfo {
    /// Describes register `regno` of `arch`, laid out as in `g` packets.
    pub fn new(arch: &Architecture, regno: usize) -> Option<Self> {
        let def = arch.register(regno)?;
        Some(RegisterInfo {
            name: def.name,
            bitsize: def.bits,
            offset: arch.register_offset(regno),
            encoding: "uint",
            format: "hex",
            set: "General Purpose Registers",
            dwarf: def.dwarf,
            generic: def.generic,
        })
    }
}

impl WriteResponse for RegisterInfo {
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_key_str("name", self.name);
        f.put_key_str("bitsize", &self.bitsize.to_string());
        f.put_key_str("offset", &self.offset.to_string());
        f.put_key_str("encoding", self.encoding);
        f.put_key_str("format", self.format);
        f.put_key_str("set", self.set);
        if let Some(dwarf) = self.dwarf {
            f.put_key_str("ehframe", &dwarf.to_string());
            f.put_key_str("dwarf", &dwarf.to_string());
        }
        if let Some(generic) = self.generic {
            f.put_key_str("generic", generic);
        }
    }
}

/// `qOffsets`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionOffsets {
    pub text: u64,
    pub data: u64,
    pub bss: Option<u64>,
}

impl WriteResponse for SectionOffsets {
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_str("Text=");
        f.put_num(self.text);
        f.put_str(";Data=");
        f.put_num(self.data);
        if let Some(bss) = self.bss {
            f.put_str(";Bss=");
            f.put_num(bss);
        }
    }
}

/// `qModuleInfo:`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleInfo {
    pub uuid: Option<String>,
    pub md5: Option<String>,
    pub triple: String,
    pub file_path: String,
    pub file_offset: u64,
    pub file_size: u64,
}

impl WriteResponse for ModuleInfo {
    fn write_response(&self, f: &mut ResponseWriter) {
        if let Some(uuid) = &self.uuid {
            f.put_key_str("uuid", uuid);
        } else if let Some(md5) = &self.md5 {
            f.put_key_str("md5", md5);
        }
        f.put_key_hex("triple", &self.triple);
        f.put_key_hex("file_path", &self.file_path);
        f.put_key_num("file_offset", self.file_offset);
        f.put_key_num("file_size", self.file_size);
    }
}

/// One chunk of a `qXfer` read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XferChunk {
    pub data: Vec<u8>,
    /// No data follows this chunk.
    pub last: bool,
}

impl XferChunk {
    /// The part of `object` starting at `offset`, at most `len` bytes.
    pub fn slice(object: &[u8], offset: u64, len: usize) -> Self {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(object.len());
        let end = start.saturating_add(len).min(object.len());
        XferChunk {
            data: object[start..end].to_vec(),
            last: end == object.len(),
        }
    }
}

impl WriteResponse for XferChunk {
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_str(if self.last { "l" } else { "m" });
        f.put_binary_encoded(&self.data);
    }
}

/// Result of `qPlatform_shell`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramResult {
    pub status: i32,
    pub signal: i32,
    pub output: Vec<u8>,
}

impl WriteResponse for ProgramResult {
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_str("F,");
        f.put_num(self.status as u32);
        f.put_str(",");
        f.put_num(self.signal as u32);
        f.put_str(",");
        f.put_binary_encoded(&self.output);
    }
}

/// A debug server started by `qLaunchGDBServer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchedServer {
    pub pid: Pid,
    pub port: u16,
}

impl WriteResponse for LaunchedServer {
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_key_str("pid", &self.pid.as_raw().to_string());
        f.put_key_str("port", &self.port.to_string());
    }
}

/// `struct stat` of the host I/O protocol: big-endian, fixed 64 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStat {
    pub dev: u32,
    pub ino: u32,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

impl FileStat {
    pub const SIZE: usize = 64;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let mut pos = 0;
        let mut put = |bytes: &[u8]| {
            out[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
        };
        for v in [
            self.dev, self.ino, self.mode, self.nlink, self.uid, self.gid, self.rdev,
        ] {
            put(&v.to_be_bytes());
        }
        for v in [self.size, self.blksize, self.blocks] {
            put(&v.to_be_bytes());
        }
        for v in [self.atime, self.mtime, self.ctime] {
            put(&v.to_be_bytes());
        }
        out
    }
}

/// `qProcessInfo` reply for the debugged process. Numbers are hex.
pub struct ProcessInfoReply<'a>(pub &'a ProcessInfo);

impl WriteResponse for ProcessInfoReply<'_> {
    fn write_response(&self, f: &mut ResponseWriter) {
        let info = self.0;
        f.put_key_num("pid", info.pid as u32);
        f.put_key_num("parent-pid", info.parent_pid as u32);
        f.put_key_num("real-uid", info.real_uid);
        f.put_key_num("real-gid", info.real_gid);
        f.put_key_num("effective-uid", info.effective_uid);
        f.put_key_num("effective-gid", info.effective_gid);
        f.put_key_num("cputype", info.cpu.lldb_cpu_type());
        f.put_key_num("cpusubtype", info.cpu.lldb_cpu_subtype());
        f.put_key_str("ostype", &info.os_type);
        f.put_key_str("vendor", &info.os_vendor);
        f.put_key_str("endian", info.endian.as_str());
        f.put_key_str("ptrsize", &info.pointer_size.to_string());
        f.put_key_hex("triple", &info.triple);
        if !info.name.is_empty() {
            f.put_key_hex("name", &info.name);
        }
    }
}

/// One entry of `qfProcessInfo` / `qProcessInfoPID`. Numbers are decimal.
pub struct ProcessListEntry<'a>(pub &'a ProcessInfo);

impl WriteResponse for ProcessListEntry<'_> {
    fn write_response(&self, f: &mut ResponseWriter) {
        let info = self.0;
        f.put_key_str("pid", &info.pid.to_string());
        f.put_key_str("ppid", &info.parent_pid.to_string());
        f.put_key_str("uid", &info.real_uid.to_string());
        f.put_key_str("gid", &info.real_gid.to_string());
        f.put_key_str("euid", &info.effective_uid.to_string());
        f.put_key_str("egid", &info.effective_gid.to_string());
        f.put_key_hex("name", &info.name);
        if !info.arguments.is_empty() {
            f.put_str("args:");
            for (i, arg) in info.arguments.iter().enumerate() {
                if i > 0 {
                    f.put_str("-");
                }
                f.put_hex_encoded(arg.as_bytes());
            }
            f.put_str(";");
        }
        if !info.triple.is_empty() {
            f.put_key_hex("triple", &info.triple);
        }
    }
}

/// `qMemoryRegionInfo` reply. A region without permissions is unmapped.
pub struct RegionReply<'a>(pub &'a MemoryRegionInfo);

impl WriteResponse for RegionReply<'_> {
    fn write_response(&self, f: &mut ResponseWriter) {
        let region = self.0;
        f.put_key_num("start", region.start.value());
        f.put_key_num("size", region.length);
        if !region.protection.is_empty() {
            f.put_key_str("permissions", &region.protection.to_rwx());
        }
        if let Some(name) = &region.name {
            f.put_key_hex("name", name);
        }
    }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;
    use rstub_target::Address;
    use rstub_target::Protection;

    use super::*;

    fn body<T: WriteResponse>(resp: T) -> String {
        let mut w = ResponseWriter::new(BytesMut::new());
        resp.write_response(&mut w);
        let out = w.finish();
        String::from_utf8_lossy(&out[1..out.len() - 3]).into_owned()
    }

    #[test]
    fn xfer_chunks() {
        let object = b"0123456789";
        assert_eq!(
            XferChunk::slice(object, 0, 4),
            XferChunk {
                data: b"0123".to_vec(),
                last: false
            }
        );
        assert!(XferChunk::slice(object, 8, 4).last);
        assert!(XferChunk::slice(object, 20, 4).data.is_empty());
        assert_eq!(body(XferChunk::slice(b"a#", 0, 10)), "la}\x03");
    }

    #[test]
    fn file_stat_layout() {
        let st = FileStat {
            mode: 0o100644,
            size: 0x1234,
            ..Default::default()
        };
        let bytes = st.to_bytes();
        assert_eq!(&bytes[8..12], &0o100644u32.to_be_bytes());
        assert_eq!(&bytes[28..36], &0x1234u64.to_be_bytes());
    }

    #[test]
    fn region_reply() {
        let region = MemoryRegionInfo {
            start: Address::new(0x1000),
            length: 0x2000,
            protection: Protection::READ | Protection::EXECUTE,
            name: None,
        };
        assert_eq!(
            body(RegionReply(&region)),
            "start:1000;size:2000;permissions:rx;"
        );
    }

    #[test]
    fn register_info() {
        let info = RegisterInfo::new(&Architecture::X86_64, 16).unwrap();
        assert_eq!(info.name, "rip");
        assert!(body(info).contains("generic:pc;"));
        assert!(RegisterInfo::new(&Architecture::X86_64, 1000).is_none());
    }
}
