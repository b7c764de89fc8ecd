/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use bitflags::bitflags;
use bytes::BytesMut;

use crate::commands::*;
use crate::hex::*;

bitflags! {
    /// Open flags of the host I/O protocol. These are the protocol's own
    /// values, not the host's `O_*` constants.
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    pub struct OpenFlags: u32 {
        const WRONLY = 0x1;
        const RDWR = 0x2;
        const APPEND = 0x8;
        const CREAT = 0x200;
        const TRUNC = 0x400;
        const EXCL = 0x800;
    }
}

impl OpenFlags {
    /// Read-only is the absence of both write flags.
    pub fn is_read_only(&self) -> bool {
        !self.intersects(OpenFlags::WRONLY | OpenFlags::RDWR)
    }
}

#[derive(PartialEq, Debug)]
pub enum vFile {
    Setfs(Option<i32>),
    Open(PathBuf, OpenFlags, u32),
    Close(i32),
    Pread(i32, usize, u64),
    Pwrite(i32, u64, Vec<u8>),
    Fstat(i32),
    Unlink(PathBuf),
    Readlink(PathBuf),
    Exists(PathBuf),
    MD5(PathBuf),
    Size(PathBuf),
}

fn decode_path(bytes: &[u8]) -> Option<PathBuf> {
    let name = decode_hex_string(bytes).ok()?;
    Some(PathBuf::from(OsString::from_vec(name)))
}

impl ParseCommand for vFile {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let pos = bytes.iter().position(|c| *c == b':')?;
        let (op, args) = (&bytes[..pos], &bytes[pos + 1..]);
        match op {
            b"setfs" => {
                let pid: i32 = decode_hex(args).ok()?;
                Some(vFile::Setfs(if pid == 0 { None } else { Some(pid) }))
            }
            b"open" => {
                let mut iter = args.split(|c| *c == b',');
                let fname = iter.next().and_then(decode_path)?;
                let flags = iter.next().and_then(|s| decode_hex(s).ok())?;
                let mode = iter.next().and_then(|s| decode_hex(s).ok())?;
                Some(vFile::Open(fname, OpenFlags::from_bits(flags)?, mode))
            }
            b"close" => Some(vFile::Close(decode_hex(args).ok()?)),
            b"pread" => {
                let mut iter = args.split(|c| *c == b',');
                let fd = iter.next().and_then(|s| decode_hex(s).ok())?;
                let count = iter.next().and_then(|s| decode_hex(s).ok())?;
                let offset = iter.next().and_then(|s| decode_hex(s).ok())?;
                Some(vFile::Pread(fd, count, offset))
            }
            b"pwrite" => {
                let mut iter = args.splitn(3, |c| *c == b',');
                let fd = iter.next().and_then(|s| decode_hex(s).ok())?;
                let offset = iter.next().and_then(|s| decode_hex(s).ok())?;
                let data = iter.next().and_then(|s| decode_binary_string(s).ok())?;
                Some(vFile::Pwrite(fd, offset, data))
            }
            b"fstat" => Some(vFile::Fstat(decode_hex(args).ok()?)),
            b"unlink" => Some(vFile::Unlink(decode_path(args)?)),
            b"readlink" => Some(vFile::Readlink(decode_path(args)?)),
            b"exists" => Some(vFile::Exists(decode_path(args)?)),
            b"MD5" => Some(vFile::MD5(decode_path(args)?)),
            b"size" => Some(vFile::Size(decode_path(args)?)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hostio_sanity() {
        // NB: `vFile:` prefix is stripped prior.
        assert_eq!(
            vFile::parse(BytesMut::from(&b"open:6a7573742070726f62696e67,0,1c0"[..])),
            Some(vFile::Open(
                PathBuf::from("just probing"),
                OpenFlags::empty(),
                0x1c0
            ))
        );
        assert_eq!(
            vFile::parse(BytesMut::from(&b"open:2f746d702f78,601,1a4"[..])),
            Some(vFile::Open(
                PathBuf::from("/tmp/x"),
                OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC,
                0o644
            ))
        );
        assert_eq!(
            vFile::parse(BytesMut::from(&b"pread:b,1000,0"[..])),
            Some(vFile::Pread(0xb, 0x1000, 0x0))
        );
        assert_eq!(
            vFile::parse(BytesMut::from(&b"pwrite:3,10,a,}]"[..])),
            Some(vFile::Pwrite(3, 0x10, b"a,}".to_vec()))
        );
        assert_eq!(
            vFile::parse(BytesMut::from(&b"unlink:6a7573742070726f62696e67"[..])),
            Some(vFile::Unlink(PathBuf::from("just probing")))
        );
        assert_eq!(
            vFile::parse(BytesMut::from(&b"readlink:6a7573742070726f62696e67"[..])),
            Some(vFile::Readlink(PathBuf::from("just probing")))
        );
        assert_eq!(
            vFile::parse(BytesMut::from(&b"setfs:0"[..])),
            Some(vFile::Setfs(None))
        );
        assert_eq!(vFile::parse(BytesMut::from(&b"chmod:0"[..])), None);
    }
}
