/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;
use std::fmt::Debug;

use rstub_util::PACKETS_TARGET;

enum Direction {
    In,
    Out,
}

const MAX_BYTES_DISPLAY: usize = 64;

/// Formats one packet body for the `packets` trace target.
pub struct PacketLogger<'a> {
    direction: Direction,
    body: &'a [u8],
    checksum: u8,
}

impl<'a> PacketLogger<'a> {
    pub fn incoming<T: 'a + AsRef<[u8]> + ?Sized>(body: &'a T, checksum: u8) -> Self {
        Self {
            direction: Direction::In,
            body: body.as_ref(),
            checksum,
        }
    }

    pub fn outgoing<T: 'a + AsRef<[u8]> + ?Sized>(body: &'a T, checksum: u8) -> Self {
        Self {
            direction: Direction::Out,
            body: body.as_ref(),
            checksum,
        }
    }

    pub fn log(&self) {
        tracing::trace!(target: PACKETS_TARGET, "{:?}", self);
    }
}

impl Debug for PacketLogger<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.direction {
            Direction::In => write!(f, "<-- ")?,
            Direction::Out => write!(f, "--> ")?,
        }

        write!(f, "b\"")?;
        for &b in self.body.iter().take(MAX_BYTES_DISPLAY) {
            match b {
                b'\n' => write!(f, "\\n")?,
                b'\r' => write!(f, "\\r")?,
                b'\t' => write!(f, "\\t")?,
                b'\\' | b'"' => write!(f, "\\{}", b as char)?,
                b'\0' => write!(f, "\\0")?,
                0x20..0x7f => write!(f, "{}", b as char)?,
                _ => write!(f, "\\x{:02x}", b)?,
            }
        }
        if self.body.len() > MAX_BYTES_DISPLAY {
            write!(f, "[{} bytes omitted]", self.body.len() - MAX_BYTES_DISPLAY)?;
        }
        write!(f, "#{:02x}\"", self.checksum)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn escapes_and_truncates() {
        assert_eq!(
            format!("{:?}", PacketLogger::incoming(b"m1000,4\n\x01", 0xab)),
            "<-- b\"m1000,4\\n\\x01#ab\""
        );
        let long = vec![b'0'; 70];
        let s = format!("{:?}", PacketLogger::outgoing(&long, 0));
        assert!(s.starts_with("--> b\"0000"));
        assert!(s.ends_with("[6 bytes omitted]#00\""));
    }
}
