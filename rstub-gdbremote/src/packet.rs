/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::Buf;
use bytes::BytesMut;
use thiserror::Error;

use crate::PacketLogger;
use crate::commands::Command;
use crate::commands::CommandParseError;
use crate::hex::*;

/// Packet parse error.
#[derive(PartialEq, Debug, Error)]
pub enum PacketParseError {
    #[error("Checksum mismatch, expected: {checksum}, got: {calculated}")]
    ChecksumMismatched { checksum: u8, calculated: u8 },
    #[error("empty packet buffer")]
    EmptyBuf,
    #[error("missing checksum")]
    MissingChecksum,
    #[error("malformed checksum")]
    MalformedChecksum,
    #[error(transparent)]
    CommandError(CommandParseError),
    #[error("unexpected header {0}")]
    UnexpectedHeader(u8),
    #[error(transparent)]
    DecodeHexError(GdbHexError),
}

impl PacketParseError {
    /// Whether the packet arrived intact but carried bad arguments. Such
    /// packets are acknowledged and answered with an error; the rest are
    /// NAKed.
    pub fn is_well_framed(&self) -> bool {
        matches!(self, PacketParseError::CommandError(_))
    }
}

impl From<GdbHexError> for PacketParseError {
    fn from(err: GdbHexError) -> Self {
        PacketParseError::DecodeHexError(err)
    }
}

impl From<CommandParseError> for PacketParseError {
    fn from(err: CommandParseError) -> Self {
        PacketParseError::CommandError(err)
    }
}

/// Packet send/recv from the debugger stream.
#[derive(Debug, PartialEq)]
pub enum Packet {
    Ack,
    Nack,
    Interrupt,
    Command(Command),
}

// Remove leading `$' and trailing `#[xx]`, validate checksum and expand
// run-length encoding.
fn decode_packet(mut bytes: BytesMut) -> Result<BytesMut, PacketParseError> {
    let end_of_body = bytes
        .iter()
        .position(|b| *b == b'#')
        .ok_or(PacketParseError::MissingChecksum)?;

    // Split buffer into body and checksum, note the packet
    // starts with a `$'.
    let (body, checksum) = bytes.split_at(end_of_body);
    let checksum = checksum
        .get(1..3)
        .filter(|c| c.len() == 2)
        .ok_or(PacketParseError::MalformedChecksum)?;

    // Validate checksum without leading `$'.
    let checksum = decode_hex(checksum).map_err(|_| PacketParseError::MalformedChecksum)?;
    let calculated = body.iter().skip(1).fold(0u8, |a, x| a.wrapping_add(*x));
    if calculated != checksum {
        return Err(PacketParseError::ChecksumMismatched {
            checksum,
            calculated,
        });
    }

    PacketLogger::incoming(&body[1..], checksum).log();

    let body = bytes.split_to(end_of_body).split_off(1);
    if body.contains(&b'*') {
        Ok(BytesMut::from(&decode_run_length(&body)?[..]))
    } else {
        Ok(body)
    }
}

impl TryFrom<BytesMut> for Packet {
    type Error = PacketParseError;
    fn try_from(buf: BytesMut) -> Result<Self, Self::Error> {
        let prefix = *buf.first().ok_or(PacketParseError::EmptyBuf)?;
        match prefix {
            b'$' => {
                let body = decode_packet(buf)?;
                Ok(Packet::Command(Command::try_parse(body)?))
            }
            b'+' => Ok(Packet::Ack),
            b'-' => Ok(Packet::Nack),
            0x03 => Ok(Packet::Interrupt),
            _ => Err(PacketParseError::UnexpectedHeader(prefix)),
        }
    }
}

impl Packet {
    /// Create a new `Packet` from one frame returned by [`PacketReader`].
    pub fn new(buf: BytesMut) -> Result<Self, PacketParseError> {
        Self::try_from(buf)
    }
}

/// Reassembles frames from a byte stream. Reads may split or coalesce
/// packets arbitrarily; bytes outside any frame are skipped.
#[derive(Debug, Default)]
pub struct PacketReader {
    buf: BytesMut,
}

impl PacketReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes received from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Whether a partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the next complete frame: a single `+`, `-` or `0x03`, or a
    /// whole `$...#xx` packet. A packet cut short by the start of another is
    /// returned as is and fails to decode.
    pub fn next_frame(&mut self) -> Option<BytesMut> {
        loop {
            match *self.buf.first()? {
                b'+' | b'-' | 0x03 => return Some(self.buf.split_to(1)),
                b'$' => {
                    let end = self.buf.iter().position(|b| *b == b'#');
                    let restart = self.buf[1..end.unwrap_or(self.buf.len())]
                        .iter()
                        .position(|b| *b == b'$');
                    if let Some(restart) = restart {
                        return Some(self.buf.split_to(restart + 1));
                    }
                    let end = end?;
                    if self.buf.len() < end + 3 {
                        return None;
                    }
                    return Some(self.buf.split_to(end + 3));
                }
                _ => {
                    let junk = self
                        .buf
                        .iter()
                        .position(|b| matches!(b, b'+' | b'-' | b'$' | 0x03))
                        .unwrap_or(self.buf.len());
                    tracing::debug!("skipping {} bytes of junk", junk);
                    self.buf.advance(junk);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn can_decode_packet() {
        let cmd = BytesMut::from("$qC#b4");
        assert_eq!(
            decode_packet(cmd),
            Ok::<_, PacketParseError>(BytesMut::from("qC"))
        );

        assert_eq!(
            // Contains non-ascii bytes
            decode_packet(BytesMut::from(&b"$X7fffffffdbac,4:\x8a\x02\0\0#09"[..])),
            Ok::<_, PacketParseError>(BytesMut::from(&b"X7fffffffdbac,4:\x8a\x02\0\0"[..]))
        );

        let cmd = BytesMut::from("$QPassSignals:e;10;14;17;1a;1b;1c;21;24;25;2c;4c;97;#0a");
        assert_eq!(
            decode_packet(cmd),
            Ok::<_, PacketParseError>(BytesMut::from(
                "QPassSignals:e;10;14;17;1a;1b;1c;21;24;25;2c;4c;97;"
            ))
        );
    }

    #[test]
    fn rejects_bad_checksums() {
        assert_eq!(
            decode_packet(BytesMut::from("$qC#00")),
            Err(PacketParseError::ChecksumMismatched {
                checksum: 0,
                calculated: 0xb4
            })
        );
        assert_eq!(
            decode_packet(BytesMut::from("$qC#zz")),
            Err(PacketParseError::MalformedChecksum)
        );
        assert_eq!(
            decode_packet(BytesMut::from("$qC#b")),
            Err(PacketParseError::MalformedChecksum)
        );
        assert_eq!(
            decode_packet(BytesMut::from("$qC")),
            Err(PacketParseError::MissingChecksum)
        );
    }

    #[test]
    fn expands_run_length_after_checksum() {
        // "G0* " is 'G', '0' repeated 4 times.
        let sum = b"G0* ".iter().fold(0u8, |a, x| a.wrapping_add(*x));
        let frame = format!("$G0* #{:02x}", sum);
        assert_eq!(
            decode_packet(BytesMut::from(frame.as_str())),
            Ok(BytesMut::from("G0000"))
        );
    }

    #[test]
    fn reader_handles_split_and_coalesced_frames() {
        let mut reader = PacketReader::new();
        reader.push(b"junk+$q");
        assert_eq!(reader.next_frame(), Some(BytesMut::from("+")));
        assert_eq!(reader.next_frame(), None);
        reader.push(b"C#b");
        assert_eq!(reader.next_frame(), None);
        reader.push(b"4$g#67\x03-");
        assert_eq!(reader.next_frame(), Some(BytesMut::from("$qC#b4")));
        assert_eq!(reader.next_frame(), Some(BytesMut::from("$g#67")));
        assert_eq!(reader.next_frame(), Some(BytesMut::from("\x03")));
        assert_eq!(reader.next_frame(), Some(BytesMut::from("-")));
        assert_eq!(reader.next_frame(), None);
        assert!(reader.is_empty());
    }

    #[test]
    fn reader_returns_truncated_packet() {
        let mut reader = PacketReader::new();
        reader.push(b"$qSup$qC#b4");
        let truncated = reader.next_frame().unwrap();
        assert_eq!(truncated, BytesMut::from("$qSup"));
        assert_eq!(
            Packet::new(truncated),
            Err(PacketParseError::MissingChecksum)
        );
        assert!(matches!(
            Packet::new(reader.next_frame().unwrap()),
            Ok(Packet::Command(_))
        ));
    }
}
