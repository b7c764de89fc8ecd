/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Hex, binary-escape and run-length codecs used by the remote protocol.

use num_traits::CheckedAdd;
use num_traits::CheckedMul;
use num_traits::FromPrimitive;
use num_traits::Zero;
use thiserror::Error;

/// Decode gdb hex error code
#[derive(Debug, Error, PartialEq)]
pub enum GdbHexError {
    /// Invalid hex digit
    #[error("Input contains non-ASCII chars")]
    NotAscii,
    /// Input is empty
    #[error("Input is empty")]
    Empty,
    /// Output is too small: overflowed
    #[error("Output is too small/overflowed")]
    Overflow,
    /// Invalid Hex input
    #[error("Gdb hex is malformed")]
    InvalidGdbHex,
    /// Invalid binary inpput
    #[error("Gdb binary is malformed")]
    InvalidGdbBinary,
    /// Invalid Output (num) type.
    #[error("Invalid output num type")]
    InvalidOutput,
    /// Run-length marker without a preceding byte or with a bad count.
    #[error("Run-length encoding is malformed")]
    InvalidRunLength,
}

/// Bytes that must be escaped in binary data.
const ESCAPED: &[u8] = b"#$}*";

/// Smallest run worth compressing; shorter ones cost more encoded.
const MIN_RUN: usize = 4;
/// Largest repeat count a single `*` marker can express.
const MAX_REPEAT: usize = 97;
const RUN_BASE: u8 = 29;

fn from_hex(c: u8) -> Option<u8> {
    if c.is_ascii_digit() {
        Some(c - b'0')
    } else if (b'a'..=b'f').contains(&c) {
        Some(c - b'a' + 10)
    } else if (b'A'..=b'F').contains(&c) {
        Some(c - b'A' + 10)
    } else if b"xX".contains(&c) {
        Some(0)
    } else {
        None
    }
}

fn to_hex(nibble: u8) -> u8 {
    match nibble {
        0..=9 => b'0' + nibble,
        _ => b'a' + nibble - 10,
    }
}

/// Decode a GDB hex string into the specified integer.
///
/// GDB hex strings may include "xx", which represent "missing" data. This
/// method simply treats "xx" as 00.
pub fn decode_hex<I>(buf: &[u8]) -> Result<I, GdbHexError>
where
    I: FromPrimitive + Zero + CheckedAdd + CheckedMul,
{
    decode_radix(buf, 16)
}

/// Decode a decimal number, as used by a handful of LLDB packets.
pub fn decode_dec<I>(buf: &[u8]) -> Result<I, GdbHexError>
where
    I: FromPrimitive + Zero + CheckedAdd + CheckedMul,
{
    if buf.iter().any(|c| !c.is_ascii_digit()) {
        return Err(GdbHexError::NotAscii);
    }
    decode_radix(buf, 10)
}

fn decode_radix<I>(buf: &[u8], radix: u8) -> Result<I, GdbHexError>
where
    I: FromPrimitive + Zero + CheckedAdd + CheckedMul,
{
    if buf.is_empty() {
        return Err(GdbHexError::Empty);
    }

    let base = I::from_u8(radix).ok_or(GdbHexError::InvalidOutput)?;
    let mut result = I::zero();

    for &digit in buf {
        let x = I::from_u8(from_hex(digit).ok_or(GdbHexError::NotAscii)?)
            .ok_or(GdbHexError::InvalidOutput)?;
        result = result.checked_mul(&base).ok_or(GdbHexError::Overflow)?;
        result = result.checked_add(&x).ok_or(GdbHexError::Overflow)?
    }

    Ok(result)
}

/// Decodes a possibly negative hex number such as `-1`.
pub fn decode_signed_hex(buf: &[u8]) -> Result<i64, GdbHexError> {
    match buf.strip_prefix(b"-") {
        Some(rest) => decode_hex::<i64>(rest).map(|v| -v),
        None => decode_hex(buf),
    }
}

/// Decode a GDB hex string into a u8 Vector.
///
/// GDB hex strings may include "xx", which represent "missing" data. This
/// method simply treats "xx" as 00.
pub fn decode_hex_string(buf: &[u8]) -> Result<Vec<u8>, GdbHexError> {
    if buf.len() % 2 != 0 {
        return Err(GdbHexError::InvalidGdbHex);
    }

    buf.chunks_exact(2)
        .map(|pair| {
            let hi = from_hex(pair[0]).ok_or(GdbHexError::NotAscii)?;
            let lo = from_hex(pair[1]).ok_or(GdbHexError::NotAscii)?;
            Ok(16 * hi + lo)
        })
        .collect()
}

/// Decodes a hex-encoded UTF-8 string, such as a path.
pub fn decode_hex_str(buf: &[u8]) -> Result<String, GdbHexError> {
    String::from_utf8(decode_hex_string(buf)?).map_err(|_| GdbHexError::NotAscii)
}

/// Encodes bytes as lowercase hex.
pub fn encode_hex(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for b in data {
        out.push(to_hex(b >> 4));
        out.push(to_hex(b & 0xf));
    }
    out
}

/// Hex-encodes a string, as a `String`.
pub fn encode_hex_str(s: &str) -> String {
    // Hex digits are always ASCII.
    encode_hex(s.as_bytes()).into_iter().map(char::from).collect()
}

/// Decode a GDB binary string into a u8 Vector.
pub fn decode_binary_string(buf: &[u8]) -> Result<Vec<u8>, GdbHexError> {
    let mut res = Vec::with_capacity(buf.len());
    let mut iter = buf.iter();

    while let Some(&b) = iter.next() {
        match b {
            b'}' => {
                let next = iter.next().ok_or(GdbHexError::InvalidGdbBinary)?;
                res.push(next ^ 0x20);
            }
            _ => res.push(b),
        }
    }
    Ok(res)
}

/// Escapes bytes for the binary protocol.
pub fn encode_binary(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if ESCAPED.contains(&b) {
            out.push(b'}');
            out.push(b ^ 0x20);
        } else {
            out.push(b);
        }
    }
    out
}

/// Expands run-length markers (`X*n` repeats `X` another `n - 29` times).
pub fn decode_run_length(buf: &[u8]) -> Result<Vec<u8>, GdbHexError> {
    if !buf.contains(&b'*') {
        return Ok(buf.to_vec());
    }

    let mut out = Vec::with_capacity(buf.len() * 2);
    let mut iter = buf.iter();
    while let Some(&b) = iter.next() {
        if b != b'*' {
            out.push(b);
            continue;
        }
        let prev = *out.last().ok_or(GdbHexError::InvalidRunLength)?;
        let count = iter.next().ok_or(GdbHexError::InvalidRunLength)?;
        let repeat = count
            .checked_sub(RUN_BASE)
            .ok_or(GdbHexError::InvalidRunLength)?;
        out.extend(std::iter::repeat_n(prev, repeat as usize));
    }
    Ok(out)
}

/// Compresses runs of identical bytes. The count characters `#` and `$`
/// are never produced, and neither are runs of the `*` marker itself or of
/// the `}` escape character, whose meaning depends on the following byte.
pub fn encode_run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == b {
            run += 1;
        }
        i += run;

        if b == b'*' || b == b'}' {
            out.extend(std::iter::repeat_n(b, run));
            continue;
        }

        let mut left = run;
        while left > 0 {
            out.push(b);
            left -= 1;
            if left + 1 < MIN_RUN {
                out.extend(std::iter::repeat_n(b, left));
                break;
            }
            let mut repeat = left.min(MAX_REPEAT);
            // 6 and 7 would encode as '#' and '$'.
            while repeat == 6 || repeat == 7 {
                repeat -= 1;
            }
            out.push(b'*');
            out.push(RUN_BASE + repeat as u8);
            left -= repeat;
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_gdb_hex_test() {
        assert_eq!(
            decode_hex_string(b"31323334"),
            Ok::<_, GdbHexError>(b"1234".to_vec())
        );
        assert_eq!(
            decode_hex_string(b"12345"),
            Err::<Vec<u8>, _>(GdbHexError::InvalidGdbHex)
        );
        assert_eq!(decode_hex::<u64>(b"7fffffffdbac"), Ok(0x7fffffffdbac));
        assert_eq!(decode_hex::<u8>(b"100"), Err(GdbHexError::Overflow));
        assert_eq!(decode_signed_hex(b"-1"), Ok(-1));
        assert_eq!(decode_dec::<u32>(b"1234"), Ok(1234));
        assert_eq!(decode_dec::<u32>(b"12a"), Err(GdbHexError::NotAscii));
    }

    #[test]
    fn decode_gdb_binary_test() {
        assert_eq!(
            decode_binary_string(b"12345"),
            Ok::<_, GdbHexError>(b"12345".to_vec())
        );
        assert_eq!(
            decode_binary_string(b"1234}"),
            Err::<Vec<u8>, _>(GdbHexError::InvalidGdbBinary)
        );
        assert_eq!(
            decode_binary_string(b"1234}A"),
            Ok::<_, GdbHexError>(b"1234a".to_vec())
        );
    }

    #[test]
    fn binary_escapes_special_bytes() {
        assert_eq!(encode_binary(b"a#b$c}d*"), b"a}\x03b}\x04c}]d}\x0a".to_vec());
        assert_eq!(
            decode_binary_string(&encode_binary(b"#$}*")),
            Ok(b"#$}*".to_vec())
        );
    }

    #[test]
    fn run_length_examples() {
        assert_eq!(encode_run_length(b"000"), b"000".to_vec());
        // "0" followed by 3 more: count 3 + 29 = ' '.
        assert_eq!(encode_run_length(b"0000"), b"0* ".to_vec());
        // 7 repeats would be '$', so 5 are encoded and the rest spelled out.
        assert_eq!(encode_run_length(b"00000000"), b"0*\"00".to_vec());
        assert_eq!(decode_run_length(b"0* "), Ok(b"0000".to_vec()));
        assert_eq!(decode_run_length(b"*!"), Err(GdbHexError::InvalidRunLength));
    }

    #[test]
    fn run_length_long_runs() {
        let data = vec![b'f'; 300];
        let encoded = encode_run_length(&data);
        assert!(encoded.len() < 20);
        assert!(!encoded.contains(&b'#') && !encoded.contains(&b'$'));
        assert_eq!(decode_run_length(&encoded), Ok(data));

        let mixed = b"0000000000000000ffffffff7f0000ab".to_vec();
        assert_eq!(decode_run_length(&encode_run_length(&mixed)), Ok(mixed));
    }
}
