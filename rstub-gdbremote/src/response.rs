// @lint-ignore LICENSELINT
/*
 * MIT License
 *
 * Copyright (c) 2021 Daniel Prilik
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */


use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use num_traits::AsPrimitive;
use num_traits::PrimInt;
use rstub_target::ErrorCode;

use crate::PacketLogger;
use crate::hex::encode_hex;
use crate::hex::encode_run_length;

/// Trait to write a reply. This is different than `Fmt` for `Display`,
/// as the response must be a valid packet reply, which does not
/// necessarily translate to either.
pub trait WriteResponse {
    /// Write the value into `f` incrementally. The value got written
    /// to `f` must be valid reply packets.
    fn write_response(&self, f: &mut ResponseWriter);
}

/// Send "OK" as response
pub struct ResponseOk;

/// Response with serialized `T` as plain data
pub struct ResponseAsPlain<T>(pub T);
/// Response with serialized `T` as hex
pub struct ResponseAsHex<T>(pub T);
/// Response with serialized `T` as binary
pub struct ResponseAsBinary<T>(pub T);
/// Response with `T` as hex, run-length compressed
pub struct ResponseAsCompressedHex<T>(pub T);

impl WriteResponse for ResponseOk {
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_str("OK")
    }
}

impl WriteResponse for () {
    fn write_response(&self, f: &mut ResponseWriter) {
        ResponseOk.write_response(f)
    }
}

impl<T> WriteResponse for ResponseAsPlain<T>
where
    T: AsRef<[u8]>,
{
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_slice(self.0.as_ref())
    }
}

impl<T> WriteResponse for ResponseAsHex<T>
where
    T: AsRef<[u8]>,
{
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_hex_encoded(self.0.as_ref())
    }
}

impl<T> WriteResponse for ResponseAsBinary<T>
where
    T: AsRef<[u8]>,
{
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_binary_encoded(self.0.as_ref())
    }
}

impl<T> WriteResponse for ResponseAsCompressedHex<T>
where
    T: AsRef<[u8]>,
{
    fn write_response(&self, f: &mut ResponseWriter) {
        f.put_compressed_hex(self.0.as_ref())
    }
}

impl<T> WriteResponse for Result<T, ErrorCode>
where
    T: WriteResponse,
{
    fn write_response(&self, f: &mut ResponseWriter) {
        match self {
            Ok(resp) => {
                resp.write_response(f);
            }
            Err(err) => f.put_error(*err),
        }
    }
}

#[derive(PartialEq, Eq, Debug)]
/// Response writer to be sent to remote client
pub struct ResponseWriter {
    started: bool,
    checksum: u8,
    error_strings: bool,
    buf: BytesMut,
}

impl ResponseWriter {
    /// Creates a new ResponseWriter
    pub fn new(mut tx_buf: BytesMut) -> Self {
        Self {
            started: false,
            checksum: 0,
            error_strings: false,
            buf: tx_buf.split(),
        }
    }

    /// Append a hex-encoded message to error replies.
    pub fn with_error_strings(mut self, enabled: bool) -> Self {
        self.error_strings = enabled;
        self
    }

    fn put_u8(&mut self, byte: u8) {
        if !self.started {
            self.started = true;
            self.buf.put_u8(b'$');
        }

        self.checksum = self.checksum.wrapping_add(byte);
        self.buf.put_u8(byte);
    }

    /// encode u8 as hex
    pub fn put_u8_hex(&mut self, byte: u8) {
        for c in encode_hex(&[byte]) {
            self.put_u8(c);
        }
    }

    /// Write a slice over the connection.
    pub fn put_slice(&mut self, s: &[u8]) {
        s.iter().for_each(|c| self.put_u8(*c))
    }

    /// Write an entire string over the connection.
    pub fn put_str(&mut self, s: &str) {
        self.put_slice(s.as_bytes())
    }

    /// Write data as hex string.
    pub fn put_hex_encoded(&mut self, data: &[u8]) {
        data.iter().for_each(|c| self.put_u8_hex(*c));
    }

    /// Write data as hex string with runs compressed.
    pub fn put_compressed_hex(&mut self, data: &[u8]) {
        self.put_slice(&encode_run_length(&encode_hex(data)))
    }

    /// Write data using the binary protocol.
    pub fn put_binary_encoded(&mut self, data: &[u8]) {
        for &b in data.iter() {
            match b {
                b'#' | b'$' | b'}' | b'*' => {
                    self.put_u8(b'}');
                    self.put_u8(b ^ 0x20)
                }
                _ => self.put_u8(b),
            }
        }
    }

    /// Write a number as a big-endian hex string using the most compact
    /// representation possible (i.e: trimming leading zeros).
    pub fn put_num<I: AsPrimitive<u64> + PrimInt>(&mut self, digit: I) {
        let value: u64 = digit.as_();
        if value == 0 {
            return self.put_u8(b'0');
        }
        let digits = format!("{:x}", value);
        self.put_str(&digits);
    }

    /// Write a number in decimal.
    pub fn put_dec<I: AsPrimitive<u64> + PrimInt>(&mut self, digit: I) {
        let value: u64 = digit.as_();
        self.put_str(&value.to_string());
    }

    /// Write `key:value;` with a hex value.
    pub fn put_key_num<I: AsPrimitive<u64> + PrimInt>(&mut self, key: &str, value: I) {
        self.put_str(key);
        self.put_u8(b':');
        self.put_num(value);
        self.put_u8(b';');
    }

    /// Write `key:value;` with a plain string value.
    pub fn put_key_str(&mut self, key: &str, value: &str) {
        self.put_str(key);
        self.put_u8(b':');
        self.put_str(value);
        self.put_u8(b';');
    }

    /// Write `key:value;` with a hex-encoded string value.
    pub fn put_key_hex(&mut self, key: &str, value: &str) {
        self.put_str(key);
        self.put_u8(b':');
        self.put_hex_encoded(value.as_bytes());
        self.put_u8(b';');
    }

    /// Write an error reply. `Unsupported` is the empty reply.
    pub fn put_error(&mut self, err: ErrorCode) {
        if err == ErrorCode::Unsupported {
            return;
        }
        self.put_u8(b'E');
        self.put_u8_hex(err.wire_code());
        if self.error_strings {
            self.put_u8(b';');
            self.put_hex_encoded(err.to_string().as_bytes());
        }
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        !self.started
    }

    /// Consumes self, writing out buffer and the final '#' and checksum
    pub fn finish(mut self) -> Bytes {
        // don't include the '#' in checksum calculation
        let checksum = self.checksum;

        // empty response
        if !self.started {
            self.started = true;
            self.buf.put_u8(b'$');
        }

        PacketLogger::outgoing(&self.buf[1..], checksum).log();

        self.buf.put_u8(b'#');
        self.buf.extend_from_slice(&encode_hex(&[checksum]));
        self.buf.freeze()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reply<T: WriteResponse>(resp: T) -> Bytes {
        let mut w = ResponseWriter::new(BytesMut::new());
        resp.write_response(&mut w);
        w.finish()
    }

    #[test]
    fn response_plain_string() {
        let mut left = ResponseWriter::new(BytesMut::new());
        let mut right = ResponseWriter::new(BytesMut::new());
        left.put_str("just a test");
        ResponseAsPlain("just a test").write_response(&mut right);
        assert_eq!(left, right);
    }

    #[test]
    fn checksums_and_empty_reply() {
        assert_eq!(reply(ResponseOk), Bytes::from("$OK#9a"));
        assert_eq!(
            reply(Err::<ResponseOk, _>(ErrorCode::Unsupported)),
            Bytes::from("$#00")
        );
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            reply(Err::<ResponseOk, _>(ErrorCode::InvalidArgument)),
            Bytes::from("$E16#ac")
        );
        assert_eq!(
            reply(Err::<ResponseOk, _>(ErrorCode::Unknown)),
            Bytes::from("$Eff#11")
        );

        let mut w = ResponseWriter::new(BytesMut::new()).with_error_strings(true);
        w.put_error(ErrorCode::NotFound);
        let out = w.finish();
        assert!(out.starts_with(b"$E02;"));
    }

    #[test]
    fn numbers() {
        let mut w = ResponseWriter::new(BytesMut::new());
        w.put_num(0u32);
        w.put_u8(b',');
        w.put_num(0x1000u64);
        w.put_u8(b',');
        w.put_dec(1234u32);
        assert!(w.finish().starts_with(b"$0,1000,1234#"));
    }

    #[test]
    fn compressed_hex() {
        let out = reply(ResponseAsCompressedHex([0u8; 8]));
        assert!(out.starts_with(b"$0*,#"));
    }
}
