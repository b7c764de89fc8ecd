/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Every fallible operation in rstub reports one of these. The discriminant is
/// the number that goes on the wire, and for the file-related codes it matches
/// the errno values of the remote host I/O protocol.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    #[error("operation not permitted")]
    NoPermission = 1,
    #[error("not found")]
    NotFound = 2,
    #[error("process not found")]
    ProcessNotFound = 3,
    #[error("interrupted")]
    Interrupted = 4,
    #[error("invalid handle")]
    InvalidHandle = 9,
    #[error("out of memory")]
    NoMemory = 12,
    #[error("access denied")]
    AccessDenied = 13,
    #[error("invalid address")]
    InvalidAddress = 14,
    #[error("resource busy")]
    Busy = 16,
    #[error("already exists")]
    AlreadyExist = 17,
    #[error("no such device")]
    NoDevice = 19,
    #[error("not a directory")]
    NotDirectory = 20,
    #[error("is a directory")]
    IsDirectory = 21,
    #[error("invalid argument")]
    InvalidArgument = 22,
    #[error("too many open files in system")]
    TooManySystemFiles = 23,
    #[error("too many open files")]
    TooManyFiles = 24,
    #[error("file too big")]
    FileTooBig = 27,
    #[error("no space left")]
    NoSpace = 28,
    #[error("invalid seek")]
    InvalidSeek = 29,
    #[error("not writeable")]
    NotWriteable = 30,
    #[error("name too long")]
    NameTooLong = 91,
    #[error("unknown error")]
    Unknown = 9999,
    #[error("unsupported")]
    Unsupported = 10000,
}

impl ErrorCode {
    /// The numeric code of this error.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// The byte sent in an `Exx` reply. Codes that do not fit in a byte are
    /// sent as `0xff`.
    pub fn wire_code(self) -> u8 {
        u8::try_from(self.code()).unwrap_or(0xff)
    }

    /// Reverse of [`ErrorCode::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        use ErrorCode::*;
        Some(match code {
            1 => NoPermission,
            2 => NotFound,
            3 => ProcessNotFound,
            4 => Interrupted,
            9 => InvalidHandle,
            12 => NoMemory,
            13 => AccessDenied,
            14 => InvalidAddress,
            16 => Busy,
            17 => AlreadyExist,
            19 => NoDevice,
            20 => NotDirectory,
            21 => IsDirectory,
            22 => InvalidArgument,
            23 => TooManySystemFiles,
            24 => TooManyFiles,
            27 => FileTooBig,
            28 => NoSpace,
            29 => InvalidSeek,
            30 => NotWriteable,
            91 => NameTooLong,
            9999 => Unknown,
            10000 => Unsupported,
            _ => return None,
        })
    }
}

impl From<Errno> for ErrorCode {
    fn from(errno: Errno) -> Self {
        match errno {
            Errno::EPERM => ErrorCode::NoPermission,
            Errno::ENOENT => ErrorCode::NotFound,
            Errno::ESRCH | Errno::ECHILD => ErrorCode::ProcessNotFound,
            Errno::EINTR => ErrorCode::Interrupted,
            Errno::EBADF => ErrorCode::InvalidHandle,
            Errno::ENOMEM => ErrorCode::NoMemory,
            Errno::EACCES => ErrorCode::AccessDenied,
            Errno::EFAULT | Errno::EIO => ErrorCode::InvalidAddress,
            Errno::EBUSY => ErrorCode::Busy,
            Errno::EEXIST => ErrorCode::AlreadyExist,
            Errno::ENODEV => ErrorCode::NoDevice,
            Errno::ENOTDIR => ErrorCode::NotDirectory,
            Errno::EISDIR => ErrorCode::IsDirectory,
            Errno::EINVAL => ErrorCode::InvalidArgument,
            Errno::ENFILE => ErrorCode::TooManySystemFiles,
            Errno::EMFILE => ErrorCode::TooManyFiles,
            Errno::EFBIG => ErrorCode::FileTooBig,
            Errno::ENOSPC => ErrorCode::NoSpace,
            Errno::ESPIPE => ErrorCode::InvalidSeek,
            Errno::EROFS => ErrorCode::NotWriteable,
            Errno::ENAMETOOLONG => ErrorCode::NameTooLong,
            Errno::ENOSYS | Errno::EOPNOTSUPP => ErrorCode::Unsupported,
            _ => ErrorCode::Unknown,
        }
    }
}

impl From<io::Error> for ErrorCode {
    fn from(err: io::Error) -> Self {
        if let Some(raw) = err.raw_os_error() {
            return Errno::from_raw(raw).into();
        }
        match err.kind() {
            io::ErrorKind::NotFound => ErrorCode::NotFound,
            io::ErrorKind::PermissionDenied => ErrorCode::AccessDenied,
            io::ErrorKind::AlreadyExists => ErrorCode::AlreadyExist,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                ErrorCode::InvalidArgument
            }
            io::ErrorKind::Interrupted => ErrorCode::Interrupted,
            io::ErrorKind::OutOfMemory => ErrorCode::NoMemory,
            io::ErrorKind::Unsupported => ErrorCode::Unsupported,
            _ => ErrorCode::Unknown,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_codes() {
        assert_eq!(ErrorCode::NoSpace.wire_code(), 28);
        assert_eq!(ErrorCode::NameTooLong.wire_code(), 0x5b);
        assert_eq!(ErrorCode::Unknown.wire_code(), 0xff);
        assert_eq!(ErrorCode::from_code(17), Some(ErrorCode::AlreadyExist));
        assert_eq!(ErrorCode::from_code(5), None);
    }

    #[test]
    fn errno_translation() {
        assert_eq!(ErrorCode::from(Errno::ENOSPC), ErrorCode::NoSpace);
        assert_eq!(ErrorCode::from(Errno::ESRCH), ErrorCode::ProcessNotFound);
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(ErrorCode::from(err), ErrorCode::NotFound);
    }
}
