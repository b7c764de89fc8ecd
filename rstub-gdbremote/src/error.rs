/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::io;

use thiserror::Error;

use crate::commands::CommandParseError;
use crate::hex::GdbHexError;
use crate::packet::PacketParseError;

/// Errors that end a connection. None of them is fatal to the server.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to listen on {address}")]
    Listen {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed waiting for the debugger to connect")]
    WaitForConnect {
        #[source]
        source: io::Error,
    },
    #[error("Failed to connect to {address}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to report the listening port")]
    NamedPipe {
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    PacketError(PacketParseError),
    #[error("Session thread panicked")]
    SessionPanicked,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<PacketParseError> for Error {
    fn from(err: PacketParseError) -> Self {
        Error::PacketError(err)
    }
}

impl From<CommandParseError> for Error {
    fn from(err: CommandParseError) -> Self {
        Error::PacketError(err.into())
    }
}

impl From<GdbHexError> for Error {
    fn from(err: GdbHexError) -> Self {
        Error::PacketError(err.into())
    }
}
