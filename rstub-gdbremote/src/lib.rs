/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! GDB/LLDB remote serial protocol for rstub.
//!
//! A [`Session`] turns packets into calls on a [`SessionDelegate`] and the
//! delegate's answers into replies. [`serve`] runs a session over any
//! byte stream. Two delegates ship with the crate: [`DebugSession`] debugs
//! one process, [`PlatformSession`] answers host and file queries.

pub mod commands;
mod debug;
mod delegate;
mod error;
pub mod hex;
pub mod host;
mod link;
mod logger;
pub mod packet;
mod platform;
pub mod response;
mod server;
mod session;
mod stop_reply;
mod types;

use logger::PacketLogger;

pub use debug::DebugSession;
pub use delegate::DEFAULT_PACKET_SIZE;
pub use delegate::SessionDelegate;
pub use delegate::SessionState;
pub use error::Error;
pub use link::SessionLink;
pub use platform::PlatformSession;
pub use server::ReceiveMode;
pub use server::accept;
pub use server::connect;
pub use server::listen;
pub use server::report_port;
pub use server::serve;
pub use session::Session;
pub use stop_reply::StopCode;
pub use stop_reply::StopReply;
pub use stop_reply::ThreadsJson;
pub use types::CompatMode;
pub use types::FileStat;
pub use types::HostInfo;
pub use types::LaunchedServer;
pub use types::ModuleInfo;
pub use types::ProcessInfoReply;
pub use types::ProcessListEntry;
pub use types::ProgramResult;
pub use types::RegionReply;
pub use types::RegisterInfo;
pub use types::SectionOffsets;
pub use types::ServerVersion;
pub use types::XferChunk;
