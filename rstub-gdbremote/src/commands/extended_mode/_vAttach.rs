/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;
use rstub_target::Pid;

use crate::commands::*;
use crate::hex::*;

/// How to treat a process name that has no running match yet.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum AttachWait {
    /// `vAttachName`: attach to an existing process only.
    No,
    /// `vAttachWait`: wait for a new process with that name.
    Always,
    /// `vAttachOrWait`: attach to an existing one, or wait.
    OrWait,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum AttachTarget {
    Pid(Pid),
    Name { name: String, wait: AttachWait },
}

#[derive(PartialEq, Debug)]
pub struct vAttach {
    pub target: AttachTarget,
}

impl ParseCommand for vAttach {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let target = if let Some(pid) = bytes.strip_prefix(b";") {
            AttachTarget::Pid(Pid::from_raw(decode_hex(pid).ok()?))
        } else {
            let (wait, name) = if let Some(name) = bytes.strip_prefix(b"Name;") {
                (AttachWait::No, name)
            } else if let Some(name) = bytes.strip_prefix(b"Wait;") {
                (AttachWait::Always, name)
            } else if let Some(name) = bytes.strip_prefix(b"OrWait;") {
                (AttachWait::OrWait, name)
            } else {
                return None;
            };
            AttachTarget::Name {
                name: decode_hex_str(name).ok()?,
                wait,
            }
        };
        Some(vAttach { target })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attach_forms() {
        assert_eq!(
            vAttach::parse(BytesMut::from(";3e8")).map(|a| a.target),
            Some(AttachTarget::Pid(Pid::from_raw(1000)))
        );
        assert_eq!(
            vAttach::parse(BytesMut::from("OrWait;6c73")).map(|a| a.target),
            Some(AttachTarget::Name {
                name: "ls".into(),
                wait: AttachWait::OrWait
            })
        );
        assert_eq!(vAttach::parse(BytesMut::from("Pid;1")), None);
    }
}
