/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bytes::BytesMut;

use crate::commands::*;
use crate::hex::*;

/// A breakpoint request shared by `Z` and `z`:
/// `type,addr,kind[;cond_list...][;cmds:persist,cmd_list...]`.
#[derive(PartialEq, Debug, Clone)]
pub struct Breakpoint {
    pub ty: BreakpointType,
    pub addr: u64,
    pub kind: u32,
    /// Agent expressions, still hex encoded.
    pub conditions: Vec<Vec<u8>>,
    pub commands: Vec<Vec<u8>>,
    pub persist: bool,
}

impl Breakpoint {
    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        let mut parts = bytes.split(|c| *c == b';');
        let mut iter = parts.next()?.split(|c| *c == b',');
        let ty = iter
            .next()
            .and_then(|s| decode_hex(s).ok())
            .and_then(BreakpointType::new)?;
        let addr = iter.next().and_then(|s| decode_hex(s).ok())?;
        let kind = iter.next().and_then(|s| decode_hex(s).ok())?;
        if iter.next().is_some() {
            return None;
        }

        let mut bkpt = Breakpoint {
            ty,
            addr,
            kind,
            conditions: Vec::new(),
            commands: Vec::new(),
            persist: false,
        };
        for part in parts {
            if let Some(cmds) = part.strip_prefix(b"cmds:") {
                let mut iter = cmds.split(|c| *c == b',');
                bkpt.persist = iter.next()? == b"1";
                bkpt.commands.extend(iter.map(|c| c.to_vec()));
            } else if let Some(cond) = part.strip_prefix(b"X") {
                bkpt.conditions.push(cond.to_vec());
            } else if !part.is_empty() {
                return None;
            }
        }
        Some(bkpt)
    }
}

#[derive(PartialEq, Debug)]
pub struct Z {
    pub bkpt: Breakpoint,
}

impl ParseCommand for Z {
    fn parse(bytes: BytesMut) -> Option<Self> {
        Some(Z {
            bkpt: Breakpoint::decode(&bytes)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_and_conditional() {
        let z = Z::parse(BytesMut::from("0,1000,1")).unwrap();
        assert_eq!(z.bkpt.ty, BreakpointType::Software);
        assert_eq!(z.bkpt.addr, 0x1000);
        assert_eq!(z.bkpt.kind, 1);
        assert!(z.bkpt.conditions.is_empty());

        let z = Z::parse(BytesMut::from("1,4004d6,1;X3,220c00;cmds:1,X2,2201")).unwrap();
        assert_eq!(z.bkpt.ty, BreakpointType::Hardware);
        assert_eq!(z.bkpt.conditions, vec![b"3,220c00".to_vec()]);
        assert!(z.bkpt.persist);
        assert_eq!(z.bkpt.commands, vec![b"X2".to_vec(), b"2201".to_vec()]);

        assert_eq!(Z::parse(BytesMut::from("5,1000,1")), None);
        assert_eq!(Z::parse(BytesMut::from("0,1000")), None);
    }
}
