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

/// `Aarglen,argnum,arg,...`: set the program arguments, `argnum` 0 being
/// the program itself. Each `arg` is hex encoded and `arglen` is its
/// encoded length.
#[derive(PartialEq, Debug)]
pub struct A {
    pub args: Vec<String>,
}

impl ParseCommand for A {
    fn parse(bytes: BytesMut) -> Option<Self> {
        let mut args: Vec<(usize, String)> = Vec::new();
        let mut rest = &bytes[..];
        while !rest.is_empty() {
            let mut iter = rest.splitn(3, |c| *c == b',');
            let len: usize = iter.next().and_then(|s| decode_dec(s).ok())?;
            let index: usize = iter.next().and_then(|s| decode_dec(s).ok())?;
            let tail = iter.next()?;
            let arg = tail.get(..len)?;
            args.push((index, decode_hex_str(arg).ok()?));
            rest = match tail.get(len..)? {
                [] => &[],
                [b',', more @ ..] => more,
                _ => return None,
            };
        }
        args.sort_by_key(|(index, _)| *index);
        if args.is_empty() || args.iter().enumerate().any(|(i, (index, _))| i != *index) {
            return None;
        }
        Some(A {
            args: args.into_iter().map(|(_, arg)| arg).collect(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn program_arguments() {
        // "/bin/ls" and "-l"
        assert_eq!(
            A::parse(BytesMut::from("14,0,2f62696e2f6c73,4,1,2d6c")),
            Some(A {
                args: vec!["/bin/ls".into(), "-l".into()]
            })
        );
        assert_eq!(A::parse(BytesMut::from("4,1,2d6c")), None);
        assert_eq!(A::parse(BytesMut::from("8,0,2d6c")), None);
    }
}
