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

#[derive(PartialEq, Debug)]
pub enum vCont {
    Query,
    Actions(Vec<ThreadResumeAction>),
}

fn decode_action(action: &[u8]) -> Option<ResumeAction> {
    let (first, rest) = action.split_first()?;
    let signal = || decode_hex::<i32>(rest).ok();
    match *first {
        b'c' if rest.is_empty() => Some(ResumeAction::Continue(None)),
        b'C' => Some(ResumeAction::Continue(Some(signal()?))),
        b's' if rest.is_empty() => Some(ResumeAction::Step(None)),
        b'S' => Some(ResumeAction::Step(Some(signal()?))),
        b't' if rest.is_empty() => Some(ResumeAction::Stop),
        b'r' => {
            let (start, end) = decode_addr_len(rest)?;
            Some(ResumeAction::StepUntil(start, end as u64))
        }
        _ => None,
    }
}

impl ParseCommand for vCont {
    fn parse(bytes: BytesMut) -> Option<Self> {
        if bytes == b"?"[..] {
            return Some(vCont::Query);
        }
        // example packet: $vCont;s:p3e86d3.3e86d3;c:p3e86d3.-1#3b
        // with prefix (`$vCont`) and checksum stripped.
        let actions = bytes
            .strip_prefix(b";")?
            .split(|c| *c == b';')
            .map(|act| {
                let mut iter = act.splitn(2, |c| *c == b':');
                let action = iter.next().and_then(decode_action)?;
                let thread = match iter.next() {
                    Some(tid) => ThreadId::decode(tid)?,
                    None => ThreadId::all(),
                };
                Some(ThreadResumeAction {
                    action,
                    thread,
                    address: None,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(vCont::Actions(actions))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn actions_with_and_without_threads() {
        assert_eq!(
            vCont::parse(BytesMut::from(";s:p3e86d3.3e86d3;c")),
            Some(vCont::Actions(vec![
                ThreadResumeAction {
                    action: ResumeAction::Step(None),
                    thread: ThreadId::pid_tid(0x3e86d3, 0x3e86d3),
                    address: None,
                },
                ThreadResumeAction {
                    action: ResumeAction::Continue(None),
                    thread: ThreadId::all(),
                    address: None,
                },
            ]))
        );
        assert_eq!(
            vCont::parse(BytesMut::from(";C0b:2a")),
            Some(vCont::Actions(vec![ThreadResumeAction {
                action: ResumeAction::Continue(Some(11)),
                thread: ThreadId::tid(0x2a),
                address: None,
            }]))
        );
        assert_eq!(vCont::parse(BytesMut::from("?")), Some(vCont::Query));
        assert_eq!(vCont::parse(BytesMut::from(";q")), None);
        assert_eq!(vCont::parse(BytesMut::new()), None);
    }
}
