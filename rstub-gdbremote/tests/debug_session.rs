/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Debug sessions driven packet by packet against a fake machine.

use bytes::Bytes;
use rstub_gdbremote::CompatMode;
use rstub_gdbremote::DebugSession;
use rstub_gdbremote::Session;
use rstub_target::Pid;
use rstub_target::Protection;
use rstub_target::testing::FakeMachine;

const PID: i32 = 0x10;

fn frame(body: &str) -> Vec<u8> {
    let sum = body.bytes().fold(0u8, |a, b| a.wrapping_add(b));
    format!("${}#{:02x}", body, sum).into_bytes()
}

/// The body of the single acknowledged reply in `replies`.
fn body(replies: &[Bytes]) -> String {
    assert_eq!(replies.len(), 1, "{:?}", replies);
    let reply = std::str::from_utf8(&replies[0]).unwrap();
    let reply = reply.strip_prefix("+$").unwrap();
    reply[..reply.len() - 3].to_owned()
}

fn send(session: &mut Session<DebugSession>, packet: &str) -> String {
    body(&session.receive(&frame(packet)))
}

/// A stopped process at 0xff0 with 32 bytes of nops ahead of it.
fn setup() -> (FakeMachine, Session<DebugSession>) {
    let machine = FakeMachine::new(PID);
    machine.map(
        0xff0,
        vec![0x90; 0x20],
        Protection::READ | Protection::EXECUTE,
    );
    machine.set_pc(Pid::from_raw(PID), 0xff0);

    let mut delegate = DebugSession::new(Box::new(machine.spawner()));
    delegate.attach(Pid::from_raw(PID)).unwrap();
    let mut session = Session::with_mode(delegate, Some(CompatMode::Gdb));
    let features = send(&mut session, "qSupported:swbreak+;hwbreak+");
    assert!(features.contains("swbreak+"), "{}", features);
    (machine, session)
}

#[test]
fn breakpoint_stops_the_target() {
    let (machine, mut session) = setup();

    assert_eq!(send(&mut session, "Z0,1000,1"), "OK");

    let stop = send(&mut session, "c");
    assert!(stop.starts_with("T05"), "{}", stop);
    assert!(stop.contains("thread:10;"), "{}", stop);
    assert!(stop.contains("swbreak:;"), "{}", stop);
    assert_eq!(machine.pc(Pid::from_raw(PID)), 0x1000);

    // The trap is gone from memory while the target is stopped.
    assert_eq!(machine.peek(0x1000, 1), vec![0x90]);
}

#[test]
fn breakpoints_are_reference_counted() {
    let (machine, mut session) = setup();

    assert_eq!(send(&mut session, "Z0,1000,1"), "OK");
    assert_eq!(send(&mut session, "Z0,1000,1"), "OK");
    assert_eq!(send(&mut session, "z0,1000,1"), "OK");

    // One reference is left, so the target still stops there.
    let stop = send(&mut session, "c");
    assert!(stop.contains("swbreak:;"), "{}", stop);
    assert_eq!(machine.pc(Pid::from_raw(PID)), 0x1000);

    assert_eq!(send(&mut session, "z0,1000,1"), "OK");
    // No site left to remove.
    assert_eq!(send(&mut session, "z0,1000,1"), "E02");

    // Nothing stops it now; it runs off the end of its code.
    assert_eq!(send(&mut session, "c"), "W00");
    assert_eq!(machine.peek(0x1000, 1), vec![0x90]);
}

#[test]
fn watchpoints_are_removed_by_kind() {
    let (machine, mut session) = setup();

    assert_eq!(send(&mut session, "Z2,1000,4"), "OK");
    // A read watchpoint was never set there.
    assert!(send(&mut session, "z3,1000,4").starts_with('E'));
    assert!(send(&mut session, "z1,1000,4").starts_with('E'));
    assert_eq!(send(&mut session, "z2,1000,4"), "OK");
    assert!(send(&mut session, "z2,1000,4").starts_with('E'));
    assert_eq!(machine.debug_registers().control, 0);
}

#[test]
fn memory_reads_never_show_traps() {
    let (_machine, mut session) = setup();

    assert_eq!(send(&mut session, "Z0,1000,1"), "OK");
    assert_eq!(send(&mut session, "m1000,4"), "90909090");

    send(&mut session, "c");
    assert_eq!(send(&mut session, "mffe,4"), "90909090");
    assert_eq!(send(&mut session, "mffe,0"), "OK");
}

#[test]
fn registers_and_threads() {
    let (machine, mut session) = setup();

    assert_eq!(send(&mut session, "qC"), "QC10");
    assert_eq!(send(&mut session, "qfThreadInfo"), "m10");
    assert_eq!(send(&mut session, "qsThreadInfo"), "l");
    assert_eq!(send(&mut session, "T10"), "OK");
    assert_eq!(send(&mut session, "T11"), "E02");

    // rip is register 16.
    assert_eq!(send(&mut session, "P10=0010000000000000"), "OK");
    assert_eq!(machine.pc(Pid::from_raw(PID)), 0x1000);

    let stop = send(&mut session, "?");
    assert!(stop.starts_with("T"), "{}", stop);
}

#[test]
fn kill_in_extended_mode_keeps_the_session() {
    let (machine, mut session) = setup();
    assert_eq!(send(&mut session, "!"), "OK");
    assert_eq!(send(&mut session, "vKill;11"), "E03");
    assert_eq!(send(&mut session, "vKill;10"), "OK");
    assert!(machine.is_killed());
    assert!(!session.delegate().has_process());
    assert!(!session.is_done());

    // Nothing left to stop.
    assert_eq!(send(&mut session, "qfThreadInfo"), "l");
}

#[test]
fn kill_ends_a_plain_session_silently() {
    let (machine, mut session) = setup();
    assert_eq!(session.receive(&frame("k")), vec![Bytes::from("+")]);
    assert!(machine.is_killed());
    assert!(session.is_done());
}

#[test]
fn target_description() {
    let (_machine, mut session) = setup();
    let xml = send(&mut session, "qXfer:features:read:target.xml:0,fff");
    assert!(xml.starts_with('l'), "{}", xml);
    assert!(xml.contains("<architecture>i386:x86-64</architecture>"));
    assert_eq!(
        send(&mut session, "qXfer:features:read:other.xml:0,fff"),
        "E02"
    );
}
