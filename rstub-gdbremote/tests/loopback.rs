/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use rstub_gdbremote::DebugSession;
use rstub_gdbremote::ReceiveMode;
use rstub_gdbremote::Session;
use rstub_gdbremote::serve;
use rstub_target::Pid;
use rstub_target::Protection;
use rstub_target::testing::FakeMachine;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::DuplexStream;

fn frame(body: &str) -> Vec<u8> {
    let sum = body.bytes().fold(0u8, |a, b| a.wrapping_add(b));
    format!("${}#{:02x}", body, sum).into_bytes()
}

/// Reads until one whole reply (and its checksum) has arrived.
async fn read_reply(client: &mut DuplexStream) -> String {
    let mut reply = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        if let Some(hash) = reply.iter().position(|c| *c == b'#') {
            if reply.len() >= hash + 3 {
                return String::from_utf8(reply).unwrap();
            }
        }
        let n = client.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed early");
        reply.extend_from_slice(&buf[..n]);
    }
}

fn machine() -> FakeMachine {
    let machine = FakeMachine::new(0x10);
    machine.map(0x1000, vec![0x90; 0x10], Protection::READ | Protection::EXECUTE);
    machine.set_pc(Pid::from_raw(0x10), 0x1000);
    machine
}

#[tokio::test]
async fn serves_until_the_client_leaves() {
    let machine = machine();
    let mut delegate = DebugSession::new(Box::new(machine.spawner()));
    delegate.attach(Pid::from_raw(0x10)).unwrap();

    let (mut client, server) = tokio::io::duplex(4096);
    let served = tokio::spawn(serve(server, Session::new(delegate), ReceiveMode::Cooked));

    client.write_all(&frame("qSupported:swbreak+")).await.unwrap();
    let reply = read_reply(&mut client).await;
    assert!(reply.starts_with("+$PacketSize="), "{}", reply);
    assert!(reply.contains("swbreak+"), "{}", reply);

    client.write_all(b"+").await.unwrap();
    client.write_all(&frame("m1000,2")).await.unwrap();
    assert_eq!(read_reply(&mut client).await, "+$9090#d2");

    drop(client);
    let session = served.await.unwrap().unwrap();
    // The target outlives the connection.
    assert!(session.delegate().has_process());
}

#[tokio::test]
async fn raw_mode_frames_in_the_session() {
    let machine = machine();
    let mut delegate = DebugSession::new(Box::new(machine.spawner()));
    delegate.attach(Pid::from_raw(0x10)).unwrap();

    let (mut client, server) = tokio::io::duplex(4096);
    let served = tokio::spawn(serve(server, Session::new(delegate), ReceiveMode::Raw));

    // A packet split across writes still gets one reply.
    let packet = frame("qC");
    client.write_all(&packet[..2]).await.unwrap();
    client.flush().await.unwrap();
    client.write_all(&packet[2..]).await.unwrap();
    assert_eq!(read_reply(&mut client).await, "+$QC10#f5");

    drop(client);
    served.await.unwrap().unwrap();
}

#[tokio::test]
async fn client_leaving_before_the_reply_keeps_the_target() {
    let machine = machine();
    let mut delegate = DebugSession::new(Box::new(machine.spawner()));
    delegate.attach(Pid::from_raw(0x10)).unwrap();

    let (mut client, server) = tokio::io::duplex(4096);
    let served = tokio::spawn(serve(server, Session::new(delegate), ReceiveMode::Cooked));
    client.write_all(&frame("qC")).await.unwrap();
    drop(client);

    let session = served.await.unwrap().unwrap();
    assert!(session.delegate().has_process());

    // The next debugger picks up where the last one left off.
    let (mut client, server) = tokio::io::duplex(4096);
    let session = Session::new(session.into_delegate());
    let served = tokio::spawn(serve(server, session, ReceiveMode::Cooked));
    client.write_all(&frame("m1000,2")).await.unwrap();
    assert_eq!(read_reply(&mut client).await, "+$9090#d2");
    drop(client);
    served.await.unwrap().unwrap();
}

#[tokio::test]
async fn interrupt_reaches_a_running_target() {
    let machine = FakeMachine::new(0x10);
    // `jmp .` and then two bytes to run off the end of.
    machine.map(
        0x1000,
        vec![0xeb, 0xfe, 0x90, 0x90],
        Protection::READ | Protection::EXECUTE,
    );
    machine.set_pc(Pid::from_raw(0x10), 0x1000);
    let mut delegate = DebugSession::new(Box::new(machine.spawner()));
    delegate.attach(Pid::from_raw(0x10)).unwrap();

    let (mut client, server) = tokio::io::duplex(4096);
    let served = tokio::spawn(serve(server, Session::new(delegate), ReceiveMode::Cooked));

    client.write_all(&frame("c")).await.unwrap();
    client.write_all(&[0x03]).await.unwrap();
    let stop = read_reply(&mut client).await;
    assert!(stop.starts_with("+$T02"), "{}", stop);
    assert!(stop.contains("thread:10;"), "{}", stop);
    assert_eq!(machine.pc(Pid::from_raw(0x10)), 0x1000);

    // Still stopped, still debuggable: patch the loop out and run again.
    client.write_all(b"+").await.unwrap();
    client.write_all(&frame("M1000,2:9090")).await.unwrap();
    assert_eq!(read_reply(&mut client).await, "+$OK#9a");
    client.write_all(&frame("c")).await.unwrap();
    assert_eq!(read_reply(&mut client).await, "+$W00#b7");

    drop(client);
    served.await.unwrap().unwrap();
}
