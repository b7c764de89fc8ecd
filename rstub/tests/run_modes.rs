/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Runs the executable and talks to it over TCP.

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;

const RSTUB: &str = env!("CARGO_BIN_EXE_rstub");

struct Killed(Child);

impl Drop for Killed {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn frame(body: &str) -> Vec<u8> {
    let sum = body.bytes().fold(0u8, |a, b| a.wrapping_add(b));
    format!("${}#{:02x}", body, sum).into_bytes()
}

fn request(stream: &mut TcpStream, body: &str) -> String {
    stream.write_all(&frame(body)).unwrap();
    let mut reply = Vec::new();
    let mut byte = [0u8];
    loop {
        stream.read_exact(&mut byte).unwrap();
        reply.push(byte[0]);
        if let Some(hash) = reply.iter().position(|c| *c == b'#') {
            if reply.len() == hash + 3 {
                return String::from_utf8(reply).unwrap();
            }
        }
    }
}

#[test]
fn slave_reports_its_port() {
    let child = Command::new(RSTUB)
        .args(["slave", "--listen", "127.0.0.1"])
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let mut child = Killed(child);

    let mut line = String::new();
    BufReader::new(child.0.stdout.take().unwrap())
        .read_line(&mut line)
        .unwrap();
    let mut words = line.split_whitespace();
    let port: u16 = words.next().unwrap().parse().unwrap();
    let pid: u32 = words.next().unwrap().parse().unwrap();
    assert_eq!(pid, child.0.id());

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    // Nothing is being debugged yet.
    assert_eq!(request(&mut stream, "qfThreadInfo"), "+$l#6c");
    assert_eq!(request(&mut stream, "qAttached"), "+$E03#a8");
}

#[test]
fn platform_answers_host_queries() {
    let dir = tempfile::tempdir().unwrap();
    let pipe = dir.path().join("port");
    std::fs::write(&pipe, b"").unwrap();

    let child = Command::new(RSTUB)
        .arg("platform")
        .arg("--named-pipe")
        .arg(&pipe)
        .arg("127.0.0.1:0")
        .spawn()
        .unwrap();
    let _child = Killed(child);

    let deadline = Instant::now() + Duration::from_secs(10);
    let port: u16 = loop {
        let contents = std::fs::read(&pipe).unwrap();
        if let Some(end) = contents.iter().position(|c| *c == 0) {
            break std::str::from_utf8(&contents[..end]).unwrap().parse().unwrap();
        }
        assert!(Instant::now() < deadline, "platform never reported its port");
        thread::sleep(Duration::from_millis(20));
    };

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    assert_eq!(request(&mut stream, "QStartNoAckMode"), "+$OK#9a");
    stream.write_all(b"+").unwrap();

    let info = request(&mut stream, "qHostInfo");
    assert!(info.contains("ostype:linux;"), "{}", info);
    let cwd = request(&mut stream, "qGetWorkingDir");
    assert!(cwd.starts_with("$"), "{}", cwd);
}
