/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Connection driver: sockets in, sockets out, and the tasks that shuttle
//! bytes between a connection and its [`Session`].

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use bytes::BytesMut;
use futures::future;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::Error;
use crate::Session;
use crate::SessionDelegate;
use crate::SessionLink;
use crate::packet::Packet;
use crate::packet::PacketParseError;
use crate::packet::PacketReader;

const PACKET_BUFFER_CAPACITY: usize = 0x8000;

/// Packets queued between the reader task and the session.
const PACKET_QUEUE_DEPTH: usize = 64;

/// How the reader task hands bytes to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    /// The reader frames packets, drops acks and routes interrupts to a
    /// running target.
    Cooked,
    /// Bytes go to the session as they arrive; it frames them itself.
    Raw,
}

enum Inbound {
    Packet(Result<Packet, PacketParseError>),
    Raw(BytesMut),
}

/// Binds a listening socket. Port 0 picks an ephemeral port.
pub fn listen(host: &str, port: u16) -> Result<TcpListener, Error> {
    let address = format!("{}:{}", host, port);
    let bind = || -> std::io::Result<TcpListener> {
        // NB: bound through std so that no extra runtime worker is spawned
        // before the first connection.
        let listener = std::net::TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        TcpListener::from_std(listener)
    };
    let listener = bind().map_err(|source| Error::Listen { address, source })?;
    tracing::info!("Listening on {:?}", listener.local_addr().ok());
    Ok(listener)
}

/// Tells whoever started us which port we listen on: the decimal port
/// followed by a NUL byte.
pub async fn report_port(path: &Path, port: u16) -> Result<(), Error> {
    let write = async {
        let mut pipe = tokio::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .await?;
        pipe.write_all(format!("{}\0", port).as_bytes()).await?;
        pipe.flush().await
    };
    write.await.map_err(|source| Error::NamedPipe { source })
}

/// Waits for the debugger to connect.
pub async fn accept(listener: &TcpListener) -> Result<TcpStream, Error> {
    let (stream, client_addr) = listener
        .accept()
        .await
        .map_err(|source| Error::WaitForConnect { source })?;
    tracing::info!("Accepting client connection: {:?}", client_addr);
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Reverse connect: dials out to a waiting debugger.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, Error> {
    let address = format!("{}:{}", host, port);
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| Error::Connect { address, source })?;
    tracing::info!("Connected to {}", stream.peer_addr()?);
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Runs `session` over `stream` until either side ends the conversation or
/// the transport fails. The session is handed back so that its delegate can
/// outlive the connection; the only error is a panicking session.
pub async fn serve<D, S>(stream: S, session: Session<D>, mode: ReceiveMode) -> Result<Session<D>, Error>
where
    D: SessionDelegate + 'static,
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (pkt_tx, pkt_rx) = mpsc::channel(PACKET_QUEUE_DEPTH);
    let (reply_tx, reply_rx) = mpsc::channel(PACKET_QUEUE_DEPTH);
    let link = session.link();

    // Delegates block on the target; keep them off the runtime threads.
    let run_session = async move {
        tokio::task::spawn_blocking(move || run_session(session, pkt_rx, reply_tx))
            .await
            .map_err(|_| Error::SessionPanicked)
    };
    let relay = relay_packets(reader, pkt_tx, link, mode);
    let send = send_replies(writer, reply_rx);

    // Transport failures end the connection, never the session.
    let (session, (), ()) = future::join3(run_session, relay, send).await;
    tracing::info!("Connection closed");
    session
}

fn run_session<D: SessionDelegate>(
    mut session: Session<D>,
    mut rx: mpsc::Receiver<Inbound>,
    tx: mpsc::Sender<Bytes>,
) -> Session<D> {
    while let Some(inbound) = rx.blocking_recv() {
        let replies: Vec<Bytes> = match inbound {
            Inbound::Packet(packet) => session.process(packet).into_iter().collect(),
            Inbound::Raw(bytes) => session.receive(&bytes),
        };
        for reply in replies {
            if tx.blocking_send(reply).is_err() {
                tracing::debug!("Reply dropped, the writer is gone");
                return session;
            }
        }
        if session.is_done() {
            tracing::debug!("Session finished");
            break;
        }
    }
    session
}

async fn relay_packets<R>(
    mut reader: R,
    tx: mpsc::Sender<Inbound>,
    link: Arc<SessionLink>,
    mode: ReceiveMode,
) where
    R: AsyncRead + Unpin,
{
    let mut framer = PacketReader::new();
    loop {
        let mut rx_buf = BytesMut::with_capacity(PACKET_BUFFER_CAPACITY);
        let read = tokio::select! {
            read = reader.read_buf(&mut rx_buf) => read,
            _ = tx.closed() => break,
        };
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!("Connection reset: {}", err);
                break;
            }
        }

        match mode {
            ReceiveMode::Raw => {
                if tx.send(Inbound::Raw(rx_buf)).await.is_err() {
                    break;
                }
            }
            ReceiveMode::Cooked => {
                framer.push(&rx_buf);
                while let Some(frame) = framer.next_frame() {
                    match frame.first() {
                        Some(b'+') => continue,
                        Some(0x03) if link.interrupt() => continue,
                        _ => {}
                    }
                    let packet = Packet::new(frame);
                    if matches!(&packet, Ok(Packet::Command(cmd)) if cmd.is_resume()) {
                        link.expect_resume();
                    }
                    if tx.send(Inbound::Packet(packet)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    // Do not leave the session blocked on a target nobody is watching.
    if link.interrupt() {
        tracing::info!("Client went away while the target was running");
    }
}

async fn send_replies<W>(mut writer: W, mut rx: mpsc::Receiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = rx.recv().await {
        let sent = match writer.write_all(&reply).await {
            Ok(()) => writer.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = sent {
            // Dropping `rx` stops the session from producing more replies.
            tracing::info!("Failed to send reply to the debugger: {}", err);
            return;
        }
    }
    // The client may already be gone.
    let _ = writer.shutdown().await;
}
