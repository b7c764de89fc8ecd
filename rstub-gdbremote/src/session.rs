/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::os::unix::ffi::OsStrExt;
use std::sync::Arc;

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use rstub_target::Address;
use rstub_target::ErrorCode;
use rstub_target::Pid;
use rstub_target::ProcessInfo;

use crate::SessionDelegate;
use crate::SessionLink;
use crate::SessionState;
use crate::commands::*;
use crate::packet::Packet;
use crate::packet::PacketParseError;
use crate::packet::PacketReader;
use crate::response::*;
use crate::stop_reply::StopCode;
use crate::stop_reply::ThreadsJson;
use crate::types::CompatMode;
use crate::types::FileStat;
use crate::types::ProcessInfoReply;
use crate::types::ProcessListEntry;
use crate::types::RegionReply;

/// Thread ids sent per `qfThreadInfo` / `qsThreadInfo` reply.
const THREADS_PER_PACKET: usize = 128;

/// What a handler leaves for the client.
enum Reply {
    /// Whatever was written, even nothing (the empty reply).
    Send,
    /// No reply packet at all; only the acknowledgement.
    Silent,
}

/// Protocol engine of one connection.
///
/// The engine frames, acknowledges and decodes packets, hands each command
/// to its [`SessionDelegate`] and encodes the answer. It does no debugging
/// itself. Commands are processed one at a time, in arrival order; a resume
/// blocks the engine until the target stops, while interrupts reach the
/// target through the [`SessionLink`].
pub struct Session<D> {
    delegate: D,
    state: SessionState,
    link: Arc<SessionLink>,
    /// Framing state for raw receive mode.
    reader: PacketReader,
    /// Last reply, without the ack prefix, for retransmission.
    last_reply: Option<Bytes>,
    thread_list: Option<std::vec::IntoIter<(Pid, Pid)>>,
    process_list: Option<std::vec::IntoIter<ProcessInfo>>,
    done: bool,
}

impl<D: SessionDelegate> Session<D> {
    /// A session that picks its dialect from the first command.
    pub fn new(delegate: D) -> Self {
        Self::with_mode(delegate, None)
    }

    /// A session with the dialect forced up front.
    pub fn with_mode(delegate: D, mode: Option<CompatMode>) -> Self {
        Session {
            delegate,
            state: SessionState::new(mode),
            link: Arc::new(SessionLink::new()),
            reader: PacketReader::new(),
            last_reply: None,
            thread_list: None,
            process_list: None,
            done: false,
        }
    }

    pub fn link(&self) -> Arc<SessionLink> {
        self.link.clone()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    pub fn into_delegate(self) -> D {
        self.delegate
    }

    /// True once the client asked to end the session.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Raw receive mode: frames `data` and answers every complete packet.
    pub fn receive(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.reader.push(data);
        let mut out = Vec::new();
        while !self.done {
            let Some(frame) = self.reader.next_frame() else {
                break;
            };
            out.extend(self.process(Packet::new(frame)));
        }
        out
    }

    /// Handles one framed packet, returning the bytes to send back.
    pub fn process(&mut self, packet: Result<Packet, PacketParseError>) -> Option<Bytes> {
        match packet {
            Ok(Packet::Ack) => None,
            Ok(Packet::Nack) => {
                tracing::debug!("client NAK, resending last reply");
                self.last_reply.clone()
            }
            Ok(Packet::Interrupt) => {
                if let Err(err) = self.delegate.on_interrupt(&mut self.state) {
                    tracing::debug!("interrupt while stopped: {}", err);
                }
                None
            }
            Ok(Packet::Command(cmd)) => self.dispatch(cmd),
            Err(err) if err.is_well_framed() => {
                tracing::warn!("rejecting command: {}", err);
                let ack = !self.state.no_ack;
                let mut writer = self.writer();
                writer.put_error(ErrorCode::InvalidArgument);
                self.finish(ack, Some(writer))
            }
            Err(err) => {
                tracing::warn!("dropping packet: {}", err);
                if self.state.no_ack {
                    None
                } else {
                    Some(Bytes::from_static(b"-"))
                }
            }
        }
    }

    fn writer(&self) -> ResponseWriter {
        ResponseWriter::new(BytesMut::new()).with_error_strings(self.state.error_strings)
    }

    fn finish(&mut self, ack: bool, writer: Option<ResponseWriter>) -> Option<Bytes> {
        let reply = writer.map(ResponseWriter::finish);
        if let Some(reply) = &reply {
            self.last_reply = Some(reply.clone());
        }
        match (ack, reply) {
            (true, Some(reply)) => {
                let mut out = BytesMut::with_capacity(reply.len() + 1);
                out.put_u8(b'+');
                out.extend_from_slice(&reply);
                Some(out.freeze())
            }
            (true, None) => Some(Bytes::from_static(b"+")),
            (false, reply) => reply,
        }
    }

    fn dispatch(&mut self, cmd: Command) -> Option<Bytes> {
        // Acks stop after the reply to QStartNoAckMode.
        let ack = !self.state.no_ack;

        if self.state.mode.is_none() {
            let mode = match cmd {
                Command::Base(Base::QStartNoAckMode(_)) => CompatMode::Lldb,
                _ => CompatMode::Gdb,
            };
            tracing::info!("client speaks the {:?} dialect", mode);
            self.state.mode = Some(mode);
        }

        let mut writer = self.writer();
        let reply = if self.state.mode() == CompatMode::Gdb && cmd.is_lldb_only() {
            tracing::debug!("not a gdb command: {:?}", cmd);
            Reply::Send
        } else if cmd.is_resume() {
            self.link.arm(self.delegate.interrupter());
            let reply = self.handle_command(cmd, &mut writer);
            self.link.disarm();
            reply
        } else {
            self.handle_command(cmd, &mut writer)
        };

        match reply {
            Reply::Send => self.finish(ack, Some(writer)),
            Reply::Silent => self.finish(ack, None),
        }
    }

    fn handle_command(&mut self, cmd: Command, writer: &mut ResponseWriter) -> Reply {
        match cmd {
            Command::Unknown(cmd) => {
                tracing::info!("Unknown command: {:?}", cmd);
                Reply::Send
            }
            Command::Base(cmd) => self.handle_base(cmd, writer),
            Command::ExtendedMode(cmd) => self.handle_extended_mode(cmd, writer),
            Command::MonitorCmd(cmd) => self.handle_monitor_cmd(cmd, writer),
            Command::Lldb(cmd) => self.handle_lldb(cmd, writer),
            Command::Platform(cmd) => self.handle_platform(cmd, writer),
        }
    }

    /// Thread a register or memory packet applies to.
    fn thread_of(&self, suffix: Option<ThreadId>) -> Option<Pid> {
        suffix.or(self.state.general_thread).and_then(|t| t.gettid())
    }

    fn write_stop(&self, result: Result<StopCode, ErrorCode>, writer: &mut ResponseWriter) {
        match result {
            Ok(code) => code.reply(&self.state).write_response(writer),
            Err(err) => writer.put_error(err),
        }
    }

    fn resume(&mut self, actions: Vec<ThreadResumeAction>, writer: &mut ResponseWriter) {
        let result = self.delegate.on_resume(&mut self.state, &actions);
        self.write_stop(result, writer);
    }

    /// `c`, `C`, `s` and `S` act on the thread picked by `Hc`.
    fn legacy_resume(&mut self, action: ResumeAction, addr: Option<u64>, writer: &mut ResponseWriter) {
        let thread = self.state.continue_thread.unwrap_or_else(ThreadId::all);
        self.resume(
            vec![ThreadResumeAction {
                action,
                thread,
                address: addr,
            }],
            writer,
        );
    }

    fn write_thread_page(&mut self, writer: &mut ResponseWriter) {
        let page: Vec<_> = self
            .thread_list
            .as_mut()
            .map(|it| it.by_ref().take(THREADS_PER_PACKET).collect())
            .unwrap_or_default();
        if page.is_empty() {
            self.thread_list = None;
            writer.put_str("l");
            return;
        }
        writer.put_str("m");
        for (i, (pid, tid)) in page.into_iter().enumerate() {
            if i > 0 {
                writer.put_str(",");
            }
            self.state.write_thread_id(writer, pid, tid);
        }
    }

    fn write_next_process(&mut self, writer: &mut ResponseWriter) {
        match self.process_list.as_mut().and_then(Iterator::next) {
            Some(info) => ProcessListEntry(&info).write_response(writer),
            None => {
                self.process_list = None;
                writer.put_error(ErrorCode::ProcessNotFound);
            }
        }
    }

    fn handle_base(&mut self, cmd: Base, writer: &mut ResponseWriter) -> Reply {
        match cmd {
            Base::QuestionMark(_) => {
                let result = self.delegate.on_query_thread_stop_info(&mut self.state, None);
                self.write_stop(result, writer);
            }
            Base::QStartNoAckMode(_) => {
                self.state.no_ack = true;
                ResponseOk.write_response(writer);
            }
            Base::QThreadEvents(events) => {
                self.state.thread_events = events.enable;
                ResponseOk.write_response(writer);
            }
            Base::QNonStop(non_stop) => self
                .delegate
                .on_non_stop_mode(&mut self.state, non_stop.enable)
                .map(|_| {
                    self.state.non_stop = non_stop.enable;
                    ResponseOk
                })
                .write_response(writer),
            Base::QAgent(agent) => self
                .delegate
                .on_enable_control_agent(&mut self.state, agent.enable)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::QAllow(allow) => self
                .delegate
                .on_allow_operations(&mut self.state, &allow.operations)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::Qbtrace(btrace) => self
                .delegate
                .on_enable_bts_tracing(&mut self.state, &btrace.mode)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::QPassSignals(signals) => self
                .delegate
                .on_pass_signals(&mut self.state, &signals.signals)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::QProgramSignals(signals) => self
                .delegate
                .on_program_signals(&mut self.state, &signals.signals)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::qSupported(supported) => {
                self.state.remote_features = supported.features;
                writer.put_str("PacketSize=");
                writer.put_num(self.state.max_packet_size);
                writer.put_str(";QStartNoAckMode+;QThreadEvents+;vContSupported+;multiprocess+");
                match self.delegate.on_query_supported(&mut self.state) {
                    Ok(features) => {
                        for feature in features {
                            writer.put_str(";");
                            feature.write_response(writer);
                        }
                    }
                    Err(ErrorCode::Unsupported) => {}
                    Err(err) => tracing::warn!("qSupported: {}", err),
                }
            }
            Base::qSymbol(sym) => {
                match self
                    .delegate
                    .on_query_symbol(&mut self.state, sym.name.as_deref(), sym.value)
                {
                    Ok(Some(next)) => {
                        writer.put_str("qSymbol:");
                        writer.put_hex_encoded(next.as_bytes());
                    }
                    Ok(None) => ResponseOk.write_response(writer),
                    Err(err) => writer.put_error(err),
                }
            }
            Base::qAttached(attached) => self
                .delegate
                .on_query_attached(&mut self.state, attached.pid)
                .map(|attached| ResponseAsPlain(if attached { "1" } else { "0" }))
                .write_response(writer),
            Base::qOffsets(_) => self
                .delegate
                .on_query_section_offsets(&mut self.state)
                .write_response(writer),
            Base::qCRC(crc) => match self.delegate.on_compute_crc(
                &mut self.state,
                Address::new(crc.addr),
                crc.length,
            ) {
                Ok(value) => {
                    writer.put_str("C");
                    writer.put_num(value);
                }
                Err(err) => writer.put_error(err),
            },
            Base::qC(_) => match self.delegate.on_query_current_thread(&mut self.state) {
                Ok((pid, tid)) => {
                    writer.put_str("QC");
                    self.state.write_thread_id(writer, pid, tid);
                }
                Err(err) => writer.put_error(err),
            },
            Base::qfThreadInfo(_) => match self.delegate.on_query_thread_list(&mut self.state) {
                Ok(threads) => {
                    self.thread_list = Some(threads.into_iter());
                    self.write_thread_page(writer);
                }
                Err(err) => writer.put_error(err),
            },
            Base::qsThreadInfo(_) => self.write_thread_page(writer),
            Base::qThreadExtraInfo(info) => match info.thread.gettid() {
                Some(tid) => self
                    .delegate
                    .on_query_thread_info(&mut self.state, tid)
                    .map(ResponseAsHex)
                    .write_response(writer),
                None => writer.put_error(ErrorCode::InvalidArgument),
            },
            Base::qGetTLSAddr(tls) => match tls.thread.gettid() {
                Some(tid) => match self.delegate.on_query_tls_address(
                    &mut self.state,
                    tid,
                    tls.offset,
                    tls.link_map,
                ) {
                    Ok(addr) => writer.put_num(addr.value()),
                    Err(err) => writer.put_error(err),
                },
                None => writer.put_error(ErrorCode::InvalidArgument),
            },
            Base::qGetTIBAddr(tib) => match tib.thread.gettid() {
                Some(tid) => match self.delegate.on_query_tib_address(&mut self.state, tid) {
                    Ok(addr) => writer.put_num(addr.value()),
                    Err(err) => writer.put_error(err),
                },
                None => writer.put_error(ErrorCode::InvalidArgument),
            },
            Base::qSearch(search) => match self.delegate.on_search(
                &mut self.state,
                Address::new(search.addr),
                search.length,
                &search.pattern,
            ) {
                Ok(Some(found)) => {
                    writer.put_str("1,");
                    writer.put_num(found.value());
                }
                Ok(None) => writer.put_str("0"),
                Err(err) => writer.put_error(err),
            },
            Base::qXfer(xfer) => match xfer {
                qXfer::Read {
                    object,
                    annex,
                    offset,
                    length,
                } => {
                    let length = length.min(self.state.max_payload_size);
                    self.delegate
                        .on_xfer_read(&mut self.state, &object, &annex, offset, length)
                        .write_response(writer)
                }
                qXfer::Write {
                    object,
                    annex,
                    offset,
                    data,
                } => match self
                    .delegate
                    .on_xfer_write(&mut self.state, &object, &annex, offset, &data)
                {
                    Ok(n) => writer.put_num(n),
                    Err(err) => writer.put_error(err),
                },
            },
            Base::vCont(vcont) => match vcont {
                vCont::Query => writer.put_str("vCont;c;C;s;S"),
                vCont::Actions(actions) => self.resume(actions, writer),
            },
            Base::vKill(kill) => {
                let result = self.delegate.on_terminate(&mut self.state, kill.pid);
                result.map(|_| ResponseOk).write_response(writer);
            }
            Base::vFile(hostio) => self.handle_host_io(hostio, writer),
            Base::vFlash(flash) => match flash {
                vFlash::Erase { addr, length } => self
                    .delegate
                    .on_flash_erase(&mut self.state, Address::new(addr), length)
                    .map(|_| ResponseOk)
                    .write_response(writer),
                vFlash::Write { addr, data } => self
                    .delegate
                    .on_flash_write(&mut self.state, Address::new(addr), &data)
                    .map(|_| ResponseOk)
                    .write_response(writer),
                vFlash::Done => self
                    .delegate
                    .on_flash_done(&mut self.state)
                    .map(|_| ResponseOk)
                    .write_response(writer),
            },
            // NB: detach ends the session; the client may still read the
            // reply.
            Base::D(detach) => {
                let result = self.delegate.on_detach(&mut self.state, detach.pid);
                if result.is_ok() && !self.state.extended {
                    self.done = true;
                }
                result.map(|_| ResponseOk).write_response(writer);
            }
            Base::H(h) => {
                let alive = match h.id.gettid() {
                    Some(tid) => match self.delegate.on_thread_is_alive(&mut self.state, tid) {
                        Err(ErrorCode::Unsupported) => Ok(()),
                        other => other,
                    },
                    None => Ok(()),
                };
                alive
                    .map(|_| {
                        match h.op {
                            ThreadOp::General => self.state.general_thread = Some(h.id),
                            ThreadOp::Continue => self.state.continue_thread = Some(h.id),
                        }
                        ResponseOk
                    })
                    .write_response(writer);
            }
            Base::T(t) => match t.thread.gettid() {
                Some(tid) => self
                    .delegate
                    .on_thread_is_alive(&mut self.state, tid)
                    .map(|_| ResponseOk)
                    .write_response(writer),
                None => writer.put_error(ErrorCode::InvalidArgument),
            },
            Base::b(baud) => self
                .delegate
                .on_set_baud_rate(&mut self.state, baud.baud)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::c(c) => self.legacy_resume(ResumeAction::Continue(None), c.addr, writer),
            Base::C(c) => self.legacy_resume(
                ResumeAction::Continue(Some(c.signal).filter(|s| *s != 0)),
                c.addr,
                writer,
            ),
            Base::s(s) => self.legacy_resume(ResumeAction::Step(None), s.addr, writer),
            Base::S(s) => self.legacy_resume(
                ResumeAction::Step(Some(s.signal).filter(|s| *s != 0)),
                s.addr,
                writer,
            ),
            Base::d(_) => self
                .delegate
                .on_toggle_debug_flag(&mut self.state)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::g(regs) => {
                let tid = self.thread_of(regs.thread);
                self.delegate
                    .on_read_general_registers(&mut self.state, tid)
                    .map(ResponseAsCompressedHex)
                    .write_response(writer)
            }
            Base::G(regs) => {
                let tid = self.thread_of(regs.thread);
                self.delegate
                    .on_write_general_registers(&mut self.state, tid, &regs.vals)
                    .map(|_| ResponseOk)
                    .write_response(writer)
            }
            Base::k(_) => {
                let result = self.delegate.on_terminate_thread(&mut self.state);
                if !self.state.extended {
                    self.done = true;
                }
                if self.state.mode() == CompatMode::Gdb {
                    if let Err(err) = result {
                        tracing::warn!("kill failed: {}", err);
                    }
                    return Reply::Silent;
                }
                self.write_stop(result, writer);
            }
            Base::m(m) if m.length == 0 => ResponseOk.write_response(writer),
            Base::m(m) => {
                let length = m.length.min(self.state.max_payload_size / 2);
                match self
                    .delegate
                    .on_read_memory(&mut self.state, Address::new(m.addr), length)
                {
                    Ok(data) if data.is_empty() => writer.put_error(ErrorCode::InvalidAddress),
                    Ok(data) => ResponseAsCompressedHex(data).write_response(writer),
                    Err(err) => writer.put_error(err),
                }
            }
            Base::M(mem) => self
                .delegate
                .on_write_memory(&mut self.state, Address::new(mem.addr), &mem.vals)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::X(mem) => {
                if mem.length == 0 {
                    // Zero length: a check for binary write support.
                    ResponseOk.write_response(writer);
                } else {
                    self.delegate
                        .on_write_memory(&mut self.state, Address::new(mem.addr), &mem.vals)
                        .map(|_| ResponseOk)
                        .write_response(writer)
                }
            }
            Base::p(reg) => {
                let tid = self.thread_of(reg.thread);
                self.delegate
                    .on_read_register_value(&mut self.state, tid, reg.reg)
                    .map(ResponseAsHex)
                    .write_response(writer)
            }
            Base::P(reg) => {
                let tid = self.thread_of(reg.thread);
                self.delegate
                    .on_write_register_value(&mut self.state, tid, reg.reg, &reg.val)
                    .map(|_| ResponseOk)
                    .write_response(writer)
            }
            Base::t(search) => match self.delegate.on_search_backward(
                &mut self.state,
                Address::new(search.addr),
                search.pattern,
                search.mask,
            ) {
                Ok(found) => writer.put_num(found.value()),
                Err(err) => writer.put_error(err),
            },
            Base::z(bkpt) => self
                .delegate
                .on_remove_breakpoint(&mut self.state, &bkpt.bkpt)
                .map(|_| ResponseOk)
                .write_response(writer),
            Base::Z(bkpt) => self
                .delegate
                .on_insert_breakpoint(&mut self.state, &bkpt.bkpt)
                .map(|_| ResponseOk)
                .write_response(writer),
        }
        Reply::Send
    }

    fn handle_host_io(&mut self, hostio: vFile, writer: &mut ResponseWriter) {
        let state = &mut self.state;
        let delegate = &mut self.delegate;
        match hostio {
            vFile::Setfs(pid) => {
                write_host_io(writer, delegate.on_file_set_system(state, pid), |w, _| {
                    w.put_str("F0")
                })
            }
            vFile::Open(path, flags, mode) => write_host_io(
                writer,
                delegate.on_file_open(state, &path, flags, mode),
                |w, fd| {
                    w.put_str("F");
                    w.put_num(fd as u32);
                },
            ),
            vFile::Close(fd) => {
                write_host_io(writer, delegate.on_file_close(state, fd), |w, _| {
                    w.put_str("F0")
                })
            }
            vFile::Pread(fd, count, offset) => {
                let count = count.min(state.max_payload_size / 2);
                write_host_io(
                    writer,
                    delegate.on_file_read(state, fd, count, offset),
                    |w, data| {
                        w.put_str("F");
                        w.put_num(data.len());
                        w.put_str(";");
                        w.put_binary_encoded(&data);
                    },
                )
            }
            vFile::Pwrite(fd, offset, data) => write_host_io(
                writer,
                delegate.on_file_write(state, fd, offset, &data),
                |w, n| {
                    w.put_str("F");
                    w.put_num(n);
                },
            ),
            vFile::Fstat(fd) => {
                write_host_io(writer, delegate.on_file_fstat(state, fd), |w, st| {
                    w.put_str("F");
                    w.put_num(FileStat::SIZE);
                    w.put_str(";");
                    w.put_binary_encoded(&st.to_bytes());
                })
            }
            vFile::Unlink(path) => {
                write_host_io(writer, delegate.on_file_remove(state, &path), |w, _| {
                    w.put_str("F0")
                })
            }
            vFile::Readlink(path) => {
                write_host_io(writer, delegate.on_file_read_link(state, &path), |w, target| {
                    let bytes = target.as_os_str().as_bytes();
                    w.put_str("F");
                    w.put_num(bytes.len());
                    w.put_str(";");
                    w.put_binary_encoded(bytes);
                })
            }
            vFile::Exists(path) => match delegate.on_file_exists(state, &path) {
                Ok(exists) => writer.put_str(if exists { "F,1" } else { "F,0" }),
                Err(ErrorCode::Unsupported) => {}
                Err(_) => writer.put_str("F,0"),
            },
            vFile::MD5(path) => match delegate.on_file_compute_md5(state, &path) {
                Ok(digest) => {
                    writer.put_str("F,");
                    writer.put_hex_encoded(&digest);
                }
                Err(ErrorCode::Unsupported) => {}
                Err(_) => writer.put_str("F,x"),
            },
            vFile::Size(path) => {
                write_host_io(writer, delegate.on_file_get_size(state, &path), |w, size| {
                    w.put_str("F");
                    w.put_num(size);
                })
            }
        }
    }

    fn handle_extended_mode(&mut self, cmd: ExtendedMode, writer: &mut ResponseWriter) -> Reply {
        match cmd {
            ExtendedMode::ExclamationMark(_) => self
                .delegate
                .on_enable_extended_mode(&mut self.state)
                .map(|_| {
                    self.state.extended = true;
                    ResponseOk
                })
                .write_response(writer),
            ExtendedMode::QDisableRandomization(aslr) => self
                .delegate
                .on_disable_aslr(&mut self.state, aslr.disable)
                .map(|_| ResponseOk)
                .write_response(writer),
            ExtendedMode::QEnvironmentHexEncoded(env) => self
                .delegate
                .on_set_environment_variable(&mut self.state, &env.key, &env.value)
                .map(|_| ResponseOk)
                .write_response(writer),
            ExtendedMode::QEnvironment(env) => self
                .delegate
                .on_set_environment_variable(&mut self.state, &env.key, &env.value)
                .map(|_| ResponseOk)
                .write_response(writer),
            ExtendedMode::QSetWorkingDir(dir) => self
                .delegate
                .on_set_working_directory(&mut self.state, &dir.dir)
                .map(|_| ResponseOk)
                .write_response(writer),
            ExtendedMode::vRun(run) => {
                let result =
                    self.delegate
                        .on_run_attach(&mut self.state, run.filename.as_deref(), &run.args);
                self.write_stop(result, writer);
            }
            ExtendedMode::vAttach(attach) => {
                let result = self.delegate.on_attach(&mut self.state, &attach.target);
                self.write_stop(result, writer);
            }
            ExtendedMode::R(_) => {
                if let Err(err) = self.delegate.on_restart(&mut self.state) {
                    tracing::warn!("restart failed: {}", err);
                }
                return Reply::Silent;
            }
            ExtendedMode::r(_) => {
                if let Err(err) = self.delegate.on_reset(&mut self.state) {
                    tracing::warn!("reset failed: {}", err);
                }
                return Reply::Silent;
            }
        }
        Reply::Send
    }

    fn handle_monitor_cmd(&mut self, cmd: MonitorCmd, writer: &mut ResponseWriter) -> Reply {
        match cmd {
            MonitorCmd::qRcmd(rcmd) => {
                match self.delegate.on_execute_command(&mut self.state, &rcmd.cmd) {
                    Ok(output) if output.is_empty() => ResponseOk.write_response(writer),
                    Ok(output) => writer.put_hex_encoded(output.as_bytes()),
                    Err(err) => writer.put_error(err),
                }
            }
        }
        Reply::Send
    }

    fn handle_lldb(&mut self, cmd: Lldb, writer: &mut ResponseWriter) -> Reply {
        match cmd {
            Lldb::qHostInfo(_) => self
                .delegate
                .on_query_host_info(&mut self.state)
                .write_response(writer),
            Lldb::qProcessInfo(_) => match self.delegate.on_query_process_info(&mut self.state) {
                Ok(info) => ProcessInfoReply(&info).write_response(writer),
                Err(err) => writer.put_error(err),
            },
            Lldb::qRegisterInfo(info) => self
                .delegate
                .on_query_register_info(&mut self.state, info.reg)
                .write_response(writer),
            Lldb::qMemoryRegionInfo(query) => match query.addr {
                None => ResponseOk.write_response(writer),
                Some(addr) => match self
                    .delegate
                    .on_query_memory_region_info(&mut self.state, Address::new(addr))
                {
                    Ok(region) => RegionReply(&region).write_response(writer),
                    Err(err) => writer.put_error(err),
                },
            },
            Lldb::qWatchpointSupportInfo(_) => {
                match self
                    .delegate
                    .on_query_hardware_watchpoint_count(&mut self.state)
                {
                    Ok(count) => writer.put_key_str("num", &count.to_string()),
                    Err(err) => writer.put_error(err),
                }
            }
            Lldb::qShlibInfoAddr(_) => match self
                .delegate
                .on_query_shared_libraries_info_address(&mut self.state)
            {
                Ok(addr) => writer.put_num(addr.value()),
                Err(err) => writer.put_error(err),
            },
            Lldb::qModuleInfo(module) => self
                .delegate
                .on_query_shared_library_info(&mut self.state, &module.path, &module.triple)
                .write_response(writer),
            Lldb::jThreadsInfo(_) => match self.delegate.on_query_threads_info(&mut self.state) {
                Ok(threads) => ThreadsJson(&threads).write_response(writer),
                Err(err) => writer.put_error(err),
            },
            Lldb::qThreadStopInfo(query) => match query.thread.gettid() {
                Some(tid) => {
                    let result = self
                        .delegate
                        .on_query_thread_stop_info(&mut self.state, Some(tid));
                    self.write_stop(result, writer);
                }
                None => writer.put_error(ErrorCode::InvalidArgument),
            },
            Lldb::QThreadSuffixSupported(_) => {
                self.state.thread_suffix = true;
                ResponseOk.write_response(writer);
            }
            Lldb::QListThreadsInStopReply(_) => {
                self.state.list_threads_in_stop_reply = true;
                ResponseOk.write_response(writer);
            }
            Lldb::QEnableErrorStrings(_) => {
                self.state.error_strings = true;
                ResponseOk.write_response(writer);
            }
            Lldb::QSaveRegisterState(save) => {
                let tid = self.thread_of(save.thread);
                match self.delegate.on_save_registers(&mut self.state, tid) {
                    Ok(id) => writer.put_dec(id),
                    Err(err) => writer.put_error(err),
                }
            }
            Lldb::QRestoreRegisterState(restore) => {
                let tid = self.thread_of(restore.thread);
                self.delegate
                    .on_restore_registers(&mut self.state, tid, restore.id)
                    .map(|_| ResponseOk)
                    .write_response(writer)
            }
            Lldb::_M(alloc) => {
                match self
                    .delegate
                    .on_allocate_memory(&mut self.state, alloc.size, alloc.protection)
                {
                    Ok(addr) => writer.put_num(addr.value()),
                    Err(err) => writer.put_error(err),
                }
            }
            Lldb::_m(dealloc) => self
                .delegate
                .on_deallocate_memory(&mut self.state, Address::new(dealloc.addr))
                .map(|_| ResponseOk)
                .write_response(writer),
            Lldb::x(mem) => {
                if mem.length == 0 {
                    // Zero length: a check for binary read support.
                    ResponseOk.write_response(writer);
                } else {
                    let length = mem.length.min(self.state.max_payload_size / 2);
                    self.delegate
                        .on_read_memory(&mut self.state, Address::new(mem.addr), length)
                        .map(ResponseAsBinary)
                        .write_response(writer)
                }
            }
            Lldb::qGDBServerVersion(_) => self
                .delegate
                .on_query_server_version(&mut self.state)
                .write_response(writer),
            Lldb::QSetMaxPacketSize(size) => {
                match self.delegate.on_set_max_packet_size(&mut self.state, size.size) {
                    Ok(()) | Err(ErrorCode::Unsupported) => {
                        self.state.max_packet_size = size.size;
                        ResponseOk.write_response(writer);
                    }
                    Err(err) => writer.put_error(err),
                }
            }
            Lldb::QSetMaxPayloadSize(size) => {
                match self.delegate.on_set_max_payload_size(&mut self.state, size.size) {
                    Ok(()) | Err(ErrorCode::Unsupported) => {
                        self.state.max_payload_size = size.size;
                        ResponseOk.write_response(writer);
                    }
                    Err(err) => writer.put_error(err),
                }
            }
            Lldb::QSetLogging(settings) => self
                .delegate
                .on_set_logging(&mut self.state, &settings)
                .map(|_| ResponseOk)
                .write_response(writer),
            Lldb::QSyncThreadState(sync) => self
                .delegate
                .on_synchronize_thread_state(&mut self.state, sync.tid)
                .map(|_| ResponseOk)
                .write_response(writer),
            Lldb::QSetEnableAsyncProfiling(profiling) => self
                .delegate
                .on_enable_asynchronous_profiling(
                    &mut self.state,
                    profiling.enable,
                    profiling.interval_usecs,
                    profiling.scan_type,
                )
                .map(|_| ResponseOk)
                .write_response(writer),
            Lldb::qGetProfileData(query) => self
                .delegate
                .on_query_profile_data(&mut self.state, query.scan_type)
                .map(ResponseAsBinary)
                .write_response(writer),
            Lldb::qVAttachOrWaitSupported(_) => ResponseOk.write_response(writer),
            Lldb::qLaunchSuccess(_) => self
                .delegate
                .on_query_launch_success(&mut self.state)
                .map(|_| ResponseOk)
                .write_response(writer),
            Lldb::QLaunchArch(arch) => self
                .delegate
                .on_set_architecture(&mut self.state, &arch.arch)
                .map(|_| ResponseOk)
                .write_response(writer),
            Lldb::QSetDisableASLR(aslr) => self
                .delegate
                .on_disable_aslr(&mut self.state, aslr.disable)
                .map(|_| ResponseOk)
                .write_response(writer),
            Lldb::QSetSTD(std) => self
                .delegate
                .on_set_std_file(&mut self.state, std.fd, &std.path)
                .map(|_| ResponseOk)
                .write_response(writer),
            Lldb::A(args) => self
                .delegate
                .on_set_program_arguments(&mut self.state, &args.args)
                .map(|_| ResponseOk)
                .write_response(writer),
        }
        Reply::Send
    }

    fn handle_platform(&mut self, cmd: Platform, writer: &mut ResponseWriter) -> Reply {
        match cmd {
            Platform::qPlatform_shell(shell) => self
                .delegate
                .on_execute_program(
                    &mut self.state,
                    &shell.command,
                    shell.timeout,
                    shell.cwd.as_deref(),
                )
                .write_response(writer),
            Platform::qPlatform_mkdir(mkdir) => write_host_io(
                writer,
                self.delegate
                    .on_file_create_directory(&mut self.state, &mkdir.path, mkdir.mode),
                |w, _| w.put_str("F0"),
            ),
            Platform::qLaunchGDBServer(launch) => self
                .delegate
                .on_launch_debug_server(&mut self.state, launch.host.as_deref(), launch.port)
                .write_response(writer),
            Platform::qfProcessInfo(query) => {
                match self
                    .delegate
                    .on_query_process_list(&mut self.state, &query.query)
                {
                    Ok(processes) => {
                        self.process_list = Some(processes.into_iter());
                        self.write_next_process(writer);
                    }
                    Err(err) => writer.put_error(err),
                }
            }
            Platform::qsProcessInfo(_) => self.write_next_process(writer),
            Platform::qProcessInfoPID(query) => {
                match self
                    .delegate
                    .on_query_process_info_pid(&mut self.state, query.pid)
                {
                    Ok(info) => ProcessListEntry(&info).write_response(writer),
                    Err(err) => writer.put_error(err),
                }
            }
            Platform::qUserName(user) => self
                .delegate
                .on_query_user_name(&mut self.state, user.id)
                .map(ResponseAsHex)
                .write_response(writer),
            Platform::qGroupName(group) => self
                .delegate
                .on_query_group_name(&mut self.state, group.id)
                .map(ResponseAsHex)
                .write_response(writer),
            Platform::qGetWorkingDir(_) => {
                match self.delegate.on_query_working_directory(&mut self.state) {
                    Ok(dir) => writer.put_hex_encoded(dir.as_os_str().as_bytes()),
                    Err(err) => writer.put_error(err),
                }
            }
        }
        Reply::Send
    }
}

/// Host I/O replies: `F<result>[...]` on success, `F-1,<errno>` on failure.
fn write_host_io<T>(
    writer: &mut ResponseWriter,
    result: Result<T, ErrorCode>,
    ok: impl FnOnce(&mut ResponseWriter, T),
) {
    match result {
        Ok(value) => ok(writer, value),
        Err(ErrorCode::Unsupported) => {}
        Err(err) => {
            writer.put_str("F-1,");
            writer.put_num(err.code());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Answers a handful of commands; everything else is unsupported.
    #[derive(Default)]
    struct Echo {
        interrupts: usize,
        threads: Vec<(Pid, Pid)>,
        baud: Option<u32>,
    }

    impl SessionDelegate for Echo {
        fn on_interrupt(&mut self, _state: &mut SessionState) -> Result<(), ErrorCode> {
            self.interrupts += 1;
            Ok(())
        }

        fn on_set_baud_rate(&mut self, _state: &mut SessionState, baud: u32) -> Result<(), ErrorCode> {
            self.baud = Some(baud);
            Ok(())
        }

        fn on_query_thread_list(
            &mut self,
            _state: &mut SessionState,
        ) -> Result<Vec<(Pid, Pid)>, ErrorCode> {
            Ok(self.threads.clone())
        }

        fn on_read_memory(
            &mut self,
            _state: &mut SessionState,
            _addr: Address,
            _len: usize,
        ) -> Result<Vec<u8>, ErrorCode> {
            Err(ErrorCode::AccessDenied)
        }
    }

    fn frame(body: &str) -> Vec<u8> {
        let sum = body.bytes().fold(0u8, |a, b| a.wrapping_add(b));
        format!("${}#{:02x}", body, sum).into_bytes()
    }

    fn send(session: &mut Session<Echo>, body: &str) -> Vec<Bytes> {
        session.receive(&frame(body))
    }

    #[test]
    fn acks_until_no_ack_mode() {
        let mut session = Session::new(Echo::default());
        assert_eq!(send(&mut session, "b2580"), vec![Bytes::from("+$OK#9a")]);
        assert_eq!(session.delegate().baud, Some(0x2580));
        assert_eq!(session.state().mode(), CompatMode::Gdb);

        // The reply to QStartNoAckMode is still acknowledged.
        assert_eq!(
            send(&mut session, "QStartNoAckMode"),
            vec![Bytes::from("+$OK#9a")]
        );
        assert_eq!(send(&mut session, "b1"), vec![Bytes::from("$OK#9a")]);
    }

    #[test]
    fn first_command_picks_the_dialect() {
        let mut session = Session::new(Echo::default());
        send(&mut session, "QStartNoAckMode");
        assert_eq!(session.state().mode(), CompatMode::Lldb);

        let mut session = Session::new(Echo::default());
        send(&mut session, "qSupported:multiprocess+");
        assert_eq!(session.state().mode(), CompatMode::Gdb);
        // LLDB-only commands are unknown to gdb clients.
        assert_eq!(send(&mut session, "QThreadSuffixSupported"), vec![Bytes::from("+$#00")]);
        assert!(!session.state().thread_suffix);
    }

    #[test]
    fn bad_packets_are_nacked_without_dispatch() {
        let mut session = Session::new(Echo::default());
        assert_eq!(session.receive(b"$b10#00"), vec![Bytes::from("-")]);
        assert_eq!(session.delegate().baud, None);
        assert!(session.state().mode.is_none());

        // Intact packets with bad arguments are answered.
        assert_eq!(send(&mut session, "bzz"), vec![Bytes::from("+$E16#ac")]);
    }

    #[test]
    fn nak_resends_last_reply() {
        let mut session = Session::new(Echo::default());
        send(&mut session, "m1000,4");
        assert_eq!(session.receive(b"-"), vec![Bytes::from("$E0d#d9")]);
    }

    #[test]
    fn empty_memory_read_is_answered() {
        let mut session = Session::new(Echo::default());
        assert_eq!(send(&mut session, "m1000,0"), vec![Bytes::from("+$OK#9a")]);
    }

    #[test]
    fn unknown_commands_get_the_empty_reply() {
        let mut session = Session::new(Echo::default());
        assert_eq!(send(&mut session, "qNotACommand"), vec![Bytes::from("+$#00")]);
        assert_eq!(send(&mut session, "b1"), vec![Bytes::from("+$OK#9a")]);
    }

    #[test]
    fn interrupts_reach_the_delegate() {
        let mut session = Session::new(Echo::default());
        assert!(session.receive(b"\x03").is_empty());
        assert_eq!(session.delegate().interrupts, 1);
    }

    #[test]
    fn thread_list_is_paged() {
        let threads = (1..=THREADS_PER_PACKET as i32 + 1)
            .map(|t| (Pid::from_raw(1), Pid::from_raw(t)))
            .collect();
        let mut session = Session::new(Echo {
            threads,
            ..Default::default()
        });
        session.receive(b"+");
        let first = send(&mut session, "qfThreadInfo");
        assert!(first[0].starts_with(b"+$m1,2,3,"));
        let second = send(&mut session, "qsThreadInfo");
        assert!(second[0].starts_with(b"+$m81#"));
        let last = send(&mut session, "qsThreadInfo");
        assert!(last[0].starts_with(b"+$l#"));
    }

    #[test]
    fn supported_features_are_recorded() {
        let mut session = Session::new(Echo::default());
        let reply = send(&mut session, "qSupported:multiprocess+;swbreak+;xmlRegisters=i386");
        assert!(reply[0].starts_with(b"+$PacketSize=20000;QStartNoAckMode+;"));
        assert!(session.state().multiprocess());
        assert!(session.state().remote_supports("swbreak"));
        assert!(!session.state().remote_supports("xmlRegisters"));
    }
}
