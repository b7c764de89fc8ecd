/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The callback surface a run mode implements, and the per-connection
//! protocol state handed to every callback.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rstub_target::Address;
use rstub_target::ErrorCode;
use rstub_target::Interrupt;
use rstub_target::MemoryRegionInfo;
use rstub_target::Pid;
use rstub_target::ProcessInfo;
use rstub_target::Protection;

use crate::commands::AttachTarget;
use crate::commands::Breakpoint;
use crate::commands::Feature;
use crate::commands::OpenFlags;
use crate::commands::ProcessQuery;
use crate::commands::QSetLogging;
use crate::commands::ThreadId;
use crate::commands::ThreadResumeAction;
use crate::response::ResponseWriter;
use crate::stop_reply::StopCode;
use crate::types::CompatMode;
use crate::types::FileStat;
use crate::types::HostInfo;
use crate::types::LaunchedServer;
use crate::types::ModuleInfo;
use crate::types::ProgramResult;
use crate::types::RegisterInfo;
use crate::types::SectionOffsets;
use crate::types::ServerVersion;
use crate::types::XferChunk;

/// Default `PacketSize` advertised in `qSupported`.
pub const DEFAULT_PACKET_SIZE: usize = 0x20000;

/// Protocol parameters negotiated on one connection.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// `None` until the first command decides the dialect.
    pub mode: Option<CompatMode>,
    pub no_ack: bool,
    pub max_packet_size: usize,
    pub max_payload_size: usize,
    /// Features the client sent in `qSupported`.
    pub remote_features: Vec<Feature>,
    pub thread_suffix: bool,
    pub list_threads_in_stop_reply: bool,
    pub error_strings: bool,
    pub extended: bool,
    pub non_stop: bool,
    pub thread_events: bool,
    /// Thread selected by `Hg`, for register and memory packets.
    pub general_thread: Option<ThreadId>,
    /// Thread selected by `Hc`.
    pub continue_thread: Option<ThreadId>,
}

impl SessionState {
    pub fn new(mode: Option<CompatMode>) -> Self {
        SessionState {
            mode,
            no_ack: false,
            max_packet_size: DEFAULT_PACKET_SIZE,
            max_payload_size: DEFAULT_PACKET_SIZE,
            remote_features: Vec::new(),
            thread_suffix: false,
            list_threads_in_stop_reply: false,
            error_strings: false,
            extended: false,
            non_stop: false,
            thread_events: false,
            general_thread: None,
            continue_thread: None,
        }
    }

    /// The dialect in effect. GDB until decided otherwise.
    pub fn mode(&self) -> CompatMode {
        self.mode.unwrap_or(CompatMode::Gdb)
    }

    pub fn remote_supports(&self, name: &str) -> bool {
        self.remote_features
            .iter()
            .any(|f| matches!(f, Feature::Supported(n) if n == name))
    }

    /// GDB's multiprocess extension: thread ids carry the pid.
    pub fn multiprocess(&self) -> bool {
        self.mode() == CompatMode::Gdb && self.remote_supports("multiprocess")
    }

    /// Writes a thread id the way the client expects it.
    pub fn write_thread_id(&self, f: &mut ResponseWriter, pid: Pid, tid: Pid) {
        if self.multiprocess() {
            f.put_str("p");
            f.put_num(pid.as_raw() as u32);
            f.put_str(".");
        }
        f.put_num(tid.as_raw() as u32);
    }
}

/// Handlers for every delegated command. One implementation per run mode;
/// whatever a mode cannot do keeps the default `Unsupported` body, which the
/// engine turns into the empty reply.
///
/// Threads come in already resolved: an explicit `;thread:` suffix wins,
/// otherwise the thread selected with `Hg` is passed, and `None` means the
/// delegate's current thread.
#[allow(unused_variables)]
pub trait SessionDelegate: Send {
    /// Handle that stops the target while a resume blocks. Asked for right
    /// before each resume command.
    fn interrupter(&self) -> Option<Arc<dyn Interrupt>> {
        None
    }

    // Session control.

    fn on_enable_extended_mode(&mut self, state: &mut SessionState) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_set_baud_rate(&mut self, state: &mut SessionState, baud: u32) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_toggle_debug_flag(&mut self, state: &mut SessionState) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_set_max_packet_size(
        &mut self,
        state: &mut SessionState,
        size: usize,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_set_max_payload_size(
        &mut self,
        state: &mut SessionState,
        size: usize,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_set_logging(
        &mut self,
        state: &mut SessionState,
        settings: &QSetLogging,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_allow_operations(
        &mut self,
        state: &mut SessionState,
        operations: &[(String, bool)],
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Returns the server's features. The client's are already in `state`.
    fn on_query_supported(&mut self, state: &mut SessionState) -> Result<Vec<Feature>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// `monitor` commands. Returns the command output.
    fn on_execute_command(
        &mut self,
        state: &mut SessionState,
        command: &str,
    ) -> Result<String, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_server_version(
        &mut self,
        state: &mut SessionState,
    ) -> Result<ServerVersion, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_host_info(&mut self, state: &mut SessionState) -> Result<HostInfo, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_enable_control_agent(
        &mut self,
        state: &mut SessionState,
        enable: bool,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_non_stop_mode(&mut self, state: &mut SessionState, enable: bool) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_enable_bts_tracing(
        &mut self,
        state: &mut SessionState,
        mode: &str,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_pass_signals(
        &mut self,
        state: &mut SessionState,
        signals: &[i32],
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_program_signals(
        &mut self,
        state: &mut SessionState,
        signals: &[i32],
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Symbol lookup conversation. Returns the next symbol the stub wants,
    /// or `None` when it is done.
    fn on_query_symbol(
        &mut self,
        state: &mut SessionState,
        name: Option<&str>,
        value: Option<u64>,
    ) -> Result<Option<String>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_register_info(
        &mut self,
        state: &mut SessionState,
        regno: usize,
    ) -> Result<RegisterInfo, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    // Process lifetime.

    fn on_attach(
        &mut self,
        state: &mut SessionState,
        target: &AttachTarget,
    ) -> Result<StopCode, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_run_attach(
        &mut self,
        state: &mut SessionState,
        program: Option<&Path>,
        args: &[String],
    ) -> Result<StopCode, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_detach(&mut self, state: &mut SessionState, pid: Option<Pid>) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Whether the process was attached to rather than launched.
    fn on_query_attached(
        &mut self,
        state: &mut SessionState,
        pid: Option<Pid>,
    ) -> Result<bool, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_process_info(
        &mut self,
        state: &mut SessionState,
    ) -> Result<ProcessInfo, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_restart(&mut self, state: &mut SessionState) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// An interrupt that arrived while the target was not running.
    fn on_interrupt(&mut self, state: &mut SessionState) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// `k`: kills the process, reporting how it ended.
    fn on_terminate_thread(&mut self, state: &mut SessionState) -> Result<StopCode, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_terminate(&mut self, state: &mut SessionState, pid: Pid) -> Result<StopCode, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_reset(&mut self, state: &mut SessionState) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    // Threads and stops.

    fn on_query_thread_stop_info(
        &mut self,
        state: &mut SessionState,
        tid: Option<Pid>,
    ) -> Result<StopCode, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_threads_info(
        &mut self,
        state: &mut SessionState,
    ) -> Result<Vec<StopCode>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_synchronize_thread_state(
        &mut self,
        state: &mut SessionState,
        tid: Pid,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Every thread as `(pid, tid)`. The engine pages the list over
    /// `qfThreadInfo` / `qsThreadInfo`.
    fn on_query_thread_list(
        &mut self,
        state: &mut SessionState,
    ) -> Result<Vec<(Pid, Pid)>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_current_thread(
        &mut self,
        state: &mut SessionState,
    ) -> Result<(Pid, Pid), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_thread_is_alive(&mut self, state: &mut SessionState, tid: Pid) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Free-form description shown by `info threads`.
    fn on_query_thread_info(
        &mut self,
        state: &mut SessionState,
        tid: Pid,
    ) -> Result<String, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_tls_address(
        &mut self,
        state: &mut SessionState,
        tid: Pid,
        offset: u64,
        link_map: u64,
    ) -> Result<Address, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_tib_address(
        &mut self,
        state: &mut SessionState,
        tid: Pid,
    ) -> Result<Address, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_hardware_watchpoint_count(
        &mut self,
        state: &mut SessionState,
    ) -> Result<usize, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_section_offsets(
        &mut self,
        state: &mut SessionState,
    ) -> Result<SectionOffsets, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_shared_libraries_info_address(
        &mut self,
        state: &mut SessionState,
    ) -> Result<Address, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_shared_library_info(
        &mut self,
        state: &mut SessionState,
        path: &Path,
        triple: &str,
    ) -> Result<ModuleInfo, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_enable_asynchronous_profiling(
        &mut self,
        state: &mut SessionState,
        enable: bool,
        interval_usecs: u64,
        scan_type: u32,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_profile_data(
        &mut self,
        state: &mut SessionState,
        scan_type: Option<u32>,
    ) -> Result<String, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Runs the target until it stops again. Blocks for as long as the target
    /// runs; [`SessionDelegate::interrupter`] is how it gets cut short.
    fn on_resume(
        &mut self,
        state: &mut SessionState,
        actions: &[ThreadResumeAction],
    ) -> Result<StopCode, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    // Registers.

    fn on_read_general_registers(
        &mut self,
        state: &mut SessionState,
        tid: Option<Pid>,
    ) -> Result<Vec<u8>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_write_general_registers(
        &mut self,
        state: &mut SessionState,
        tid: Option<Pid>,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Snapshots the registers of a thread, returning the snapshot id.
    fn on_save_registers(
        &mut self,
        state: &mut SessionState,
        tid: Option<Pid>,
    ) -> Result<u64, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_restore_registers(
        &mut self,
        state: &mut SessionState,
        tid: Option<Pid>,
        id: u64,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_read_register_value(
        &mut self,
        state: &mut SessionState,
        tid: Option<Pid>,
        regno: usize,
    ) -> Result<Vec<u8>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_write_register_value(
        &mut self,
        state: &mut SessionState,
        tid: Option<Pid>,
        regno: usize,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    // Memory.

    fn on_read_memory(
        &mut self,
        state: &mut SessionState,
        addr: Address,
        len: usize,
    ) -> Result<Vec<u8>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_write_memory(
        &mut self,
        state: &mut SessionState,
        addr: Address,
        data: &[u8],
    ) -> Result<usize, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_allocate_memory(
        &mut self,
        state: &mut SessionState,
        size: usize,
        protection: Protection,
    ) -> Result<Address, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_deallocate_memory(
        &mut self,
        state: &mut SessionState,
        addr: Address,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_memory_region_info(
        &mut self,
        state: &mut SessionState,
        addr: Address,
    ) -> Result<MemoryRegionInfo, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_compute_crc(
        &mut self,
        state: &mut SessionState,
        addr: Address,
        len: usize,
    ) -> Result<u32, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// First match of `pattern` in `len` bytes from `addr`.
    fn on_search(
        &mut self,
        state: &mut SessionState,
        addr: Address,
        len: usize,
        pattern: &[u8],
    ) -> Result<Option<Address>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// Searches backwards from `addr` for a 4-byte word matching `pattern`
    /// under `mask`.
    fn on_search_backward(
        &mut self,
        state: &mut SessionState,
        addr: Address,
        pattern: u32,
        mask: u32,
    ) -> Result<Address, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_insert_breakpoint(
        &mut self,
        state: &mut SessionState,
        bkpt: &Breakpoint,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_remove_breakpoint(
        &mut self,
        state: &mut SessionState,
        bkpt: &Breakpoint,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_xfer_read(
        &mut self,
        state: &mut SessionState,
        object: &str,
        annex: &str,
        offset: u64,
        len: usize,
    ) -> Result<XferChunk, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_xfer_write(
        &mut self,
        state: &mut SessionState,
        object: &str,
        annex: &str,
        offset: u64,
        data: &[u8],
    ) -> Result<usize, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    // Launch setup.

    fn on_disable_aslr(&mut self, state: &mut SessionState, disable: bool) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_set_environment_variable(
        &mut self,
        state: &mut SessionState,
        key: &str,
        value: &str,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_set_working_directory(
        &mut self,
        state: &mut SessionState,
        dir: &Path,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_set_std_file(
        &mut self,
        state: &mut SessionState,
        fd: i32,
        path: &Path,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_set_architecture(&mut self, state: &mut SessionState, arch: &str) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// `A`: program path followed by its arguments. Launches the program.
    fn on_set_program_arguments(
        &mut self,
        state: &mut SessionState,
        args: &[String],
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_launch_success(&mut self, state: &mut SessionState) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    // Host.

    fn on_execute_program(
        &mut self,
        state: &mut SessionState,
        command: &str,
        timeout: Option<Duration>,
        cwd: Option<&Path>,
    ) -> Result<ProgramResult, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_create_directory(
        &mut self,
        state: &mut SessionState,
        path: &Path,
        mode: u32,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    /// `vFile:setfs`: later paths resolve in the filesystem of `pid`, or in
    /// the server's with `None`.
    fn on_file_set_system(
        &mut self,
        state: &mut SessionState,
        pid: Option<i32>,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_open(
        &mut self,
        state: &mut SessionState,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<i32, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_close(&mut self, state: &mut SessionState, fd: i32) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_read(
        &mut self,
        state: &mut SessionState,
        fd: i32,
        count: usize,
        offset: u64,
    ) -> Result<Vec<u8>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_write(
        &mut self,
        state: &mut SessionState,
        fd: i32,
        offset: u64,
        data: &[u8],
    ) -> Result<usize, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_fstat(&mut self, state: &mut SessionState, fd: i32) -> Result<FileStat, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_remove(&mut self, state: &mut SessionState, path: &Path) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_read_link(
        &mut self,
        state: &mut SessionState,
        path: &Path,
    ) -> Result<PathBuf, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_exists(&mut self, state: &mut SessionState, path: &Path) -> Result<bool, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_compute_md5(
        &mut self,
        state: &mut SessionState,
        path: &Path,
    ) -> Result<[u8; 16], ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_file_get_size(&mut self, state: &mut SessionState, path: &Path) -> Result<u64, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    // Platform.

    fn on_query_process_list(
        &mut self,
        state: &mut SessionState,
        query: &ProcessQuery,
    ) -> Result<Vec<ProcessInfo>, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_process_info_pid(
        &mut self,
        state: &mut SessionState,
        pid: Pid,
    ) -> Result<ProcessInfo, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_launch_debug_server(
        &mut self,
        state: &mut SessionState,
        host: Option<&str>,
        port: u16,
    ) -> Result<LaunchedServer, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_user_name(&mut self, state: &mut SessionState, uid: u32) -> Result<String, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_group_name(
        &mut self,
        state: &mut SessionState,
        gid: u32,
    ) -> Result<String, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_query_working_directory(
        &mut self,
        state: &mut SessionState,
    ) -> Result<PathBuf, ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    // Flash.

    fn on_flash_erase(
        &mut self,
        state: &mut SessionState,
        addr: Address,
        len: usize,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_flash_write(
        &mut self,
        state: &mut SessionState,
        addr: Address,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }

    fn on_flash_done(&mut self, state: &mut SessionState) -> Result<(), ErrorCode> {
        Err(ErrorCode::Unsupported)
    }
}
