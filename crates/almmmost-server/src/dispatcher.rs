//! The round-robin poll loop: the one place every other module in this
//! crate gets wired together against a set of [`LinkChannel`]s.
//!
//! Mirrors `almmmost.c`'s `main`: scan every port once, starting one past
//! whichever port was last serviced, and act on the first one with a
//! frame waiting. A short read or an unrecognized `(sor, req)` pair resets
//! that port and moves on rather than wedging the whole loop.

use std::collections::HashMap;

use almmmost_common::wire::{check_kind, req_kind, BootRequest, CheckRequest, DiskRequest, FileRequest, FileResponse, IpcResponse, DATA_SZ, REQ_SZ, SOR0, SOR1};
use almmmost_common::{Attributes, Fcb, FcbRename, MmmErr, RetCode, FCB_SIZE};
use almmmost_core::link::{LinkChannel, LinkError, LinkResult};
use almmmost_core::record::RECORD_SIZE;

use crate::boot::BootImageSource;
use crate::check::handle_check;
use crate::console::{self, Command};
use crate::logon::{handle_logon, PASSWORD_BLOCK_SIZE};
use crate::server::Server;
use crate::spool::break_spool;

/// BDOS function numbers carried in `tvsp_file_request::bdosfunc`.
mod bdos {
    pub const OPEN: u8 = 15;
    pub const CLOSE: u8 = 16;
    pub const SEARCH_FIRST: u8 = 17;
    pub const DELETE: u8 = 19;
    pub const READ_SEQ: u8 = 20;
    pub const WRITE_SEQ: u8 = 21;
    pub const MAKE: u8 = 22;
    pub const RENAME: u8 = 23;
    pub const SET_ATTR: u8 = 30;
    pub const READ_RAND: u8 = 33;
    pub const WRITE_RAND: u8 = 34;
    pub const GET_SIZE: u8 = 35;
    pub const SET_RAND_RECORD: u8 = 36;
    pub const WRITE_RAND_ZERO: u8 = 40;
}

/// Handles a drive/file request's `FCB.drv` field: 0 means "use the
/// port's current default drive", 1-16 select drive A-P directly.
fn effective_disk(fcb_drv: u8, curbdisk: u8) -> u8 {
    if fcb_drv != 0 {
        fcb_drv - 1
    } else {
        curbdisk
    }
}

/// Sequential record position from an FCB's extent/record fields:
/// `(s2 << 12) + (curext << 7) + currec`, i.e. `full_extent() * 128 + currec`.
fn seq_pos(fcb: &Fcb) -> u32 {
    fcb.full_extent() * 128 + fcb.currec as u32
}

/// Advances an FCB's sequential cursor by one record, carrying `currec`
/// into `curext` and `curext` into `s2` at their respective limits.
fn advance_seq(fcb: &mut Fcb) {
    let mut currec = fcb.currec as u32 + 1;
    let mut curext = fcb.curext as u32;
    let mut s2 = fcb.s2 as u32;
    if currec >= 128 {
        currec = 0;
        curext += 1;
        if curext > 31 {
            curext = 0;
            s2 += 1;
        }
    }
    fcb.currec = currec as u8;
    fcb.curext = curext as u8;
    fcb.s2 = s2 as u8;
}

/// Refreshes an FCB's `al`/`reccnt` fields from whichever extent a handle
/// currently has open covering `record`, the way the original leaves `al[]`
/// pointing at the extent a client's next sequential read will need.
fn refresh_al(server: &Server, fcb: &mut Fcb, handle: u16, record: u32) {
    let Some(file) = server.engine.oft.get(handle) else { return };
    let Ok(params) = server.engine.images.params(file.disk) else { return };
    let extent_records = params.extent_records();
    let physical_extent = record / extent_records;
    if let Some((_, entry)) = file.extents.iter().find(|(_, e)| e.physical_extent(params.exm) == physical_extent) {
        fcb.al = entry.blknums;
        fcb.reccnt = entry.reccnt;
    }
}

fn ok_response(handle: u16) -> FileResponse {
    let mut response = FileResponse {
        fileno: [0, 0],
        retcode: RetCode::Ok as u8,
        err: MmmErr::Ok as u8,
    };
    response.set_file_num(handle);
    response
}

fn err_response(handle: u16, retcode: RetCode, err: MmmErr) -> FileResponse {
    let mut response = FileResponse {
        fileno: [0, 0],
        retcode: retcode as u8,
        err: err as u8,
    };
    response.set_file_num(handle);
    response
}

fn fs_err_response(handle: u16, error: &almmmost_fs::FsError) -> FileResponse {
    err_response(handle, error.ret_code(), error.mmm_err())
}

/// Ties every leaf module in this crate (config, file engine, special
/// traps, boot images, console) to a set of link channels and drives the
/// round-robin poll loop.
pub struct Dispatcher {
    pub server: Server,
    pub links: Vec<Box<dyn LinkChannel + Send>>,
    pub boot_source: Box<dyn BootImageSource>,
    console_rx: Option<std::sync::mpsc::Receiver<String>>,
    last_port: Option<usize>,
    /// Open special-file handles, in a handle space disjoint from
    /// `FileEngine::open`'s (which starts at 1 and counts up): special
    /// files never touch the directory engine, so they get their own
    /// table here rather than a synthetic `OpenFile` entry.
    special_handles: HashMap<u16, String>,
    next_special_handle: u16,
}

impl Dispatcher {
    pub fn new(server: Server, links: Vec<Box<dyn LinkChannel + Send>>) -> Self {
        Self {
            server,
            links,
            boot_source: Box::new(crate::boot::DefaultBootSource),
            console_rx: None,
            last_port: None,
            special_handles: HashMap::new(),
            next_special_handle: 0x8000,
        }
    }

    pub fn with_console(mut self, rx: std::sync::mpsc::Receiver<String>) -> Self {
        self.console_rx = Some(rx);
        self
    }

    fn alloc_special_handle(&mut self) -> u16 {
        let handle = self.next_special_handle;
        self.next_special_handle = self.next_special_handle.wrapping_add(1);
        if self.next_special_handle == 0 {
            self.next_special_handle = 0x8000;
        }
        handle
    }

    fn drain_console(&mut self) {
        let Some(rx) = &self.console_rx else { return };
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        for line in lines {
            match console::parse_command(&line) {
                Ok(cmd) => {
                    let exit = cmd == Command::Exit;
                    let message = console::apply_command(&mut self.server, cmd);
                    tracing::info!(message = %message, "console command applied");
                    if exit {
                        tracing::info!("console requested shutdown");
                    }
                }
                Err(diagnostic) => tracing::warn!(diagnostic = %diagnostic, "console command rejected"),
            }
        }
    }

    /// Runs one round-robin scan, servicing at most one ready port.
    /// Returns `true` if a request was serviced.
    pub fn poll_once(&mut self) -> bool {
        self.drain_console();
        if self.server.take_abort() {
            tracing::warn!("abort flag observed; link writes will be skipped until cleared");
        }
        if self.server.take_locate() {
            tracing::info!("locate: servicing {} port(s)", self.links.len());
        }

        let n = self.links.len();
        if n == 0 {
            return false;
        }
        let start = self.last_port.map(|p| (p + 1) % n).unwrap_or(0);
        for i in 0..n {
            let port = (start + i) % n;
            let ready = match self.links[port].check_ready() {
                Ok(ready) => ready,
                Err(error) => {
                    tracing::warn!(port, %error, "link error during check_ready");
                    continue;
                }
            };
            if ready {
                self.last_port = Some(port);
                self.service_port(port as u8);
                return true;
            }
        }
        false
    }

    /// Runs the poll loop until the process is killed; idles briefly
    /// between empty scans rather than spinning the CPU.
    pub fn run(&mut self) -> ! {
        loop {
            if !self.poll_once() {
                std::thread::sleep(std::time::Duration::from_micros(45));
            }
        }
    }

    fn service_port(&mut self, port: u8) {
        let header = match self.read_header(port) {
            Ok(header) => header,
            Err(error) => {
                tracing::warn!(port, %error, "short or malformed request header");
                let _ = self.links[port as usize].reset();
                return;
            }
        };

        let sor = header[0];
        let op = header[1];

        let result = match (sor, op) {
            (SOR1, req_kind::BOOT) => self.handle_boot(port, &header),
            (SOR1, req_kind::BREAK_SPOOL) => self.handle_break_spool(port),
            (SOR1, req_kind::CHECK) => self.handle_check_req(port, &header),
            (SOR1, req_kind::READ_SECTOR) => self.handle_disk_read(port, &header),
            (SOR1, req_kind::WRITE_SECTOR) => self.handle_disk_write(port, &header),
            (SOR1, req_kind::FILEOP) => self.handle_file_op(port, &header),
            (SOR0, b'C') | (SOR0, b'L') => self.handle_logon_req(port),
            _ => {
                tracing::warn!(port, sor, op, "unrecognized request");
                Err(LinkError::Device(format!("unrecognized request (sor={sor}, op={op})")))
            }
        };

        if let Err(error) = result {
            tracing::warn!(port, %error, "request failed; resetting port");
            let _ = self.links[port as usize].reset();
        }
    }

    fn read_header(&mut self, port: u8) -> LinkResult<[u8; REQ_SZ]> {
        let bytes = self.links[port as usize].recv_frame(REQ_SZ)?;
        bytes.try_into().map_err(|got: Vec<u8>| LinkError::ShortFrame { expected: REQ_SZ, got: got.len() })
    }

    fn send_delay() {
        std::thread::sleep(std::time::Duration::from_micros(100));
    }

    fn handle_boot(&mut self, port: u8, header: &[u8; REQ_SZ]) -> LinkResult<()> {
        let req = BootRequest::from_bytes(header);
        let payload = if req.wants_bootloader() {
            self.boot_source.bootloader(req.usr).map(|b| b.to_vec())
        } else {
            self.boot_source.os_image(req.usr, req.recnum, req.sects)
        };
        match payload {
            Some(bytes) => {
                Self::send_delay();
                self.links[port as usize].send_frame(&bytes)
            }
            None => {
                tracing::warn!(port, ostype = req.usr, "no boot image configured for this client type");
                Ok(())
            }
        }
    }

    fn handle_break_spool(&mut self, port: u8) -> LinkResult<()> {
        let response = break_spool();
        Self::send_delay();
        self.links[port as usize].send_frame(&response.to_bytes())
    }

    fn handle_check_req(&mut self, port: u8, header: &[u8; REQ_SZ]) -> LinkResult<()> {
        let req = CheckRequest::from_bytes(header);
        let response = handle_check(&req, &self.server, port);
        Self::send_delay();
        self.links[port as usize].send_frame(&response.to_bytes())
    }

    fn handle_logon_req(&mut self, port: u8) -> LinkResult<()> {
        let bytes = self.links[port as usize].recv_frame(PASSWORD_BLOCK_SIZE)?;
        let block: [u8; PASSWORD_BLOCK_SIZE] = bytes
            .try_into()
            .map_err(|got: Vec<u8>| LinkError::ShortFrame { expected: PASSWORD_BLOCK_SIZE, got: got.len() })?;
        let response = handle_logon(&block);
        Self::send_delay();
        self.links[port as usize].send_frame(&response.to_bytes())
    }

    fn handle_disk_read(&mut self, port: u8, header: &[u8; REQ_SZ]) -> LinkResult<()> {
        let req = DiskRequest::from_bytes(header);
        let rec = req.track() as u32 * self.sectors_per_track(req.ndisk) + req.sector() as u32;
        let mut response = IpcResponse { retcode: 0, x: 0, errcode: 0, err: 0 };
        let data = match self.server.engine.images.read_record(req.ndisk, 0, rec) {
            Ok(bytes) => Some(bytes),
            Err(_) => {
                response.err = 1;
                response.errcode = MmmErr::Select as u8;
                None
            }
        };
        Self::send_delay();
        self.links[port as usize].send_frame(&response.to_bytes())?;
        if let Some(data) = data {
            Self::send_delay();
            self.links[port as usize].send_frame(&data)?;
        }
        Ok(())
    }

    fn handle_disk_write(&mut self, port: u8, header: &[u8; REQ_SZ]) -> LinkResult<()> {
        let req = DiskRequest::from_bytes(header);
        let bytes = self.links[port as usize].recv_frame(DATA_SZ)?;
        let data: [u8; DATA_SZ] = bytes
            .try_into()
            .map_err(|got: Vec<u8>| LinkError::ShortFrame { expected: DATA_SZ, got: got.len() })?;

        let mut response = IpcResponse { retcode: 0, x: 0, errcode: 0, err: 0 };
        let rec = req.track() as u32 * self.sectors_per_track(req.ndisk) + req.sector() as u32;
        if self.server.engine.images.write_record(req.ndisk, 0, rec, &data).is_err() {
            response.err = 1;
            response.errcode = MmmErr::Select as u8;
        }
        Self::send_delay();
        self.links[port as usize].send_frame(&response.to_bytes())
    }

    fn sectors_per_track(&self, disk: u8) -> u32 {
        self.server.engine.images.params(disk).map(|p| p.spt as u32).unwrap_or(1).max(1)
    }

    fn handle_file_op(&mut self, port: u8, header: &[u8; REQ_SZ]) -> LinkResult<()> {
        let req = FileRequest::from_bytes(header);

        let fcb_bytes = self.links[port as usize].recv_frame(FCB_SIZE)?;
        let fcb_bytes: [u8; FCB_SIZE] = fcb_bytes
            .try_into()
            .map_err(|got: Vec<u8>| LinkError::ShortFrame { expected: FCB_SIZE, got: got.len() })?;

        let is_write = matches!(req.bdosfunc, bdos::WRITE_SEQ | bdos::WRITE_RAND | bdos::WRITE_RAND_ZERO);
        let data = if is_write {
            let bytes = self.links[port as usize].recv_frame(DATA_SZ)?;
            let arr: [u8; DATA_SZ] = bytes
                .try_into()
                .map_err(|got: Vec<u8>| LinkError::ShortFrame { expected: DATA_SZ, got: got.len() })?;
            Some(arr)
        } else {
            None
        };

        // Rename reinterprets the 36 FCB bytes as a source/destination pair
        // rather than a single name; handle it before general FCB decoding.
        if req.bdosfunc == bdos::RENAME {
            let response = self.execute_rename(port, &req, &fcb_bytes);
            Self::send_delay();
            self.links[port as usize].send_frame(&response.to_bytes())?;
            Self::send_delay();
            return self.links[port as usize].send_frame(&fcb_bytes);
        }

        let mut fcb = Fcb::from_bytes(&fcb_bytes);
        let (response, read_data) = self.execute_file_op(port, &req, &mut fcb, data.as_ref());

        Self::send_delay();
        self.links[port as usize].send_frame(&response.to_bytes())?;
        Self::send_delay();
        self.links[port as usize].send_frame(&fcb.to_bytes())?;

        let is_read = matches!(req.bdosfunc, bdos::READ_SEQ | bdos::READ_RAND);
        if is_read && response.retcode == RetCode::Ok as u8 && response.err == MmmErr::Ok as u8 {
            if let Some(data) = read_data {
                Self::send_delay();
                self.links[port as usize].send_frame(&data)?;
            }
        }
        Ok(())
    }

    fn execute_rename(&mut self, port: u8, req: &FileRequest, fcb_bytes: &[u8; FCB_SIZE]) -> FileResponse {
        let rename = FcbRename::from_bytes(fcb_bytes);
        let disk = effective_disk(rename.drv, self.server.ports[port as usize].curbdisk);
        let slot = self.resolve_slot(disk, port);
        let user = req.usrcode;
        let src_ext = Attributes::plain_ext(&rename.sfext);
        let dst_ext = Attributes::plain_ext(&rename.dfext);
        match self.server.engine.rename(disk, slot, user, &rename.sfname, &src_ext, &rename.dfname, &dst_ext) {
            Ok(()) => ok_response(0),
            Err(error) => fs_err_response(0, &error),
        }
    }

    fn resolve_slot(&self, disk: u8, port: u8) -> u8 {
        self.server.ports.get(port as usize).map(|p| p.slot_for(disk)).unwrap_or(0)
    }

    fn execute_file_op(
        &mut self,
        port: u8,
        req: &FileRequest,
        fcb: &mut Fcb,
        data: Option<&[u8; DATA_SZ]>,
    ) -> (FileResponse, Option<[u8; RECORD_SIZE]>) {
        let disk = effective_disk(fcb.drv, self.server.ports[port as usize].curbdisk);
        let slot = self.resolve_slot(disk, port);
        let user = req.usrcode;
        let hint = req.file_num();
        let fext = fcb.plain_ext();

        if self.server.special.lookup(&fcb.fname, &fext) {
            return self.execute_special_op(req.bdosfunc, hint, fcb, data);
        }

        match req.bdosfunc {
            bdos::OPEN | bdos::MAKE => {
                let make = req.bdosfunc == bdos::MAKE;
                match self.server.engine.open(port, disk, slot, user, &fcb.fname, &fext, make) {
                    Ok(handle) => {
                        refresh_al(&self.server, fcb, handle, 0);
                        (ok_response(handle), None)
                    }
                    Err(error) => (fs_err_response(hint, &error), None),
                }
            }
            bdos::CLOSE => match self.resolve_handle(port, hint, disk, user, fcb) {
                Some(handle) => {
                    let _ = self.server.engine.close(handle);
                    (ok_response(0xFFFF), None)
                }
                None => (err_response(0xFFFF, RetCode::Misc, MmmErr::BadFile), None),
            },
            bdos::READ_SEQ | bdos::READ_RAND => {
                let Some(handle) = self.resolve_handle(port, hint, disk, user, fcb) else {
                    return (err_response(hint, RetCode::Misc, MmmErr::BadFile), None);
                };
                let pos = if req.bdosfunc == bdos::READ_SEQ { seq_pos(fcb) } else { fcb.rand_record() };
                match self.server.engine.read_rand(handle, pos) {
                    Ok(record) => {
                        if req.bdosfunc == bdos::READ_SEQ {
                            advance_seq(fcb);
                        }
                        refresh_al(&self.server, fcb, handle, pos);
                        (ok_response(handle), Some(record))
                    }
                    Err(error) => {
                        refresh_al(&self.server, fcb, handle, pos);
                        (fs_err_response(handle, &error), None)
                    }
                }
            }
            bdos::WRITE_SEQ | bdos::WRITE_RAND | bdos::WRITE_RAND_ZERO => {
                let Some(handle) = self.resolve_handle(port, hint, disk, user, fcb) else {
                    return (err_response(hint, RetCode::Misc, MmmErr::BadFile), None);
                };
                let Some(data) = data else {
                    return (err_response(handle, RetCode::Misc, MmmErr::IllegalCall), None);
                };
                let pos = if req.bdosfunc == bdos::WRITE_SEQ { seq_pos(fcb) } else { fcb.rand_record() };
                let result = if req.bdosfunc == bdos::WRITE_RAND_ZERO {
                    self.server.engine.write_rand_zero(handle, pos, data)
                } else {
                    self.server.engine.write_rand(handle, pos, data)
                };
                match result {
                    Ok(()) => {
                        if req.bdosfunc == bdos::WRITE_SEQ {
                            advance_seq(fcb);
                        }
                        refresh_al(&self.server, fcb, handle, pos);
                        (ok_response(handle), None)
                    }
                    Err(error) => (fs_err_response(handle, &error), None),
                }
            }
            bdos::SEARCH_FIRST => {
                let user_filter = if fcb.drv == b'?' { None } else { Some(user) };
                match self.server.engine.search_first(disk, slot, user_filter, &fcb.fname, &fext) {
                    Ok(Some(entry)) => {
                        fcb.al = entry.blknums;
                        fcb.reccnt = entry.reccnt;
                        (ok_response(0), None)
                    }
                    Ok(None) => (err_response(0, RetCode::Misc, MmmErr::BadFile), None),
                    Err(error) => (fs_err_response(0, &error), None),
                }
            }
            bdos::DELETE => match self.server.engine.delete(disk, slot, user, &fcb.fname, &fext) {
                Ok(0) => (err_response(0, RetCode::Misc, MmmErr::BadFile), None),
                Ok(_) => (ok_response(0), None),
                Err(error) => (fs_err_response(0, &error), None),
            },
            bdos::SET_ATTR => {
                let attrs = fcb.attributes();
                match self.server.engine.set_attr(disk, slot, user, &fcb.fname, &fext, attrs) {
                    Ok(()) => (ok_response(0), None),
                    Err(error) => (fs_err_response(0, &error), None),
                }
            }
            bdos::GET_SIZE => {
                let Some(handle) = self.resolve_handle(port, hint, disk, user, fcb) else {
                    return (err_response(hint, RetCode::Misc, MmmErr::BadFile), None);
                };
                match self.server.engine.get_size(handle) {
                    Ok(size) => {
                        fcb.set_rand_record(size);
                        refresh_al(&self.server, fcb, handle, size.saturating_sub(1));
                        (ok_response(handle), None)
                    }
                    Err(error) => (fs_err_response(handle, &error), None),
                }
            }
            bdos::SET_RAND_RECORD => {
                let Some(handle) = self.resolve_handle(port, hint, disk, user, fcb) else {
                    return (err_response(hint, RetCode::Misc, MmmErr::BadFile), None);
                };
                match self.server.engine.set_rand_record(handle, fcb.curext, fcb.s2, fcb.currec) {
                    Ok(pos) => {
                        fcb.set_rand_record(pos);
                        (ok_response(handle), None)
                    }
                    Err(error) => (fs_err_response(handle, &error), None),
                }
            }
            _ => (err_response(hint, RetCode::Misc, MmmErr::IllegalCall), None),
        }
    }

    /// Resolves a file-op's handle for ops that need an already-open file,
    /// first checking the special-handle table and falling back to the
    /// file engine's open-file table.
    fn resolve_handle(&mut self, port: u8, hint: u16, disk: u8, user: u8, fcb: &Fcb) -> Option<u16> {
        if self.special_handles.contains_key(&hint) {
            return Some(hint);
        }
        let fext = fcb.plain_ext();
        self.server.engine.oft.resolve_handle(port, hint, disk, user, &fcb.fname, &fext)
    }

    /// Handles a file op against the special-trap registry instead of the
    /// directory-backed file engine: `Open`/`Make` hand out a handle from
    /// this dispatcher's own handle space, `Close` forgets it, `Read`/
    /// `Write`/`GetSize` go straight to the trap.
    fn execute_special_op(
        &mut self,
        bdosfunc: u8,
        hint: u16,
        fcb: &mut Fcb,
        data: Option<&[u8; DATA_SZ]>,
    ) -> (FileResponse, Option<[u8; RECORD_SIZE]>) {
        let fext = fcb.plain_ext();
        match bdosfunc {
            bdos::OPEN | bdos::MAKE => {
                let handle = self.alloc_special_handle();
                self.special_handles.insert(handle, crate::special::canonicalize(&fcb.fname, &fext));
                (ok_response(handle), None)
            }
            bdos::CLOSE => {
                self.special_handles.remove(&hint);
                (ok_response(0xFFFF), None)
            }
            bdos::READ_SEQ | bdos::READ_RAND => {
                let Some(name) = self.special_handles.get(&hint) else {
                    return (err_response(hint, RetCode::Misc, MmmErr::BadFile), None);
                };
                let Some(trap) = self.server.special.get_mut(&fcb.fname, &fext) else {
                    return (err_response(hint, RetCode::Misc, MmmErr::BadFile), None);
                };
                let pos = if bdosfunc == bdos::READ_SEQ { seq_pos(fcb) } else { fcb.rand_record() };
                let _ = name;
                match trap.read(pos) {
                    Some(record) => {
                        if bdosfunc == bdos::READ_SEQ {
                            advance_seq(fcb);
                        }
                        (ok_response(hint), Some(record))
                    }
                    None => (err_response(hint, RetCode::Misc, MmmErr::BadFile), None),
                }
            }
            bdos::WRITE_SEQ | bdos::WRITE_RAND | bdos::WRITE_RAND_ZERO => {
                let Some(data) = data else {
                    return (err_response(hint, RetCode::Misc, MmmErr::IllegalCall), None);
                };
                let Some(trap) = self.server.special.get_mut(&fcb.fname, &fext) else {
                    return (err_response(hint, RetCode::Misc, MmmErr::BadFile), None);
                };
                let pos = if bdosfunc == bdos::WRITE_SEQ { seq_pos(fcb) } else { fcb.rand_record() };
                if trap.write(pos, data) {
                    if bdosfunc == bdos::WRITE_SEQ {
                        advance_seq(fcb);
                    }
                    (ok_response(hint), None)
                } else {
                    (err_response(hint, RetCode::Misc, MmmErr::WriteProtect), None)
                }
            }
            bdos::GET_SIZE => {
                let Some(trap) = self.server.special.get_mut(&fcb.fname, &fext) else {
                    return (err_response(hint, RetCode::Misc, MmmErr::BadFile), None);
                };
                fcb.set_rand_record(trap.size_records());
                (ok_response(hint), None)
            }
            _ => (err_response(hint, RetCode::Misc, MmmErr::IllegalCall), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almmmost_common::name::parse_8_3;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedLink {
        ready: bool,
        inbound: Mutex<VecDeque<Vec<u8>>>,
        outbound: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl ScriptedLink {
        fn new(frames: Vec<Vec<u8>>) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let outbound = Arc::new(Mutex::new(Vec::new()));
            let link = Self {
                ready: true,
                inbound: Mutex::new(frames.into()),
                outbound: outbound.clone(),
            };
            (link, outbound)
        }
    }

    impl LinkChannel for ScriptedLink {
        fn check_ready(&mut self) -> LinkResult<bool> {
            Ok(self.ready && !self.inbound.lock().unwrap().is_empty())
        }

        fn recv_frame(&mut self, len: usize) -> LinkResult<Vec<u8>> {
            let mut queue = self.inbound.lock().unwrap();
            let frame = queue.pop_front().ok_or(LinkError::ShortFrame { expected: len, got: 0 })?;
            if frame.len() != len {
                return Err(LinkError::ShortFrame { expected: len, got: frame.len() });
            }
            Ok(frame)
        }

        fn send_frame(&mut self, data: &[u8]) -> LinkResult<()> {
            self.outbound.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        fn reset(&mut self) -> LinkResult<()> {
            Ok(())
        }
    }

    fn sample_config(dir: &std::path::Path) -> crate::config::ServerConfig {
        let text = format!(
            "
[General]
Genrev = 1
Spool Drive = 0

[Disks]
Image Dir = {}
Num Disks = 1
Max Priv Dirs = 1

[Disk 0]
Type = PUBLIC
Floppy = Y
SPT = 26
BSF = 3
DBM = 20
DBL = 31
ALx = 2
RES = 0
Image 0 = disk0.img
",
            dir.display()
        );
        crate::config::ServerConfig::parse(&text).unwrap()
    }

    fn dispatcher_with(dir: &std::path::Path, frames: Vec<Vec<u8>>) -> (Dispatcher, Arc<Mutex<Vec<Vec<u8>>>>) {
        std::fs::write(dir.join("disk0.img"), vec![0u8; 64 * 1024]).unwrap();
        let config = sample_config(dir);
        let server = Server::from_config(config, 1).unwrap();
        let (link, outbound) = ScriptedLink::new(frames);
        (Dispatcher::new(server, vec![Box::new(link)]), outbound)
    }

    fn check_request(subreq: u8) -> Vec<u8> {
        CheckRequest {
            sor: SOR1,
            req: req_kind::CHECK,
            drv: 0,
            subreq,
            y: [0; 6],
        }
        .to_bytes()
        .to_vec()
    }

    #[test]
    fn check_request_round_trips_through_the_poll_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut dispatcher, outbound) = dispatcher_with(tmp.path(), vec![check_request(check_kind::GENREV)]);
        assert!(dispatcher.poll_once());

        let sent = outbound.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let response = IpcResponse::from_bytes(&sent[0].clone().try_into().unwrap());
        assert_eq!(response.retcode, 1);
    }

    fn make_request(usr: u8, filenum: u16) -> Vec<u8> {
        let mut req = FileRequest {
            sor: SOR1,
            req: req_kind::FILEOP,
            logdrv: 0,
            bdosfunc: bdos::MAKE,
            usrcode: usr,
            filenum: [0, 0],
            curbdisk: 0,
            curbfunc: 0,
            x: 0,
        };
        req.set_file_num(filenum);
        req.to_bytes().to_vec()
    }

    fn file_request(bdosfunc: u8, usr: u8) -> Vec<u8> {
        FileRequest {
            sor: SOR1,
            req: req_kind::FILEOP,
            logdrv: 0,
            bdosfunc,
            usrcode: usr,
            filenum: [0, 0],
            curbdisk: 0,
            curbfunc: 0,
            x: 0,
        }
        .to_bytes()
        .to_vec()
    }

    fn fcb_bytes(fname: [u8; 8], fext: [u8; 3], rrec: u32) -> Vec<u8> {
        let mut fcb = Fcb {
            drv: 0,
            fname,
            fext,
            curext: 0,
            s1: 0,
            s2: 0,
            reccnt: 0,
            al: [0; 16],
            currec: 0,
            rrec: [0; 3],
        };
        fcb.set_rand_record(rrec);
        fcb.to_bytes().to_vec()
    }

    #[test]
    fn make_write_read_round_trips_through_the_file_engine() {
        let tmp = tempfile::tempdir().unwrap();
        let (fname, fext) = parse_8_3("FOO.TXT");

        let mut data = vec![0u8; 128];
        data[0] = 0x42;

        let frames = vec![
            make_request(0, 0),
            fcb_bytes(fname, fext, 0),
            file_request(bdos::WRITE_RAND, 0),
            fcb_bytes(fname, fext, 0),
            data.clone(),
            file_request(bdos::READ_RAND, 0),
            fcb_bytes(fname, fext, 0),
        ];

        let (mut dispatcher, outbound) = dispatcher_with(tmp.path(), frames);

        assert!(dispatcher.poll_once());
        assert!(dispatcher.poll_once());
        assert!(dispatcher.poll_once());

        let sent = outbound.lock().unwrap();
        // Make: response + fcb echo. Write: response + fcb echo. Read:
        // response + fcb echo + 128-byte payload.
        assert_eq!(sent.len(), 7);

        let read_response = FileResponse::from_bytes(&sent[4].clone().try_into().unwrap());
        assert_eq!(read_response.retcode, RetCode::Ok as u8);
        assert_eq!(read_response.err, MmmErr::Ok as u8);

        let read_payload = &sent[6];
        assert_eq!(read_payload[0], 0x42);
    }

    #[test]
    fn unrecognized_request_resets_the_port_without_panicking() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = vec![9u8, b'Z', 0, 0, 0, 0, 0, 0, 0, 0];
        let (mut dispatcher, _outbound) = dispatcher_with(tmp.path(), vec![bogus]);
        assert!(dispatcher.poll_once());
    }
}
