//! The Check sub-protocol ((1,'C')): spool-drive, autologon+procid, genrev
//! and hijack queries, answered directly from `ServerConfig`/`PortState`.
//!
//! `alm_do_check` itself isn't in the kept source (only declared in
//! `almmmost_misc.h` and named at the call site in `almmmost.c`); its
//! per-query behavior is inferred from `almmmost.h`'s `TVSP_CHECK_*`
//! constants and spec.md §6.1's description of what `retcode` carries for
//! each query.

use almmmost_common::wire::{check_kind, CheckRequest, IpcResponse};

use crate::server::Server;

/// Answers one Check request for `port`.
pub fn handle_check(req: &CheckRequest, server: &Server, port: u8) -> IpcResponse {
    let retcode = match req.subreq {
        check_kind::SPOOL_DRIVE => server.config.spool_drive,
        check_kind::AUTOLOAD_PROC => {
            let autologon = server.ports.get(port as usize).map(|p| p.autologon).unwrap_or(false);
            ((autologon as u8) << 6) | (port & 0x3F)
        }
        check_kind::GENREV => server.config.genrev,
        // Hijack has no concrete semantics left in the kept source beyond
        // its name in almmmost.h; answered as "never hijacked".
        check_kind::HIJACK => 0,
        _ => 0,
    };
    IpcResponse {
        retcode,
        x: 0,
        errcode: 0,
        err: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn server_with(genrev: u8, spool_drive: u8) -> Server {
        let text = format!(
            "
[General]
Genrev = {genrev}
Spool Drive = {spool_drive}

[Disks]
Num Disks = 0
"
        );
        let config = ServerConfig::parse(&text).unwrap();
        Server::from_config(config, 2).unwrap()
    }

    fn check(subreq: u8, drv: u8) -> CheckRequest {
        CheckRequest {
            sor: 1,
            req: almmmost_common::wire::req_kind::CHECK,
            drv,
            subreq,
            y: [0; 6],
        }
    }

    #[test]
    fn spool_drive_query_returns_configured_drive() {
        let server = server_with(7, 2);
        let response = handle_check(&check(check_kind::SPOOL_DRIVE, 0), &server, 0);
        assert_eq!(response.retcode, 2);
    }

    #[test]
    fn genrev_query_returns_configured_revision() {
        let server = server_with(7, 2);
        let response = handle_check(&check(check_kind::GENREV, 0), &server, 0);
        assert_eq!(response.retcode, 7);
    }

    #[test]
    fn autoload_proc_packs_autologon_and_port() {
        let mut server = server_with(0, 0);
        server.ports[1].autologon = true;
        let response = handle_check(&check(check_kind::AUTOLOAD_PROC, 0), &server, 1);
        assert_eq!(response.retcode, (1 << 6) | 1);
    }
}
