//! Break spool ((1,'N')): interface-only stub.
//!
//! The spooler/printer path has no kept C source beyond its declaration in
//! `almmmost_misc.h` (`alm_break_spool`), and is not part of the file
//! engine spec.md scopes in. This gives the dispatcher somewhere to route
//! the request without pretending to model printer state that was never
//! part of the kept source.

use almmmost_common::wire::IpcResponse;

/// Acknowledges a break-spool request. Always succeeds: there is no
/// spooler state here to break.
pub fn break_spool() -> IpcResponse {
    IpcResponse {
        retcode: 0,
        x: 0,
        errcode: 0,
        err: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_spool_always_succeeds() {
        assert_eq!(break_spool().retcode, 0);
    }
}
