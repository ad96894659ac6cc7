//! Logon ((0,'C'/'L')): reads the 128-byte password block and answers.
//!
//! The kept source's `alm_do_logon` is not itself in `original_source`
//! (only its call site in `almmmost.c`'s main loop), and no persistent
//! credential store is visible anywhere else in the kept tree. This
//! resolves the matching spec Open Question by always succeeding — see
//! DESIGN.md.

use almmmost_common::wire::IpcResponse;

pub const PASSWORD_BLOCK_SIZE: usize = 128;

/// Handles a Logon request. The password block's content is accepted and
/// discarded; `retcode` is always 0.
pub fn handle_logon(_password_block: &[u8; PASSWORD_BLOCK_SIZE]) -> IpcResponse {
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
    fn logon_always_succeeds() {
        let block = [0u8; PASSWORD_BLOCK_SIZE];
        let response = handle_logon(&block);
        assert_eq!(response.retcode, 0);
    }

    #[test]
    fn logon_ignores_password_content() {
        let response = handle_logon(&[0xFFu8; PASSWORD_BLOCK_SIZE]);
        assert_eq!(response.retcode, 0);
    }
}
