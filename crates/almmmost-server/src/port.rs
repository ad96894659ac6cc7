//! Per-port client state: the Rust shape of `struct user_port_data_t` /
//! `userinfo[]` in the original.
//!
//! One `PortState` exists per physical link, tracking which private
//! directory slot the port currently has selected on each drive and
//! whether it logged on with autologon enabled.

use almmmost_common::MAXDISK;

/// Mutable per-port state the dispatcher consults and updates while
/// servicing requests from one link.
#[derive(Debug, Clone)]
pub struct PortState {
    pub port: u8,
    /// Whether this port's client skips the interactive logon prompt
    /// (`[Port n] Autologon` in the config).
    pub autologon: bool,
    /// Which private directory slot this port currently has selected on
    /// each drive (`userinfo[port].drive_dir[disk]`); ignored for
    /// `Public`/`PublicOnly` drives.
    pub drive_dir: [u8; MAXDISK],
    /// The drive a file request with `FCB.drv == 0` defaults to
    /// (`curbdisk` carried on the wire request header).
    pub curbdisk: u8,
}

impl PortState {
    pub fn new(port: u8) -> Self {
        Self {
            port,
            autologon: false,
            drive_dir: [0; MAXDISK],
            curbdisk: 0,
        }
    }

    /// Applies a `[Port n]` config section's defaults to a fresh state.
    /// `Private Dir` sets the same slot on every drive (`alm_port_ini`
    /// applies it uniformly across `MAXDISK`, not per-drive).
    pub fn apply_config(&mut self, cfg: &crate::config::PortConfig) {
        self.autologon = cfg.autologon;
        self.drive_dir = [cfg.private_dir; MAXDISK];
    }

    /// The directory slot this port resolves to on `disk` (its own
    /// private selection, or 0 for shared drives — the caller still needs
    /// to know the drive's `DirKind` to decide which applies).
    pub fn slot_for(&self, disk: u8) -> u8 {
        self.drive_dir.get(disk as usize).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_port_defaults_to_slot_zero_everywhere() {
        let port = PortState::new(3);
        assert_eq!(port.slot_for(0), 0);
        assert_eq!(port.slot_for(5), 0);
        assert!(!port.autologon);
    }

    #[test]
    fn apply_config_sets_autologon_and_default_slot() {
        let mut port = PortState::new(0);
        port.apply_config(&crate::config::PortConfig {
            port: 0,
            autologon: true,
            private_dir: 2,
        });
        assert!(port.autologon);
        assert_eq!(port.slot_for(0), 2);
    }
}
