//! The `Server` value: every piece of process-wide state threaded through
//! the dispatcher and the control console, per spec's "model as a single
//! owned `Server` value... avoid thread-local or static mutable
//! singletons" design note.

use almmmost_fs::{FileEngine, FileImage};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::port::PortState;
use crate::special::SpecialRegistry;

pub struct Server {
    pub config: ServerConfig,
    pub engine: FileEngine,
    pub ports: Vec<PortState>,
    pub special: SpecialRegistry,
    /// Set by the console's `abort` command; every busy-wait loop in the
    /// dispatcher checks and clears it.
    pub abort: bool,
    /// Set by the console's `locate` command; a diagnostic dump flag, also
    /// cleared after it's observed.
    pub locate: bool,
}

impl Server {
    /// Builds a server from a parsed config, opening every configured disk
    /// image from disk (`RO:`-prefixed images open read-only).
    pub fn from_config(config: ServerConfig, num_ports: u8) -> ServerResult<Self> {
        let mut engine = FileEngine::new();
        for disk_cfg in &config.disks {
            let mut slots: Vec<Box<dyn almmmost_core::RecordIo + Send>> = Vec::with_capacity(disk_cfg.images.len());
            for image in &disk_cfg.images {
                let file = FileImage::open(&image.path, image.read_only).map_err(|source| ServerError::Image {
                    path: image.path.clone(),
                    source,
                })?;
                slots.push(Box::new(file));
            }
            let assigned = engine.images.add_disk(disk_cfg.to_params(), slots);
            debug_assert_eq!(assigned, disk_cfg.disk, "config disk order must match add_disk order");
        }

        let mut ports: Vec<PortState> = (0..num_ports).map(PortState::new).collect();
        for port_cfg in &config.ports {
            if let Some(port) = ports.get_mut(port_cfg.port as usize) {
                port.apply_config(port_cfg);
            }
        }

        Ok(Server {
            config,
            engine,
            ports,
            special: SpecialRegistry::with_builtins(),
            abort: false,
            locate: false,
        })
    }

    /// Closes every file a port has open and resets its drive selections,
    /// the way a client disconnect or the console's `closeport` does.
    pub fn clear_port(&mut self, port: u8) {
        self.engine.oft.close_all_for_port(port);
        if let Some(state) = self.ports.get_mut(port as usize) {
            *state = PortState::new(port);
        }
    }

    pub fn take_abort(&mut self) -> bool {
        std::mem::take(&mut self.abort)
    }

    pub fn take_locate(&mut self) -> bool {
        std::mem::take(&mut self.locate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(dir: &std::path::Path) -> ServerConfig {
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
Type = PUBLIC_ONLY
Floppy = Y
SPT = 26
BSF = 0
DBM = 9
DBL = 7
ALx = 2
RES = 0
Image 0 = disk0.img
",
            dir.display()
        );
        ServerConfig::parse(&text).unwrap()
    }

    #[test]
    fn from_config_opens_every_configured_image() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("disk0.img"), vec![0u8; 10 * 128]).unwrap();
        let config = sample_config(tmp.path());
        let server = Server::from_config(config, 4).unwrap();
        assert_eq!(server.ports.len(), 4);
        assert!(server.engine.images.params(0).is_ok());
    }

    #[test]
    fn from_config_fails_on_missing_image_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = sample_config(tmp.path());
        assert!(Server::from_config(config, 1).is_err());
    }

    #[test]
    fn clear_port_closes_its_open_files_and_resets_selection() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("disk0.img"), vec![0u8; 10 * 128]).unwrap();
        let config = sample_config(tmp.path());
        let mut server = Server::from_config(config, 1).unwrap();
        server.ports[0].drive_dir[0] = 3;
        server.clear_port(0);
        assert_eq!(server.ports[0].drive_dir[0], 0);
    }
}
