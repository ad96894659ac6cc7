//! Configuration file ingest.
//!
//! Mirrors `parse_args`/`alm_gen_ini`/`alm_img_ini`/`alm_port_ini` in
//! `almmmost.c`/`almmmost_image.c`: one pass over every `[Section]` in the
//! file, dispatched by a case-insensitive prefix match on the section name,
//! then a pass over that section's key/value pairs. `ini` does the
//! tokenizing; this module only knows Almmmost's section/key vocabulary.

use std::path::PathBuf;

use almmmost_common::{MAXDIRS, MAXDISK, MAXUSER};
use almmmost_core::{AlmError, AlmResult};
use almmmost_fs::DirKind;
use ini::Ini;

/// One `Image m` line within a `[Disk n]` section.
#[derive(Debug, Clone)]
pub struct DiskImageConfig {
    /// Directory slot this image backs (`m` in `Image m`).
    pub slot: u8,
    pub path: PathBuf,
    pub read_only: bool,
}

/// One `[Disk n]` section: drive geometry plus the images backing it.
#[derive(Debug, Clone)]
pub struct DiskConfig {
    pub disk: u8,
    pub kind: DirKind,
    pub is_floppy: bool,
    pub spt: u16,
    pub bsf: u8,
    pub dbm: u16,
    pub dbl: u16,
    pub exm: u8,
    /// Number of allocation blocks reserved for the directory (`ALx`).
    pub dir_alx: u8,
    pub res_tracks: u16,
    pub images: Vec<DiskImageConfig>,
}

impl DiskConfig {
    fn new(disk: u8) -> Self {
        Self {
            disk,
            kind: DirKind::Private,
            is_floppy: false,
            spt: 0,
            bsf: 0,
            dbm: 0,
            dbl: 0,
            exm: 0,
            dir_alx: 0,
            res_tracks: 0,
            images: Vec::new(),
        }
    }

    pub fn to_params(&self) -> almmmost_fs::DiskParams {
        almmmost_fs::DiskParams {
            spt: self.spt,
            bsf: self.bsf,
            blm: (1u16 << self.bsf).wrapping_sub(1) as u8,
            exm: self.exm,
            dbm: self.dbm,
            dbl: self.dbl,
            dir_alx: self.dir_alx,
            cks: 0,
            res_tracks: self.res_tracks,
            is_floppy: self.is_floppy,
            dirs: self.images.len() as u32,
            kind: self.kind,
        }
    }
}

/// One `[Port n]` section: per-port defaults applied to a fresh `PortState`.
#[derive(Debug, Clone, Default)]
pub struct PortConfig {
    pub port: u8,
    pub autologon: bool,
    pub private_dir: u8,
}

/// The parsed contents of an Almmmost configuration file.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `[General] Genrev` — reported verbatim by the Check/genrev query.
    pub genrev: u8,
    /// `[General] Spool Drive` — reported by the Check/spool-drive query.
    pub spool_drive: u8,
    /// `[Disks] Image Dir` — path prefix every `Image m` entry resolves
    /// against.
    pub image_dir: PathBuf,
    /// `[Disks] Num Disks`.
    pub num_disks: u8,
    /// `[Disks] Max Priv Dirs`.
    pub max_priv_dirs: u8,
    pub disks: Vec<DiskConfig>,
    pub ports: Vec<PortConfig>,
}

impl ServerConfig {
    pub fn load(path: &std::path::Path) -> AlmResult<Self> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| AlmError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_ini(&ini)
    }

    pub fn parse(text: &str) -> AlmResult<Self> {
        let ini = Ini::load_from_str(text).map_err(|e| AlmError::Config(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> AlmResult<Self> {
        let mut config = ServerConfig {
            genrev: 0,
            spool_drive: 0,
            image_dir: PathBuf::new(),
            num_disks: 0,
            max_priv_dirs: MAXDIRS as u8,
            disks: Vec::new(),
            ports: Vec::new(),
        };

        // Two passes: [Disks] first (so Image Dir/Num Disks are known
        // before any [Disk n] section needs them), then everything else.
        if let Some(section) = ini.section(Some("Disks")) {
            for (key, value) in section.iter() {
                if key.eq_ignore_ascii_case("Image Dir") {
                    config.image_dir = PathBuf::from(value);
                } else if key.eq_ignore_ascii_case("Num Disks") {
                    config.num_disks = parse_int(value)?.min(MAXDISK as u32) as u8;
                } else if key.eq_ignore_ascii_case("Max Priv Dirs") {
                    config.max_priv_dirs = parse_int(value)?.min(MAXDIRS as u32) as u8;
                }
            }
        }

        for (name, section) in ini.iter() {
            let Some(name) = name else { continue };
            if name.eq_ignore_ascii_case("General") {
                if let Some(v) = section.get("Genrev") {
                    config.genrev = parse_int(v)? as u8;
                }
                if let Some(v) = section.get("Spool Drive") {
                    config.spool_drive = parse_int(v)? as u8;
                }
            } else if let Some(rest) = strip_prefix_ci(name, "Disk ") {
                let disk_num = parse_int(rest)? as u8;
                if disk_num as u32 >= config.num_disks as u32 {
                    return Err(AlmError::Config(format!(
                        "[{name}]: disk number {disk_num} >= Num Disks {0}",
                        config.num_disks
                    )));
                }
                config.disks.push(parse_disk_section(disk_num, section, &config.image_dir, config.max_priv_dirs)?);
            } else if let Some(rest) = strip_prefix_ci(name, "Port ") {
                let port_num = parse_int(rest)? as u8;
                if port_num as usize > MAXUSER {
                    return Err(AlmError::Config(format!("[{name}]: port number exceeds MAXUSER")));
                }
                config.ports.push(parse_port_section(port_num, section)?);
            }
            // [Device] and [Client OSTYPE n] sections carry no kept field
            // semantics beyond what almm_dev_ini/alm_osl_ini documented in
            // spec.md's config table already implies; they are accepted
            // and otherwise ignored, matching every other unrecognized
            // section name.
        }

        config.disks.sort_by_key(|d| d.disk);
        config.ports.sort_by_key(|p| p.port);
        Ok(config)
    }
}

fn parse_disk_section(
    disk: u8,
    section: &ini::Properties,
    image_dir: &std::path::Path,
    max_priv_dirs: u8,
) -> AlmResult<DiskConfig> {
    let mut cfg = DiskConfig::new(disk);
    for (key, value) in section.iter() {
        if let Some(rest) = strip_prefix_ci(key, "Image ") {
            let slot = parse_int(rest)? as u8;
            if slot as u32 >= max_priv_dirs as u32 {
                continue;
            }
            let (read_only, name) = match value.get(..3) {
                Some(prefix) if prefix[..2].eq_ignore_ascii_case("RO") && &prefix[2..3] == ":" => {
                    (true, &value[3..])
                }
                _ => (false, value),
            };
            cfg.images.push(DiskImageConfig {
                slot,
                path: image_dir.join(name),
                read_only,
            });
        } else if key.eq_ignore_ascii_case("Type") {
            cfg.kind = match value.to_ascii_uppercase().as_str() {
                "PRIVATE" => DirKind::Private,
                "PUBLIC_ONLY" => DirKind::PublicOnly,
                _ => DirKind::Public,
            };
        } else if key.eq_ignore_ascii_case("Floppy") {
            cfg.is_floppy = value.to_ascii_uppercase().starts_with('Y');
        } else if key.eq_ignore_ascii_case("SPT") {
            cfg.spt = parse_int(value)? as u16;
        } else if key.eq_ignore_ascii_case("BSF") {
            cfg.bsf = parse_int(value)? as u8;
        } else if key.eq_ignore_ascii_case("DBM") {
            cfg.dbm = parse_int(value)? as u16;
        } else if key.eq_ignore_ascii_case("DBL") {
            cfg.dbl = parse_int(value)? as u16;
        } else if key.eq_ignore_ascii_case("EXM") {
            cfg.exm = parse_int(value)? as u8;
        } else if key.eq_ignore_ascii_case("ALx") {
            cfg.dir_alx = parse_int(value)? as u8;
        } else if key.eq_ignore_ascii_case("RES") {
            cfg.res_tracks = parse_int(value)? as u16;
        }
    }
    cfg.images.sort_by_key(|i| i.slot);
    Ok(cfg)
}

fn parse_port_section(port: u8, section: &ini::Properties) -> AlmResult<PortConfig> {
    let mut cfg = PortConfig { port, ..Default::default() };
    for (key, value) in section.iter() {
        if key.eq_ignore_ascii_case("Autologon") {
            cfg.autologon = value.to_ascii_uppercase().starts_with('Y');
        } else if key.eq_ignore_ascii_case("Private Dir") {
            cfg.private_dir = parse_int(value)? as u8;
        }
    }
    Ok(cfg)
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Parses a config value as C's `strtol(v, NULL, 0)` would: decimal, or
/// `0x`-prefixed hex.
fn parse_int(value: &str) -> AlmResult<u32> {
    let value = value.trim();
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        value.parse::<u32>()
    };
    parsed.map_err(|_| AlmError::Config(format!("not a number: '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
[General]
Genrev = 3
Spool Drive = 1

[Disks]
Image Dir = /srv/almmmost/images
Num Disks = 2
Max Priv Dirs = 4

[Disk 0]
Type = PUBLIC
Floppy = N
SPT = 64
BSF = 5
DBM = 1831
DBL = 127
EXM = 1
ALx = 16
RES = 2
Image 0 = public0.img

[Disk 1]
Type = PRIVATE
Floppy = Y
SPT = 26
BSF = 3
DBM = 194
DBL = 63
EXM = 0
ALx = 2
RES = 0
Image 0 = RO:user0.img
Image 1 = user1.img

[Port 0]
Autologon = Y
Private Dir = 0

[Port 1]
Autologon = N
Private Dir = 1
";

    #[test]
    fn parses_general_and_disks_sections() {
        let config = ServerConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.genrev, 3);
        assert_eq!(config.spool_drive, 1);
        assert_eq!(config.image_dir, PathBuf::from("/srv/almmmost/images"));
        assert_eq!(config.num_disks, 2);
        assert_eq!(config.disks.len(), 2);
    }

    #[test]
    fn ro_prefix_marks_image_read_only() {
        let config = ServerConfig::parse(SAMPLE).unwrap();
        let disk1 = &config.disks[1];
        assert_eq!(disk1.images[0].read_only, true);
        assert_eq!(disk1.images[0].path, PathBuf::from("/srv/almmmost/images/user0.img"));
        assert_eq!(disk1.images[1].read_only, false);
    }

    #[test]
    fn disk_kind_is_parsed() {
        let config = ServerConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.disks[0].kind, DirKind::Public);
        assert_eq!(config.disks[1].kind, DirKind::Private);
    }

    #[test]
    fn port_sections_are_parsed_and_sorted() {
        let config = ServerConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.ports.len(), 2);
        assert!(config.ports[0].autologon);
        assert!(!config.ports[1].autologon);
        assert_eq!(config.ports[1].private_dir, 1);
    }

    #[test]
    fn out_of_range_disk_number_is_rejected() {
        let bad = "
[Disks]
Num Disks = 1

[Disk 5]
Type = PUBLIC
";
        assert!(ServerConfig::parse(bad).is_err());
    }

    #[test]
    fn hex_values_are_accepted() {
        let text = "
[Disks]
Num Disks = 1

[Disk 0]
DBM = 0x727
";
        let config = ServerConfig::parse(text).unwrap();
        assert_eq!(config.disks[0].dbm, 0x727);
    }
}
