//! The control console: command grammar, parsing and dispatch.
//!
//! The original (`alm_cmd_sigint`) runs this entirely inside a `SIGINT`
//! handler, reading a line from stdin and acting on it before returning to
//! the interrupted poll loop. Rust signal handlers cannot safely call into
//! arbitrary owned state (allocate, lock, or touch anything not
//! async-signal-safe) the way that does — a documented REDESIGN, not a
//! silent deviation (see DESIGN.md). Here, a background thread reads
//! console lines into a channel, and the dispatcher drains it between
//! poll iterations instead of from a signal handler; [`parse_command`] and
//! [`apply_command`] hold the actual grammar/dispatch and are plain,
//! directly testable functions.

use std::sync::mpsc::{self, Receiver};

use crate::server::Server;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Abort,
    Locate,
    Reopen { drive: u8, slot: u8, path: String },
    FileIn { path: String },
    FileOut { path: String },
    ClosePort { port: u8 },
    PrintFil,
    PrintSpe,
    PrintDpb,
    PrintHpb,
    SaveOs { ostype: u8, path: String },
    Sync,
    Exit,
}

/// Parses one console command line. Leading/trailing whitespace is
/// trimmed and the command word is matched case-insensitively, per
/// spec.md §6.5. Unknown commands are `Err` with a diagnostic message
/// (the original "prints a diagnostic and returns" rather than failing
/// the console).
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.trim().split_whitespace();
    let cmd = words.next().unwrap_or("").to_ascii_lowercase();
    let rest: Vec<&str> = words.collect();

    match cmd.as_str() {
        "abort" => Ok(Command::Abort),
        "locate" => Ok(Command::Locate),
        "sync" => Ok(Command::Sync),
        "exit" | "quit" => Ok(Command::Exit),
        "printfil" => Ok(Command::PrintFil),
        "printspe" => Ok(Command::PrintSpe),
        "printdpb" => Ok(Command::PrintDpb),
        "printhpb" => Ok(Command::PrintHpb),
        "closeport" => {
            let port = rest
                .first()
                .ok_or("closeport requires a port number")?
                .parse::<u8>()
                .map_err(|_| format!("invalid port number: {}", rest[0]))?;
            Ok(Command::ClosePort { port })
        }
        "filein" => Ok(Command::FileIn {
            path: rest.first().ok_or("filein requires a path")?.to_string(),
        }),
        "fileout" => Ok(Command::FileOut {
            path: rest.first().ok_or("fileout requires a path")?.to_string(),
        }),
        "reopen" => {
            let spec = rest.first().ok_or("reopen requires <letter>[:<slot>] <path>")?;
            let path = rest.get(1).ok_or("reopen requires a path")?;
            let (letter, slot) = match spec.split_once(':') {
                Some((letter, slot)) => (letter, slot.parse::<u8>().map_err(|_| format!("invalid slot: {slot}"))?),
                None => (*spec, 0),
            };
            let letter_ch = letter
                .chars()
                .next()
                .ok_or_else(|| "empty drive letter".to_string())?;
            if !letter_ch.is_ascii_alphabetic() {
                return Err(format!("invalid drive letter: {letter}"));
            }
            let drive = (letter_ch.to_ascii_uppercase() as u8) - b'A';
            Ok(Command::Reopen {
                drive,
                slot,
                path: (*path).to_string(),
            })
        }
        "saveos" => {
            let ostype = rest
                .first()
                .ok_or("saveos requires <n> <path>")?
                .parse::<u8>()
                .map_err(|_| format!("invalid OS type: {}", rest[0]))?;
            let path = rest.get(1).ok_or("saveos requires a path")?;
            Ok(Command::SaveOs {
                ostype,
                path: (*path).to_string(),
            })
        }
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command: {other}")),
    }
}

/// Applies a parsed command to the server, returning a one-line status
/// message (what the original would have printed to stdout). `reopen`,
/// `filein`, `fileout` and `saveos` touch real image/OS-image I/O that is
/// out of scope here (spec.md Non-goals) and are accepted but not wired
/// to a backing action; `printfil`/`printspe`/`printdpb`/`printhpb` report
/// that a diagnostic dump isn't rendered in this build, rather than
/// silently doing nothing.
pub fn apply_command(server: &mut Server, cmd: Command) -> String {
    match cmd {
        Command::Abort => {
            server.abort = true;
            "abort flag set".to_string()
        }
        Command::Locate => {
            server.locate = true;
            "locate flag set".to_string()
        }
        Command::Sync => "sync: every write already lands synchronously".to_string(),
        Command::Exit => "exit requested".to_string(),
        Command::ClosePort { port } => {
            server.clear_port(port);
            format!("closed port {port}")
        }
        Command::PrintFil => "printfil: open-file table dump not wired in this build".to_string(),
        Command::PrintSpe => "printspe: special-file registry dump not wired in this build".to_string(),
        Command::PrintDpb => "printdpb: disk parameter dump not wired in this build".to_string(),
        Command::PrintHpb => "printhpb: host-parameter dump not wired in this build".to_string(),
        Command::Reopen { drive, slot, path } => reopen(server, drive, slot, &path),
        Command::FileIn { path } => format!("filein {path}: accepted, no backing fetch wired in this build"),
        Command::FileOut { path } => format!("fileout {path}: accepted, no backing fetch wired in this build"),
        Command::SaveOs { ostype, path } => format!("saveos {ostype} {path}: accepted, no backing OS image wired in this build"),
    }
}

/// Closes every open file on `drive`, swaps its directory slot's backing
/// image for the file at `path` (resolved against `[Disks] Image Dir` the
/// same way a config `Image m` line is), and rebuilds the disk's BAM —
/// `almmmost_image.c: alm_img_reopen`'s job. Rejects `Public`/`PublicOnly`
/// drives outright (DESIGN.md Open Question 1).
fn reopen(server: &mut Server, drive: u8, slot: u8, path: &str) -> String {
    let resolved = server.config.image_dir.join(path);
    let file = match almmmost_fs::FileImage::open(&resolved, false) {
        Ok(file) => file,
        Err(error) => return format!("reopen {}:{slot} {}: {error}", (b'A' + drive) as char, resolved.display()),
    };
    server.engine.oft.close_all_for_disk(drive);
    match server.engine.images.reopen(drive, slot, Box::new(file)) {
        Ok(()) => format!("reopen {}:{slot} {}: ok", (b'A' + drive) as char, resolved.display()),
        Err(error) => format!("reopen {}:{slot} {}: {error}", (b'A' + drive) as char, resolved.display()),
    }
}

/// Feeds console lines from stdin into a channel the dispatcher can poll
/// without blocking, so command processing happens between request-poll
/// iterations instead of inside a signal handler.
pub fn spawn_stdin_console() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_commands_case_insensitively() {
        assert_eq!(parse_command("Abort"), Ok(Command::Abort));
        assert_eq!(parse_command("  LOCATE  "), Ok(Command::Locate));
        assert_eq!(parse_command("quit"), Ok(Command::Exit));
        assert_eq!(parse_command("EXIT"), Ok(Command::Exit));
    }

    #[test]
    fn parses_closeport_with_argument() {
        assert_eq!(parse_command("closeport 3"), Ok(Command::ClosePort { port: 3 }));
    }

    #[test]
    fn closeport_without_argument_is_an_error() {
        assert!(parse_command("closeport").is_err());
    }

    #[test]
    fn parses_reopen_with_slot() {
        assert_eq!(
            parse_command("reopen B:2 /images/foo.img"),
            Ok(Command::Reopen {
                drive: 1,
                slot: 2,
                path: "/images/foo.img".to_string(),
            })
        );
    }

    #[test]
    fn parses_reopen_without_slot_defaults_to_zero() {
        assert_eq!(
            parse_command("reopen A /images/foo.img"),
            Ok(Command::Reopen {
                drive: 0,
                slot: 0,
                path: "/images/foo.img".to_string(),
            })
        );
    }

    #[test]
    fn parses_saveos() {
        assert_eq!(
            parse_command("saveos 4 /tmp/os.img"),
            Ok(Command::SaveOs {
                ostype: 4,
                path: "/tmp/os.img".to_string(),
            })
        );
    }

    #[test]
    fn unknown_command_is_an_error_with_a_diagnostic() {
        let err = parse_command("frobnicate").unwrap_err();
        assert!(err.contains("frobnicate"));
    }

    #[test]
    fn empty_line_is_an_error() {
        assert!(parse_command("   ").is_err());
    }
}
