//! `almmmostd`: the Almmmost server binary.
//!
//! Mirrors `almmmost.c`'s `main(argc, argv)`, which takes exactly one
//! argument (the ini path) and runs forever servicing the configured
//! ports. The SDLC/RS-422 link itself is out of scope (spec.md
//! Non-goals); `--ports` stands in for however many physical ports a
//! real deployment's `tvi_sdlc` device would expose, each backed here by
//! an idle [`NullLink`] so the dispatcher's poll loop, config ingest and
//! control console are all exercised end to end without real hardware.

use std::path::PathBuf;

use almmmost_core::link::{LinkChannel, LinkResult};
use almmmost_server::config::ServerConfig;
use almmmost_server::dispatcher::Dispatcher;
use almmmost_server::server::Server;
use clap::Parser;

/// TeleVideo MmmOST-compatible file server for TS-8xx workstations.
#[derive(Debug, Parser)]
#[command(name = "almmmostd", version, about)]
struct Args {
    /// Path to the server's section/key/value configuration file.
    config: PathBuf,

    /// Number of link ports to service (stands in for the physical
    /// SDLC port count on real hardware).
    #[arg(short, long, default_value_t = 4)]
    ports: u8,
}

/// A link with no backing transport: never ready, every call fails.
/// Lets the dispatcher's poll loop run against a configured port count
/// with no real SDLC hardware attached, per spec.md's Non-goals.
struct NullLink;

impl LinkChannel for NullLink {
    fn check_ready(&mut self) -> LinkResult<bool> {
        Ok(false)
    }

    fn recv_frame(&mut self, _len: usize) -> LinkResult<Vec<u8>> {
        Err(almmmost_core::link::LinkError::NotReady)
    }

    fn send_frame(&mut self, _data: &[u8]) -> LinkResult<()> {
        Err(almmmost_core::link::LinkError::NotReady)
    }

    fn reset(&mut self) -> LinkResult<()> {
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = match ServerConfig::load(&args.config) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(path = %args.config.display(), %error, "configuration error; server cannot start");
            std::process::exit(1);
        }
    };

    let server = match Server::from_config(config, args.ports) {
        Ok(server) => server,
        Err(error) => {
            tracing::error!(%error, "failed to open configured disk images");
            std::process::exit(1);
        }
    };

    tracing::info!(ports = args.ports, "almmmostd starting");

    let links: Vec<Box<dyn LinkChannel + Send>> = (0..args.ports).map(|_| Box::new(NullLink) as Box<dyn LinkChannel + Send>).collect();
    let console_rx = almmmost_server::console::spawn_stdin_console();
    let mut dispatcher = Dispatcher::new(server, links).with_console(console_rx);
    dispatcher.run();
}
