//! Configuration ingest, special-file traps, the request dispatcher, the
//! control console, and the server-wide state (`Server`) they're built
//! around. The `almmmostd` binary (`src/main.rs`) is a thin CLI shell
//! over this library.

pub mod boot;
pub mod check;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod logon;
pub mod port;
pub mod server;
pub mod special;
pub mod spool;
