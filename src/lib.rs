//! espree-collector - telemetry from the Espree MRI control panel
//!
//! The panel has no machine-readable interface, only a VT100 menu on a
//! serial line. This crate impersonates the terminal: it sends keystrokes to
//! reach the data page, decodes the escape-coded reply into a character
//! grid, and scrapes sensor values off the settled screen.
//!
//! - **config**: TOML configuration
//! - **core**: serial channel, gather session and the VT100 emulator
//! - **telemetry**: field extraction and line protocol output

pub mod config;
pub mod core;
pub mod telemetry;
