//! Core collection components.
//!
//! - **channel**: serial line to the control panel
//! - **term**: VT100 screen emulation (grid, decoder, state machine)
//! - **session**: one gather cycle, channel + menu navigation + decode
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── SerialChannel (duplex byte stream to the panel)
//! └── Emulator
//!     ├── Grid + Cursor (screen buffer)
//!     └── VtParser (ANSI escape sequences)
//! ```

pub mod channel;
pub mod session;
pub mod term;
