//! VT100 screen emulation
//!
//! - **grid**: fixed character matrix and clamped cursor
//! - **parser**: byte stream to [`ControlEvent`] tokenizer
//! - **emulator**: applies events, keeps the settled snapshot

pub mod emulator;
pub mod grid;
pub mod parser;

pub use emulator::{Emulator, TermError};
pub use grid::{BoundsViolation, Cursor, Grid, GridSize, Position};
pub use parser::{ControlEvent, ParseError, ParseErrorKind, VtParser};
