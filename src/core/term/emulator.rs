//! Terminal state machine
//!
//! Drives the instrument like a terminal would: keystrokes go out over the
//! channel, a response window comes back, and decoded events are applied to
//! the grid and cursor.
//!
//! The instrument redraws by erasing and reprinting the whole screen, so the
//! emulator keeps a copy of the grid taken just before each erase and at
//! each absolute/line move. Callers read that settled copy through
//! [`Emulator::last_snapshot`], never the live grid.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use super::grid::{BoundsViolation, Cursor, Grid, GridSize};
use super::parser::{ControlEvent, ParseError, VtParser};

pub const KEY_ESCAPE: u8 = 27;
pub const KEY_ENTER: u8 = 13;

/// Largest single read from the channel
const READ_CHUNK: usize = 4096;

#[derive(Error, Debug)]
pub enum TermError {
    #[error("channel I/O failed: {0}")]
    Channel(#[source] io::Error),

    #[error("failed to decode {}-byte response window: {source}", .raw.len())]
    Decode {
        #[source]
        source: ParseError,
        /// The whole window, for offline diagnosis
        raw: Vec<u8>,
    },

    #[error("{0} not supported")]
    Unsupported(&'static str),

    #[error("cursor horizontal absolute column {column} outside 1..={cols}")]
    ColumnOutOfRange { column: u16, cols: usize },

    #[error("unsupported erase in display mode {0}")]
    UnsupportedErase(u16),

    #[error("grid invariant violated: {0}")]
    Bounds(#[from] BoundsViolation),
}

pub type Result<T> = std::result::Result<T, TermError>;

/// Terminal emulator bound to a duplex byte channel
pub struct Emulator<T> {
    conn: T,
    parser: VtParser,
    screen: Grid,
    cursor: Cursor,
    last_state: Grid,
    overprints: usize,
}

impl<T: Read + Write> Emulator<T> {
    /// Bind to `conn` with a blank grid of `size` and the cursor at origin
    pub fn new(conn: T, size: GridSize) -> Self {
        Self {
            conn,
            parser: VtParser::new(),
            screen: Grid::new(size),
            cursor: Cursor::new(size),
            last_state: Grid::new(size),
            overprints: 0,
        }
    }

    /// Rebind to a fresh channel, dropping the old one, and reset all state
    pub fn initialize(&mut self, conn: T) {
        self.conn = conn;
        self.reset();
    }

    /// Blank grid and snapshot, cursor to origin, decoder to ground
    pub fn reset(&mut self) {
        self.parser = VtParser::new();
        self.screen.erase();
        self.last_state.erase();
        self.cursor.reset();
        self.overprints = 0;
    }

    /// Release the channel
    pub fn into_inner(self) -> T {
        self.conn
    }

    /// Send one raw byte, as if a key were pressed
    pub fn send_key(&mut self, byte: u8) -> Result<()> {
        trace!("Key {:#04x}", byte);
        self.conn.write_all(&[byte]).map_err(TermError::Channel)?;
        self.conn.flush().map_err(TermError::Channel)
    }

    pub fn escape(&mut self) -> Result<()> {
        self.send_key(KEY_ESCAPE)
    }

    pub fn enter(&mut self) -> Result<()> {
        self.send_key(KEY_ENTER)
    }

    /// Read a response window of up to `n` bytes and apply it.
    ///
    /// End of stream and read timeouts end the window early without error.
    /// The whole window is tokenized before any event is applied, so a
    /// tokenization failure leaves grid, cursor and snapshot as they were.
    /// Bytes are consumed either way; after any error the caller has to
    /// reconnect rather than resume.
    pub fn decode(&mut self, n: usize) -> Result<()> {
        let window = self.read_window(n)?;
        debug!("Read {} of {} byte response window", window.len(), n);

        let events = match self.parser.parse(&window) {
            Ok(events) => events,
            Err(source) => {
                error!(raw = %STANDARD.encode(&window), "Undecodable response window: {}", source);
                return Err(TermError::Decode {
                    source,
                    raw: window,
                });
            }
        };

        for event in events {
            self.apply(event)?;
        }
        Ok(())
    }

    fn read_window(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut window = Vec::with_capacity(n.min(READ_CHUNK));
        let mut chunk = [0u8; READ_CHUNK];
        while window.len() < n {
            let want = (n - window.len()).min(READ_CHUNK);
            match self.conn.read(&mut chunk[..want]) {
                Ok(0) => break,
                Ok(k) => window.extend_from_slice(&chunk[..k]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::UnexpectedEof
                    ) =>
                {
                    debug!("Response window ended early: {}", e);
                    break;
                }
                Err(e) => return Err(TermError::Channel(e)),
            }
        }
        Ok(window)
    }
}

impl<T> Emulator<T> {
    pub fn size(&self) -> GridSize {
        self.screen.size()
    }

    /// The last settled screen
    pub fn last_snapshot(&self) -> &Grid {
        &self.last_state
    }

    /// The live grid, possibly mid-redraw
    pub fn screen(&self) -> &Grid {
        &self.screen
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Prints dropped because the cursor had run off the right edge
    pub fn overprints(&self) -> usize {
        self.overprints
    }

    fn snapshot(&mut self) {
        self.last_state.clone_from(&self.screen);
    }

    /// Apply one decoded event to the grid and cursor
    pub fn apply(&mut self, event: ControlEvent) -> Result<()> {
        match event {
            ControlEvent::Print(ch) => self.print(ch)?,
            ControlEvent::LineFeed => self.cursor.down(1),
            ControlEvent::CarriageReturn => self.cursor.set_col(0),
            ControlEvent::Control(byte) => trace!("Ignoring control {:#04x}", byte),

            ControlEvent::CursorUp(n) => self.cursor.up(n as usize),
            ControlEvent::CursorDown(n) => self.cursor.down(n as usize),
            // The firmware only ever sends the single-step form
            ControlEvent::CursorForward(_) => self.cursor.forward(1),
            ControlEvent::CursorBack(n) => self.cursor.back(n as usize),
            ControlEvent::CursorNextLine(n) => {
                self.cursor.set_col(0);
                self.cursor.down(n as usize);
                self.snapshot();
            }
            ControlEvent::CursorPrecedingLine(n) => {
                self.cursor.set_col(0);
                self.cursor.up(n as usize);
                self.snapshot();
            }
            ControlEvent::CursorHorizontalAbsolute(column) => {
                self.cursor_horizontal_absolute(column)?
            }
            ControlEvent::CursorPosition { row, col } => {
                self.cursor.set(i64::from(row) - 1, i64::from(col) - 1);
                // Homing alone is not a frame boundary
                if !(row == 1 && col == 1) {
                    self.snapshot();
                }
            }
            ControlEvent::EraseInDisplay(mode) => self.erase_in_display(mode)?,
            // Attributes are accepted but not rendered
            ControlEvent::SelectGraphicRendition(_) => {}

            other @ (ControlEvent::EraseInLine(_)
            | ControlEvent::HorizontalVerticalPosition { .. }
            | ControlEvent::LinePositionAbsolute(_)
            | ControlEvent::InsertChars(_)
            | ControlEvent::DeleteChars(_)
            | ControlEvent::EraseChars(_)
            | ControlEvent::InsertLines(_)
            | ControlEvent::DeleteLines(_)
            | ControlEvent::ScrollUp(_)
            | ControlEvent::ScrollDown(_)
            | ControlEvent::SetScrollRegion { .. }
            | ControlEvent::TabForward(_)
            | ControlEvent::TabBack(_)
            | ControlEvent::TabSet
            | ControlEvent::TabClear(_)
            | ControlEvent::SetMode { .. }
            | ControlEvent::ResetMode { .. }
            | ControlEvent::DeviceAttributes { .. }
            | ControlEvent::DeviceStatusReport(_)
            | ControlEvent::SaveCursor
            | ControlEvent::RestoreCursor
            | ControlEvent::SetCursorStyle(_)
            | ControlEvent::Index
            | ControlEvent::NextLine
            | ControlEvent::ReverseIndex
            | ControlEvent::FullReset) => {
                warn!("Unexpected {:?} in instrument output", other);
                return Err(TermError::Unsupported(other.name()));
            }
        }
        Ok(())
    }

    fn print(&mut self, ch: char) -> Result<()> {
        if self.cursor.pending_overflow() {
            // Firmware sometimes omits the line break after a full row
            self.overprints += 1;
            warn!(
                "Overprinting line {}: dropped {:?}",
                self.cursor.row(),
                ch
            );
            return Ok(());
        }
        self.screen.put(ch, self.cursor.position())?;
        self.cursor.advance();
        Ok(())
    }

    fn cursor_horizontal_absolute(&mut self, column: u16) -> Result<()> {
        let cols = self.size().cols;
        if column == 0 || usize::from(column) > cols {
            return Err(TermError::ColumnOutOfRange { column, cols });
        }
        self.cursor.set_col(i64::from(column) - 1);
        self.snapshot();
        Ok(())
    }

    fn erase_in_display(&mut self, mode: u16) -> Result<()> {
        match mode {
            0 => {
                self.snapshot();
                if !self.cursor.pending_overflow() {
                    self.screen.erase_line_from(self.cursor.position());
                }
            }
            2 => {
                self.snapshot();
                self.screen.erase();
                self.cursor.reset();
            }
            3 => {
                self.snapshot();
                self.screen.erase();
            }
            _ => return Err(TermError::UnsupportedErase(mode)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::grid::Position;

    /// In-memory stand-in for the serial port
    struct FakePort {
        input: io::Cursor<Vec<u8>>,
        written: Vec<u8>,
        fail_reads: Option<io::ErrorKind>,
    }

    impl FakePort {
        fn new(input: &[u8]) -> Self {
            Self {
                input: io::Cursor::new(input.to_vec()),
                written: Vec::new(),
                fail_reads: None,
            }
        }

        fn failing(kind: io::ErrorKind) -> Self {
            Self {
                fail_reads: Some(kind),
                ..Self::new(b"")
            }
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(kind) = self.fail_reads {
                return Err(io::Error::new(kind, "fake read failure"));
            }
            self.input.read(buf)
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn emulator(input: &[u8]) -> Emulator<FakePort> {
        Emulator::new(FakePort::new(input), GridSize::default())
    }

    fn move_to<T>(emu: &mut Emulator<T>, pos: Position) {
        emu.cursor.set(pos.row as i64, pos.col as i64);
    }

    fn row(grid: &Grid, r: usize) -> String {
        grid.row_text(r).unwrap()
    }

    #[test]
    fn test_print_advances_cursor() {
        let mut emu = emulator(b"");
        emu.apply(ControlEvent::Print('A')).unwrap();
        emu.apply(ControlEvent::Print('B')).unwrap();

        assert_eq!(row(emu.screen(), 0), format!("AB{}", " ".repeat(118)));
        assert_eq!(emu.cursor().position(), Position::new(0, 2));
    }

    #[test]
    fn test_print_past_last_column_is_dropped() {
        let mut emu = emulator(b"");
        move_to(&mut emu, Position::new(0, 119));
        emu.apply(ControlEvent::Print('X')).unwrap();
        emu.apply(ControlEvent::Print('Y')).unwrap();

        assert_eq!(emu.screen().get(Position::new(0, 119)), Some('X'));
        assert_eq!(emu.cursor().position(), Position::new(0, 119));
        assert_eq!(emu.overprints(), 1);
        assert_eq!(emu.screen().get(Position::new(1, 0)), Some(' '));
    }

    #[test]
    fn test_line_feed_and_carriage_return() {
        let mut emu = emulator(b"");
        move_to(&mut emu, Position::new(22, 40));
        emu.apply(ControlEvent::LineFeed).unwrap();
        emu.apply(ControlEvent::LineFeed).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(23, 40));

        emu.apply(ControlEvent::CarriageReturn).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(23, 0));
    }

    #[test]
    fn test_relative_moves_clamp_and_never_snapshot() {
        let mut emu = emulator(b"");
        emu.apply(ControlEvent::Print('q')).unwrap();

        emu.apply(ControlEvent::CursorDown(u16::MAX)).unwrap();
        emu.apply(ControlEvent::CursorBack(u16::MAX)).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(23, 0));

        emu.apply(ControlEvent::CursorUp(u16::MAX)).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(0, 0));

        emu.apply(ControlEvent::CursorForward(50)).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(0, 1));

        assert_eq!(emu.last_snapshot(), &Grid::new(GridSize::default()));
    }

    #[test]
    fn test_next_and_preceding_line() {
        let mut emu = emulator(b"");
        move_to(&mut emu, Position::new(10, 30));
        emu.apply(ControlEvent::Print('n')).unwrap();

        emu.apply(ControlEvent::CursorNextLine(100)).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(23, 0));
        assert_eq!(emu.last_snapshot().get(Position::new(10, 30)), Some('n'));

        emu.apply(ControlEvent::CursorPrecedingLine(3)).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(20, 0));
    }

    #[test]
    fn test_horizontal_absolute() {
        let mut emu = emulator(b"");
        emu.apply(ControlEvent::Print('h')).unwrap();
        emu.apply(ControlEvent::CursorHorizontalAbsolute(120)).unwrap();
        assert_eq!(emu.cursor().col(), 119);
        assert_eq!(emu.last_snapshot().get(Position::new(0, 0)), Some('h'));

        assert!(matches!(
            emu.apply(ControlEvent::CursorHorizontalAbsolute(0)),
            Err(TermError::ColumnOutOfRange { column: 0, cols: 120 })
        ));
        assert!(matches!(
            emu.apply(ControlEvent::CursorHorizontalAbsolute(121)),
            Err(TermError::ColumnOutOfRange { column: 121, .. })
        ));
        assert_eq!(emu.cursor().col(), 119);
    }

    #[test]
    fn test_cursor_home_does_not_snapshot() {
        let mut emu = emulator(b"");
        emu.apply(ControlEvent::Print('z')).unwrap();
        emu.apply(ControlEvent::CursorPosition { row: 1, col: 1 }).unwrap();

        assert_eq!(emu.cursor().position(), Position::new(0, 0));
        assert_eq!(emu.last_snapshot(), &Grid::new(GridSize::default()));
    }

    #[test]
    fn test_cursor_position_snapshots_prior_grid() {
        let mut emu = emulator(b"");
        emu.apply(ControlEvent::Print('z')).unwrap();
        let before = emu.screen().clone();

        emu.apply(ControlEvent::CursorPosition { row: 5, col: 10 }).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(4, 9));
        assert_eq!(emu.last_snapshot(), &before);

        emu.apply(ControlEvent::CursorPosition { row: 900, col: 900 }).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(23, 119));
    }

    #[test]
    fn test_erase_in_display_captures_frame_first() {
        let mut emu = emulator(b"");
        for ch in "frame".chars() {
            emu.apply(ControlEvent::Print(ch)).unwrap();
        }
        move_to(&mut emu, Position::new(7, 7));

        emu.apply(ControlEvent::EraseInDisplay(2)).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(0, 0));
        assert_eq!(emu.screen(), &Grid::new(GridSize::default()));
        assert!(row(emu.last_snapshot(), 0).starts_with("frame "));
    }

    #[test]
    fn test_erase_mode_three_keeps_cursor() {
        let mut emu = emulator(b"");
        emu.apply(ControlEvent::Print('x')).unwrap();
        move_to(&mut emu, Position::new(3, 4));

        emu.apply(ControlEvent::EraseInDisplay(3)).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(3, 4));
        assert_eq!(emu.screen(), &Grid::new(GridSize::default()));
        assert_eq!(emu.last_snapshot().get(Position::new(0, 0)), Some('x'));
    }

    #[test]
    fn test_erase_mode_zero_blanks_rest_of_row() {
        let mut emu = emulator(b"");
        for ch in "abcdef".chars() {
            emu.apply(ControlEvent::Print(ch)).unwrap();
        }
        emu.apply(ControlEvent::LineFeed).unwrap();
        emu.apply(ControlEvent::CarriageReturn).unwrap();
        emu.apply(ControlEvent::Print('g')).unwrap();
        move_to(&mut emu, Position::new(0, 3));

        emu.apply(ControlEvent::EraseInDisplay(0)).unwrap();
        assert_eq!(row(emu.screen(), 0).trim_end(), "abc");
        assert_eq!(row(emu.screen(), 1).trim_end(), "g");
        assert_eq!(row(emu.last_snapshot(), 0).trim_end(), "abcdef");
    }

    #[test]
    fn test_unsupported_erase_mode_touches_nothing() {
        let mut emu = emulator(b"");
        emu.apply(ControlEvent::Print('k')).unwrap();
        let screen = emu.screen().clone();
        let cursor = *emu.cursor();

        assert!(matches!(
            emu.apply(ControlEvent::EraseInDisplay(1)),
            Err(TermError::UnsupportedErase(1))
        ));
        assert_eq!(emu.screen(), &screen);
        assert_eq!(emu.cursor(), &cursor);
        assert_eq!(emu.last_snapshot(), &Grid::new(GridSize::default()));
    }

    #[test]
    fn test_unimplemented_operations_are_rejected() {
        let mut emu = emulator(b"");
        for event in [
            ControlEvent::DeviceAttributes { secondary: false },
            ControlEvent::ScrollUp(1),
            ControlEvent::InsertLines(2),
            ControlEvent::DeleteChars(1),
            ControlEvent::TabSet,
            ControlEvent::EraseInLine(0),
            ControlEvent::LinePositionAbsolute(4),
        ] {
            let name = event.name();
            match emu.apply(event) {
                Err(TermError::Unsupported(op)) => assert_eq!(op, name),
                other => panic!("expected unsupported {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_graphic_rendition_is_ignored() {
        let mut emu = emulator(b"");
        emu.apply(ControlEvent::SelectGraphicRendition(vec![1, 7]))
            .unwrap();
        assert_eq!(emu.cursor().position(), Position::new(0, 0));
    }

    #[test]
    fn test_decode_redraw_keeps_last_complete_frame() {
        let mut emu = emulator(b"\x1b[2J\x1b[3;5HHelium\x1b[4;5H\x1b[1mOK\x1b[m\x1b[2J\x1b[1;1HNew");
        emu.decode(4000).unwrap();

        let snapshot = emu.last_snapshot();
        assert_eq!(row(snapshot, 2).trim_end(), "    Helium");
        assert_eq!(row(snapshot, 3).trim_end(), "    OK");
        assert!(row(emu.screen(), 0).starts_with("New"));
    }

    #[test]
    fn test_decode_reads_at_most_n_bytes() {
        let mut emu = emulator(b"abcdef");
        emu.decode(3).unwrap();
        assert_eq!(row(emu.screen(), 0).trim_end(), "abc");
        emu.decode(3).unwrap();
        assert_eq!(row(emu.screen(), 0).trim_end(), "abcdef");
    }

    #[test]
    fn test_decode_huge_window_reads_what_arrives() {
        let mut emu = emulator(b"\x1b[3;1Hshort");
        emu.decode(usize::MAX).unwrap();
        assert_eq!(row(emu.screen(), 2).trim_end(), "short");
    }

    #[test]
    fn test_decode_window_spanning_several_reads() {
        let mut input = vec![b'-'; READ_CHUNK + 10];
        input.extend_from_slice(b"\x1b[1;5Hend");
        let mut emu = emulator(&input);
        emu.decode(input.len()).unwrap();
        assert_eq!(emu.cursor().position(), Position::new(0, 7));
        assert_eq!(row(emu.last_snapshot(), 0), "-".repeat(120));
        assert_eq!(emu.overprints(), READ_CHUNK + 10 - 120);
    }

    #[test]
    fn test_decode_unknown_final_byte_keeps_snapshot() {
        let mut emu = emulator(b"\x1b[5;5Hold\x1b[2;2H");
        emu.decode(100).unwrap();
        let before = emu.last_snapshot().clone();
        assert_eq!(row(&before, 4).trim_end(), "    old");

        emu.conn.input = io::Cursor::new(b"\x1b[2Jnew\x1b[9y".to_vec());
        assert!(matches!(emu.decode(100), Err(TermError::Decode { .. })));
        assert_eq!(emu.last_snapshot(), &before);
    }

    #[test]
    fn test_decode_error_carries_raw_window() {
        let mut emu = emulator(b"ok");
        emu.decode(10).unwrap();
        let snapshot = emu.last_snapshot().clone();
        let cursor = *emu.cursor();

        emu.conn.input = io::Cursor::new(b"\x1b[2Jx\x1b[9y".to_vec());
        match emu.decode(100) {
            Err(TermError::Decode { source, raw }) => {
                assert_eq!(raw, b"\x1b[2Jx\x1b[9y".to_vec());
                assert_eq!(source.offset, 8);
            }
            other => panic!("expected decode error, got {:?}", other),
        }
        assert_eq!(emu.last_snapshot(), &snapshot);
        assert_eq!(emu.cursor(), &cursor);
        assert_eq!(row(emu.screen(), 0).trim_end(), "ok");
    }

    #[test]
    fn test_decode_timeout_ends_window() {
        let mut emu = Emulator::new(
            FakePort::failing(io::ErrorKind::TimedOut),
            GridSize::default(),
        );
        emu.decode(4000).unwrap();
    }

    #[test]
    fn test_decode_propagates_channel_errors() {
        let mut emu = Emulator::new(
            FakePort::failing(io::ErrorKind::BrokenPipe),
            GridSize::default(),
        );
        assert!(matches!(emu.decode(10), Err(TermError::Channel(_))));
    }

    #[test]
    fn test_decode_stops_on_unsupported_operation() {
        let mut emu = emulator(b"ab\x1b[2Scd");
        assert!(matches!(
            emu.decode(100),
            Err(TermError::Unsupported("SU"))
        ));
        assert_eq!(row(emu.screen(), 0).trim_end(), "ab");
    }

    #[test]
    fn test_keys_are_written_raw() {
        let mut emu = emulator(b"");
        emu.escape().unwrap();
        emu.enter().unwrap();
        emu.send_key(b'r').unwrap();
        assert_eq!(emu.into_inner().written, vec![27, 13, b'r']);
    }

    #[test]
    fn test_custom_geometry() {
        let mut emu = Emulator::new(FakePort::new(b"12345\r\nxy"), GridSize::new(2, 4));
        emu.decode(64).unwrap();
        assert_eq!(emu.screen().as_text(), "1234\nxy  ");
        assert_eq!(emu.overprints(), 1);
    }

    #[test]
    fn test_initialize_resets_all_state() {
        let mut emu = emulator(b"\x1b[5;5Hdata\x1b[2Jlive\x1b[12");
        emu.decode(64).unwrap();
        assert_eq!(row(emu.last_snapshot(), 4).trim_end(), "    data");

        emu.initialize(FakePort::new(b"H"));
        let blank = Grid::new(GridSize::default());
        assert_eq!(emu.cursor().position(), Position::new(0, 0));
        assert!(!emu.cursor().pending_overflow());
        assert_eq!(emu.screen(), &blank);
        assert_eq!(emu.last_snapshot(), &blank);
        assert_eq!(emu.overprints(), 0);

        // the half-read CSI from the old channel is gone
        emu.decode(8).unwrap();
        assert_eq!(row(emu.screen(), 0).trim_end(), "H");
        assert_eq!(emu.cursor().position(), Position::new(0, 1));
    }

    #[test]
    fn test_cursor_horizontal_absolute_uses_grid_width() {
        let mut emu = Emulator::new(FakePort::new(b"\x1b[8G"), GridSize::new(3, 8));
        assert_eq!(emu.size(), GridSize::new(3, 8));
        emu.decode(16).unwrap();
        assert_eq!(emu.cursor().col(), 7);

        emu.conn.input = io::Cursor::new(b"\x1b[9G".to_vec());
        assert!(matches!(
            emu.decode(16),
            Err(TermError::ColumnOutOfRange { column: 9, cols: 8 })
        ));
    }
}
