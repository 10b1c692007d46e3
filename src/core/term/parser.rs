//! VT sequence decoder
//!
//! Tokenizes a raw byte stream per the VT100/ANSI grammar into
//! [`ControlEvent`]s. The decoder does not touch the screen; the emulator
//! applies the events it produces.

use thiserror::Error;

/// Upper bound on numeric parameters in one CSI sequence
const MAX_PARAMS: usize = 32;

/// One decoded terminal operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Printable character
    Print(char),
    /// LF
    LineFeed,
    /// CR
    CarriageReturn,
    /// Any other C0 control (BEL, BS, HT, ...)
    Control(u8),

    /// CUU
    CursorUp(u16),
    /// CUD
    CursorDown(u16),
    /// CUF
    CursorForward(u16),
    /// CUB
    CursorBack(u16),
    /// CNL
    CursorNextLine(u16),
    /// CPL
    CursorPrecedingLine(u16),
    /// CHA, 1-based column as sent
    CursorHorizontalAbsolute(u16),
    /// CUP, 1-based
    CursorPosition { row: u16, col: u16 },
    /// ED
    EraseInDisplay(u16),
    /// SGR
    SelectGraphicRendition(Vec<u16>),

    /// EL
    EraseInLine(u16),
    /// HVP
    HorizontalVerticalPosition { row: u16, col: u16 },
    /// VPA
    LinePositionAbsolute(u16),
    /// ICH
    InsertChars(u16),
    /// DCH
    DeleteChars(u16),
    /// ECH
    EraseChars(u16),
    /// IL
    InsertLines(u16),
    /// DL
    DeleteLines(u16),
    /// SU
    ScrollUp(u16),
    /// SD
    ScrollDown(u16),
    /// DECSTBM
    SetScrollRegion { top: u16, bottom: u16 },
    /// CHT
    TabForward(u16),
    /// CBT
    TabBack(u16),
    /// HTS
    TabSet,
    /// TBC
    TabClear(u16),
    /// SM / DECSET
    SetMode { private: bool, modes: Vec<u16> },
    /// RM / DECRST
    ResetMode { private: bool, modes: Vec<u16> },
    /// DA / secondary DA
    DeviceAttributes { secondary: bool },
    /// DSR
    DeviceStatusReport(u16),
    /// DECSC / SCOSC
    SaveCursor,
    /// DECRC / SCORC
    RestoreCursor,
    /// DECSCUSR
    SetCursorStyle(u16),
    /// IND
    Index,
    /// NEL
    NextLine,
    /// RI
    ReverseIndex,
    /// RIS
    FullReset,
}

impl ControlEvent {
    /// Mnemonic used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            ControlEvent::Print(_) => "print",
            ControlEvent::LineFeed => "LF",
            ControlEvent::CarriageReturn => "CR",
            ControlEvent::Control(_) => "C0",
            ControlEvent::CursorUp(_) => "CUU",
            ControlEvent::CursorDown(_) => "CUD",
            ControlEvent::CursorForward(_) => "CUF",
            ControlEvent::CursorBack(_) => "CUB",
            ControlEvent::CursorNextLine(_) => "CNL",
            ControlEvent::CursorPrecedingLine(_) => "CPL",
            ControlEvent::CursorHorizontalAbsolute(_) => "CHA",
            ControlEvent::CursorPosition { .. } => "CUP",
            ControlEvent::EraseInDisplay(_) => "ED",
            ControlEvent::SelectGraphicRendition(_) => "SGR",
            ControlEvent::EraseInLine(_) => "EL",
            ControlEvent::HorizontalVerticalPosition { .. } => "HVP",
            ControlEvent::LinePositionAbsolute(_) => "VPA",
            ControlEvent::InsertChars(_) => "ICH",
            ControlEvent::DeleteChars(_) => "DCH",
            ControlEvent::EraseChars(_) => "ECH",
            ControlEvent::InsertLines(_) => "IL",
            ControlEvent::DeleteLines(_) => "DL",
            ControlEvent::ScrollUp(_) => "SU",
            ControlEvent::ScrollDown(_) => "SD",
            ControlEvent::SetScrollRegion { .. } => "DECSTBM",
            ControlEvent::TabForward(_) => "CHT",
            ControlEvent::TabBack(_) => "CBT",
            ControlEvent::TabSet => "HTS",
            ControlEvent::TabClear(_) => "TBC",
            ControlEvent::SetMode { private: true, .. } => "DECSET",
            ControlEvent::SetMode { private: false, .. } => "SM",
            ControlEvent::ResetMode { private: true, .. } => "DECRST",
            ControlEvent::ResetMode { private: false, .. } => "RM",
            ControlEvent::DeviceAttributes { .. } => "DA",
            ControlEvent::DeviceStatusReport(_) => "DSR",
            ControlEvent::SaveCursor => "DECSC",
            ControlEvent::RestoreCursor => "DECRC",
            ControlEvent::SetCursorStyle(_) => "DECSCUSR",
            ControlEvent::Index => "IND",
            ControlEvent::NextLine => "NEL",
            ControlEvent::ReverseIndex => "RI",
            ControlEvent::FullReset => "RIS",
        }
    }
}

/// What went wrong while tokenizing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("unrecognized CSI sequence (params={params:?}, intermediates={intermediates:?}, final={final_byte:?})")]
    UnknownCsi {
        params: Vec<Option<u16>>,
        intermediates: Vec<u8>,
        final_byte: char,
    },

    #[error("unrecognized escape sequence ESC {0:?}")]
    UnknownEscape(char),

    #[error("more than {MAX_PARAMS} CSI parameters")]
    TooManyParams,
}

/// Tokenization failure at a byte offset within the fed window
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at byte {offset}")]
pub struct ParseError {
    pub offset: usize,
    #[source]
    pub kind: ParseErrorKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    /// OSC, DCS, SOS, PM and APC payloads, consumed until ST or BEL
    StringPayload,
    EscapeInString,
}

/// Parser state machine
#[derive(Debug, Default)]
pub struct VtParser {
    state: ParserState,
    /// `None` marks a parameter that was left empty
    params: Vec<Option<u16>>,
    intermediates: Vec<u8>,
    /// Private marker (`?`, `>`, `=`, `<`) leading a CSI sequence
    marker: Option<u8>,
    current_param: Option<u16>,
}

impl VtParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::with_capacity(16),
            intermediates: Vec::with_capacity(4),
            marker: None,
            current_param: None,
        }
    }

    /// True when no sequence is in progress
    pub fn is_ground(&self) -> bool {
        self.state == ParserState::Ground
    }

    /// Tokenize a whole window. Sequences left open at the end carry over
    /// to the next call. On error the parser is back in ground state.
    pub fn parse(&mut self, bytes: &[u8]) -> Result<Vec<ControlEvent>, ParseError> {
        let mut events = Vec::with_capacity(bytes.len());
        for (offset, &byte) in bytes.iter().enumerate() {
            match self.feed(byte) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(kind) => return Err(ParseError { offset, kind }),
            }
        }
        Ok(events)
    }

    /// Feed a single byte to the parser
    pub fn feed(&mut self, byte: u8) -> Result<Option<ControlEvent>, ParseErrorKind> {
        let in_string = matches!(
            self.state,
            ParserState::StringPayload | ParserState::EscapeInString
        );

        // C0 controls act anywhere outside string payloads
        if byte < 0x20 && !in_string {
            return Ok(match byte {
                0x1B => {
                    self.enter_escape();
                    None
                }
                0x18 | 0x1A => {
                    // CAN / SUB abort the sequence in progress
                    self.state = ParserState::Ground;
                    None
                }
                0x0A => Some(ControlEvent::LineFeed),
                0x0D => Some(ControlEvent::CarriageReturn),
                _ => Some(ControlEvent::Control(byte)),
            });
        }

        let result = match self.state {
            ParserState::Ground => Ok(self.ground(byte)),
            ParserState::Escape => self.escape(byte),
            ParserState::EscapeIntermediate => Ok(self.escape_intermediate(byte)),
            ParserState::CsiEntry => self.csi_entry(byte),
            ParserState::CsiParam => self.csi_param(byte),
            ParserState::CsiIntermediate => self.csi_intermediate(byte),
            ParserState::CsiIgnore => Ok(self.csi_ignore(byte)),
            ParserState::StringPayload => Ok(self.string_payload(byte)),
            ParserState::EscapeInString => self.escape_in_string(byte),
        };
        if result.is_err() {
            self.state = ParserState::Ground;
        }
        result
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.intermediates.clear();
        self.marker = None;
        self.current_param = None;
    }

    fn ground(&mut self, byte: u8) -> Option<ControlEvent> {
        match byte {
            0x20..=0x7E => Some(ControlEvent::Print(byte as char)),
            // Latin-1 printable range; DEL and C1 are dropped
            0xA0..=0xFF => Some(ControlEvent::Print(byte as char)),
            _ => None,
        }
    }

    fn escape(&mut self, byte: u8) -> Result<Option<ControlEvent>, ParseErrorKind> {
        self.state = ParserState::Ground;
        let event = match byte {
            b'[' => {
                self.state = ParserState::CsiEntry;
                None
            }
            b']' | b'P' | b'X' | b'^' | b'_' => {
                self.state = ParserState::StringPayload;
                None
            }
            b'7' => Some(ControlEvent::SaveCursor),
            b'8' => Some(ControlEvent::RestoreCursor),
            b'D' => Some(ControlEvent::Index),
            b'E' => Some(ControlEvent::NextLine),
            b'H' => Some(ControlEvent::TabSet),
            b'M' => Some(ControlEvent::ReverseIndex),
            b'c' => Some(ControlEvent::FullReset),
            // Keypad application/numeric mode
            b'=' | b'>' => None,
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
                None
            }
            // DEL is ignored mid-sequence
            0x7F => {
                self.state = ParserState::Escape;
                None
            }
            _ => return Err(ParseErrorKind::UnknownEscape(byte as char)),
        };
        Ok(event)
    }

    fn escape_intermediate(&mut self, byte: u8) -> Option<ControlEvent> {
        match byte {
            0x20..=0x2F => {
                self.intermediates.push(byte);
            }
            _ => {
                // Charset designations and the like; nothing to render
                self.state = ParserState::Ground;
            }
        }
        None
    }

    fn csi_entry(&mut self, byte: u8) -> Result<Option<ControlEvent>, ParseErrorKind> {
        match byte {
            b'0'..=b'9' => {
                self.current_param = Some((byte - b'0') as u16);
                self.state = ParserState::CsiParam;
            }
            b';' => {
                self.push_param(None)?;
                self.state = ParserState::CsiParam;
            }
            b'?' | b'>' | b'=' | b'<' => {
                self.marker = Some(byte);
                self.state = ParserState::CsiParam;
            }
            b':' => {
                self.state = ParserState::CsiIgnore;
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => return self.dispatch_csi(byte),
            _ => {}
        }
        Ok(None)
    }

    fn csi_param(&mut self, byte: u8) -> Result<Option<ControlEvent>, ParseErrorKind> {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            b';' => {
                let param = self.current_param.take();
                self.push_param(param)?;
            }
            // Subparameters and misplaced markers make the sequence malformed
            b':' | b'<'..=b'?' => {
                self.state = ParserState::CsiIgnore;
            }
            0x20..=0x2F => {
                self.finish_param()?;
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.finish_param()?;
                return self.dispatch_csi(byte);
            }
            _ => {}
        }
        Ok(None)
    }

    fn csi_intermediate(&mut self, byte: u8) -> Result<Option<ControlEvent>, ParseErrorKind> {
        match byte {
            0x20..=0x2F => {
                self.intermediates.push(byte);
            }
            0x30..=0x3F => {
                self.state = ParserState::CsiIgnore;
            }
            0x40..=0x7E => return self.dispatch_csi(byte),
            _ => {}
        }
        Ok(None)
    }

    fn csi_ignore(&mut self, byte: u8) -> Option<ControlEvent> {
        if (0x40..=0x7E).contains(&byte) {
            tracing::debug!("Dropped malformed CSI ending in {:?}", byte as char);
            self.state = ParserState::Ground;
        }
        None
    }

    fn string_payload(&mut self, byte: u8) -> Option<ControlEvent> {
        match byte {
            // BEL or 8-bit ST terminates
            0x07 | 0x9C => self.state = ParserState::Ground,
            0x1B => self.state = ParserState::EscapeInString,
            _ => {}
        }
        None
    }

    fn escape_in_string(&mut self, byte: u8) -> Result<Option<ControlEvent>, ParseErrorKind> {
        if byte == b'\\' {
            self.state = ParserState::Ground;
            Ok(None)
        } else if byte == 0x1B {
            Ok(None)
        } else {
            // Not ST: the string ended, process this byte as a new escape
            self.enter_escape();
            self.escape(byte)
        }
    }

    fn push_param(&mut self, param: Option<u16>) -> Result<(), ParseErrorKind> {
        if self.params.len() >= MAX_PARAMS {
            return Err(ParseErrorKind::TooManyParams);
        }
        self.params.push(param);
        Ok(())
    }

    fn finish_param(&mut self) -> Result<(), ParseErrorKind> {
        // `CSI 5;H` leaves a trailing empty parameter
        let trailing_empty = self.params.last().is_some();
        match self.current_param.take() {
            Some(p) => self.push_param(Some(p)),
            None if trailing_empty => self.push_param(None),
            None => Ok(()),
        }
    }

    /// Parameter `idx`, or `default` when absent or empty
    fn param(&self, idx: usize, default: u16) -> u16 {
        self.params.get(idx).copied().flatten().unwrap_or(default)
    }

    /// Count-style parameter: absent, empty and 0 all mean 1
    fn count(&self, idx: usize) -> u16 {
        self.param(idx, 1).max(1)
    }

    fn numeric_params(&self) -> Vec<u16> {
        self.params.iter().map(|p| p.unwrap_or(0)).collect()
    }

    fn dispatch_csi(&mut self, final_byte: u8) -> Result<Option<ControlEvent>, ParseErrorKind> {
        self.state = ParserState::Ground;

        let event = match (self.marker, self.intermediates.as_slice(), final_byte) {
            // Cursor movement
            (None, [], b'A') => ControlEvent::CursorUp(self.count(0)),
            (None, [], b'B') => ControlEvent::CursorDown(self.count(0)),
            (None, [], b'C') => ControlEvent::CursorForward(self.count(0)),
            (None, [], b'D') => ControlEvent::CursorBack(self.count(0)),
            (None, [], b'E') => ControlEvent::CursorNextLine(self.count(0)),
            (None, [], b'F') => ControlEvent::CursorPrecedingLine(self.count(0)),
            (None, [], b'G') => ControlEvent::CursorHorizontalAbsolute(self.param(0, 1)),
            (None, [], b'H') => ControlEvent::CursorPosition {
                row: self.count(0),
                col: self.count(1),
            },
            (None, [], b'f') => ControlEvent::HorizontalVerticalPosition {
                row: self.count(0),
                col: self.count(1),
            },
            (None, [], b'd') => ControlEvent::LinePositionAbsolute(self.count(0)),

            // Erase
            (None | Some(b'?'), [], b'J') => ControlEvent::EraseInDisplay(self.param(0, 0)),
            (None | Some(b'?'), [], b'K') => ControlEvent::EraseInLine(self.param(0, 0)),
            (None, [], b'X') => ControlEvent::EraseChars(self.count(0)),

            // Line and character editing
            (None, [], b'@') => ControlEvent::InsertChars(self.count(0)),
            (None, [], b'P') => ControlEvent::DeleteChars(self.count(0)),
            (None, [], b'L') => ControlEvent::InsertLines(self.count(0)),
            (None, [], b'M') => ControlEvent::DeleteLines(self.count(0)),

            // Scrolling
            (None, [], b'S') => ControlEvent::ScrollUp(self.count(0)),
            (None, [], b'T') => ControlEvent::ScrollDown(self.count(0)),
            (None, [], b'r') => ControlEvent::SetScrollRegion {
                top: self.param(0, 1),
                bottom: self.param(1, 0),
            },

            // Tabs
            (None, [], b'I') => ControlEvent::TabForward(self.count(0)),
            (None, [], b'Z') => ControlEvent::TabBack(self.count(0)),
            (None, [], b'g') => ControlEvent::TabClear(self.param(0, 0)),

            // Rendition
            (None, [], b'm') => ControlEvent::SelectGraphicRendition(self.numeric_params()),

            // Modes
            (None, [], b'h') => ControlEvent::SetMode {
                private: false,
                modes: self.numeric_params(),
            },
            (Some(b'?'), [], b'h') => ControlEvent::SetMode {
                private: true,
                modes: self.numeric_params(),
            },
            (None, [], b'l') => ControlEvent::ResetMode {
                private: false,
                modes: self.numeric_params(),
            },
            (Some(b'?'), [], b'l') => ControlEvent::ResetMode {
                private: true,
                modes: self.numeric_params(),
            },

            // Reports
            (None, [], b'c') => ControlEvent::DeviceAttributes { secondary: false },
            (Some(b'>'), [], b'c') => ControlEvent::DeviceAttributes { secondary: true },
            (None | Some(b'?'), [], b'n') => ControlEvent::DeviceStatusReport(self.param(0, 0)),

            // Cursor save/restore and style
            (None, [], b's') => ControlEvent::SaveCursor,
            (None, [], b'u') => ControlEvent::RestoreCursor,
            (None, [b' '], b'q') => ControlEvent::SetCursorStyle(self.param(0, 0)),

            _ => {
                return Err(ParseErrorKind::UnknownCsi {
                    params: self.params.clone(),
                    intermediates: self
                        .marker
                        .iter()
                        .chain(self.intermediates.iter())
                        .copied()
                        .collect(),
                    final_byte: final_byte as char,
                })
            }
        };
        Ok(Some(event))
    }
}
