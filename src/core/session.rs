//! Gather session
//!
//! One gather cycle: take the channel, walk the panel menu with fixed
//! keystroke delays, decode one response window and hand back the settled
//! screen. The channel is dropped when the session ends, on success or
//! failure. Retrying is the caller's business: a failed cycle is simply
//! started again from a fresh connection.

use std::io::{Read, Write};
use std::thread;

use thiserror::Error;
use tracing::{debug, info};

use super::channel::{ChannelError, SerialChannel};
use super::term::{Emulator, Grid, GridSize, TermError};
use crate::config::{Config, MenuConfig};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Term(#[from] TermError),
}

/// A single navigate-then-decode pass over one channel
pub struct Session<T> {
    emulator: Emulator<T>,
}

impl<T: Read + Write> Session<T> {
    pub fn new(conn: T, size: GridSize) -> Self {
        Self {
            emulator: Emulator::new(conn, size),
        }
    }

    /// Send the menu keys, then decode the response window
    pub fn run(&mut self, menu: &MenuConfig) -> Result<&Grid, TermError> {
        let delay = menu.key_delay();
        for key in &menu.keys {
            debug!("Sending key {}", key);
            self.emulator.send_key(key.byte())?;
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        self.emulator.decode(menu.response_bytes)?;
        let overprints = self.emulator.overprints();
        if overprints > 0 {
            info!("Dropped {} characters past the right edge", overprints);
        }
        Ok(self.emulator.last_snapshot())
    }

    pub fn into_inner(self) -> T {
        self.emulator.into_inner()
    }
}

/// Run one navigate-then-decode pass over `conn`, consuming it
pub fn gather<T: Read + Write>(
    conn: T,
    size: GridSize,
    menu: &MenuConfig,
) -> Result<Grid, TermError> {
    let mut session = Session::new(conn, size);
    session.run(menu).cloned()
}

/// Open the configured serial port and run one gather cycle over it
pub fn gather_serial(config: &Config) -> Result<Grid, SessionError> {
    let channel = SerialChannel::open(&config.serial)?;
    info!("Gathering from {}", channel.name());
    Ok(gather(channel, config.screen.grid_size(), &config.menu)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MenuKey;
    use std::io;

    struct ScriptedPort {
        reply: io::Cursor<Vec<u8>>,
        keys: Vec<u8>,
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.keys.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn instant_menu() -> MenuConfig {
        MenuConfig {
            key_delay_ms: 0,
            ..MenuConfig::default()
        }
    }

    fn port(reply: &[u8]) -> ScriptedPort {
        ScriptedPort {
            reply: io::Cursor::new(reply.to_vec()),
            keys: Vec::new(),
        }
    }

    #[test]
    fn test_run_sends_menu_keys_then_decodes() {
        let mut session = Session::new(
            port(b"\x1b[2J\x1b[2;3HData page\x1b[2J"),
            GridSize::default(),
        );
        let screen = session.run(&instant_menu()).unwrap();
        assert_eq!(screen.row_text(1).unwrap().trim_end(), "  Data page");

        assert_eq!(session.into_inner().keys, vec![27, 13, b'r', 13]);
    }

    #[test]
    fn test_custom_key_script() {
        let menu = MenuConfig {
            key_delay_ms: 0,
            keys: vec![MenuKey::Char(b'2'), MenuKey::Enter],
            response_bytes: 16,
        };
        let mut session = Session::new(port(b""), GridSize::new(2, 8));
        session.run(&menu).unwrap();
        assert_eq!(session.into_inner().keys, vec![b'2', 13]);
    }

    #[test]
    fn test_gather_surfaces_decode_errors() {
        let result = gather(port(b"\x1b[1;1Hx\x1b[7y"), GridSize::default(), &instant_menu());
        assert!(matches!(result, Err(TermError::Decode { .. })));
    }
}
