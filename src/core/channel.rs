//! Serial line to the control panel
//!
//! The panel speaks 8N1 with no flow control. Reads time out after the
//! configured interval, which the emulator treats as the end of a response
//! window.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SerialConfig;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to open serial port {port:?}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
}

/// Open serial port; closed on drop
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialChannel {
    pub fn open(config: &SerialConfig) -> Result<Self, ChannelError> {
        debug!(
            "Opening {} at {} baud, {} ms read timeout",
            config.port, config.baud_rate, config.timeout_ms
        );
        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()
            .map_err(|source| ChannelError::Open {
                port: config.port.clone(),
                source,
            })?;
        info!("Opened serial port {}", config.port);

        Ok(Self {
            port,
            name: config.port.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        debug!("Closing serial port {}", self.name);
    }
}
