//! espree - telemetry collector for the Espree MRI control panel
//!
//! Walks the panel's terminal menu over a serial line, decodes the screen it
//! draws and prints the sensor values as one InfluxDB line, ready for an
//! `exec`-style scheduler.
//!
//! # Quick Start
//!
//! ```text
//! espree                          # Gather once from the configured port
//! espree -p COM3 -n scanner-3     # Override port and machine name
//! espree screen                   # Print the settled screen instead
//! espree replay --base64 win.txt  # Decode a window dumped to the log
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use espree_collector::config::{Config, LogConfig};
use espree_collector::core::session;
use espree_collector::core::term::Emulator;
use espree_collector::telemetry::{ScreenExtractor, MEASUREMENT};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, PartialEq)]
enum Command {
    /// Navigate once and print one metric line
    Gather,
    /// Navigate once and print the settled screen
    Screen,
    /// Decode a captured response window from a file
    Replay(PathBuf),
}

/// Command line options
#[derive(Debug)]
struct Args {
    command: Command,
    config_path: Option<PathBuf>,
    port: Option<String>,
    name: Option<String>,
    bytes: Option<usize>,
    base64: bool,
    verbose: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            command: Command::Gather,
            config_path: None,
            port: None,
            name: None,
            bytes: None,
            base64: false,
            verbose: false,
        }
    }
}

fn print_version() {
    eprintln!("espree {}", VERSION);
}

fn print_help() {
    eprintln!("espree {} - Espree MRI control panel collector", VERSION);
    eprintln!();
    eprintln!("Usage: espree [OPTIONS] [COMMAND]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  gather                (default) Read the panel once, print a metric line");
    eprintln!("  screen                Read the panel once, print the screen text");
    eprintln!("  replay <FILE>         Decode a captured response window");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Config file (default ~/.espree/config.toml)");
    eprintln!("  -p, --port <PORT>     Serial port, e.g. COM1 or /dev/ttyUSB0");
    eprintln!("  -n, --name <NAME>     Machine name tag");
    eprintln!("      --bytes <N>       Response window size");
    eprintln!("      --base64          Replay file holds base64 text");
    eprintln!("      --verbose         Debug logging");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
}

fn parse_args<I: IntoIterator<Item = String>>(argv: I) -> Result<Args, String> {
    let args: Vec<String> = argv.into_iter().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    let value = |i: usize, flag: &str| -> Result<String, String> {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("Missing argument for {}", flag))
    };

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                parsed.config_path = Some(PathBuf::from(value(i, "--config")?));
            }
            "-p" | "--port" => {
                i += 1;
                parsed.port = Some(value(i, "--port")?);
            }
            "-n" | "--name" => {
                i += 1;
                parsed.name = Some(value(i, "--name")?);
            }
            "--bytes" => {
                i += 1;
                let raw = value(i, "--bytes")?;
                let n = raw
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid byte count: {}", raw))?;
                parsed.bytes = Some(n);
            }
            "--base64" => parsed.base64 = true,
            "--verbose" => parsed.verbose = true,
            "gather" => parsed.command = Command::Gather,
            "screen" => parsed.command = Command::Screen,
            "replay" => {
                i += 1;
                parsed.command = Command::Replay(PathBuf::from(value(i, "replay")?));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Install the global subscriber. RUST_LOG wins over the configured level.
fn init_logging(log: &LogConfig, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        Level::from_str(&log.level)
            .map_err(|_| anyhow::anyhow!("Invalid log level: {}", log.level))?
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    if log.file.is_empty() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log.file)
            .with_context(|| format!("Failed to open log file {}", log.file))?;
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args(env::args()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(2);
        }
    };

    let mut config = Config::load(args.config_path.as_deref())?;
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(name) = &args.name {
        config.name = name.clone();
    }
    if let Some(bytes) = args.bytes {
        config.menu.response_bytes = bytes;
    }

    init_logging(&config.log, args.verbose)?;
    info!("espree {} starting ({:?})", VERSION, args.command);

    match &args.command {
        Command::Gather => run_gather(&config),
        Command::Screen => run_screen(&config),
        Command::Replay(path) => run_replay(&config, path, args.base64, args.bytes),
    }
}

fn run_gather(config: &Config) -> anyhow::Result<()> {
    let extractor = ScreenExtractor::new()?;
    let screen = session::gather_serial(config)
        .with_context(|| format!("Gather from {} failed", config.serial.port))?;
    let reading = extractor
        .extract(&screen.as_text())
        .with_context(|| format!("No reading on the screen from {}", config.serial.port))?;

    println!("{}", reading.to_line_protocol(MEASUREMENT, &config.name));
    Ok(())
}

fn run_screen(config: &Config) -> anyhow::Result<()> {
    let screen = session::gather_serial(config)
        .with_context(|| format!("Gather from {} failed", config.serial.port))?;
    println!("{}", screen);
    Ok(())
}

fn run_replay(
    config: &Config,
    path: &Path,
    base64: bool,
    bytes: Option<usize>,
) -> anyhow::Result<()> {
    let data = load_capture(path, base64)?;
    if data.is_empty() {
        bail!("Capture {} is empty", path.display());
    }
    let window = bytes.unwrap_or(data.len());

    let mut emulator = Emulator::new(io::Cursor::new(data), config.screen.grid_size());
    emulator
        .decode(window)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    let text = emulator.last_snapshot().as_text();
    println!("{}", text);

    let reading = ScreenExtractor::new()?
        .extract(&text)
        .context("No reading on the replayed screen")?;
    println!("{}", reading.to_line_protocol(MEASUREMENT, &config.name));
    Ok(())
}

/// Raw bytes, or the base64 text the decoder logs on failure
fn load_capture(path: &Path, base64: bool) -> anyhow::Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !base64 {
        return Ok(data);
    }
    let text: Vec<u8> = data
        .into_iter()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(text)
        .with_context(|| format!("{} is not valid base64", path.display()))
}
