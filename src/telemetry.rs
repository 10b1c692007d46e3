//! Sensor readings scraped from the panel's data page
//!
//! Works on the settled screen text only. Each field has its own pattern and
//! its own error, so a failed cycle says exactly which value went missing.

use std::fmt::Write as _;

use regex::Regex;
use thiserror::Error;

pub const MEASUREMENT: &str = "espree";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to parse helium level")]
    HeliumLevel,

    #[error("failed to parse cold head temperature")]
    ColdHeadTemperature,

    #[error("failed to parse shield temperature")]
    ShieldTemperature,

    #[error("failed to parse magnet power")]
    MagnetPower,

    #[error("failed to parse magnet psi")]
    MagnetPsi,

    #[error("failed to parse compressor status")]
    Compressor,

    #[error("unknown compressor status {0:?}")]
    UnknownCompressorStatus(String),

    #[error("{field}: {value:?} is not a number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid screen pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// One set of sensor values from the data page
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub helium_level1: f64,
    pub helium_level2: f64,
    pub coldhead_temperature: f64,
    /// Sensor 1 of the shield
    pub shield_temperature: f64,
    pub magnet_power: f64,
    pub magnet_psi: f64,
    pub compressor: bool,
}

impl Reading {
    /// Field name and value pairs, in output order
    fn float_fields(&self) -> [(&'static str, f64); 6] {
        [
            ("helium_level1", self.helium_level1),
            ("helium_level2", self.helium_level2),
            ("coldhead_temperature", self.coldhead_temperature),
            ("shield_temperature", self.shield_temperature),
            ("magnet_power", self.magnet_power),
            ("magnet_psi", self.magnet_psi),
        ]
    }

    /// InfluxDB line protocol, no timestamp
    pub fn to_line_protocol(&self, measurement: &str, name: &str) -> String {
        let mut line = format!(
            "{},name={} ",
            escape_measurement(measurement),
            escape_tag(name)
        );
        for (field, value) in self.float_fields() {
            let _ = write!(line, "{}={},", field, value);
        }
        let _ = write!(line, "compressor={}", self.compressor);
        line
    }
}

fn escape_measurement(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, ',' | ' ' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, ',' | ' ' | '=' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Compiled field patterns
pub struct ScreenExtractor {
    helium_level: Regex,
    cold_head: Regex,
    shield: Regex,
    magnet_power: Regex,
    magnet_psi: Regex,
    compressor: Regex,
}

impl ScreenExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            helium_level: Regex::new(
                r"Values.+\s+(?P<level1>\d{1,2}\.\d)%+\s+(?P<level2>\d{1,2}\.\d)%",
            )?,
            cold_head: Regex::new(r"Cold Head\s+Sensor1:(?P<sensor1>\d{1,2}\.\d)K")?,
            shield: Regex::new(
                r"Shield\s+Sensor1:(?P<sensor1>\d{1,2}\.\d)K\s+Sensor2:(?P<sensor2>\d{1,2}\.\d)K",
            )?,
            magnet_power: Regex::new(r"Average Power\s+:(?P<power>\d+\.\d+)W")?,
            magnet_psi: Regex::new(r"Mag psiA\s+:(?P<psi>\d+\.\d+)\s+")?,
            compressor: Regex::new(r"Compressor:\s+(?P<compressor>OFF|ON)")?,
        })
    }

    /// Pull every field out of the screen text
    pub fn extract(&self, screen: &str) -> Result<Reading, ExtractError> {
        let helium = self
            .helium_level
            .captures(screen)
            .ok_or(ExtractError::HeliumLevel)?;
        let cold_head = self
            .cold_head
            .captures(screen)
            .ok_or(ExtractError::ColdHeadTemperature)?;
        let shield = self
            .shield
            .captures(screen)
            .ok_or(ExtractError::ShieldTemperature)?;
        let magnet_power = self
            .magnet_power
            .captures(screen)
            .ok_or(ExtractError::MagnetPower)?;
        let magnet_psi = self
            .magnet_psi
            .captures(screen)
            .ok_or(ExtractError::MagnetPsi)?;
        let compressor = self
            .compressor
            .captures(screen)
            .ok_or(ExtractError::Compressor)?;

        let compressor = match &compressor["compressor"] {
            "ON" => true,
            "OFF" => false,
            other => return Err(ExtractError::UnknownCompressorStatus(other.to_string())),
        };

        Ok(Reading {
            helium_level1: number("helium_level1", &helium["level1"])?,
            helium_level2: number("helium_level2", &helium["level2"])?,
            coldhead_temperature: number("coldhead_temperature", &cold_head["sensor1"])?,
            shield_temperature: number("shield_temperature", &shield["sensor1"])?,
            magnet_power: number("magnet_power", &magnet_power["power"])?,
            magnet_psi: number("magnet_psi", &magnet_psi["psi"])?,
            compressor,
        })
    }
}

fn number(field: &'static str, value: &str) -> Result<f64, ExtractError> {
    value.parse().map_err(|_| ExtractError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
