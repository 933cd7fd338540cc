use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Certificate serial number, stored as uppercase hex without separators
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber {
    hex: String,
}

#[derive(Error, Debug)]
pub enum SerialNumberParseError {
    #[error("Invalid hex character: {0}")]
    InvalidHexCharacter(char),

    #[error("Empty string provided")]
    EmptyString,
}

impl SerialNumber {
    /// Build from big-endian serial bytes, dropping leading zero bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let trimmed = &bytes[first..];
        if trimmed.is_empty() {
            return Self {
                hex: "0".to_string(),
            };
        }
        // Match big-integer hex rendering: no leading zero nibble
        let hex = hex::encode_upper(trimmed);
        let hex = hex.strip_prefix('0').map(str::to_string).unwrap_or(hex);
        Self { hex }
    }

    /// Accepts plain or colon-separated hex in any case
    pub fn parse(identifier: &str) -> std::result::Result<Self, SerialNumberParseError> {
        let cleaned = identifier.replace(':', "").to_uppercase();
        if cleaned.is_empty() {
            return Err(SerialNumberParseError::EmptyString);
        }
        if let Some(ch) = cleaned.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(SerialNumberParseError::InvalidHexCharacter(ch));
        }
        Ok(Self { hex: cleaned })
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Colon-separated pairs, e.g. "03:FC:2E"
    pub fn as_colon_hex(&self) -> String {
        let padded = if self.hex.len() % 2 == 1 {
            format!("0{}", self.hex)
        } else {
            self.hex.clone()
        };
        padded
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

impl FromStr for SerialNumber {
    type Err = SerialNumberParseError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SerialNumber {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.hex)
    }
}

impl<'de> Deserialize<'de> for SerialNumber {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SerialNumber::parse(&s).map_err(serde::de::Error::custom)
    }
}
