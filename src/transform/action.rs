//! Encrypt / decrypt selector

use crate::error::Error;
use crate::transform::BYTE_RANGE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of the transform applied to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Shift every byte forward by the key
    Encrypt,

    /// Shift every byte back by the key
    Decrypt,
}

impl Action {
    /// Token used on the command line and in worker arguments
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Encrypt => "encrypt",
            Action::Decrypt => "decrypt",
        }
    }

    /// Per-byte offset in `0..256` this action applies for `key`
    pub fn delta(&self, key: i64) -> u8 {
        let forward = key.rem_euclid(BYTE_RANGE as i64) as u16;
        let offset = match self {
            Action::Encrypt => forward,
            Action::Decrypt => (BYTE_RANGE - forward) % BYTE_RANGE,
        };
        offset as u8
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    /// Accepts `encrypt` or `decrypt`, ignoring case and surrounding whitespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "encrypt" => Ok(Action::Encrypt),
            "decrypt" => Ok(Action::Decrypt),
            _ => Err(Error::InvalidAction(s.to_string())),
        }
    }
}
