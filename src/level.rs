//! Record severity levels
//!
//! Levels are ordered by verbosity: a session configured at level `L`
//! accepts a record at level `M` when `M <= L`. `Disable` accepts nothing.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Severity of a record, and the threshold of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Level {
    /// Nothing is written
    Disable = 0,
    /// Errors only
    Error = 1,
    /// Warnings and errors
    Warning = 2,
    /// Debug output and above
    Debug = 3,
    /// Everything
    Info = 4,
}

impl Default for Level {
    fn default() -> Self {
        Self::Info
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Level {
    /// All levels, least verbose first
    pub const ALL: [Level; 5] = [
        Level::Disable,
        Level::Error,
        Level::Warning,
        Level::Debug,
        Level::Info,
    ];

    /// Parse a level from a string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            _ => Err(Error::config(format!("Unknown level: {}", s))),
        }
    }

    /// Convert the numeric representation back into a level
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Get the name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Debug => "debug",
            Self::Info => "info",
        }
    }

    /// The single character written into the `[level]` field of a record
    pub fn as_char(&self) -> char {
        match self {
            Self::Info => 'I',
            Self::Debug => 'D',
            Self::Warning => 'W',
            Self::Error => 'E',
            Self::Disable => 'X',
        }
    }

    /// Whether a session at this threshold accepts a record at `record`
    pub fn permits(&self, record: Level) -> bool {
        record != Level::Disable && record <= *self
    }

    /// Whether the record goes to standard error when echoed to the terminal
    pub(crate) fn is_stderr(&self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Disable < Level::Error);
        assert!(Level::Error < Level::Warning);
        assert!(Level::Warning < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert_eq!(Level::default(), Level::Info);
    }

    #[test]
    fn test_level_chars() {
        assert_eq!(Level::Info.as_char(), 'I');
        assert_eq!(Level::Debug.as_char(), 'D');
        assert_eq!(Level::Warning.as_char(), 'W');
        assert_eq!(Level::Error.as_char(), 'E');
        assert_eq!(Level::Disable.as_char(), 'X');
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(Level::from_str("INFO").unwrap(), Level::Info);
        assert_eq!(Level::from_str("warn").unwrap(), Level::Warning);
        assert_eq!(Level::from_str("disable").unwrap(), Level::Disable);
        assert!(Level::from_str("verbose").is_err());

        for level in Level::ALL {
            assert_eq!(Level::from_u8(level as u8), Some(level));
            assert_eq!(Level::from_str(level.as_str()).unwrap(), level);
        }
        assert_eq!(Level::from_u8(5), None);
    }

    #[test]
    fn test_disable_accepts_nothing() {
        for record in Level::ALL {
            assert!(!Level::Disable.permits(record));
        }
        for threshold in Level::ALL {
            assert!(!threshold.permits(Level::Disable));
        }
    }

    proptest! {
        #[test]
        fn prop_permits_matches_numeric_order(threshold in 0u8..5, record in 1u8..5) {
            let threshold = Level::from_u8(threshold).unwrap();
            let record = Level::from_u8(record).unwrap();
            prop_assert_eq!(threshold.permits(record), (record as u8) <= (threshold as u8) && threshold != Level::Disable);
        }
    }
}
